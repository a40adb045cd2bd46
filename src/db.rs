use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "resultsd.sqlite3";

/// Academic entity tables that carry a `current` flag.
pub const ACADEMIC_TABLES: [&str; 3] = ["academic_sessions", "academic_terms", "exam_types"];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE_NAME))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    for table in ACADEMIC_TABLES {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table}(
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    current INTEGER NOT NULL DEFAULT 0
                )"
            ),
            [],
        )?;
        // At most one current row per entity kind.
        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_current
                 ON {table}(current) WHERE current = 1"
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            middle_name TEXT NOT NULL DEFAULT '',
            surname TEXT NOT NULL,
            gender TEXT NOT NULL DEFAULT '',
            current_class_id TEXT,
            current_status TEXT NOT NULL DEFAULT 'active',
            completed INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            FOREIGN KEY(current_class_id) REFERENCES classes(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(current_class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS result_cells(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            term_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            test_score REAL,
            exam_score REAL,
            average REAL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE,
            FOREIGN KEY(session_id) REFERENCES academic_sessions(id) ON DELETE CASCADE,
            FOREIGN KEY(term_id) REFERENCES academic_terms(id) ON DELETE CASCADE,
            FOREIGN KEY(exam_id) REFERENCES exam_types(id) ON DELETE CASCADE,
            UNIQUE(student_id, class_id, subject_id, session_id, term_id, exam_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_result_cells_cohort
         ON result_cells(class_id, session_id, term_id, exam_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_result_cells_student ON result_cells(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_infos(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            term_id TEXT NOT NULL,
            exam_id TEXT NOT NULL,
            ratings_json TEXT NOT NULL,
            date_of_opening TEXT,
            date_of_closing TEXT,
            head_comments TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            UNIQUE(student_id, session_id, term_id, exam_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff_financials(
            staff_id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            basic TEXT NOT NULL,
            special_allowance TEXT NOT NULL DEFAULT '0',
            has_helsb INTEGER NOT NULL DEFAULT 0,
            helsb_rate_percent TEXT NOT NULL DEFAULT '15'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_profiles(
            account_id TEXT PRIMARY KEY,
            phone TEXT,
            email TEXT,
            bio TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_role ON accounts(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

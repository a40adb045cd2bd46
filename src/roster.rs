//! Classes, subjects and students: the entities result cells point at.

use crate::db::now_rfc3339;
use crate::error::{conflict, Result, ResultsError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRef {
    pub id: String,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub middle_name: String,
    pub surname: String,
    pub gender: String,
    pub current_class_id: Option<String>,
    pub current_status: StudentStatus,
    pub completed: bool,
}

/// Full name with empty parts skipped.
pub fn display_name(first: &str, middle: &str, surname: &str) -> String {
    [first, middle, surname]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}


#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub surname: String,
    #[serde(default)]
    pub gender: String,
    pub current_class_id: Option<String>,
}

pub fn create_class(conn: &Connection, name: &str, sort_order: i64) -> Result<ClassRef> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, sort_order) VALUES(?, ?, ?)",
        (&id, name, sort_order),
    )
    .map_err(conflict)?;
    Ok(ClassRef {
        id,
        name: name.to_string(),
        sort_order,
    })
}

pub fn get_class(conn: &Connection, class_id: &str) -> Result<ClassRef> {
    conn.query_row(
        "SELECT id, name, sort_order FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassRef {
                id: r.get(0)?,
                name: r.get(1)?,
                sort_order: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ResultsError::UnknownClass(class_id.to_string()))
}

pub fn list_classes(conn: &Connection) -> Result<Vec<ClassRef>> {
    let mut stmt = conn.prepare("SELECT id, name, sort_order FROM classes ORDER BY sort_order, name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ClassRef {
                id: r.get(0)?,
                name: r.get(1)?,
                sort_order: r.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_subject(conn: &Connection, name: &str) -> Result<SubjectRef> {
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO subjects(id, name) VALUES(?, ?)", (&id, name))
        .map_err(conflict)?;
    Ok(SubjectRef {
        id,
        name: name.to_string(),
    })
}

pub fn get_subject(conn: &Connection, subject_id: &str) -> Result<SubjectRef> {
    conn.query_row(
        "SELECT id, name FROM subjects WHERE id = ?",
        [subject_id],
        |r| {
            Ok(SubjectRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ResultsError::UnknownSubject(subject_id.to_string()))
}

pub fn list_subjects(conn: &Connection) -> Result<Vec<SubjectRef>> {
    let mut stmt = conn.prepare("SELECT id, name FROM subjects ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(SubjectRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_student(conn: &Connection, new: &NewStudent) -> Result<Student> {
    if let Some(class_id) = new.current_class_id.as_deref() {
        get_class(conn, class_id)?;
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, first_name, middle_name, surname, gender, current_class_id, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            new.first_name.trim(),
            new.middle_name.trim(),
            new.surname.trim(),
            new.gender.trim().to_ascii_lowercase(),
            new.current_class_id.as_deref(),
            now_rfc3339(),
        ),
    )
    .map_err(conflict)?;
    get_student(conn, &id)
}

const STUDENT_COLUMNS: &str =
    "id, first_name, middle_name, surname, gender, current_class_id, current_status, completed";

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    let status: String = r.get(6)?;
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        middle_name: r.get(2)?,
        surname: r.get(3)?,
        gender: r.get(4)?,
        current_class_id: r.get(5)?,
        current_status: StudentStatus::parse(&status).unwrap_or(StudentStatus::Inactive),
        completed: r.get::<_, i64>(7)? != 0,
    })
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Student> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?"),
        [student_id],
        student_from_row,
    )
    .optional()?
    .ok_or_else(|| ResultsError::UnknownStudent(student_id.to_string()))
}

/// Students of a class (or every student), ordered female-first then by name
/// the way result-entry screens list them.
pub fn list_students(conn: &Connection, class_id: Option<&str>) -> Result<Vec<Student>> {
    let order = "ORDER BY CASE gender WHEN 'female' THEN 0 WHEN 'male' THEN 1 ELSE 2 END,
                 first_name, surname";
    let mut out = Vec::new();
    match class_id {
        Some(cid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STUDENT_COLUMNS} FROM students WHERE current_class_id = ? {order}"
            ))?;
            for row in stmt.query_map([cid], student_from_row)? {
                out.push(row?);
            }
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("SELECT {STUDENT_COLUMNS} FROM students {order}"))?;
            for row in stmt.query_map([], student_from_row)? {
                out.push(row?);
            }
        }
    }
    Ok(out)
}

fn bulk_update_students(
    conn: &Connection,
    set_clause: &str,
    value: Value,
    student_ids: &[String],
) -> Result<usize> {
    if student_ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; student_ids.len()].join(",");
    let sql = format!(
        "UPDATE students SET {set_clause} = ?, updated_at = ? WHERE id IN ({placeholders})"
    );
    let mut bind: Vec<Value> = Vec::with_capacity(student_ids.len() + 2);
    bind.push(value);
    bind.push(Value::Text(now_rfc3339()));
    bind.extend(student_ids.iter().map(|id| Value::Text(id.clone())));
    Ok(conn.execute(&sql, params_from_iter(bind)).map_err(conflict)?)
}

/// Flips `current_status` for many students with one statement.
pub fn set_students_status(
    conn: &Connection,
    student_ids: &[String],
    status: StudentStatus,
) -> Result<usize> {
    bulk_update_students(
        conn,
        "current_status",
        Value::Text(status.as_str().to_string()),
        student_ids,
    )
}

pub fn set_students_completed(
    conn: &Connection,
    student_ids: &[String],
    completed: bool,
) -> Result<usize> {
    bulk_update_students(
        conn,
        "completed",
        Value::Integer(i64::from(completed)),
        student_ids,
    )
}

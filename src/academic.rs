//! Academic context: the (session, term, exam) triple every result cell is
//! keyed by, and the "current" flag that supplies defaults.

use crate::error::{conflict, Result, ResultsError};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicKind {
    Session,
    Term,
    Exam,
}

impl AcademicKind {
    pub const ALL: [AcademicKind; 3] = [Self::Session, Self::Term, Self::Exam];

    pub fn table(self) -> &'static str {
        match self {
            Self::Session => "academic_sessions",
            Self::Term => "academic_terms",
            Self::Exam => "exam_types",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Term => "term",
            Self::Exam => "exam",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "session" => Some(Self::Session),
            "term" => Some(Self::Term),
            "exam" => Some(Self::Exam),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicEntity {
    pub id: String,
    pub name: String,
    pub current: bool,
}

/// Resolved (session, term, exam) handles for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicContext {
    pub session: AcademicRef,
    pub term: AcademicRef,
    pub exam: AcademicRef,
}

impl AcademicContext {
    pub fn ids(&self) -> (&str, &str, &str) {
        (&self.session.id, &self.term.id, &self.exam.id)
    }
}

/// Explicit identifiers a caller may supply; `None` means "use current".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    pub session_id: Option<String>,
    pub term_id: Option<String>,
    pub exam_id: Option<String>,
}

fn lookup(conn: &Connection, kind: AcademicKind, id: &str) -> Result<AcademicRef> {
    let sql = format!("SELECT id, name FROM {} WHERE id = ?", kind.table());
    conn.query_row(&sql, [id], |r| {
        Ok(AcademicRef {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })
    .optional()?
    .ok_or_else(|| ResultsError::UnknownAcademicEntity {
        kind: kind.label(),
        id: id.to_string(),
    })
}

pub fn current(conn: &Connection, kind: AcademicKind) -> Result<Option<AcademicRef>> {
    let sql = format!("SELECT id, name FROM {} WHERE current = 1", kind.table());
    Ok(conn
        .query_row(&sql, [], |r| {
            Ok(AcademicRef {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })
        .optional()?)
}

fn resolve_slot(
    conn: &Connection,
    kind: AcademicKind,
    explicit: Option<&str>,
) -> Result<AcademicRef> {
    match explicit {
        Some(id) => lookup(conn, kind, id),
        None => current(conn, kind)?.ok_or(ResultsError::ContextNotSet { slot: kind.label() }),
    }
}

/// Resolves the effective academic triple. Supplied ids are used as given
/// (after confirming they exist); omitted slots fall back to the current row.
pub fn resolve_academic_context(
    conn: &Connection,
    req: &ContextRequest,
) -> Result<AcademicContext> {
    Ok(AcademicContext {
        session: resolve_slot(conn, AcademicKind::Session, req.session_id.as_deref())?,
        term: resolve_slot(conn, AcademicKind::Term, req.term_id.as_deref())?,
        exam: resolve_slot(conn, AcademicKind::Exam, req.exam_id.as_deref())?,
    })
}

pub fn create(
    conn: &Connection,
    kind: AcademicKind,
    name: &str,
    make_current: bool,
) -> Result<AcademicRef> {
    let id = Uuid::new_v4().to_string();
    let sql = format!("INSERT INTO {}(id, name, current) VALUES(?, ?, 0)", kind.table());
    conn.execute(&sql, (&id, name)).map_err(conflict)?;
    if make_current {
        set_current(conn, kind, &id)?;
    }
    Ok(AcademicRef {
        id,
        name: name.to_string(),
    })
}

pub fn list(conn: &Connection, kind: AcademicKind) -> Result<Vec<AcademicEntity>> {
    let sql = format!(
        "SELECT id, name, current FROM {} ORDER BY name",
        kind.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AcademicEntity {
                id: r.get(0)?,
                name: r.get(1)?,
                current: r.get::<_, i64>(2)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Makes `id` the single current row of its kind, clearing the previous one
/// in the same transaction.
pub fn set_current(conn: &Connection, kind: AcademicKind, id: &str) -> Result<()> {
    lookup(conn, kind, id)?;
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        &format!("UPDATE {} SET current = 0 WHERE current = 1", kind.table()),
        [],
    )
    .map_err(conflict)?;
    tx.execute(
        &format!("UPDATE {} SET current = 1 WHERE id = ?", kind.table()),
        [id],
    )
    .map_err(conflict)?;
    tx.commit().map_err(conflict)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seed_all_current(conn: &Connection) -> (AcademicRef, AcademicRef, AcademicRef) {
        (
            create(conn, AcademicKind::Session, "2024/2025", true).expect("session"),
            create(conn, AcademicKind::Term, "Term I", true).expect("term"),
            create(conn, AcademicKind::Exam, "Midterm", true).expect("exam"),
        )
    }

    #[test]
    fn omitted_slots_use_current_rows() {
        let conn = db::open_in_memory().expect("db");
        let (s, t, e) = seed_all_current(&conn);
        let ctx = resolve_academic_context(&conn, &ContextRequest::default()).expect("resolve");
        assert_eq!(ctx.session, s);
        assert_eq!(ctx.term, t);
        assert_eq!(ctx.exam, e);
    }

    #[test]
    fn explicit_ids_win_over_current() {
        let conn = db::open_in_memory().expect("db");
        seed_all_current(&conn);
        let final_exam = create(&conn, AcademicKind::Exam, "Final", false).expect("final");
        let ctx = resolve_academic_context(
            &conn,
            &ContextRequest {
                exam_id: Some(final_exam.id.clone()),
                ..Default::default()
            },
        )
        .expect("resolve");
        assert_eq!(ctx.exam, final_exam);
    }

    #[test]
    fn missing_current_term_is_context_not_set() {
        let conn = db::open_in_memory().expect("db");
        create(&conn, AcademicKind::Session, "2024/2025", true).expect("session");
        create(&conn, AcademicKind::Term, "Term I", false).expect("term");
        create(&conn, AcademicKind::Exam, "Midterm", true).expect("exam");
        let e = resolve_academic_context(&conn, &ContextRequest::default()).unwrap_err();
        assert!(matches!(e, ResultsError::ContextNotSet { slot: "term" }));
    }

    #[test]
    fn unknown_explicit_id_is_reported() {
        let conn = db::open_in_memory().expect("db");
        seed_all_current(&conn);
        let e = resolve_academic_context(
            &conn,
            &ContextRequest {
                session_id: Some("nope".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            e,
            ResultsError::UnknownAcademicEntity { kind: "session", .. }
        ));
    }

    #[test]
    fn set_current_clears_previous() {
        let conn = db::open_in_memory().expect("db");
        let first = create(&conn, AcademicKind::Term, "Term I", true).expect("t1");
        let second = create(&conn, AcademicKind::Term, "Term II", false).expect("t2");
        set_current(&conn, AcademicKind::Term, &second.id).expect("set");

        let rows = list(&conn, AcademicKind::Term).expect("list");
        let flagged: Vec<&str> = rows
            .iter()
            .filter(|r| r.current)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(flagged, vec![second.id.as_str()]);
        assert_ne!(first.id, second.id);
    }
}

//! Per-term student report-card extras: behaviour ratings, term dates and
//! the head teacher's comment. Surfaced on reports, never aggregated.

use crate::academic::AcademicContext;
use crate::error::{conflict, Result, ResultsError};
use crate::roster;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Behaviour traits rated on every report card.
pub const BEHAVIOUR_TRAITS: [&str; 9] = [
    "cooperation_with_peers",
    "honesty",
    "hygiene",
    "willingness_to_work",
    "respect",
    "collaboration_in_work",
    "love_for_work",
    "behavior_improvement",
    "effort",
];

const RATINGS: [&str; 5] = ["A", "B", "C", "D", "F"];
const DEFAULT_RATING: &str = "A";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfos {
    /// Trait name to letter rating. Traits left out are rated "A".
    #[serde(default)]
    pub ratings: BTreeMap<String, String>,
    pub date_of_opening: Option<String>,
    pub date_of_closing: Option<String>,
    #[serde(default)]
    pub head_comments: String,
}

impl StudentInfos {
    fn normalized(&self) -> Result<Self> {
        let mut ratings: BTreeMap<String, String> = BEHAVIOUR_TRAITS
            .iter()
            .map(|t| (t.to_string(), DEFAULT_RATING.to_string()))
            .collect();
        for (name, letter) in &self.ratings {
            if !BEHAVIOUR_TRAITS.contains(&name.as_str()) {
                return Err(ResultsError::InvalidInfos(format!(
                    "unknown behaviour trait: {name}"
                )));
            }
            let letter = letter.trim().to_ascii_uppercase();
            if !RATINGS.contains(&letter.as_str()) {
                return Err(ResultsError::InvalidInfos(format!(
                    "rating for {name} must be one of A, B, C, D, F (got {letter})"
                )));
            }
            ratings.insert(name.clone(), letter);
        }
        Ok(Self {
            ratings,
            date_of_opening: parse_date("dateOfOpening", self.date_of_opening.as_deref())?,
            date_of_closing: parse_date("dateOfClosing", self.date_of_closing.as_deref())?,
            head_comments: self.head_comments.trim().to_string(),
        })
    }
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|d| Some(d.format(DATE_FORMAT).to_string()))
        .map_err(|_| ResultsError::InvalidInfos(format!("{field} must be YYYY-MM-DD (got {raw})")))
}

/// Creates or replaces the single infos record for the student and context.
pub fn save_student_infos(
    conn: &Connection,
    student_id: &str,
    ctx: &AcademicContext,
    infos: &StudentInfos,
) -> Result<StudentInfos> {
    roster::get_student(conn, student_id)?;
    let infos = infos.normalized()?;
    let ratings_json = serde_json::to_string(&infos.ratings)
        .map_err(|e| ResultsError::InvalidInfos(e.to_string()))?;
    let (session_id, term_id, exam_id) = ctx.ids();
    conn.execute(
        "INSERT INTO student_infos(
            id, student_id, session_id, term_id, exam_id,
            ratings_json, date_of_opening, date_of_closing, head_comments)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, session_id, term_id, exam_id) DO UPDATE SET
            ratings_json = excluded.ratings_json,
            date_of_opening = excluded.date_of_opening,
            date_of_closing = excluded.date_of_closing,
            head_comments = excluded.head_comments",
        (
            Uuid::new_v4().to_string(),
            student_id,
            session_id,
            term_id,
            exam_id,
            ratings_json,
            infos.date_of_opening.as_deref(),
            infos.date_of_closing.as_deref(),
            &infos.head_comments,
        ),
    )
    .map_err(conflict)?;
    Ok(infos)
}

pub fn get_student_infos(
    conn: &Connection,
    student_id: &str,
    ctx: &AcademicContext,
) -> Result<Option<StudentInfos>> {
    let (session_id, term_id, exam_id) = ctx.ids();
    let row: Option<(String, Option<String>, Option<String>, String)> = conn
        .query_row(
            "SELECT ratings_json, date_of_opening, date_of_closing, head_comments
             FROM student_infos
             WHERE student_id = ? AND session_id = ? AND term_id = ? AND exam_id = ?",
            (student_id, session_id, term_id, exam_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((ratings_json, date_of_opening, date_of_closing, head_comments)) = row else {
        return Ok(None);
    };
    let ratings = serde_json::from_str(&ratings_json).map_err(|e| {
        ResultsError::InvalidInfos(format!(
            "stored ratings for {student_id} are unreadable: {e}"
        ))
    })?;
    Ok(Some(StudentInfos {
        ratings,
        date_of_opening,
        date_of_closing,
        head_comments,
    }))
}

/// Students in `student_ids` whose infos for the context carry a non-empty
/// head comment.
pub(crate) fn count_commented(
    conn: &Connection,
    student_ids: &[String],
    ctx: &AcademicContext,
) -> Result<usize> {
    let mut n = 0;
    for id in student_ids {
        if let Some(infos) = get_student_infos(conn, id, ctx)? {
            if !infos.head_comments.is_empty() {
                n += 1;
            }
        }
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::{self, AcademicKind, ContextRequest};
    use crate::db;
    use crate::roster::NewStudent;

    fn setup() -> (Connection, AcademicContext, String) {
        let conn = db::open_in_memory().expect("db");
        for kind in AcademicKind::ALL {
            academic::create(&conn, kind, "first", true).expect("academic");
        }
        let ctx = academic::resolve_academic_context(&conn, &ContextRequest::default())
            .expect("ctx");
        let s = roster::create_student(
            &conn,
            &NewStudent {
                first_name: "Neema".into(),
                surname: "Lyimo".into(),
                ..Default::default()
            },
        )
        .expect("student");
        (conn, ctx, s.id)
    }

    #[test]
    fn save_fills_default_ratings_and_round_trips() {
        let (conn, ctx, sid) = setup();
        let mut ratings = BTreeMap::new();
        ratings.insert("honesty".to_string(), "b".to_string());
        let saved = save_student_infos(
            &conn,
            &sid,
            &ctx,
            &StudentInfos {
                ratings,
                date_of_opening: Some("2025-07-07".into()),
                date_of_closing: None,
                head_comments: "  Keep it up  ".into(),
            },
        )
        .expect("save");
        assert_eq!(saved.ratings.len(), BEHAVIOUR_TRAITS.len());
        assert_eq!(saved.ratings["honesty"], "B");
        assert_eq!(saved.ratings["effort"], "A");
        assert_eq!(saved.head_comments, "Keep it up");

        let loaded = get_student_infos(&conn, &sid, &ctx).expect("get");
        assert_eq!(loaded, Some(saved));
    }

    #[test]
    fn second_save_replaces_the_record() {
        let (conn, ctx, sid) = setup();
        save_student_infos(
            &conn,
            &sid,
            &ctx,
            &StudentInfos {
                head_comments: "first".into(),
                ..Default::default()
            },
        )
        .expect("first");
        save_student_infos(
            &conn,
            &sid,
            &ctx,
            &StudentInfos {
                head_comments: "second".into(),
                ..Default::default()
            },
        )
        .expect("second");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_infos", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 1);
        let loaded = get_student_infos(&conn, &sid, &ctx).expect("get").expect("row");
        assert_eq!(loaded.head_comments, "second");
    }

    #[test]
    fn rejects_bad_rating_trait_and_date() {
        let (conn, ctx, sid) = setup();
        let bad_letter = StudentInfos {
            ratings: BTreeMap::from([("honesty".to_string(), "E".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            save_student_infos(&conn, &sid, &ctx, &bad_letter),
            Err(ResultsError::InvalidInfos(_))
        ));
        let bad_trait = StudentInfos {
            ratings: BTreeMap::from([("punctuality".to_string(), "A".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            save_student_infos(&conn, &sid, &ctx, &bad_trait),
            Err(ResultsError::InvalidInfos(_))
        ));
        let bad_date = StudentInfos {
            date_of_closing: Some("07/07/2025".into()),
            ..Default::default()
        };
        assert!(matches!(
            save_student_infos(&conn, &sid, &ctx, &bad_date),
            Err(ResultsError::InvalidInfos(_))
        ));
    }

    #[test]
    fn unreadable_stored_ratings_are_reported() {
        let (conn, ctx, sid) = setup();
        save_student_infos(&conn, &sid, &ctx, &StudentInfos::default()).expect("save");
        conn.execute("UPDATE student_infos SET ratings_json = '{not json'", [])
            .expect("corrupt");
        assert!(matches!(
            get_student_infos(&conn, &sid, &ctx),
            Err(ResultsError::InvalidInfos(_))
        ));
    }

    #[test]
    fn unknown_student_is_rejected() {
        let (conn, ctx, _) = setup();
        let e = save_student_infos(&conn, "ghost", &ctx, &StudentInfos::default()).unwrap_err();
        assert!(matches!(e, ResultsError::UnknownStudent(_)));
    }
}

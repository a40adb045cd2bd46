//! Result store gateway: typed queries and atomic writes over `result_cells`.

use crate::academic::AcademicContext;
use crate::calc::scoring::{self, ScoreFn};
use crate::db::now_rfc3339;
use crate::error::{conflict, Result, ResultsError};
use crate::roster;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Upper bound accepted for a single test or exam component.
pub const SCORE_CEILING: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultCell {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub session_id: String,
    pub term_id: String,
    pub exam_id: String,
    pub test_score: Option<f64>,
    pub exam_score: Option<f64>,
    /// Mark stored with the scores, from the rule they were written with.
    pub average: Option<f64>,
}

impl ResultCell {
    pub fn is_taken(&self) -> bool {
        self.test_score.is_some() || self.exam_score.is_some()
    }
}

/// Predicate over result cells. Unset fields match everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellFilter {
    pub session_id: Option<String>,
    pub term_id: Option<String>,
    pub exam_id: Option<String>,
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub student_id: Option<String>,
    /// Whitespace-separated name fragments; a cell matches when any fragment
    /// appears in any of the student's names (case-insensitive).
    pub student_name: Option<String>,
}

impl CellFilter {
    pub fn for_context(ctx: &AcademicContext) -> Self {
        let (session, term, exam) = ctx.ids();
        Self {
            session_id: Some(session.to_string()),
            term_id: Some(term.to_string()),
            exam_id: Some(exam.to_string()),
            ..Default::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind: Vec<Value> = Vec::new();
        let exact = [
            ("rc.session_id", &self.session_id),
            ("rc.term_id", &self.term_id),
            ("rc.exam_id", &self.exam_id),
            ("rc.class_id", &self.class_id),
            ("rc.subject_id", &self.subject_id),
            ("rc.student_id", &self.student_id),
        ];
        for (col, v) in exact {
            if let Some(v) = v {
                clauses.push(format!("{col} = ?"));
                bind.push(Value::Text(v.clone()));
            }
        }
        if let Some(name) = self.student_name.as_deref() {
            let mut any: Vec<String> = Vec::new();
            for part in name.split_whitespace() {
                let pattern = format!("%{}%", escape_like(part));
                any.push(
                    "(s.first_name LIKE ? ESCAPE '\\' OR s.middle_name LIKE ? ESCAPE '\\' OR s.surname LIKE ? ESCAPE '\\')"
                        .to_string(),
                );
                for _ in 0..3 {
                    bind.push(Value::Text(pattern.clone()));
                }
            }
            if !any.is_empty() {
                clauses.push(format!("({})", any.join(" OR ")));
            }
        }
        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        (sql, bind)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

const CELL_SELECT: &str = "SELECT rc.id, rc.student_id,
        s.first_name, s.middle_name, s.surname,
        rc.class_id, rc.subject_id, sub.name, rc.session_id, rc.term_id, rc.exam_id,
        rc.test_score, rc.exam_score, rc.average
     FROM result_cells rc
     JOIN students s ON s.id = rc.student_id
     JOIN subjects sub ON sub.id = rc.subject_id";

fn cell_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ResultCell> {
    let first: String = r.get(2)?;
    let middle: String = r.get(3)?;
    let surname: String = r.get(4)?;
    Ok(ResultCell {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: roster::display_name(&first, &middle, &surname),
        class_id: r.get(5)?,
        subject_id: r.get(6)?,
        subject_name: r.get(7)?,
        session_id: r.get(8)?,
        term_id: r.get(9)?,
        exam_id: r.get(10)?,
        test_score: r.get(11)?,
        exam_score: r.get(12)?,
        average: r.get(13)?,
    })
}

/// Cells matching `filter`, ordered by student name then subject name.
pub fn query_cells(conn: &Connection, filter: &CellFilter) -> Result<Vec<ResultCell>> {
    let (where_sql, bind) = filter.where_clause();
    let sql = format!(
        "{CELL_SELECT} {where_sql}
         ORDER BY s.first_name, s.surname, rc.student_id, sub.name"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), cell_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The cohort of one class for one academic context, optionally narrowed to
/// a subject and/or a student-name search.
pub fn fetch_cells(
    conn: &Connection,
    class_id: &str,
    ctx: &AcademicContext,
    subject_id: Option<&str>,
    student_name: Option<&str>,
) -> Result<Vec<ResultCell>> {
    let filter = CellFilter {
        class_id: Some(class_id.to_string()),
        subject_id: subject_id.map(str::to_string),
        student_name: student_name.map(str::to_string),
        ..CellFilter::for_context(ctx)
    };
    query_cells(conn, &filter)
}

pub fn get_cell(conn: &Connection, cell_id: &str) -> Result<ResultCell> {
    conn.query_row(&format!("{CELL_SELECT} WHERE rc.id = ?"), [cell_id], cell_from_row)
        .optional()?
        .ok_or_else(|| ResultsError::UnknownCell(cell_id.to_string()))
}

/// Creates every missing (student, subject) cell for the class and context
/// with empty scores. Existing cells are left alone, so repeating the call
/// creates nothing. Returns the number of cells created.
pub fn bulk_create_cells(
    conn: &Connection,
    student_ids: &[String],
    subject_ids: &[String],
    class_id: &str,
    ctx: &AcademicContext,
) -> Result<usize> {
    roster::get_class(conn, class_id)?;
    let subjects: BTreeSet<&str> = subject_ids.iter().map(String::as_str).collect();
    for sid in &subjects {
        roster::get_subject(conn, sid)?;
    }
    let students: BTreeSet<&str> = student_ids.iter().map(String::as_str).collect();
    for sid in &students {
        roster::get_student(conn, sid)?;
    }

    let (session_id, term_id, exam_id) = ctx.ids();
    let now = now_rfc3339();
    let tx = conn.unchecked_transaction()?;
    let mut created = 0_usize;
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO result_cells(
                    id, student_id, class_id, subject_id, session_id, term_id, exam_id,
                    test_score, exam_score, average, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?)
                 ON CONFLICT(student_id, class_id, subject_id, session_id, term_id, exam_id)
                 DO NOTHING",
            )
            .map_err(conflict)?;
        for student_id in &students {
            for subject_id in &subjects {
                created += stmt
                    .execute((
                        Uuid::new_v4().to_string(),
                        student_id,
                        class_id,
                        subject_id,
                        session_id,
                        term_id,
                        exam_id,
                        &now,
                    ))
                    .map_err(conflict)?;
            }
        }
    }
    tx.commit().map_err(conflict)?;
    Ok(created)
}

/// Deletes every cell matching `filter` in one statement.
pub fn delete_cells(conn: &Connection, filter: &CellFilter) -> Result<usize> {
    let (where_sql, bind) = filter.where_clause();
    let sql = format!(
        "DELETE FROM result_cells WHERE id IN (
            SELECT rc.id FROM result_cells rc
            JOIN students s ON s.id = rc.student_id
            {where_sql})"
    );
    let tx = conn.unchecked_transaction()?;
    let deleted = tx
        .execute(&sql, params_from_iter(bind))
        .map_err(conflict)?;
    tx.commit().map_err(conflict)?;
    Ok(deleted)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEdit {
    pub cell_id: String,
    pub test_score: Option<f64>,
    pub exam_score: Option<f64>,
}

fn validate_component(label: &str, v: Option<f64>) -> Result<()> {
    if let Some(v) = v {
        if !v.is_finite() || !(0.0..=SCORE_CEILING).contains(&v) {
            return Err(ResultsError::InvalidScore(format!(
                "{label} {v} must be within 0..={SCORE_CEILING}"
            )));
        }
    }
    Ok(())
}

fn write_scores(conn: &Connection, edit: &CellEdit, scorer: ScoreFn) -> Result<()> {
    let average = scoring::score_with(scorer, edit.test_score, edit.exam_score).average;
    let n = conn
        .execute(
            "UPDATE result_cells
             SET test_score = ?, exam_score = ?, average = ?, updated_at = ?
             WHERE id = ?",
            (
                edit.test_score,
                edit.exam_score,
                average,
                now_rfc3339(),
                &edit.cell_id,
            ),
        )
        .map_err(conflict)?;
    if n == 0 {
        return Err(ResultsError::UnknownCell(edit.cell_id.clone()));
    }
    Ok(())
}

/// Sets both score components of one cell (`None` clears a component) and
/// refreshes the stored average with the default scoring rule.
pub fn update_cell_scores(conn: &Connection, edit: &CellEdit) -> Result<ResultCell> {
    update_cell_scores_with(conn, edit, scoring::mean_of_components)
}

/// As [`update_cell_scores`], storing the average `scorer` gives.
pub fn update_cell_scores_with(
    conn: &Connection,
    edit: &CellEdit,
    scorer: ScoreFn,
) -> Result<ResultCell> {
    validate_component("test score", edit.test_score)?;
    validate_component("exam score", edit.exam_score)?;
    write_scores(conn, edit, scorer)?;
    get_cell(conn, &edit.cell_id)
}

/// Applies every edit or none of them.
pub fn update_cells_bulk(conn: &Connection, edits: &[CellEdit]) -> Result<usize> {
    update_cells_bulk_with(conn, edits, scoring::mean_of_components)
}

pub fn update_cells_bulk_with(
    conn: &Connection,
    edits: &[CellEdit],
    scorer: ScoreFn,
) -> Result<usize> {
    for e in edits {
        validate_component("test score", e.test_score)?;
        validate_component("exam score", e.exam_score)?;
    }
    let tx = conn.unchecked_transaction()?;
    for e in edits {
        // Dropping `tx` on error rolls back the edits already applied.
        write_scores(&tx, e, scorer)?;
    }
    tx.commit().map_err(conflict)?;
    Ok(edits.len())
}

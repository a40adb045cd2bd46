//! Report assembly: loads a cohort through the store and runs it through
//! the calc pipeline (score, aggregate, rank, subject stats).

use crate::academic::AcademicContext;
use crate::calc::aggregate::{aggregate_cohort, PassStatus, StudentAggregate};
use crate::calc::policy::{ReportPolicy, NO_GRADE};
use crate::calc::ranking::rank_cohort;
use crate::calc::subjects::{subject_stats, SubjectStat};
use crate::error::Result;
use crate::infos::{self, StudentInfos};
use crate::roster::{self, ClassRef, Student, StudentStatus};
use crate::store::{self, CellFilter};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class: ClassRef,
    pub context: AcademicContext,
    /// Ordered by position.
    pub students: Vec<StudentAggregate>,
    /// Ordered by subject average, best first.
    pub subjects: Vec<SubjectStat>,
}

pub fn compute_class_results(
    conn: &Connection,
    class_id: &str,
    ctx: &AcademicContext,
    policy: &ReportPolicy,
) -> Result<ClassReport> {
    policy.validate()?;
    let class = roster::get_class(conn, class_id)?;
    let cells = store::fetch_cells(conn, class_id, ctx, None, None)?;
    Ok(ClassReport {
        class,
        context: ctx.clone(),
        students: rank_cohort(aggregate_cohort(&cells, policy)),
        subjects: subject_stats(&cells, policy),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub test_score: Option<f64>,
    pub exam_score: Option<f64>,
    pub average: Option<f64>,
    pub grade: String,
    pub remark: String,
    /// `None` when the subject was not taken.
    pub status: Option<PassStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    /// Class the student was ranked in; `None` if it cannot be determined.
    pub class: Option<ClassRef>,
    pub context: AcademicContext,
    pub subjects: Vec<SubjectLine>,
    pub total: f64,
    pub total_rounded: f64,
    pub taken_count: usize,
    pub overall_average: f64,
    pub overall_status: PassStatus,
    pub overall_grade: String,
    pub overall_total_marks: f64,
    pub position: Option<f64>,
    pub cohort_size: usize,
    pub infos: Option<StudentInfos>,
}

/// Class to rank a student in: the current class when the student has cells
/// there (or none anywhere), else the class of the student's first cell.
fn report_class_id(
    conn: &Connection,
    student: &Student,
    ctx: &AcademicContext,
) -> Result<Option<String>> {
    let own = store::query_cells(
        conn,
        &CellFilter {
            student_id: Some(student.id.clone()),
            ..CellFilter::for_context(ctx)
        },
    )?;
    if let Some(current) = student.current_class_id.as_deref() {
        if own.is_empty() || own.iter().any(|c| c.class_id == current) {
            return Ok(Some(current.to_string()));
        }
    }
    Ok(own.into_iter().next().map(|c| c.class_id))
}

fn subject_lines(agg: &StudentAggregate, policy: &ReportPolicy) -> Vec<SubjectLine> {
    agg.subjects
        .iter()
        .map(|(name, mark)| match mark.average {
            Some(avg) => SubjectLine {
                subject_id: mark.subject_id.clone(),
                subject_name: name.clone(),
                test_score: mark.test_score,
                exam_score: mark.exam_score,
                average: Some(avg),
                grade: policy.grading_bands.letter(avg).to_string(),
                remark: policy.grading_bands.remark(avg).to_string(),
                status: Some(PassStatus::of(policy, avg)),
            },
            None => SubjectLine {
                subject_id: mark.subject_id.clone(),
                subject_name: name.clone(),
                test_score: None,
                exam_score: None,
                average: None,
                grade: NO_GRADE.to_string(),
                remark: String::new(),
                status: None,
            },
        })
        .collect()
}

/// One student's report card: their subjects, overall figures and position
/// within their class cohort for the context.
pub fn compute_student_report(
    conn: &Connection,
    student_id: &str,
    ctx: &AcademicContext,
    policy: &ReportPolicy,
) -> Result<StudentReport> {
    policy.validate()?;
    let student = roster::get_student(conn, student_id)?;
    let class = match report_class_id(conn, &student, ctx)? {
        Some(id) => Some(roster::get_class(conn, &id)?),
        None => None,
    };

    let ranked = match &class {
        Some(c) => rank_cohort(aggregate_cohort(
            &store::fetch_cells(conn, &c.id, ctx, None, None)?,
            policy,
        )),
        None => Vec::new(),
    };
    let cohort_size = ranked.len();
    let own = ranked.into_iter().find(|a| a.student_id == student.id);
    let infos = infos::get_student_infos(conn, &student.id, ctx)?;

    let report = match own {
        Some(agg) => StudentReport {
            subjects: subject_lines(&agg, policy),
            total: agg.total,
            total_rounded: agg.total_rounded,
            taken_count: agg.taken_count,
            overall_average: agg.overall_average,
            overall_status: agg.overall_status,
            overall_grade: agg.overall_grade,
            overall_total_marks: agg.overall_total_marks,
            position: agg.position,
            student,
            class,
            context: ctx.clone(),
            cohort_size,
            infos,
        },
        None => StudentReport {
            subjects: Vec::new(),
            total: 0.0,
            total_rounded: 0.0,
            taken_count: 0,
            overall_average: 0.0,
            overall_status: PassStatus::of(policy, 0.0),
            overall_grade: NO_GRADE.to_string(),
            overall_total_marks: 0.0,
            position: None,
            student,
            class,
            context: ctx.clone(),
            cohort_size,
            infos,
        },
    };
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStatus {
    pub class: ClassRef,
    pub context: AcademicContext,
    /// Students with at least one cell in the cohort.
    pub students_with_results: usize,
    /// Of those, how many are active and not completed.
    pub active_pending: usize,
    /// Of those, how many have a head comment recorded.
    pub completed_forms: usize,
    /// Students with at least one taken cell, ranked among themselves.
    pub ranking: Vec<StudentAggregate>,
}

/// Progress of report-card preparation for one class and context.
pub fn compute_form_status(
    conn: &Connection,
    class_id: &str,
    ctx: &AcademicContext,
    policy: &ReportPolicy,
) -> Result<FormStatus> {
    policy.validate()?;
    let class = roster::get_class(conn, class_id)?;
    let cells = store::fetch_cells(conn, class_id, ctx, None, None)?;
    let aggregates = aggregate_cohort(&cells, policy);

    let ids: Vec<String> = aggregates.iter().map(|a| a.student_id.clone()).collect();
    let mut active_pending = 0;
    for id in &ids {
        let s = roster::get_student(conn, id)?;
        if s.current_status == StudentStatus::Active && !s.completed {
            active_pending += 1;
        }
    }
    let completed_forms = infos::count_commented(conn, &ids, ctx)?;
    let ranking = rank_cohort(
        aggregates
            .into_iter()
            .filter(|a| a.taken_count > 0)
            .collect(),
    );

    Ok(FormStatus {
        class,
        context: ctx.clone(),
        students_with_results: ids.len(),
        active_pending,
        completed_forms,
        ranking,
    })
}

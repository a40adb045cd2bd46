use crate::calc::policy::{round_half_up, ReportPolicy, NO_GRADE};
use crate::calc::scoring::score_with;
use crate::store::ResultCell;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Places kept from each cell mark before summing. Entered scores carry two.
const MARK_DP: u32 = 6;

/// Cell mark as an exact decimal, so totals do not depend on summation order.
pub fn exact_mark(mark: f64) -> Decimal {
    // A non-finite mark from a custom scorer adds nothing.
    Decimal::from_f64(mark).map_or(Decimal::ZERO, |d| d.round_dp(MARK_DP))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pass,
    Fail,
}

impl PassStatus {
    pub fn of(policy: &ReportPolicy, avg: f64) -> Self {
        if policy.is_pass(avg) {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMark {
    pub subject_id: String,
    pub test_score: Option<f64>,
    pub exam_score: Option<f64>,
    /// `None` when neither component was entered.
    pub average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAggregate {
    pub student_id: String,
    pub student_name: String,
    /// Keyed by subject name.
    pub subjects: BTreeMap<String, SubjectMark>,
    pub total: f64,
    /// `total` rounded half-up to an integer for display.
    pub total_rounded: f64,
    pub taken_count: usize,
    pub overall_average: f64,
    pub overall_status: PassStatus,
    pub overall_grade: String,
    pub overall_total_marks: f64,
    /// Filled in by the ranking pass.
    pub position: Option<f64>,
    /// Exact sum behind `total`.
    #[serde(skip)]
    pub exact_total: Decimal,
    /// Exact mean behind `overall_average`; ranking compares this.
    #[serde(skip)]
    pub exact_average: Decimal,
}

/// Folds a cohort's cells into one aggregate per student, in order of each
/// student's first cell.
pub fn aggregate_cohort(cells: &[ResultCell], policy: &ReportPolicy) -> Vec<StudentAggregate> {
    let mut out: Vec<StudentAggregate> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for cell in cells {
        let i = *index.entry(cell.student_id.as_str()).or_insert_with(|| {
            out.push(StudentAggregate {
                student_id: cell.student_id.clone(),
                student_name: cell.student_name.clone(),
                subjects: BTreeMap::new(),
                total: 0.0,
                total_rounded: 0.0,
                taken_count: 0,
                overall_average: 0.0,
                overall_status: PassStatus::Fail,
                overall_grade: NO_GRADE.to_string(),
                overall_total_marks: 0.0,
                position: None,
                exact_total: Decimal::ZERO,
                exact_average: Decimal::ZERO,
            });
            out.len() - 1
        });
        let agg = &mut out[i];

        let scored = score_with(policy.scorer, cell.test_score, cell.exam_score);
        if let (true, Some(avg)) = (scored.taken, scored.average) {
            agg.exact_total += exact_mark(avg);
            agg.taken_count += 1;
        }
        agg.subjects.insert(
            cell.subject_name.clone(),
            SubjectMark {
                subject_id: cell.subject_id.clone(),
                test_score: cell.test_score,
                exam_score: cell.exam_score,
                average: scored.average,
            },
        );
    }

    for agg in &mut out {
        finish(agg, policy);
    }
    out
}

fn finish(agg: &mut StudentAggregate, policy: &ReportPolicy) {
    agg.exact_average = if agg.taken_count > 0 {
        agg.exact_total / Decimal::from(agg.taken_count)
    } else {
        Decimal::ZERO
    };
    agg.total = agg.exact_total.as_f64();
    agg.overall_average = agg.exact_average.as_f64();
    agg.total_rounded = round_half_up(agg.total, 0);
    agg.overall_status = PassStatus::of(policy, agg.overall_average);
    agg.overall_grade = if agg.taken_count > 0 {
        policy
            .grading_bands
            .letter(agg.overall_average)
            .to_string()
    } else {
        NO_GRADE.to_string()
    };
    agg.overall_total_marks = agg.taken_count as f64 * policy.subject_max;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn cell(
        student: &str,
        subject: &str,
        test: Option<f64>,
        exam: Option<f64>,
    ) -> ResultCell {
        ResultCell {
            id: format!("{student}-{subject}"),
            student_id: student.to_string(),
            student_name: student.to_string(),
            class_id: "c".into(),
            subject_id: subject.to_string(),
            subject_name: subject.to_string(),
            session_id: "s".into(),
            term_id: "t".into(),
            exam_id: "e".into(),
            test_score: test,
            exam_score: exam,
            average: None,
        }
    }

    #[test]
    fn totals_and_average_over_taken_cells() {
        let cells = vec![
            cell("A", "MATH", Some(80.0), Some(80.0)),
            cell("A", "ENG", Some(90.0), Some(70.0)),
        ];
        let aggs = aggregate_cohort(&cells, &ReportPolicy::primary());
        assert_eq!(aggs.len(), 1);
        let a = &aggs[0];
        assert_eq!(a.total, 160.0);
        assert_eq!(a.taken_count, 2);
        assert_eq!(a.overall_average, 80.0);
        assert_eq!(a.overall_status, PassStatus::Pass);
        assert_eq!(a.overall_grade, "B");
        assert_eq!(a.overall_total_marks, 200.0);
    }

    #[test]
    fn not_taken_cells_are_listed_but_not_counted() {
        let cells = vec![
            cell("X", "MATH", Some(70.0), Some(70.0)),
            cell("X", "ENG", None, None),
        ];
        let x = &aggregate_cohort(&cells, &ReportPolicy::primary())[0];
        assert_eq!(x.taken_count, 1);
        assert_eq!(x.overall_average, 70.0);
        assert_eq!(x.overall_total_marks, 100.0);
        assert_eq!(x.subjects["ENG"].average, None);
        assert_eq!(x.subjects["MATH"].average, Some(70.0));
    }

    #[test]
    fn student_without_taken_cells_scores_zero_and_fails() {
        let cells = vec![cell("Y", "MATH", None, None)];
        let y = &aggregate_cohort(&cells, &ReportPolicy::primary())[0];
        assert_eq!(y.taken_count, 0);
        assert_eq!(y.overall_average, 0.0);
        assert_eq!(y.overall_status, PassStatus::Fail);
        assert_eq!(y.overall_grade, NO_GRADE);
    }

    #[test]
    fn pass_threshold_is_inclusive_and_per_policy() {
        let cells = vec![cell("Z", "MATH", Some(25.0), Some(25.0))];
        let primary = &aggregate_cohort(&cells, &ReportPolicy::primary())[0];
        assert_eq!(primary.overall_status, PassStatus::Fail);
        let secondary = &aggregate_cohort(&cells, &ReportPolicy::secondary())[0];
        assert_eq!(secondary.overall_status, PassStatus::Pass);
        assert_eq!(secondary.overall_total_marks, 50.0);

        let edge = vec![cell("W", "MATH", Some(50.0), None)];
        assert_eq!(
            aggregate_cohort(&edge, &ReportPolicy::primary())[0].overall_status,
            PassStatus::Pass
        );
    }

    #[test]
    fn total_rounds_half_up_for_display_only() {
        let cells = vec![
            cell("R", "MATH", Some(60.0), Some(61.0)),
            cell("R", "ENG", Some(50.0), Some(50.0)),
        ];
        let r = &aggregate_cohort(&cells, &ReportPolicy::primary())[0];
        assert_eq!(r.total, 110.5);
        assert_eq!(r.total_rounded, 111.0);
        assert_eq!(r.overall_average, 55.25);
    }

    #[test]
    fn students_keep_first_appearance_order() {
        let cells = vec![
            cell("B", "MATH", Some(1.0), None),
            cell("A", "MATH", Some(2.0), None),
            cell("B", "ENG", Some(3.0), None),
        ];
        let ids: Vec<String> = aggregate_cohort(&cells, &ReportPolicy::primary())
            .into_iter()
            .map(|a| a.student_id)
            .collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn permuted_fractional_marks_give_identical_totals() {
        let cells = vec![
            cell("X", "A", Some(41.6), Some(41.6)),
            cell("X", "B", Some(91.65), Some(91.65)),
            cell("X", "C", Some(92.2), Some(92.2)),
            cell("Y", "A", Some(91.65), Some(91.65)),
            cell("Y", "B", Some(92.2), Some(92.2)),
            cell("Y", "C", Some(41.6), Some(41.6)),
        ];
        let aggs = aggregate_cohort(&cells, &ReportPolicy::primary());
        assert_eq!(aggs[0].exact_total, aggs[1].exact_total);
        assert_eq!(aggs[0].exact_average, aggs[1].exact_average);
        assert_eq!(aggs[0].total, 225.45);
        assert_eq!(aggs[0].overall_average, aggs[1].overall_average);
    }

    #[test]
    fn exact_mark_drops_binary_noise() {
        assert_eq!(exact_mark(0.1 + 0.2), exact_mark(0.3));
        assert_eq!(exact_mark(f64::NAN), Decimal::ZERO);
    }
}

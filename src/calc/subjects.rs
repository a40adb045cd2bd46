use crate::calc::policy::{ReportPolicy, NO_GRADE};
use crate::calc::scoring::score_with;
use crate::store::ResultCell;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject_id: String,
    pub subject_name: String,
    /// Class mean over taken cells, rounded per policy. `None` if nobody
    /// took the subject.
    pub average: Option<f64>,
    pub grade: String,
    pub remark: String,
    pub gpa: f64,
    pub taken_count: usize,
}

#[derive(Default)]
struct Acc {
    subject_id: String,
    sum: f64,
    count: usize,
}

/// Per-subject class statistics, best average first. Subjects nobody took
/// sort last.
pub fn subject_stats(cells: &[ResultCell], policy: &ReportPolicy) -> Vec<SubjectStat> {
    let mut by_subject: BTreeMap<&str, Acc> = BTreeMap::new();
    for cell in cells {
        let acc = by_subject
            .entry(cell.subject_name.as_str())
            .or_insert_with(|| Acc {
                subject_id: cell.subject_id.clone(),
                ..Default::default()
            });
        let scored = score_with(policy.scorer, cell.test_score, cell.exam_score);
        if let (true, Some(avg)) = (scored.taken, scored.average) {
            acc.sum += avg;
            acc.count += 1;
        }
    }

    let mut out: Vec<SubjectStat> = by_subject
        .into_iter()
        .map(|(name, acc)| {
            if acc.count == 0 {
                return SubjectStat {
                    subject_id: acc.subject_id,
                    subject_name: name.to_string(),
                    average: None,
                    grade: NO_GRADE.to_string(),
                    remark: String::new(),
                    gpa: 0.0,
                    taken_count: 0,
                };
            }
            let mean = acc.sum / acc.count as f64;
            let shown = policy.subject_rounding.apply(mean);
            SubjectStat {
                subject_id: acc.subject_id,
                subject_name: name.to_string(),
                average: Some(shown),
                grade: policy.grading_bands.letter(shown).to_string(),
                remark: policy.grading_bands.remark(shown).to_string(),
                gpa: policy.gpa(mean),
                taken_count: acc.count,
            }
        })
        .collect();

    out.sort_by(|a, b| match (a.average, b.average) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    out
}

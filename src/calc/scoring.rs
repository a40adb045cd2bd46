/// Rule that merges a cell's test and exam components into one mark.
///
/// Only called when at least one component is present; it must still be
/// total and deterministic over both inputs.
pub type ScoreFn = fn(Option<f64>, Option<f64>) -> f64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellScore {
    pub average: Option<f64>,
    pub taken: bool,
}

/// Default merging rule: both components present gives their mean, a single
/// component stands in for the whole mark.
pub fn mean_of_components(test: Option<f64>, exam: Option<f64>) -> f64 {
    match (test, exam) {
        (Some(t), Some(e)) => (t + e) / 2.0,
        (Some(t), None) => t,
        (None, Some(e)) => e,
        (None, None) => 0.0,
    }
}

pub fn score_with(rule: ScoreFn, test: Option<f64>, exam: Option<f64>) -> CellScore {
    if test.is_none() && exam.is_none() {
        return CellScore {
            average: None,
            taken: false,
        };
    }
    CellScore {
        average: Some(rule(test, exam)),
        taken: true,
    }
}

pub fn score(test: Option<f64>, exam: Option<f64>) -> CellScore {
    score_with(mean_of_components, test, exam)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_components_average() {
        assert_eq!(score(Some(90.0), Some(70.0)).average, Some(80.0));
        assert_eq!(score(Some(60.0), Some(50.0)).average, Some(55.0));
    }

    #[test]
    fn single_component_stands_alone() {
        let s = score(Some(64.0), None);
        assert!(s.taken);
        assert_eq!(s.average, Some(64.0));
        assert_eq!(score(None, Some(12.5)).average, Some(12.5));
    }

    #[test]
    fn empty_cell_is_not_taken() {
        let s = score(None, None);
        assert!(!s.taken);
        assert_eq!(s.average, None);
    }

    #[test]
    fn zero_scores_still_count_as_taken() {
        let s = score(Some(0.0), Some(0.0));
        assert!(s.taken);
        assert_eq!(s.average, Some(0.0));
    }

    #[test]
    fn custom_rule_is_used() {
        fn exam_weighted(test: Option<f64>, exam: Option<f64>) -> f64 {
            0.25 * test.unwrap_or(0.0) + 0.75 * exam.unwrap_or(0.0)
        }
        let s = score_with(exam_weighted, Some(40.0), Some(80.0));
        assert_eq!(s.average, Some(70.0));
        assert!(!score_with(exam_weighted, None, None).taken);
    }
}

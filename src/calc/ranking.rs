//! Class positions.
//!
//! Positions follow the school's tie convention rather than a standard
//! competition rank: walk the cohort in descending average, and for each run
//! of equal averages starting at position `p`, a lone entry gets `p` while
//! every member of a tied run of `k` gets `p + 0.5`. The next run starts at
//! `p + k`. Ties are detected by exact equality of the decimal averages and
//! never broken by a secondary key.

use crate::calc::aggregate::StudentAggregate;

/// Positions for averages already sorted in descending order.
pub fn tie_averaged_positions<T: PartialEq>(sorted_desc: &[T]) -> Vec<f64> {
    let mut positions = Vec::with_capacity(sorted_desc.len());
    let mut current = 1_usize;
    let mut i = 0;
    while i < sorted_desc.len() {
        let mut j = i + 1;
        while j < sorted_desc.len() && sorted_desc[j] == sorted_desc[i] {
            j += 1;
        }
        let run = j - i;
        let position = if run > 1 {
            current as f64 + 0.5
        } else {
            current as f64
        };
        positions.extend(std::iter::repeat(position).take(run));
        current += run;
        i = j;
    }
    positions
}

/// Orders the cohort by average descending and assigns positions.
pub fn rank_cohort(mut cohort: Vec<StudentAggregate>) -> Vec<StudentAggregate> {
    cohort.sort_by(|a, b| b.exact_average.cmp(&a.exact_average));
    let averages: Vec<_> = cohort.iter().map(|a| a.exact_average).collect();
    for (agg, pos) in cohort.iter_mut().zip(tie_averaged_positions(&averages)) {
        agg.position = Some(pos);
    }
    cohort
}

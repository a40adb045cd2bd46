use crate::calc::scoring::{mean_of_components, ScoreFn};
use crate::error::{Result, ResultsError};
use serde::{Deserialize, Serialize};

/// Round half-up to `dp` decimals: `Int(x * 10^dp + 0.5) / 10^dp`.
pub fn round_half_up(x: f64, dp: u32) -> f64 {
    let f = 10_f64.powi(dp as i32);
    ((x * f) + 0.5).floor() / f
}

/// Floor that tolerates binary representation error just below an integer.
pub fn floor_tolerant(x: f64) -> f64 {
    (x + 1e-9).floor()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub letter: String,
    pub min: f64,
    #[serde(default)]
    pub remark: String,
}

/// Letter-grade table. Bands are ordered best first with strictly
/// decreasing `min`; anything below the last band gets the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingBands {
    pub bands: Vec<GradeBand>,
    pub fallback_letter: String,
    #[serde(default)]
    pub fallback_remark: String,
}

/// Grade shown for a subject nobody took, or a student with no taken cells.
pub const NO_GRADE: &str = "-";

impl GradingBands {
    fn band(letter: &str, min: f64, remark: &str) -> GradeBand {
        GradeBand {
            letter: letter.to_string(),
            min,
            remark: remark.to_string(),
        }
    }

    pub fn full_scale() -> Self {
        Self {
            bands: vec![
                Self::band("A", 81.0, "VIZURI SANA"),
                Self::band("B", 75.0, "VIZURI"),
                Self::band("C", 65.0, "WASTANI"),
                Self::band("D", 55.0, "HAFIFU"),
            ],
            fallback_letter: "F".to_string(),
            fallback_remark: "MBAYA".to_string(),
        }
    }

    pub fn half_scale() -> Self {
        Self {
            bands: vec![
                Self::band("A", 41.0, "VIZURI SANA"),
                Self::band("B", 30.0, "VIZURI"),
                Self::band("C", 25.0, "WASTANI"),
                Self::band("D", 15.0, "HAFIFU"),
            ],
            fallback_letter: "F".to_string(),
            fallback_remark: "MBAYA".to_string(),
        }
    }

    /// 0 for the best band, `bands.len()` for the fallback.
    pub fn rank_of(&self, avg: f64) -> usize {
        self.bands
            .iter()
            .position(|b| avg >= b.min)
            .unwrap_or(self.bands.len())
    }

    pub fn letter(&self, avg: f64) -> &str {
        self.bands
            .get(self.rank_of(avg))
            .map(|b| b.letter.as_str())
            .unwrap_or(self.fallback_letter.as_str())
    }

    pub fn remark(&self, avg: f64) -> &str {
        self.bands
            .get(self.rank_of(avg))
            .map(|b| b.remark.as_str())
            .unwrap_or(self.fallback_remark.as_str())
    }

    fn validate(&self, subject_max: f64) -> Result<()> {
        if self.fallback_letter.trim().is_empty() {
            return Err(ResultsError::InvalidPolicy(
                "fallback grade letter must not be empty".into(),
            ));
        }
        let mut prev: Option<f64> = None;
        for b in &self.bands {
            if b.letter.trim().is_empty() {
                return Err(ResultsError::InvalidPolicy(
                    "grade letters must not be empty".into(),
                ));
            }
            if !b.min.is_finite() || b.min < 0.0 || b.min > subject_max {
                return Err(ResultsError::InvalidPolicy(format!(
                    "band {} minimum {} must be within 0..={}",
                    b.letter, b.min, subject_max
                )));
            }
            if let Some(p) = prev {
                if b.min >= p {
                    return Err(ResultsError::InvalidPolicy(format!(
                        "grading bands must be strictly decreasing (band {} at {} follows {})",
                        b.letter, b.min, p
                    )));
                }
            }
            prev = Some(b.min);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectRounding {
    Floor,
    Decimals(u32),
}

impl SubjectRounding {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Floor => floor_tolerant(x),
            Self::Decimals(dp) => round_half_up(x, dp),
        }
    }
}

const MAX_DECIMALS: u32 = 6;

/// Everything a report computation is parameterized by. Read-only once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPolicy {
    pub pass_threshold: f64,
    pub subject_max: f64,
    pub grading_bands: GradingBands,
    #[serde(rename = "subjectAverageRounding")]
    pub subject_rounding: SubjectRounding,
    pub gpa_decimals: u32,
    #[serde(skip, default = "default_scorer")]
    pub scorer: ScoreFn,
}

fn default_scorer() -> ScoreFn {
    mean_of_components
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self::primary()
    }
}

impl ReportPolicy {
    /// Full-scale view: pass at 50 of 100, floored subject averages.
    pub fn primary() -> Self {
        Self {
            pass_threshold: 50.0,
            subject_max: 100.0,
            grading_bands: GradingBands::full_scale(),
            subject_rounding: SubjectRounding::Floor,
            gpa_decimals: 2,
            scorer: mean_of_components,
        }
    }

    /// Half-scale view: pass at 25 of 50, two-decimal subject averages.
    pub fn secondary() -> Self {
        Self {
            pass_threshold: 25.0,
            subject_max: 50.0,
            grading_bands: GradingBands::half_scale(),
            subject_rounding: SubjectRounding::Decimals(2),
            gpa_decimals: 3,
            scorer: mean_of_components,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "primary" => Some(Self::primary()),
            "secondary" => Some(Self::secondary()),
            _ => None,
        }
    }

    pub fn with_scorer(mut self, scorer: ScoreFn) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.subject_max.is_finite() || self.subject_max <= 0.0 {
            return Err(ResultsError::InvalidPolicy(format!(
                "subject max must be > 0 (got {})",
                self.subject_max
            )));
        }
        if !self.pass_threshold.is_finite()
            || self.pass_threshold < 0.0
            || self.pass_threshold > self.subject_max
        {
            return Err(ResultsError::InvalidPolicy(format!(
                "pass threshold {} must be within 0..={}",
                self.pass_threshold, self.subject_max
            )));
        }
        if self.gpa_decimals > MAX_DECIMALS {
            return Err(ResultsError::InvalidPolicy(format!(
                "gpa decimals must be <= {MAX_DECIMALS}"
            )));
        }
        if let SubjectRounding::Decimals(dp) = self.subject_rounding {
            if dp > MAX_DECIMALS {
                return Err(ResultsError::InvalidPolicy(format!(
                    "subject average decimals must be <= {MAX_DECIMALS}"
                )));
            }
        }
        self.grading_bands.validate(self.subject_max)
    }

    pub fn is_pass(&self, avg: f64) -> bool {
        avg >= self.pass_threshold
    }

    /// `(average / subject_max) * 4`, rounded to the policy's GPA decimals.
    pub fn gpa(&self, avg: f64) -> f64 {
        round_half_up((avg / self.subject_max) * 4.0, self.gpa_decimals)
    }
}

//! Workspace configuration: report policy presets and payroll rates, stored
//! as JSON sections in the `settings` table over built-in defaults.

use crate::calc::policy::{GradingBands, ReportPolicy, SubjectRounding};
use crate::db;
use crate::error::ResultsError;
use crate::payroll::PayrollSettings;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::str::FromStr;

pub const DEFAULT_PRESET: &str = "primary";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Primary,
    Secondary,
    Payroll,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [Self::Primary, Self::Secondary, Self::Payroll];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "payroll" => Some(Self::Payroll),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Payroll => "payroll",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Primary => "setup.policy.primary",
            Self::Secondary => "setup.policy.secondary",
            Self::Payroll => "setup.payroll",
        }
    }
}

fn default_section(section: SetupSection) -> anyhow::Result<Value> {
    Ok(match section {
        SetupSection::Primary => serde_json::to_value(ReportPolicy::primary())?,
        SetupSection::Secondary => serde_json::to_value(ReportPolicy::secondary())?,
        SetupSection::Payroll => serde_json::to_value(PayrollSettings::default())?,
    })
}

fn invalid_policy(msg: impl Into<String>) -> ResultsError {
    ResultsError::InvalidPolicy(msg.into())
}

fn parse_number(v: &Value, key: &str) -> Result<f64, ResultsError> {
    v.as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid_policy(format!("{key} must be a number")))
}

fn parse_decimals(v: &Value, key: &str) -> Result<u64, ResultsError> {
    v.as_u64()
        .filter(|n| *n <= 6)
        .ok_or_else(|| invalid_policy(format!("{key} must be an integer in 0..=6")))
}

fn parse_rounding(v: &Value) -> Result<SubjectRounding, ResultsError> {
    const KEY: &str = "subjectAverageRounding";
    if let Some(s) = v.as_str() {
        return match s.trim().to_ascii_lowercase().as_str() {
            "floor" => Ok(SubjectRounding::Floor),
            _ => Err(invalid_policy(format!(
                "{KEY} must be \"floor\" or {{\"decimals\": n}}"
            ))),
        };
    }
    if v.is_number() {
        return Ok(SubjectRounding::Decimals(parse_decimals(v, KEY)? as u32));
    }
    let rounding: SubjectRounding = serde_json::from_value(v.clone())
        .map_err(|e| invalid_policy(format!("{KEY}: {e}")))?;
    if let SubjectRounding::Decimals(dp) = rounding {
        parse_decimals(&Value::from(dp), KEY)?;
    }
    Ok(rounding)
}

fn parse_percent(v: &Value, key: &str) -> Result<Decimal, ResultsError> {
    let parsed = match v {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    };
    let rate = parsed.ok_or_else(|| ResultsError::InvalidRate(format!("{key} must be a number")))?;
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ResultsError::InvalidRate(format!(
            "{key} {rate} must be within 0..=100"
        )));
    }
    Ok(rate)
}

/// Applies `patch` to a section value and checks the result as a whole.
/// `current` is left untouched on error.
fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), ResultsError> {
    let mut next = current.clone();
    let obj = next
        .as_object_mut()
        .ok_or_else(|| invalid_policy("setup section must be a JSON object"))?;
    for (k, v) in patch {
        match section {
            SetupSection::Primary | SetupSection::Secondary => match k.as_str() {
                "passThreshold" | "subjectMax" => {
                    obj.insert(k.clone(), Value::from(parse_number(v, k)?));
                }
                "gpaDecimals" => {
                    obj.insert(k.clone(), Value::from(parse_decimals(v, k)?));
                }
                "gradingBands" => {
                    let bands: GradingBands = serde_json::from_value(v.clone())
                        .map_err(|e| invalid_policy(format!("gradingBands: {e}")))?;
                    obj.insert(k.clone(), json!(bands));
                }
                "subjectAverageRounding" => {
                    obj.insert(k.clone(), json!(parse_rounding(v)?));
                }
                _ => return Err(invalid_policy(format!("unknown policy field: {k}"))),
            },
            SetupSection::Payroll => match k.as_str() {
                "nssfRatePercent" | "wcfRatePercent" => {
                    obj.insert(k.clone(), json!(parse_percent(v, k)?));
                }
                _ => {
                    return Err(ResultsError::InvalidRate(format!(
                        "unknown payroll field: {k}"
                    )))
                }
            },
        }
    }
    match section {
        SetupSection::Primary | SetupSection::Secondary => {
            let policy: ReportPolicy = serde_json::from_value(next.clone())
                .map_err(|e| invalid_policy(e.to_string()))?;
            policy.validate()?;
        }
        SetupSection::Payroll => {
            let settings: PayrollSettings = serde_json::from_value(next.clone())
                .map_err(|e| ResultsError::InvalidRate(e.to_string()))?;
            settings.validate()?;
        }
    }
    *current = next;
    Ok(())
}

/// Built-in defaults with the saved section merged over them.
pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section)?;
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort: a stale saved value falls back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Validates and persists a patch, returning the new effective section.
pub fn update_section(
    conn: &Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Value> {
    let mut current = load_section(conn, section)?;
    merge_section_patch(section, &mut current, patch)?;
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(current)
}

/// Every section keyed by name, as `setup.get` reports it.
pub fn effective_setup(conn: &Connection) -> anyhow::Result<Value> {
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), load_section(conn, section)?);
    }
    Ok(Value::Object(out))
}

pub fn load_policy(conn: &Connection, preset: &str) -> anyhow::Result<ReportPolicy> {
    let section = match SetupSection::parse(preset) {
        Some(s @ (SetupSection::Primary | SetupSection::Secondary)) => s,
        _ => return Err(invalid_policy(format!("unknown policy preset: {preset}")).into()),
    };
    Ok(serde_json::from_value(load_section(conn, section)?)?)
}

/// Report `policy` parameter: absent (default preset), a preset name, or an
/// object of overrides with an optional `preset` to start from. Overrides
/// apply to this request only.
pub fn resolve_policy(conn: &Connection, param: Option<&Value>) -> anyhow::Result<ReportPolicy> {
    match param {
        None | Some(Value::Null) => load_policy(conn, DEFAULT_PRESET),
        Some(Value::String(name)) => load_policy(conn, name),
        Some(Value::Object(overrides)) => {
            let preset = match overrides.get("preset") {
                None => DEFAULT_PRESET,
                Some(v) => v
                    .as_str()
                    .ok_or_else(|| invalid_policy("preset must be a string"))?,
            };
            let section = match SetupSection::parse(preset) {
                Some(s @ (SetupSection::Primary | SetupSection::Secondary)) => s,
                _ => return Err(invalid_policy(format!("unknown policy preset: {preset}")).into()),
            };
            let mut patch = overrides.clone();
            patch.remove("preset");
            let mut current = load_section(conn, section)?;
            merge_section_patch(section, &mut current, &patch)?;
            Ok(serde_json::from_value(current)?)
        }
        Some(_) => Err(invalid_policy("policy must be a preset name or an object").into()),
    }
}

pub fn load_payroll(conn: &Connection) -> anyhow::Result<PayrollSettings> {
    Ok(serde_json::from_value(load_section(
        conn,
        SetupSection::Payroll,
    )?)?)
}

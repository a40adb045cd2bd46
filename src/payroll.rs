//! Payroll: gross salary through statutory and HELSB deductions to net pay.
//!
//! Amounts are `Decimal` and carried at full precision; `Payslip::rounded`
//! is the 2-decimal half-up copy meant for display.

use crate::error::{conflict, Result, ResultsError};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffFinancial {
    pub staff_id: String,
    #[serde(default)]
    pub display_name: String,
    pub basic: Decimal,
    #[serde(default)]
    pub special_allowance: Decimal,
    #[serde(default)]
    pub has_helsb: bool,
    #[serde(default = "default_helsb_rate")]
    pub helsb_rate_percent: Decimal,
}

fn default_helsb_rate() -> Decimal {
    Decimal::from(15)
}

impl StaffFinancial {
    pub fn gross_for_deductions(&self) -> Decimal {
        self.basic + self.special_allowance
    }

    pub fn helsb_deduction(&self) -> Decimal {
        if self.has_helsb {
            self.gross_for_deductions() * self.helsb_rate_percent / Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        }
    }
}

fn check_percent(label: &str, rate: Decimal) -> Result<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ResultsError::InvalidRate(format!(
            "{label} {rate} must be within 0..=100"
        )));
    }
    Ok(())
}

/// A deduction computed over gross-for-deductions.
pub trait DeductionRule {
    fn code(&self) -> &str;
    fn amount(&self, gross_for_deductions: Decimal) -> Decimal;
}

#[derive(Debug, Clone)]
pub struct PercentOfGross {
    code: String,
    percent: Decimal,
}

impl PercentOfGross {
    pub fn new(code: impl Into<String>, percent: Decimal) -> Result<Self> {
        let code = code.into();
        check_percent(&format!("{code} rate"), percent)?;
        Ok(Self { code, percent })
    }
}

impl DeductionRule for PercentOfGross {
    fn code(&self) -> &str {
        &self.code
    }

    fn amount(&self, gross_for_deductions: Decimal) -> Decimal {
        gross_for_deductions * self.percent / Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone)]
pub struct FixedAmount {
    code: String,
    amount: Decimal,
}

impl FixedAmount {
    pub fn new(code: impl Into<String>, amount: Decimal) -> Result<Self> {
        let code = code.into();
        if amount < Decimal::ZERO {
            return Err(ResultsError::InvalidAmount(format!(
                "{code} must not be negative (got {amount})"
            )));
        }
        Ok(Self { code, amount })
    }
}

impl DeductionRule for FixedAmount {
    fn code(&self) -> &str {
        &self.code
    }

    fn amount(&self, _gross_for_deductions: Decimal) -> Decimal {
        self.amount
    }
}

/// Workspace payroll rates, stored under the `payroll` settings key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSettings {
    pub nssf_rate_percent: Decimal,
    pub wcf_rate_percent: Decimal,
}

impl Default for PayrollSettings {
    fn default() -> Self {
        Self {
            nssf_rate_percent: Decimal::from(10),
            wcf_rate_percent: Decimal::ZERO,
        }
    }
}

impl PayrollSettings {
    pub fn validate(&self) -> Result<()> {
        check_percent("NSSF rate", self.nssf_rate_percent)?;
        check_percent("WCF rate", self.wcf_rate_percent)
    }
}

/// NSSF and WCF as percentages of gross, PAYE as the fixed amount given.
pub fn statutory_rules(
    settings: &PayrollSettings,
    paye: Decimal,
) -> Result<Vec<Box<dyn DeductionRule>>> {
    let mut rules: Vec<Box<dyn DeductionRule>> = Vec::with_capacity(3);
    rules.push(Box::new(PercentOfGross::new("NSSF", settings.nssf_rate_percent)?));
    rules.push(Box::new(PercentOfGross::new("WCF", settings.wcf_rate_percent)?));
    rules.push(Box::new(FixedAmount::new("PAYE", paye)?));
    Ok(rules)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductionLine {
    pub code: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payslip {
    pub staff_id: String,
    pub basic: Decimal,
    pub special_allowance: Decimal,
    pub gross_for_deductions: Decimal,
    pub helsb_deduction: Decimal,
    /// Rule deductions in the order the rules were given; HELSB is not
    /// repeated here.
    pub deductions: Vec<DeductionLine>,
    /// HELSB plus every rule deduction.
    pub total_deductions: Decimal,
    /// May be negative when deductions exceed gross.
    pub net: Decimal,
    /// Untaxed; outside gross-for-deductions and net.
    pub allowance: Decimal,
    pub gross_salary: Decimal,
    pub take_home: Decimal,
}

fn r2(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Payslip {
    pub fn rounded(&self) -> Self {
        Self {
            staff_id: self.staff_id.clone(),
            basic: r2(self.basic),
            special_allowance: r2(self.special_allowance),
            gross_for_deductions: r2(self.gross_for_deductions),
            helsb_deduction: r2(self.helsb_deduction),
            deductions: self
                .deductions
                .iter()
                .map(|d| DeductionLine {
                    code: d.code.clone(),
                    amount: r2(d.amount),
                })
                .collect(),
            total_deductions: r2(self.total_deductions),
            net: r2(self.net),
            allowance: r2(self.allowance),
            gross_salary: r2(self.gross_salary),
            take_home: r2(self.take_home),
        }
    }
}

pub fn compute_payroll(
    staff: &StaffFinancial,
    rules: &[Box<dyn DeductionRule>],
    allowance: Decimal,
) -> Result<Payslip> {
    check_percent("HELSB rate", staff.helsb_rate_percent)?;
    let gross = staff.gross_for_deductions();
    let helsb = staff.helsb_deduction();
    let deductions: Vec<DeductionLine> = rules
        .iter()
        .map(|rule| DeductionLine {
            code: rule.code().to_string(),
            amount: rule.amount(gross),
        })
        .collect();
    let total_deductions = helsb + deductions.iter().map(|d| d.amount).sum::<Decimal>();
    let net = staff.basic + staff.special_allowance - total_deductions;
    Ok(Payslip {
        staff_id: staff.staff_id.clone(),
        basic: staff.basic,
        special_allowance: staff.special_allowance,
        gross_for_deductions: gross,
        helsb_deduction: helsb,
        deductions,
        total_deductions,
        net,
        allowance,
        gross_salary: gross + allowance,
        take_home: net + allowance,
    })
}

fn decimal_col(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = r.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn upsert_staff_financial(conn: &Connection, staff: &StaffFinancial) -> Result<()> {
    check_percent("HELSB rate", staff.helsb_rate_percent)?;
    conn.execute(
        "INSERT INTO staff_financials(
            staff_id, display_name, basic, special_allowance, has_helsb, helsb_rate_percent)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(staff_id) DO UPDATE SET
            display_name = excluded.display_name,
            basic = excluded.basic,
            special_allowance = excluded.special_allowance,
            has_helsb = excluded.has_helsb,
            helsb_rate_percent = excluded.helsb_rate_percent",
        (
            &staff.staff_id,
            &staff.display_name,
            staff.basic.to_string(),
            staff.special_allowance.to_string(),
            i64::from(staff.has_helsb),
            staff.helsb_rate_percent.to_string(),
        ),
    )
    .map_err(conflict)?;
    Ok(())
}

pub fn get_staff_financial(conn: &Connection, staff_id: &str) -> Result<StaffFinancial> {
    conn.query_row(
        "SELECT staff_id, display_name, basic, special_allowance, has_helsb, helsb_rate_percent
         FROM staff_financials WHERE staff_id = ?",
        [staff_id],
        |r| {
            Ok(StaffFinancial {
                staff_id: r.get(0)?,
                display_name: r.get(1)?,
                basic: decimal_col(r, 2)?,
                special_allowance: decimal_col(r, 3)?,
                has_helsb: r.get::<_, i64>(4)? != 0,
                helsb_rate_percent: decimal_col(r, 5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ResultsError::UnknownStaff(staff_id.to_string()))
}

/// Loads a stored staff record and runs it through the statutory rules plus
/// any extra fixed deductions.
pub fn compute_payroll_for_staff(
    conn: &Connection,
    staff_id: &str,
    settings: &PayrollSettings,
    paye: Decimal,
    extra: &[DeductionLine],
    allowance: Decimal,
) -> Result<Payslip> {
    let staff = get_staff_financial(conn, staff_id)?;
    let mut rules = statutory_rules(settings, paye)?;
    for d in extra {
        rules.push(Box::new(FixedAmount::new(d.code.clone(), d.amount)?));
    }
    compute_payroll(&staff, &rules, allowance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("decimal")
    }

    fn staff(basic: &str, special: &str, has_helsb: bool, rate: &str) -> StaffFinancial {
        StaffFinancial {
            staff_id: "st-1".into(),
            display_name: "Mwalimu Joseph".into(),
            basic: dec(basic),
            special_allowance: dec(special),
            has_helsb,
            helsb_rate_percent: dec(rate),
        }
    }

    #[test]
    fn helsb_only_payslip() {
        let slip = compute_payroll(&staff("1000000", "200000", true, "15"), &[], Decimal::ZERO)
            .expect("payslip");
        assert_eq!(slip.gross_for_deductions, dec("1200000"));
        assert_eq!(slip.helsb_deduction, dec("180000"));
        assert_eq!(slip.net, dec("1020000"));
    }

    #[test]
    fn helsb_flag_off_ignores_rate() {
        let slip = compute_payroll(&staff("500000", "0", false, "100"), &[], Decimal::ZERO)
            .expect("payslip");
        assert_eq!(slip.helsb_deduction, Decimal::ZERO);
        assert_eq!(slip.net, dec("500000"));
    }

    #[test]
    fn rate_outside_percent_range_is_rejected() {
        for rate in ["-1", "100.01"] {
            let e = compute_payroll(&staff("1", "0", true, rate), &[], Decimal::ZERO).unwrap_err();
            assert!(matches!(e, ResultsError::InvalidRate(_)), "rate {rate}");
        }
        assert!(matches!(
            PercentOfGross::new("NSSF", dec("120")),
            Err(ResultsError::InvalidRate(_))
        ));
        assert!(matches!(
            FixedAmount::new("LOAN", dec("-5")),
            Err(ResultsError::InvalidAmount(_))
        ));
    }

    #[test]
    fn statutory_rules_and_identity() {
        let rules = statutory_rules(&PayrollSettings::default(), dec("45000")).expect("rules");
        let s = staff("850000", "150000", true, "15");
        let slip = compute_payroll(&s, &rules, dec("60000")).expect("payslip");

        let codes: Vec<&str> = slip.deductions.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["NSSF", "WCF", "PAYE"]);
        assert_eq!(slip.deductions[0].amount, dec("100000"));
        assert_eq!(slip.deductions[1].amount, Decimal::ZERO);
        assert_eq!(slip.helsb_deduction, dec("150000"));

        let sum: Decimal =
            slip.helsb_deduction + slip.deductions.iter().map(|d| d.amount).sum::<Decimal>();
        assert_eq!(slip.total_deductions, sum);
        assert_eq!(slip.net, s.basic + s.special_allowance - sum);
        assert_eq!(slip.gross_salary, dec("1060000"));
        assert_eq!(slip.take_home, slip.net + dec("60000"));
    }

    #[test]
    fn negative_net_is_reported() {
        let rules: Vec<Box<dyn DeductionRule>> =
            vec![Box::new(FixedAmount::new("LOAN", dec("300000")).expect("rule"))];
        let slip = compute_payroll(&staff("200000", "0", true, "15"), &rules, Decimal::ZERO)
            .expect("payslip");
        assert_eq!(slip.net, dec("-130000"));
    }

    #[test]
    fn rounded_copy_is_half_up_two_decimals() {
        let slip = compute_payroll(&staff("1000.05", "0", true, "15"), &[], Decimal::ZERO)
            .expect("payslip");
        assert_eq!(slip.helsb_deduction, dec("150.0075"));
        let shown = slip.rounded();
        assert_eq!(shown.helsb_deduction, dec("150.01"));
        assert_eq!(shown.net, dec("850.04"));
        assert_eq!(slip.net, dec("850.0425"));
    }

    #[test]
    fn stored_staff_round_trip() {
        let conn = db::open_in_memory().expect("db");
        let s = staff("1000000", "200000", true, "15");
        upsert_staff_financial(&conn, &s).expect("insert");
        assert_eq!(get_staff_financial(&conn, "st-1").expect("get"), s);

        let raised = StaffFinancial {
            basic: dec("1100000"),
            ..s
        };
        upsert_staff_financial(&conn, &raised).expect("update");
        let slip = compute_payroll_for_staff(
            &conn,
            "st-1",
            &PayrollSettings::default(),
            Decimal::ZERO,
            &[DeductionLine {
                code: "SACCOS".into(),
                amount: dec("20000"),
            }],
            Decimal::ZERO,
        )
        .expect("payslip");
        // 1,300,000 gross: NSSF 130,000 + HELSB 195,000 + SACCOS 20,000.
        assert_eq!(slip.total_deductions, dec("345000"));
        assert_eq!(slip.net, dec("955000"));

        assert!(matches!(
            get_staff_financial(&conn, "ghost"),
            Err(ResultsError::UnknownStaff(_))
        ));
    }
}

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db_conn, optional_field, parse_params, required_str, respond};
use crate::ipc::types::{AppState, Request};
use resultsd::config;
use resultsd::payroll::{self, DeductionLine, StaffFinancial};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn handle_upsert_financial(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let staff: StaffFinancial = parse_params(&req.params)?;
    if staff.staff_id.trim().is_empty() {
        return Err(HandlerErr::bad_params("staffId must not be empty"));
    }
    payroll::upsert_staff_financial(conn, &staff)?;
    Ok(json!({ "staff": payroll::get_staff_financial(conn, &staff.staff_id)? }))
}

/// Money values may be sent as JSON strings or numbers; strings keep exact
/// decimals.
fn handle_compute(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let staff_id = required_str(&req.params, "staffId")?;
    let paye: Decimal = optional_field(&req.params, "paye")?.unwrap_or_default();
    let allowance: Decimal = optional_field(&req.params, "allowance")?.unwrap_or_default();
    let extra: Vec<DeductionLine> =
        optional_field(&req.params, "deductions")?.unwrap_or_default();
    let settings = config::load_payroll(conn)?;
    let slip =
        payroll::compute_payroll_for_staff(conn, &staff_id, &settings, paye, &extra, allowance)?;
    Ok(json!({ "payslip": slip.rounded(), "exact": slip }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "staff.upsertFinancial" => handle_upsert_financial(state, req),
        "payroll.compute" => handle_compute(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

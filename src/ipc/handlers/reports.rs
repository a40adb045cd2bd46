use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{context, db_conn, required_field, required_str, respond};
use crate::ipc::types::{AppState, Request};
use resultsd::calc::policy::ReportPolicy;
use resultsd::infos::{self, StudentInfos};
use resultsd::{config, reports};
use rusqlite::Connection;
use serde_json::{json, Value};

fn policy(conn: &Connection, params: &Value) -> Result<ReportPolicy, HandlerErr> {
    Ok(config::resolve_policy(conn, params.get("policy"))?)
}

fn handle_class(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let ctx = context(conn, &req.params)?;
    let policy = policy(conn, &req.params)?;
    let report = reports::compute_class_results(conn, &class_id, &ctx, &policy)?;
    Ok(json!({ "policy": policy, "report": report }))
}

fn handle_student(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let ctx = context(conn, &req.params)?;
    let policy = policy(conn, &req.params)?;
    let report = reports::compute_student_report(conn, &student_id, &ctx, &policy)?;
    Ok(json!({ "policy": policy, "report": report }))
}

fn handle_form_status(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let ctx = context(conn, &req.params)?;
    let policy = policy(conn, &req.params)?;
    Ok(json!(reports::compute_form_status(conn, &class_id, &ctx, &policy)?))
}

fn handle_infos_save(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let ctx = context(conn, &req.params)?;
    let infos: StudentInfos = required_field(&req.params, "infos")?;
    let saved = infos::save_student_infos(conn, &student_id, &ctx, &infos)?;
    Ok(json!({ "studentId": student_id, "context": ctx, "infos": saved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.class" => handle_class(state, req),
        "reports.student" => handle_student(state, req),
        "reports.formStatus" => handle_form_status(state, req),
        "infos.save" => handle_infos_save(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

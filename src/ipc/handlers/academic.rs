use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{context, db_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use resultsd::academic::{self, AcademicKind};
use serde_json::{json, Value};

fn kind_param(params: &Value) -> Result<AcademicKind, HandlerErr> {
    let raw = required_str(params, "kind")?;
    AcademicKind::parse(&raw.to_ascii_lowercase())
        .ok_or_else(|| HandlerErr::bad_params("kind must be one of: session, term, exam"))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let kind = kind_param(&req.params)?;
    let name = required_str(&req.params, "name")?;
    let current = req
        .params
        .get("current")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let created = academic::create(conn, kind, &name, current)?;
    Ok(json!({ "kind": kind, "id": created.id, "name": created.name, "current": current }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let kind = kind_param(&req.params)?;
    Ok(json!({ "kind": kind, "items": academic::list(conn, kind)? }))
}

fn handle_set_current(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let kind = kind_param(&req.params)?;
    let id = required_str(&req.params, "id")?;
    academic::set_current(conn, kind, &id)?;
    Ok(json!({ "kind": kind, "currentId": id }))
}

fn handle_resolve(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    Ok(json!(context(conn, &req.params)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "academic.create" => handle_create(state, req),
        "academic.list" => handle_list(state, req),
        "academic.setCurrent" => handle_set_current(state, req),
        "academic.resolve" => handle_resolve(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

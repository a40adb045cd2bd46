use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use resultsd::config::{self, SetupSection};
use serde_json::json;

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    Ok(config::effective_setup(conn)?)
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = db_conn(state)?;
    let section_raw = required_str(&req.params, "section")?;
    let Some(section) = SetupSection::parse(&section_raw) else {
        return Err(HandlerErr::bad_params(
            "section must be one of: primary, secondary, payroll",
        ));
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let current = config::update_section(conn, section, patch)?;
    Ok(json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(respond(req, handle_setup_get(state, req))),
        "setup.update" => Some(respond(req, handle_setup_update(state, req))),
        _ => None,
    }
}

use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::setup::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::academic::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::roster::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::cells::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::payroll::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::accounts::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    let resp = dispatch(state, &req);
    if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = resp
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        tracing::warn!(id = %req.id, method = %req.method, code, "request failed");
    }
    resp
}

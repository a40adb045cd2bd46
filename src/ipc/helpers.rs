use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use resultsd::academic::{resolve_academic_context, AcademicContext, ContextRequest};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".into(),
        details: None,
    })
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))?;
    if s.is_empty() {
        return Err(HandlerErr::bad_params(format!("{key} must not be empty")));
    }
    Ok(s)
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Deserializes the whole params object.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone()).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn required_field<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let raw = params
        .get(key)
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("{key}: {e}")))
}

pub fn optional_field<T: DeserializeOwned>(
    params: &Value,
    key: &str,
) -> Result<Option<T>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("{key}: {e}"))),
    }
}

/// Academic triple from optional `sessionId` / `termId` / `examId`.
pub fn context(conn: &Connection, params: &Value) -> Result<AcademicContext, HandlerErr> {
    let req = ContextRequest {
        session_id: optional_str(params, "sessionId"),
        term_id: optional_str(params, "termId"),
        exam_id: optional_str(params, "examId"),
    };
    Ok(resolve_academic_context(conn, &req)?)
}

pub fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{db_conn, optional_field, optional_str, required_str, respond};
use crate::ipc::types::{AppState, Request};
use resultsd::accounts::{self, Profile, Role};
use serde_json::{json, Value};

fn role_param(raw: &str) -> Result<Role, HandlerErr> {
    Role::parse(&raw.to_ascii_lowercase()).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown role: {raw}"),
        details: Some(json!({
            "allowed": ["admin", "teacher", "head_teacher", "bursar", "secretary", "academic", "parent"]
        })),
    })
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let username = required_str(&req.params, "username")?;
    let display_name = optional_str(&req.params, "displayName").unwrap_or_else(|| username.clone());
    let role = role_param(&required_str(&req.params, "role")?)?;
    let profile: Profile = optional_field(&req.params, "profile")?.unwrap_or_default();
    let account =
        accounts::create_account_with_profile(conn, &username, &display_name, role, &profile)?;
    Ok(json!({ "account": account }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let role = match optional_str(&req.params, "role") {
        Some(raw) => Some(role_param(&raw)?),
        None => None,
    };
    Ok(json!({ "accounts": accounts::list_accounts(conn, role)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "accounts.create" => handle_create(state, req),
        "accounts.list" => handle_list(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

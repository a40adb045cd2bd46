use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    db_conn, optional_str, parse_params, required_field, required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use resultsd::roster::{self, NewStudent, StudentStatus};
use serde_json::{json, Value};

fn handle_classes_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let name = required_str(&req.params, "name")?;
    let sort_order = req
        .params
        .get("sortOrder")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    Ok(json!(roster::create_class(conn, &name, sort_order)?))
}

fn handle_classes_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    Ok(json!({ "classes": roster::list_classes(conn)? }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let name = required_str(&req.params, "name")?;
    Ok(json!(roster::create_subject(conn, &name)?))
}

fn handle_subjects_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    Ok(json!({ "subjects": roster::list_subjects(conn)? }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let new: NewStudent = parse_params(&req.params)?;
    if new.first_name.trim().is_empty() || new.surname.trim().is_empty() {
        return Err(HandlerErr::bad_params(
            "firstName and surname must not be empty",
        ));
    }
    Ok(json!(roster::create_student(conn, &new)?))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = optional_str(&req.params, "classId");
    Ok(json!({ "students": roster::list_students(conn, class_id.as_deref())? }))
}

fn handle_students_set_status(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let ids: Vec<String> = required_field(&req.params, "studentIds")?;
    let raw = required_str(&req.params, "status")?;
    let Some(status) = StudentStatus::parse(&raw) else {
        return Err(HandlerErr::bad_params("status must be one of: active, inactive"));
    };
    let updated = roster::set_students_status(conn, &ids, status)?;
    Ok(json!({ "updated": updated }))
}

fn handle_students_set_completed(
    state: &mut AppState,
    req: &Request,
) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let ids: Vec<String> = required_field(&req.params, "studentIds")?;
    let completed: bool = required_field(&req.params, "completed")?;
    let updated = roster::set_students_completed(conn, &ids, completed)?;
    Ok(json!({ "updated": updated }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "classes.create" => handle_classes_create(state, req),
        "classes.list" => handle_classes_list(state, req),
        "subjects.create" => handle_subjects_create(state, req),
        "subjects.list" => handle_subjects_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.list" => handle_students_list(state, req),
        "students.setStatus" => handle_students_set_status(state, req),
        "students.setCompleted" => handle_students_set_completed(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

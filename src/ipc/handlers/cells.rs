use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    context, db_conn, optional_str, parse_params, required_field, required_str, respond,
};
use crate::ipc::types::{AppState, Request};
use resultsd::store::{self, CellEdit, CellFilter};
use serde_json::{json, Value};

/// Upper bound on edits per `cells.bulkUpdate` call.
const MAX_BULK_EDITS: usize = 5000;

fn handle_bulk_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let student_ids: Vec<String> = required_field(&req.params, "studentIds")?;
    let subject_ids: Vec<String> = required_field(&req.params, "subjectIds")?;
    let ctx = context(conn, &req.params)?;
    let created = store::bulk_create_cells(conn, &student_ids, &subject_ids, &class_id, &ctx)?;
    Ok(json!({ "created": created }))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let ctx = context(conn, &req.params)?;
    let subject_id = optional_str(&req.params, "subjectId");
    let student_name = optional_str(&req.params, "studentName");
    let cells = store::fetch_cells(
        conn,
        &class_id,
        &ctx,
        subject_id.as_deref(),
        student_name.as_deref(),
    )?;
    Ok(json!({ "context": ctx, "cells": cells }))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let edit: CellEdit = parse_params(&req.params)?;
    Ok(json!({ "cell": store::update_cell_scores(conn, &edit)? }))
}

fn handle_bulk_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let edits: Vec<CellEdit> = required_field(&req.params, "edits")?;
    if edits.len() > MAX_BULK_EDITS {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("at most {MAX_BULK_EDITS} edits per call"),
            details: Some(json!({ "count": edits.len() })),
        });
    }
    Ok(json!({ "updated": store::update_cells_bulk(conn, &edits)? }))
}

/// Deletes within one class and academic context, optionally narrowed by
/// subject, student or student-name search.
fn handle_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = db_conn(state)?;
    let class_id = required_str(&req.params, "classId")?;
    let ctx = context(conn, &req.params)?;
    let filter = CellFilter {
        class_id: Some(class_id),
        subject_id: optional_str(&req.params, "subjectId"),
        student_id: optional_str(&req.params, "studentId"),
        student_name: optional_str(&req.params, "studentName"),
        ..CellFilter::for_context(&ctx)
    };
    Ok(json!({ "deleted": store::delete_cells(conn, &filter)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "cells.bulkCreate" => handle_bulk_create(state, req),
        "cells.list" => handle_list(state, req),
        "cells.update" => handle_update(state, req),
        "cells.bulkUpdate" => handle_bulk_update(state, req),
        "cells.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}

use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {pointer} in {value}"))
}

#[test]
fn requests_before_workspace_and_unknown_methods() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").is_some());
    assert!(health["workspacePath"].is_null());

    let no_ws = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(error_code(&no_ws), "no_workspace");

    let unknown = request(&mut stdin, &mut reader, "3", "grades.explode", json!({}));
    assert_eq!(error_code(&unknown), "not_implemented");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn class_report_flow_over_ipc() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let mut n = 0;
    let mut next_id = || {
        n += 1;
        n.to_string()
    };

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let ws_path = workspace.path().to_string_lossy().to_string();
    assert_eq!(selected["workspacePath"], json!(ws_path));
    let health = request_ok(&mut stdin, &mut reader, &next_id(), "health", json!({}));
    assert_eq!(health["workspacePath"], json!(ws_path));

    // Without a current academic triple, reports cannot resolve a context.
    let class = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "classes.create",
        json!({ "name": "Form I", "sortOrder": 1 }),
    );
    let class_id = str_at(&class, "/id").to_string();
    let missing = request(
        &mut stdin,
        &mut reader,
        &next_id(),
        "reports.class",
        json!({ "classId": class_id }),
    );
    assert_eq!(error_code(&missing), "context_not_set");

    for (kind, name) in [("session", "2025"), ("term", "Term I"), ("exam", "Midterm")] {
        request_ok(
            &mut stdin,
            &mut reader,
            &next_id(),
            "academic.create",
            json!({ "kind": kind, "name": name, "current": true }),
        );
    }
    let ctx = request_ok(&mut stdin, &mut reader, &next_id(), "academic.resolve", json!({}));
    assert_eq!(str_at(&ctx, "/term/name"), "Term I");

    let mut subject_ids = Vec::new();
    for name in ["MATH", "ENG"] {
        let s = request_ok(
            &mut stdin,
            &mut reader,
            &next_id(),
            "subjects.create",
            json!({ "name": name }),
        );
        subject_ids.push(str_at(&s, "/id").to_string());
    }
    let mut student_ids = Vec::new();
    for first in ["Asha", "Baraka", "Chausiku"] {
        let s = request_ok(
            &mut stdin,
            &mut reader,
            &next_id(),
            "students.create",
            json!({ "firstName": first, "surname": "Mollel", "currentClassId": class_id }),
        );
        student_ids.push(str_at(&s, "/id").to_string());
    }

    let bulk = json!({ "classId": class_id, "studentIds": student_ids, "subjectIds": subject_ids });
    let created = request_ok(&mut stdin, &mut reader, &next_id(), "cells.bulkCreate", bulk.clone());
    assert_eq!(created["created"], json!(6));
    let again = request_ok(&mut stdin, &mut reader, &next_id(), "cells.bulkCreate", bulk);
    assert_eq!(again["created"], json!(0));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "cells.list",
        json!({ "classId": class_id }),
    );
    let cells = listed["cells"].as_array().expect("cells").clone();
    assert_eq!(cells.len(), 6);

    let scores: [(&str, &str, f64, f64); 6] = [
        ("Asha", "MATH", 80.0, 80.0),
        ("Asha", "ENG", 90.0, 70.0),
        ("Baraka", "MATH", 60.0, 60.0),
        ("Baraka", "ENG", 50.0, 50.0),
        ("Chausiku", "MATH", 60.0, 60.0),
        ("Chausiku", "ENG", 50.0, 50.0),
    ];
    let edits: Vec<serde_json::Value> = scores
        .iter()
        .map(|(first, subject, test, exam)| {
            let cell = cells
                .iter()
                .find(|c| {
                    c["studentName"].as_str().unwrap_or("").starts_with(first)
                        && c["subjectName"] == json!(subject)
                })
                .expect("cell for edit");
            json!({ "cellId": cell["id"], "testScore": test, "examScore": exam })
        })
        .collect();

    // One bad score rejects the whole batch.
    let mut bad = edits.clone();
    bad[5]["examScore"] = json!(140);
    let rejected = request(
        &mut stdin,
        &mut reader,
        &next_id(),
        "cells.bulkUpdate",
        json!({ "edits": bad }),
    );
    assert_eq!(error_code(&rejected), "invalid_score");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "cells.bulkUpdate",
        json!({ "edits": edits }),
    );
    assert_eq!(updated["updated"], json!(6));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "reports.class",
        json!({ "classId": class_id, "policy": { "subjectAverageRounding": { "decimals": 2 } } }),
    );
    let students = report.pointer("/report/students").and_then(|v| v.as_array()).expect("students");
    assert_eq!(students[0]["studentName"], json!("Asha Mollel"));
    assert_eq!(students[0]["position"], json!(1.0));
    assert_eq!(students[0]["overallStatus"], json!("PASS"));
    assert_eq!(students[1]["position"], json!(2.5));
    assert_eq!(students[2]["position"], json!(2.5));
    let subjects = report.pointer("/report/subjects").and_then(|v| v.as_array()).expect("subjects");
    assert_eq!(subjects[0]["subjectName"], json!("MATH"));
    assert_eq!(subjects[0]["average"], json!(66.67));
    assert_eq!(subjects[0]["grade"], json!("C"));
    assert_eq!(subjects[1]["gpa"], json!(2.4));

    // Stored default preset floors subject averages.
    let floored = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "reports.class",
        json!({ "classId": class_id }),
    );
    assert_eq!(floored.pointer("/report/subjects/0/average"), Some(&json!(66.0)));

    let student = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "reports.student",
        json!({ "studentId": student_ids[1] }),
    );
    assert_eq!(student.pointer("/report/position"), Some(&json!(2.5)));
    assert_eq!(student.pointer("/report/cohortSize"), Some(&json!(3)));

    request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "infos.save",
        json!({
            "studentId": student_ids[0],
            "infos": { "ratings": { "honesty": "B" }, "headComments": "Safi sana" }
        }),
    );
    let status = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "reports.formStatus",
        json!({ "classId": class_id }),
    );
    assert_eq!(status["studentsWithResults"], json!(3));
    assert_eq!(status["completedForms"], json!(1));
    assert_eq!(status["activePending"], json!(3));

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        &next_id(),
        "cells.delete",
        json!({ "classId": class_id, "studentName": "chausiku" }),
    );
    assert_eq!(deleted["deleted"], json!(2));

    drop(stdin);
    let _ = child.wait();
}

use resultsd::ResultsError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ResultsError> for HandlerErr {
    fn from(e: ResultsError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

/// Config and storage helpers return `anyhow`; a wrapped `ResultsError`
/// keeps its own code.
impl From<anyhow::Error> for HandlerErr {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<ResultsError>() {
            Ok(core) => core.into(),
            Err(other) => Self {
                code: "db_query_failed",
                message: format!("{other:#}"),
                details: None,
            },
        }
    }
}

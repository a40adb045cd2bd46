use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Deserialize;

/// One line read from stdin. `params` defaults to `null` when omitted.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sidecar session: the selected results workspace and its open database.
/// Every method except `health` and `workspace.select` needs `db`.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    /// Replaces the current workspace; the previous connection is closed.
    pub fn open_workspace(&mut self, path: &Path, conn: Connection) {
        self.workspace = Some(path.to_path_buf());
        self.db = Some(conn);
    }

    pub fn workspace_path(&self) -> Option<String> {
        self.workspace
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

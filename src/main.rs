mod ipc;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("RESULTSD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "resultsd starting");

    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to reply to.
                tracing::warn!(error = %e, "dropping malformed request");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                writeln!(stdout, "{resp}")?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(stdout, "{resp}")?;
        stdout.flush()?;
    }
    Ok(())
}

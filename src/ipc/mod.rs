//! JSON-lines request handling for the `resultsd` sidecar.

mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Request};

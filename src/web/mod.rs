//! HTTP surface for dynamic queries.
//!
//! JSON API over the record store, the generation orchestrator and the
//! execution service, plus compiler endpoints.

mod error;
mod server;

pub use error::ApiError;
pub use server::{build_state, router, serve, AppState, Success};

//! Undertow Web - JSON API over the stream lookup facade

pub mod handlers;
pub mod response;
pub mod server;

pub use response::{ApiError, ApiResponse, status_for};
pub use server::{AppState, router, run_server};

//! Code shared by the Pulse services: error envelope, auth extractors,
//! tracing and metrics setup, and clients for Postgres, Redis and email.

pub mod clients;
pub mod errors;
pub mod middleware;
pub mod types;

pub use errors::{AppError, AppResult, ErrorCode};
pub use types::*;

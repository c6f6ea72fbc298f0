mod auth_extractor;
mod observability;

pub use auth_extractor::*;
pub use observability::*;

pub mod dashboard;
pub mod pipeline;
pub mod staleness;

pub mod connections;
pub mod dashboard;
pub mod health;

pub mod cron;
pub mod health;

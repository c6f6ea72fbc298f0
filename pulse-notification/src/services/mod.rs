pub mod decision;
pub mod runner;
pub mod scheduler;
pub mod spike_processor;

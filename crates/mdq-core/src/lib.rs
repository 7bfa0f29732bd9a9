pub mod config;
pub mod logging;

pub mod control;
pub mod engine;
pub mod error;
pub mod job;
pub mod paths;
pub mod queue;
pub mod store;
pub mod supervisor;

pub mod advance;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod group;
pub mod progress;
pub mod settings;
pub mod store;
pub mod tickets;

pub use engine::{PayrollEngine, RunMode, RunRequest, RunSummary, Trigger, UserError};
pub use error::PayrollError;

pub mod command;
pub mod engine;
pub mod results;

pub use command::CommandEngine;
pub use engine::{EngineError, ReportEngine, ReportOutcome, RuntimeConfig, TempDirs};

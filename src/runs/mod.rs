pub mod models;
pub mod registry;

// Re-export commonly used types
pub use models::{RunCompletion, RunRecord};
pub use registry::{RunCounts, RunRegistry};

pub mod orchestrator;
pub mod tasks;

pub use orchestrator::Orchestrator;

pub mod classifier;
pub mod client;
pub mod heuristics;
pub mod mailbox;
pub mod plan;
pub mod registry;
pub mod simplified_message;

pub use classifier::Classifier;
pub use client::GmailClient;
pub use mailbox::Mailbox;
pub use plan::{LabelPlan, PlanBuilder, PlanOutcome};
pub use registry::LabelRegistry;

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod stats;
mod types;


pub use orchestrator::{PipelineOrchestrator, PipelineOrchestratorBuilder};
pub use stats::SessionSummary;
pub use types::{ComponentState, PipelineState, ShutdownReason};

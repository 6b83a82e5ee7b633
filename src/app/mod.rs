mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::{MicelogOrchestrator, MicelogOrchestratorBuilder};
pub use runtime::ShutdownHandle;
pub use types::{ArchiveStatus, ComponentState, ReaderShutdown, ShutdownReason, ShutdownReport};

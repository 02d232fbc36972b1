pub mod orchestrator;
pub mod scheduler;
pub mod window;

pub use orchestrator::{RunSummary, SyncOrchestrator, SyncReport};
pub use window::DateWindow;

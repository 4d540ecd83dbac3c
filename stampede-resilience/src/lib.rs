//! Resilience patterns for Stampede
//!
//! Currently this is the run-wide stop coordination: a single coordinator
//! broadcasts escalating stop signals and every virtual user holds a
//! listener.

pub mod shutdown;

// Re-export commonly used types
pub use shutdown::{ActiveTaskGuard, ShutdownCoordinator, ShutdownError, ShutdownListener, ShutdownSignal};

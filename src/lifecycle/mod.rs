//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http/server.rs):
//!     Bind listener → Serving → accept loop
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Draining → stop accepting → drain connections → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown; a second one forces it
//! ```
//!
//! # Design Decisions
//! - State is observable (state.rs) rather than inferred from task handles
//! - Shutdown has a deadline: forced close after it passes

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{Shutdown, ShutdownOutcome};
pub use signals::{TerminationSignal, TerminationSignals};
pub use state::{Lifecycle, LifecycleState, TransitionError};

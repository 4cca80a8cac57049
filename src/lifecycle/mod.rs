//! Connection lifecycle.
//!
//! This module owns the single active session across reconnects, classifies
//! disconnects, and holds the process-wide shutdown guard.

mod generation;
mod manager;
mod shutdown;
mod state;

pub use generation::{Generation, GenerationCounter};
pub use manager::{Directive, LifecycleManager};
pub use shutdown::{ShutdownReason, ShutdownState};
pub use state::{DisconnectClass, LifecycleState};

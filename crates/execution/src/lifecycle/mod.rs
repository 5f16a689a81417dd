//! Position lifecycle: stage transitions and event history.
//!
//! - Stage machine for a single position
//! - Event log per position
//! - Summaries and aggregate statistics

mod events;
mod stage;
mod tracker;

pub use events::*;
pub use stage::PositionLifecycle;
pub use tracker::*;

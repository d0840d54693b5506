//! Timelock transactions split into descriptors, call encoding and lifecycle state

pub mod encoding;
pub mod state;
pub mod types;

pub use encoding::{identity, timelock_calldata, CallEncoder};
pub use state::{TimelockAction, TimelockState};
pub use types::*;

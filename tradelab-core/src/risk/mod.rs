//! Risk controls: the entry gate (circuit breakers) and position sizing.

pub mod gate;
pub mod sizer;

pub use gate::{GateContext, GateDecision, HaltReason, RiskGate};
pub use sizer::PositionSizer;

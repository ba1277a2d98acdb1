//! Cross-chain swap lifecycle
//!
//! The coordinator:
//! 1. Tracks one state machine per accepted fill
//! 2. Sequences bid, escrow, reveal and claim submissions per swap
//! 3. Enforces the source-before-destination escrow ordering
//!
//! The recovery supervisor reclaims whatever the coordinator leaves behind
//! once timelocks expire.

pub mod coordinator;
pub mod recovery;

pub use coordinator::{Swap, SwapCoordinator, SwapSpec, SwapState, SwapView};
pub use recovery::RecoverySupervisor;

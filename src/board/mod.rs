//! Client-side state for the odds board.
//!
//! Consumes the backend's broadcast stream and maintains the single
//! rendered fixture view: full snapshots replace it, updates are taken as
//! authoritative merged content, and per-cell balance-line selection lives
//! here (it is UI state, not server state).

pub mod reducer;
pub mod sse;
pub mod state;
pub mod tui;

pub use reducer::spawn_reducer;
pub use state::{BoardState, CycleDirection, MARKET_TYPES};

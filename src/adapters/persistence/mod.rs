//! Persistence Adapters - JSON File Storage
//!
//! Implements the strategy repository port with an atomic JSON
//! snapshot. No database dependency.

pub mod state;

pub use state::SnapshotStore;

//! Protocol Scanners - Pool Discovery Adapters
//!
//! - `listing`: protocols backed by the yield listing
//! - `unwired`: placeholder for protocols without an adapter

pub mod listing;
pub mod unwired;

pub use listing::{ListingScanner, SharedListing};
pub use unwired::UnwiredScanner;

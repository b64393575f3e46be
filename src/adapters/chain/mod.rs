//! Chain Adapters - EVM Network Access
//!
//! Provides on-chain access via alloy-rs 0.9 for:
//! - Per-network RPC providers with chain-id validation and call timeouts
//! - On-chain price-feed contracts as the highest-priority price source

pub mod price_feed;
pub mod provider;

pub use price_feed::ChainlinkFeedSource;
pub use provider::{ChainManager, NetworkProvider};

//! Domain layer - Core types and rules.
//!
//! Pure data and arithmetic for the aggregator: error kinds, the
//! network registry, price observations, pools and their ranking,
//! strategies and fees. No I/O here (hexagonal architecture inner ring).

pub mod error;
pub mod fees;
pub mod network;
pub mod pool;
pub mod price;
pub mod strategy;

// Re-export core types for convenience
pub use error::{AggregatorError, AggregatorResult};
pub use fees::FeeSchedule;
pub use network::{NetworkConfig, NetworkId, NetworkKind, NetworkRegistry};
pub use pool::{Pool, ProtocolKind, Token, rank_by_risk_adjusted_yield};
pub use price::{CacheKey, PriceSourceKind, TokenPrice};
pub use strategy::{
    Strategy, StrategyId, StrategyKind, StrategyLedger, StrategyParams, StrategyPerformance,
};

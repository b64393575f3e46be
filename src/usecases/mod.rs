//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the aggregator's core workflows.
//!
//! Use cases:
//! - `PriceOracle`: multi-source USD pricing with a TTL cache, pool APY lookups
//! - `PoolCatalog`: concurrent per-network pool discovery and ranking
//! - `StrategyManager`: strategy lifecycle, harvests, supervised monitors
//! - `GasOracle`: per-network gas gate for maintenance transactions

pub mod gas_oracle;
pub mod pool_catalog;
pub mod price_oracle;
pub mod strategy_manager;

pub use gas_oracle::GasOracle;
pub use pool_catalog::{PoolCatalog, ScanReport};
pub use price_oracle::{OracleSettings, OracleStats, PriceOracle};
pub use strategy_manager::{ManagerSettings, ManagerStats, StrategyManager};

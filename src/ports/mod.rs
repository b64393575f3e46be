//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `ChainClient`: per-network RPC reads (gas price, eth_call)
//! - `PriceSource`: USD token prices
//! - `YieldSource`: pool yield listings
//! - `ProtocolScanner`: per-protocol pool discovery
//! - `ExecutionAdapter`: deposits, withdrawals, harvests
//! - `StrategyRepository`: strategy snapshot persistence

pub mod chain_client;
pub mod execution;
pub mod price_source;
pub mod protocol_scanner;
pub mod repository;
pub mod yield_source;

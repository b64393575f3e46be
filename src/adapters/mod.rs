//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP APIs, blockchain RPC, file I/O). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: EVM RPC providers and on-chain price feeds via alloy-rs
//! - `http`: market-data and yield-listing APIs via reqwest
//! - `scanners`: protocol pool discovery
//! - `execution`: placeholder execution adapter
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: atomic JSON strategy snapshots

pub mod chain;
pub mod execution;
pub mod http;
pub mod metrics;
pub mod persistence;
pub mod scanners;

//! Error kinds shared by the oracle, catalog and strategy manager.
//!
//! `SourceUnavailable` is produced by individual adapters and is
//! absorbed at the oracle/catalog boundary (fallthrough to the next
//! source or network). Every other kind surfaces to the caller.

use alloy::primitives::Address;
use thiserror::Error;

use super::network::NetworkId;

/// Errors produced by the core components and their collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregatorError {
    /// Unknown strategy id, network, or a network a source does not cover.
    #[error("{what} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up.
        what: &'static str,
        /// Lookup key as displayed to the caller.
        key: String,
    },

    /// A single price/yield source failed.
    #[error("source {origin} unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the failing source.
        origin: String,
        /// Network error, status code, or parse failure.
        reason: String,
    },

    /// Every configured price source failed for this key.
    #[error("no price available for {token} on network {network}")]
    PriceUnavailable {
        /// Network id of the lookup.
        network: NetworkId,
        /// Token contract address.
        token: Address,
    },

    /// The yield-data aggregator could not be reached.
    #[error("no yield data available for pool {pool} on network {network}")]
    YieldUnavailable {
        /// Network id of the lookup.
        network: NetworkId,
        /// Pool contract address.
        pool: Address,
    },

    /// A capability that is intentionally not wired.
    #[error("{0} is not wired")]
    Unimplemented(String),

    /// Malformed address or out-of-range parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The execution adapter reported an unsuccessful transaction.
    #[error("execution rejected: {0}")]
    ExecutionRejected(String),
}

impl AggregatorError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            what,
            key: key.to_string(),
        }
    }

    /// Shorthand for a `SourceUnavailable` error.
    pub fn source(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means "capability not wired" rather than a failure.
    pub const fn is_unimplemented(&self) -> bool {
        matches!(self, Self::Unimplemented(_))
    }
}

/// Result alias used across the core.
pub type AggregatorResult<T> = Result<T, AggregatorError>;

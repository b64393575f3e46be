//! Placeholder scanner for protocols without an adapter.

use async_trait::async_trait;

use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkConfig;
use crate::domain::pool::Pool;
use crate::ports::protocol_scanner::ProtocolScanner;

/// Always answers `Unimplemented`.
pub struct UnwiredScanner {
    protocol: String,
}

impl UnwiredScanner {
    /// Placeholder for `protocol`.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
        }
    }
}

#[async_trait]
impl ProtocolScanner for UnwiredScanner {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    async fn scan(&self, _network: &NetworkConfig) -> AggregatorResult<Vec<Pool>> {
        Err(AggregatorError::Unimplemented(format!("{} scanner", self.protocol)))
    }
}

//! HTTP Adapters - Off-chain Market and Yield Data
//!
//! - `client`: shared rate-limited JSON client (reqwest + governor)
//! - `coingecko`: general market-data aggregator price source
//! - `defillama`: protocol aggregator price source and yield listing

pub mod client;
pub mod coingecko;
pub mod defillama;

pub use client::{HttpClientConfig, HttpJsonClient};
pub use coingecko::CoinGeckoSource;
pub use defillama::{DefiLlamaPrices, DefiLlamaYields};

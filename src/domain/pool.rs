//! Tokens, pools and the risk-adjusted yield ranking.

use std::cmp::Ordering;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::network::NetworkId;

/// Protocol category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    /// Money markets (Aave, Compound).
    Lending,
    /// AMMs (Curve, Balancer, QuickSwap).
    Dex,
    /// Vaults and yield aggregators (Yearn, Beefy).
    Yield,
    /// Liquid staking (Lido, Rocket Pool).
    LiquidStaking,
    /// Perps and options (GMX).
    Derivative,
}

/// An ERC-20 token on a given network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Network id.
    pub network: NetworkId,
    /// Contract address.
    pub address: Address,
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal precision of base units.
    pub decimals: u8,
    /// Last known USD price (0 when never priced).
    pub price_usd: f64,
}

impl Token {
    /// Convert base units to whole tokens. Saturates above `u128::MAX`.
    pub fn to_units(&self, base_units: U256) -> f64 {
        let raw = u128::try_from(base_units).unwrap_or(u128::MAX) as f64;
        raw / 10f64.powi(i32::from(self.decimals))
    }
}

/// A yield opportunity offered by a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Unique id within the catalog.
    pub id: String,
    /// Protocol name, e.g. "Aave".
    pub protocol: String,
    /// Protocol category.
    pub kind: ProtocolKind,
    /// Network id.
    pub network: NetworkId,
    /// Pool contract address.
    pub address: Address,
    /// Display symbol, e.g. "USDC-WETH".
    pub symbol: String,
    /// First constituent token, when the scanner resolved it.
    pub token0: Option<Token>,
    /// Second constituent token; `None` for single-asset pools.
    pub token1: Option<Token>,
    /// Annualized percentage yield; 0 means unknown or inactive.
    pub apy: f64,
    /// Total value locked (USD).
    pub tvl_usd: f64,
    /// Lower is safer; must be > 0 to be ranked.
    pub risk_score: u32,
    /// Amount currently deposited by us (base units).
    pub deposited_amount: U256,
    /// Reward token contracts.
    pub reward_tokens: Vec<Address>,
}

impl Pool {
    /// APY per unit of risk.
    pub fn risk_adjusted_yield(&self) -> f64 {
        self.apy / f64::from(self.risk_score)
    }

    /// Eligible for ranking under the given tolerance.
    pub fn is_eligible(&self, risk_tolerance: u32) -> bool {
        self.risk_score > 0 && self.risk_score <= risk_tolerance && self.apy > 0.0
    }
}

/// Filter by risk tolerance and positive APY, then order by
/// `apy / risk_score` descending. Equal scores fall back to pool id
/// ascending so the order is reproducible.
pub fn rank_by_risk_adjusted_yield<'a>(
    pools: impl IntoIterator<Item = &'a Pool>,
    risk_tolerance: u32,
) -> Vec<Pool> {
    let mut ranked: Vec<Pool> = pools
        .into_iter()
        .filter(|p| p.is_eligible(risk_tolerance))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| compare_ranked(a, b));
    ranked
}

fn compare_ranked(a: &Pool, b: &Pool) -> Ordering {
    b.risk_adjusted_yield()
        .total_cmp(&a.risk_adjusted_yield())
        .then_with(|| a.id.cmp(&b.id))
}

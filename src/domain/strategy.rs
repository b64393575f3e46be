//! Yield strategies and their performance snapshots.
//!
//! A strategy binds user capital to one pool with fee and harvest
//! parameters. Ids are random v4 UUIDs, so concurrent creation within
//! the same instant cannot collide.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, I256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AggregatorError, AggregatorResult};
use super::fees::FeeSchedule;
use super::network::NetworkId;
use super::pool::{Pool, Token};

/// Strategy identifier, `strategy-<uuid>`.
pub type StrategyId = String;

/// Generate a fresh strategy id.
pub fn new_strategy_id() -> StrategyId {
    format!("strategy-{}", Uuid::new_v4())
}

/// Strategy category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    /// Harvest and reinvest rewards.
    AutoCompound,
    /// Farm reward tokens.
    YieldFarm,
    /// Provide AMM liquidity.
    Liquidity,
    /// Stake into a staking pool.
    Staking,
}

/// User request to create a strategy.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Display name.
    pub name: String,
    /// Category.
    pub kind: StrategyKind,
    /// Network id.
    pub network: NetworkId,
    /// Protocol name.
    pub protocol: String,
    /// Pool address as supplied by the user (hex string).
    pub pool_address: String,
    /// Expected APY.
    pub expected_apy: f64,
    /// TVL snapshot at creation (USD).
    pub tvl_usd: f64,
    /// Risk score accepted for this strategy.
    pub risk_tolerance: u32,
    /// Minimum deposit (base units).
    pub min_deposit: U256,
    /// Maximum deposit (base units).
    pub max_deposit: U256,
    /// Fee rates.
    pub fees: FeeSchedule,
    /// Harvest interval; the manager default applies when `None`.
    pub harvest_interval: Option<Duration>,
    /// Token deposited into the pool, used to value the position.
    pub deposit_token: Option<Token>,
    /// Free-form parameters.
    pub parameters: HashMap<String, serde_json::Value>,
}

impl StrategyParams {
    /// Seed parameters from a catalog pool.
    pub fn from_pool(pool: &Pool, name: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            network: pool.network,
            protocol: pool.protocol.clone(),
            pool_address: pool.address.to_checksum(None),
            expected_apy: pool.apy,
            tvl_usd: pool.tvl_usd,
            risk_tolerance: pool.risk_score,
            min_deposit: U256::ZERO,
            max_deposit: U256::MAX,
            fees: FeeSchedule::default(),
            harvest_interval: None,
            deposit_token: pool.token0.clone(),
            parameters: HashMap::new(),
        }
    }

    /// Structural validation. Returns the parsed pool address.
    ///
    /// # Errors
    /// `InvalidInput` describing the first invalid field.
    pub fn validate(&self) -> AggregatorResult<Address> {
        if self.name.trim().is_empty() {
            return Err(AggregatorError::InvalidInput("strategy name is empty".into()));
        }
        if self.protocol.trim().is_empty() {
            return Err(AggregatorError::InvalidInput("protocol is empty".into()));
        }

        let pool = Address::from_str(self.pool_address.trim()).map_err(|e| {
            AggregatorError::InvalidInput(format!(
                "pool address {:?} is not a valid address: {e}",
                self.pool_address
            ))
        })?;

        if !self.expected_apy.is_finite() || self.expected_apy < 0.0 {
            return Err(AggregatorError::InvalidInput(format!(
                "expected APY must be finite and non-negative, got {}",
                self.expected_apy
            )));
        }
        if self.min_deposit > self.max_deposit {
            return Err(AggregatorError::InvalidInput(format!(
                "min deposit {} exceeds max deposit {}",
                self.min_deposit, self.max_deposit
            )));
        }
        if self.harvest_interval.is_some_and(|i| i.is_zero()) {
            return Err(AggregatorError::InvalidInput("harvest interval must be positive".into()));
        }
        if let Some(token) = &self.deposit_token {
            if token.network != self.network {
                return Err(AggregatorError::InvalidInput(format!(
                    "deposit token lives on network {}, strategy on {}",
                    token.network, self.network
                )));
            }
        }
        self.fees.validate()?;

        Ok(pool)
    }
}

/// Running totals of what the execution adapter reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyLedger {
    /// Total deposited (base units).
    pub deposited: U256,
    /// Total withdrawn (base units).
    pub withdrawn: U256,
    /// Total rewards claimed (base units).
    pub harvested: U256,
    /// Performance fees charged on harvests.
    pub performance_fees: U256,
    /// Withdrawal fees charged on withdrawals.
    pub withdrawal_fees: U256,
}

impl StrategyLedger {
    /// Principal still deployed.
    pub fn net_deposited(&self) -> U256 {
        self.deposited.saturating_sub(self.withdrawn)
    }

    /// Harvested rewards net of performance fees, minus withdrawal fees.
    pub fn realized_profit_loss(&self) -> I256 {
        let gains = to_signed(self.harvested.saturating_sub(self.performance_fees));
        let costs = to_signed(self.withdrawal_fees);
        gains.saturating_sub(costs)
    }
}

fn to_signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// A user's commitment to a pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Unique id.
    pub id: StrategyId,
    /// Display name.
    pub name: String,
    /// Category.
    pub kind: StrategyKind,
    /// Network id.
    pub network: NetworkId,
    /// Protocol name.
    pub protocol: String,
    /// Pool contract.
    pub pool_address: Address,
    /// Expected APY, refreshed by the monitor.
    pub apy: f64,
    /// TVL snapshot (USD).
    pub tvl_usd: f64,
    /// Risk score.
    pub risk_score: u32,
    /// Minimum deposit (base units).
    pub min_deposit: U256,
    /// Maximum deposit (base units).
    pub max_deposit: U256,
    /// Fee rates.
    pub fees: FeeSchedule,
    /// Minimum time between harvests.
    pub harvest_interval: Duration,
    /// Last successful harvest; `None` until the first one.
    pub last_harvest: Option<DateTime<Utc>>,
    /// Whether the strategy is monitored.
    pub active: bool,
    /// Token deposited into the pool.
    pub deposit_token: Option<Token>,
    /// Free-form parameters.
    pub parameters: HashMap<String, serde_json::Value>,
    /// Execution totals.
    pub ledger: StrategyLedger,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    /// Build an active strategy from validated parameters.
    pub fn from_params(
        id: StrategyId,
        params: StrategyParams,
        pool_address: Address,
        default_harvest_interval: Duration,
    ) -> Self {
        Self {
            id,
            name: params.name,
            kind: params.kind,
            network: params.network,
            protocol: params.protocol,
            pool_address,
            apy: params.expected_apy,
            tvl_usd: params.tvl_usd,
            risk_score: params.risk_tolerance,
            min_deposit: params.min_deposit,
            max_deposit: params.max_deposit,
            fees: params.fees,
            harvest_interval: params.harvest_interval.unwrap_or(default_harvest_interval),
            last_harvest: None,
            active: true,
            deposit_token: params.deposit_token,
            parameters: params.parameters,
            ledger: StrategyLedger::default(),
            created_at: Utc::now(),
        }
    }

    /// Whether `harvest_interval` has elapsed since the last harvest.
    ///
    /// A clock that moved backwards reads as "not due".
    pub fn harvest_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_harvest {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= self.harvest_interval),
        }
    }

    /// Check a deposit amount against the strategy bounds.
    ///
    /// # Errors
    /// `InvalidInput` if inactive, zero, or outside [min, max].
    pub fn check_deposit(&self, amount: U256) -> AggregatorResult<()> {
        if !self.active {
            return Err(AggregatorError::InvalidInput(format!(
                "strategy {} is inactive",
                self.id
            )));
        }
        if amount.is_zero() {
            return Err(AggregatorError::InvalidInput("deposit amount is zero".into()));
        }
        if amount < self.min_deposit || amount > self.max_deposit {
            return Err(AggregatorError::InvalidInput(format!(
                "deposit {amount} outside bounds [{}, {}]",
                self.min_deposit, self.max_deposit
            )));
        }
        Ok(())
    }
}

/// Point-in-time performance of a strategy. Recomputed on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPerformance {
    /// Strategy id.
    pub strategy_id: StrategyId,
    /// Stored expected APY.
    pub current_apy: f64,
    /// APY after the performance fee.
    pub net_apy: f64,
    /// Principal still deployed, valued in USD.
    pub total_deposited_usd: f64,
    /// Rewards claimed so far (base units).
    pub total_harvested: U256,
    /// Rewards accrued but not yet claimed (base units).
    pub pending_rewards: U256,
    /// Realized profit/loss (base units).
    pub profit_loss: I256,
}

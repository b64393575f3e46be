//! Strategy fee schedule.
//!
//! Withdrawal and performance fees are stored as `Decimal` rates in
//! [0, 1). Amounts are token base units (`U256`); the rate is applied
//! at basis-point resolution so the arithmetic stays in integers.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::error::{AggregatorError, AggregatorResult};

const BPS_DENOMINATOR: u64 = 10_000;

/// Fee rates charged by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fraction of the withdrawn amount kept as fee.
    pub withdrawal_fee: Decimal,
    /// Fraction of harvested rewards kept as fee.
    pub performance_fee: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            withdrawal_fee: Decimal::ZERO,
            performance_fee: dec!(0.10),
        }
    }
}

impl FeeSchedule {
    /// Create a validated schedule.
    ///
    /// # Errors
    /// `InvalidInput` if either rate is outside [0, 1).
    pub fn new(withdrawal_fee: Decimal, performance_fee: Decimal) -> AggregatorResult<Self> {
        let schedule = Self {
            withdrawal_fee,
            performance_fee,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Check both rates are in [0, 1).
    ///
    /// # Errors
    /// `InvalidInput` naming the offending rate.
    pub fn validate(&self) -> AggregatorResult<()> {
        for (name, rate) in [
            ("withdrawal_fee", self.withdrawal_fee),
            ("performance_fee", self.performance_fee),
        ] {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(AggregatorError::InvalidInput(format!(
                    "{name} must be in [0, 1), got {rate}"
                )));
            }
        }
        Ok(())
    }

    /// APY left to the depositor after the performance fee.
    pub fn net_apy(&self, gross_apy: f64) -> f64 {
        let keep = (Decimal::ONE - self.performance_fee).to_f64().unwrap_or(1.0);
        gross_apy * keep
    }

    /// Performance fee owed on harvested rewards.
    pub fn performance_fee_on(&self, rewards: U256) -> U256 {
        apply_rate(rewards, self.performance_fee)
    }

    /// Withdrawal fee owed on a withdrawn amount.
    pub fn withdrawal_fee_on(&self, amount: U256) -> U256 {
        apply_rate(amount, self.withdrawal_fee)
    }

    /// Rewards left after the performance fee.
    pub fn net_of_performance_fee(&self, rewards: U256) -> U256 {
        rewards.saturating_sub(self.performance_fee_on(rewards))
    }
}

/// `amount * rate`, truncated to whole basis points and base units.
fn apply_rate(amount: U256, rate: Decimal) -> U256 {
    let bps = (rate * Decimal::from(BPS_DENOMINATOR))
        .trunc()
        .to_u64()
        .unwrap_or(0);
    let denom = U256::from(BPS_DENOMINATOR);
    let bps = U256::from(bps);

    // Split to avoid overflowing near U256::MAX.
    (amount / denom) * bps + (amount % denom) * bps / denom
}

//! Strategy Manager Use Case - Strategy Lifecycle and Monitoring
//!
//! Owns the strategy table and one supervised monitoring task per
//! active strategy:
//! - Creation validates structurally, assigns a random id and never
//!   touches the network
//! - Deposits, withdrawals and harvests are delegated to the
//!   execution adapter; the ledger records what it reports
//! - Harvests are gated by the harvest interval and claimed through an
//!   in-flight slot, so a concurrent or repeated call is a no-op
//! - Deactivation and shutdown cancel the monitor and wait for it

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::{AggregatorError, AggregatorResult};
use crate::domain::network::NetworkRegistry;
use crate::domain::strategy::{
  Strategy, StrategyId, StrategyParams, StrategyPerformance, new_strategy_id,
};
use crate::ports::execution::{ExecutionAdapter, HarvestOutcome, PositionTarget, TransactionResult};
use crate::ports::repository::StrategySnapshot;
use crate::usecases::gas_oracle::GasOracle;
use crate::usecases::price_oracle::PriceOracle;

/// Manager tuning.
#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
  /// Period of each strategy's monitoring tick.
  pub monitor_interval: Duration,
  /// Harvest interval for strategies created without one.
  pub default_harvest_interval: Duration,
}

impl Default for ManagerSettings {
  fn default() -> Self {
    Self {
      monitor_interval: Duration::from_secs(60),
      default_harvest_interval: Duration::from_secs(24 * 60 * 60),
    }
  }
}

/// Cumulative lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
  /// Strategies created.
  pub created: u64,
  /// Successful deposits.
  pub deposits: u64,
  /// Successful withdrawals.
  pub withdrawals: u64,
  /// Successful harvests.
  pub harvests: u64,
  /// Harvests the adapter failed or rejected.
  pub harvest_failures: u64,
  /// Monitor ticks that skipped a due harvest because of gas.
  pub gas_skips: u64,
}

#[derive(Debug, Default)]
struct Counters {
  created: AtomicU64,
  deposits: AtomicU64,
  withdrawals: AtomicU64,
  harvests: AtomicU64,
  harvest_failures: AtomicU64,
  gas_skips: AtomicU64,
}

/// State shared between the manager and its monitoring tasks.
struct ManagerState {
  strategies: RwLock<HashMap<StrategyId, Strategy>>,
  /// Strategies with a harvest in progress.
  harvesting: StdMutex<HashSet<StrategyId>>,
  registry: Arc<NetworkRegistry>,
  oracle: Arc<PriceOracle>,
  executor: Arc<dyn ExecutionAdapter>,
  gas: OnceLock<Arc<GasOracle>>,
  settings: ManagerSettings,
  counters: Counters,
}

/// A running monitor and its cancellation signal.
struct MonitorHandle {
  cancel: watch::Sender<bool>,
  task: JoinHandle<()>,
}

/// Manages user strategies and their monitors.
pub struct StrategyManager {
  state: Arc<ManagerState>,
  monitors: Mutex<HashMap<StrategyId, MonitorHandle>>,
}

impl StrategyManager {
  /// Create a manager with an empty strategy table.
  pub fn new(
    registry: Arc<NetworkRegistry>,
    oracle: Arc<PriceOracle>,
    executor: Arc<dyn ExecutionAdapter>,
    settings: ManagerSettings,
  ) -> Self {
    Self {
      state: Arc::new(ManagerState {
        strategies: RwLock::new(HashMap::new()),
        harvesting: StdMutex::new(HashSet::new()),
        registry,
        oracle,
        executor,
        gas: OnceLock::new(),
        settings,
        counters: Counters::default(),
      }),
      monitors: Mutex::new(HashMap::new()),
    }
  }

  /// Gate monitor harvests on gas prices. Only the first oracle set is kept.
  pub fn with_gas_oracle(self, gas: Arc<GasOracle>) -> Self {
    if self.state.gas.set(gas).is_err() {
      warn!("Gas oracle already set, ignoring");
    }
    self
  }

  /// Create an active strategy and start its monitor.
  ///
  /// # Errors
  /// - `InvalidInput` if a field is structurally invalid
  /// - `NotFound` if the network is not registered
  #[instrument(skip(self, params), fields(name = %params.name, network = params.network))]
  pub async fn create_strategy(&self, params: StrategyParams) -> AggregatorResult<StrategyId> {
    let pool = params.validate()?;
    self.state.registry.get(params.network)?;

    let id = new_strategy_id();
    let strategy = Strategy::from_params(
      id.clone(),
      params,
      pool,
      self.state.settings.default_harvest_interval,
    );

    info!(
      strategy = %id,
      protocol = %strategy.protocol,
      pool = %strategy.pool_address,
      apy = strategy.apy,
      "Strategy created"
    );

    self
      .state
      .strategies
      .write()
      .await
      .insert(id.clone(), strategy);
    self.spawn_monitor(&id).await;
    self.state.counters.created.fetch_add(1, Ordering::Relaxed);

    Ok(id)
  }

  /// Deposit `amount` for `user` through the execution adapter.
  ///
  /// # Errors
  /// - `NotFound` if the id is unknown
  /// - `InvalidInput` if the strategy is inactive or the amount is out of bounds
  /// - `Unimplemented` if no execution adapter is wired
  /// - `ExecutionRejected` if the adapter reports failure
  #[instrument(skip(self), fields(amount = %amount, user = %user))]
  pub async fn execute_strategy(
    &self,
    id: &str,
    amount: U256,
    user: Address,
  ) -> AggregatorResult<TransactionResult> {
    let target = {
      let strategies = self.state.strategies.read().await;
      let strategy = strategies
        .get(id)
        .ok_or_else(|| AggregatorError::not_found("strategy", id))?;
      strategy.check_deposit(amount)?;
      position_target(strategy)
    };

    let result = self.state.executor.deposit(&target, user, amount).await?;
    if !result.success {
      warn!(strategy = %id, "Deposit rejected by execution adapter");
      return Err(AggregatorError::ExecutionRejected(format!("deposit into {id}")));
    }

    if let Some(strategy) = self.state.strategies.write().await.get_mut(id) {
      strategy.ledger.deposited = strategy.ledger.deposited.saturating_add(amount);
    }
    self.state.counters.deposits.fetch_add(1, Ordering::Relaxed);
    info!(strategy = %id, lp_tokens = %result.lp_token_amount, "Deposit executed");

    Ok(result)
  }

  /// Withdraw `amount` of deployed principal to `user`.
  ///
  /// Allowed on inactive strategies. The withdrawal fee is recorded in
  /// the ledger.
  ///
  /// # Errors
  /// - `NotFound` if the id is unknown
  /// - `InvalidInput` if the amount is zero or exceeds the deployed principal
  /// - `Unimplemented` if no execution adapter is wired
  /// - `ExecutionRejected` if the adapter reports failure
  #[instrument(skip(self), fields(amount = %amount, user = %user))]
  pub async fn withdraw_strategy(
    &self,
    id: &str,
    amount: U256,
    user: Address,
  ) -> AggregatorResult<TransactionResult> {
    let target = {
      let strategies = self.state.strategies.read().await;
      let strategy = strategies
        .get(id)
        .ok_or_else(|| AggregatorError::not_found("strategy", id))?;

      let available = strategy.ledger.net_deposited();
      if amount.is_zero() || amount > available {
        return Err(AggregatorError::InvalidInput(format!(
          "withdrawal {amount} outside deployed principal {available}"
        )));
      }
      position_target(strategy)
    };

    let result = self.state.executor.withdraw(&target, user, amount).await?;
    if !result.success {
      warn!(strategy = %id, "Withdrawal rejected by execution adapter");
      return Err(AggregatorError::ExecutionRejected(format!("withdrawal from {id}")));
    }

    if let Some(strategy) = self.state.strategies.write().await.get_mut(id) {
      let fee = strategy.fees.withdrawal_fee_on(amount);
      strategy.ledger.withdrawn = strategy.ledger.withdrawn.saturating_add(amount);
      strategy.ledger.withdrawal_fees = strategy.ledger.withdrawal_fees.saturating_add(fee);
      info!(strategy = %id, fee = %fee, "Withdrawal executed");
    }
    self.state.counters.withdrawals.fetch_add(1, Ordering::Relaxed);

    Ok(result)
  }

  /// Harvest one strategy if its interval has elapsed.
  ///
  /// Returns `Ok(None)` without side effects when the harvest is not
  /// due, the strategy is inactive, or another harvest of it is in
  /// flight. On success `last_harvest` advances to now.
  ///
  /// # Errors
  /// - `NotFound` if the id is unknown
  /// - `Unimplemented` if no execution adapter is wired
  /// - `ExecutionRejected` if the adapter reports failure
  pub async fn harvest_all(&self, id: &str) -> AggregatorResult<Option<HarvestOutcome>> {
    self.state.harvest(id).await
  }

  /// Point-in-time performance of a strategy.
  ///
  /// Deposited value is priced through the oracle when the deposit
  /// token is known; pending rewards come from the execution adapter.
  /// Anything that cannot be derived is reported as zero.
  ///
  /// # Errors
  /// `NotFound` if the id is unknown.
  #[instrument(skip(self))]
  pub async fn get_strategy_performance(&self, id: &str) -> AggregatorResult<StrategyPerformance> {
    let strategy = self.get_strategy(id).await?;
    let deployed = strategy.ledger.net_deposited();

    let total_deposited_usd = match &strategy.deposit_token {
      Some(token) if !deployed.is_zero() => {
        match self
          .state
          .oracle
          .get_token_price(token.network, token.address)
          .await
        {
          Ok(price) => token.to_units(deployed) * price,
          Err(e) => {
            warn!(strategy = %id, error = %e, "Deposit token unpriced, reporting 0 USD");
            0.0
          }
        }
      }
      _ => 0.0,
    };

    let pending_rewards = match self
      .state
      .executor
      .pending_rewards(&position_target(&strategy))
      .await
    {
      Ok(pending) => pending,
      Err(e) if e.is_unimplemented() => U256::ZERO,
      Err(e) => {
        warn!(strategy = %id, error = %e, "Pending rewards unavailable");
        U256::ZERO
      }
    };

    Ok(StrategyPerformance {
      strategy_id: strategy.id.clone(),
      current_apy: strategy.apy,
      net_apy: strategy.fees.net_apy(strategy.apy),
      total_deposited_usd,
      total_harvested: strategy.ledger.harvested,
      pending_rewards,
      profit_loss: strategy.ledger.realized_profit_loss(),
    })
  }

  /// Stop monitoring a strategy and mark it inactive.
  ///
  /// The monitor has exited when this returns. Deactivating an inactive
  /// strategy is a no-op.
  ///
  /// # Errors
  /// `NotFound` if the id is unknown.
  #[instrument(skip(self))]
  pub async fn deactivate_strategy(&self, id: &str) -> AggregatorResult<()> {
    if !self.state.strategies.read().await.contains_key(id) {
      return Err(AggregatorError::not_found("strategy", id));
    }

    self.stop_monitor(id).await;

    if let Some(strategy) = self.state.strategies.write().await.get_mut(id) {
      if strategy.active {
        strategy.active = false;
        info!(strategy = %id, "Strategy deactivated");
      }
    }
    Ok(())
  }

  /// Deactivate and delete a strategy.
  ///
  /// # Errors
  /// `NotFound` if the id is unknown.
  pub async fn remove_strategy(&self, id: &str) -> AggregatorResult<Strategy> {
    self.deactivate_strategy(id).await?;
    self
      .state
      .strategies
      .write()
      .await
      .remove(id)
      .ok_or_else(|| AggregatorError::not_found("strategy", id))
  }

  /// Stop every monitor. Strategies keep their active flag so a
  /// snapshot restores them as active.
  pub async fn shutdown(&self) {
    let handles: Vec<_> = self.monitors.lock().await.drain().collect();
    let count = handles.len();

    for (_, handle) in &handles {
      let _ = handle.cancel.send(true);
    }
    for (id, handle) in handles {
      if let Err(e) = handle.task.await {
        warn!(strategy = %id, error = %e, "Monitor task ended abnormally");
      }
    }

    info!(monitors = count, "Strategy monitors stopped");
  }

  /// A copy of one strategy.
  ///
  /// # Errors
  /// `NotFound` if the id is unknown.
  pub async fn get_strategy(&self, id: &str) -> AggregatorResult<Strategy> {
    self
      .state
      .strategies
      .read()
      .await
      .get(id)
      .cloned()
      .ok_or_else(|| AggregatorError::not_found("strategy", id))
  }

  /// All strategies, oldest first.
  pub async fn list_strategies(&self) -> Vec<Strategy> {
    let mut all: Vec<_> = self.state.strategies.read().await.values().cloned().collect();
    all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    all
  }

  /// Number of active strategies.
  pub async fn active_count(&self) -> usize {
    self
      .state
      .strategies
      .read()
      .await
      .values()
      .filter(|s| s.active)
      .count()
  }

  /// Number of running monitors.
  pub async fn monitor_count(&self) -> usize {
    self.monitors.lock().await.len()
  }

  /// Snapshot of the whole table for persistence.
  pub async fn snapshot(&self) -> StrategySnapshot {
    StrategySnapshot {
      version: env!("CARGO_PKG_VERSION").to_string(),
      saved_at: Utc::now(),
      strategies: self.list_strategies().await,
    }
  }

  /// Load strategies from a snapshot, restarting monitors for active
  /// ones. Ids already present are skipped. Returns the number loaded.
  pub async fn restore(&self, snapshot: StrategySnapshot) -> usize {
    let mut loaded = 0usize;
    let mut restored = Vec::new();
    {
      let mut strategies = self.state.strategies.write().await;
      for strategy in snapshot.strategies {
        if strategies.contains_key(&strategy.id) {
          debug!(strategy = %strategy.id, "Strategy already loaded, skipping");
          continue;
        }
        if strategy.active {
          restored.push(strategy.id.clone());
        }
        strategies.insert(strategy.id.clone(), strategy);
        loaded += 1;
      }
    }

    for id in &restored {
      self.spawn_monitor(id).await;
    }

    info!(
      saved_at = %snapshot.saved_at,
      loaded,
      monitors = restored.len(),
      "Strategies restored"
    );
    loaded
  }

  /// Cumulative lifecycle counters.
  pub fn stats(&self) -> ManagerStats {
    let c = &self.state.counters;
    ManagerStats {
      created: c.created.load(Ordering::Relaxed),
      deposits: c.deposits.load(Ordering::Relaxed),
      withdrawals: c.withdrawals.load(Ordering::Relaxed),
      harvests: c.harvests.load(Ordering::Relaxed),
      harvest_failures: c.harvest_failures.load(Ordering::Relaxed),
      gas_skips: c.gas_skips.load(Ordering::Relaxed),
    }
  }

  async fn spawn_monitor(&self, id: &StrategyId) {
    let (cancel, cancelled) = watch::channel(false);
    let state = Arc::clone(&self.state);
    let strategy_id = id.clone();
    let task = tokio::spawn(async move { state.monitor(strategy_id, cancelled).await });

    if let Some(previous) = self
      .monitors
      .lock()
      .await
      .insert(id.clone(), MonitorHandle { cancel, task })
    {
      let _ = previous.cancel.send(true);
    }
  }

  /// Cancel a monitor and wait for it to exit.
  async fn stop_monitor(&self, id: &str) -> bool {
    let Some(handle) = self.monitors.lock().await.remove(id) else {
      return false;
    };

    let _ = handle.cancel.send(true);
    if let Err(e) = handle.task.await {
      warn!(strategy = %id, error = %e, "Monitor task ended abnormally");
    }
    true
  }
}

impl ManagerState {
  async fn monitor(self: Arc<Self>, id: StrategyId, mut cancelled: watch::Receiver<bool>) {
    let period = self.settings.monitor_interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    debug!(strategy = %id, period_ms = period.as_millis(), "Monitor started");

    loop {
      tokio::select! {
        biased;
        _ = cancelled.changed() => break,
        _ = ticker.tick() => {
          if !self.monitor_tick(&id).await {
            break;
          }
        }
      }
    }

    debug!(strategy = %id, "Monitor stopped");
  }

  /// One monitoring pass. Returns `false` once the strategy is gone or inactive.
  async fn monitor_tick(&self, id: &str) -> bool {
    let Some(strategy) = self
      .strategies
      .read()
      .await
      .get(id)
      .filter(|s| s.active)
      .cloned()
    else {
      return false;
    };

    match self
      .oracle
      .get_apy(&strategy.protocol, strategy.pool_address, strategy.network)
      .await
    {
      Ok(apy) => {
        if let Some(s) = self.strategies.write().await.get_mut(id) {
          s.apy = apy;
        }
        debug!(strategy = %id, apy, "APY refreshed");
      }
      Err(e) => debug!(strategy = %id, error = %e, "APY refresh skipped"),
    }

    if !strategy.harvest_due(Utc::now()) {
      return true;
    }

    if let Some(gas) = self.gas.get() {
      if !gas.is_gas_acceptable(strategy.network).await {
        self.counters.gas_skips.fetch_add(1, Ordering::Relaxed);
        debug!(strategy = %id, network = strategy.network, "Harvest deferred, gas too high");
        return true;
      }
    }

    match self.harvest(id).await {
      Ok(_) => {}
      Err(e) if e.is_unimplemented() => debug!(strategy = %id, "Harvest skipped: {e}"),
      Err(e) => warn!(strategy = %id, error = %e, "Scheduled harvest failed"),
    }
    true
  }

  #[instrument(skip(self))]
  async fn harvest(&self, id: &str) -> AggregatorResult<Option<HarvestOutcome>> {
    if !self.strategies.read().await.contains_key(id) {
      return Err(AggregatorError::not_found("strategy", id));
    }

    let Some(_slot) = HarvestSlot::claim(&self.harvesting, id) else {
      debug!("Harvest already in flight");
      return Ok(None);
    };

    let target = {
      let strategies = self.strategies.read().await;
      let strategy = strategies
        .get(id)
        .ok_or_else(|| AggregatorError::not_found("strategy", id))?;

      if !strategy.active {
        debug!("Strategy inactive, harvest skipped");
        return Ok(None);
      }
      if !strategy.harvest_due(Utc::now()) {
        debug!("Harvest not due");
        return Ok(None);
      }
      position_target(strategy)
    };

    let outcome = match self.executor.harvest(&target).await {
      Ok(outcome) => outcome,
      Err(e) => {
        if !e.is_unimplemented() {
          self.counters.harvest_failures.fetch_add(1, Ordering::Relaxed);
        }
        return Err(e);
      }
    };

    if !outcome.success {
      self.counters.harvest_failures.fetch_add(1, Ordering::Relaxed);
      return Err(AggregatorError::ExecutionRejected(format!("harvest of {id}")));
    }

    if let Some(strategy) = self.strategies.write().await.get_mut(id) {
      let fee = strategy.fees.performance_fee_on(outcome.rewards_claimed);
      strategy.ledger.harvested = strategy.ledger.harvested.saturating_add(outcome.rewards_claimed);
      strategy.ledger.performance_fees = strategy.ledger.performance_fees.saturating_add(fee);
      strategy.last_harvest = Some(Utc::now());

      info!(
        rewards = %outcome.rewards_claimed,
        fee = %fee,
        reinvested = outcome.reinvested,
        "Strategy harvested"
      );
    }
    self.counters.harvests.fetch_add(1, Ordering::Relaxed);

    Ok(Some(outcome))
  }
}

/// Exclusive right to harvest one strategy; released on drop.
struct HarvestSlot<'a> {
  set: &'a StdMutex<HashSet<StrategyId>>,
  id: StrategyId,
}

impl<'a> HarvestSlot<'a> {
  fn claim(set: &'a StdMutex<HashSet<StrategyId>>, id: &str) -> Option<Self> {
    let claimed = set
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(id.to_string());

    claimed.then(|| Self {
      set,
      id: id.to_string(),
    })
  }
}

impl Drop for HarvestSlot<'_> {
  fn drop(&mut self) {
    self
      .set
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.id);
  }
}

fn position_target(strategy: &Strategy) -> PositionTarget {
  PositionTarget {
    network: strategy.network,
    protocol: strategy.protocol.clone(),
    pool: strategy.pool_address,
  }
}

//! Market-data HTTP Client - Rate-limited JSON GET Client
//!
//! Wraps reqwest with a request timeout, a concurrency limit, a
//! per-minute rate limit and retries with exponential backoff. Shared
//! by every HTTP price and yield source.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::error::{AggregatorError, AggregatorResult};

/// Configuration for the market-data HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
  /// Request timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Requests allowed per minute across all sources.
  pub max_requests_per_minute: u32,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl Default for HttpClientConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(10),
      max_concurrent: 8,
      max_requests_per_minute: 30,
      max_retries: 2,
      retry_base_delay: Duration::from_millis(250),
    }
  }
}

/// Rate-limited JSON client for public market-data APIs.
pub struct HttpJsonClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: HttpClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request-rate limiter.
  limiter: DefaultDirectRateLimiter,
}

impl HttpJsonClient {
  /// Create a new client.
  ///
  /// # Errors
  /// Fails if the TLS backend cannot be initialized.
  pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .user_agent(concat!("defi-yield-aggregator/", env!("CARGO_PKG_VERSION")))
      .build()
      .context("Failed to build HTTP client")?;

    let per_minute = NonZeroU32::new(config.max_requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let limiter = RateLimiter::direct(Quota::per_minute(per_minute));
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
    })
  }

  /// GET `url` and decode the JSON body.
  ///
  /// Retries on 429, 5xx and transport errors.
  ///
  /// # Errors
  /// `SourceUnavailable` tagged with `origin` on transport errors,
  /// non-2xx responses, or bodies that do not decode as `T`.
  pub async fn get_json<T: DeserializeOwned>(&self, origin: &str, url: &str) -> AggregatorResult<T> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .map_err(|e| AggregatorError::source(origin, e))?;

    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(origin, attempt, delay_ms = delay.as_millis(), "Retrying request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      match self.http.get(url).send().await {
        Ok(response) => match response.status() {
          status if status.is_success() => {
            return response
              .json::<T>()
              .await
              .map_err(|e| AggregatorError::source(origin, format!("malformed payload: {e}")));
          }
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(origin, "Rate limited, backing off");
            last_error = Some(AggregatorError::source(origin, "rate limited"));
          }
          status if status.is_server_error() => {
            warn!(origin, status = %status, "Server error, retrying");
            last_error = Some(AggregatorError::source(origin, format!("server error {status}")));
          }
          status => {
            return Err(AggregatorError::source(origin, format!("unexpected status {status}")));
          }
        },
        Err(e) => {
          warn!(origin, error = %e, attempt, "Request failed");
          last_error = Some(AggregatorError::source(origin, e));
        }
      }
    }

    Err(last_error.unwrap_or_else(|| AggregatorError::source(origin, "max retries exceeded")))
  }
}

// src/risk/circuit_breaker.rs
//! Circuit breaker around fallible external calls.
//!
//! Each breaker guards one call family (universe refresh, market data,
//! rebalance). The whole call protocol, including the awaited operation,
//! runs while holding the breaker's async mutex, so concurrent callers of
//! the same instance are serialized behind a slow call. Separate instances
//! per call family keep unrelated calls independent.

use crate::config::CircuitBreakerConfig;
use crate::domain::errors::CircuitBreakerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    timeout: Duration,
    failure_threshold: u32,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, timeout: Duration, failure_threshold: u32) -> Self {
        Self {
            name: name.to_string(),
            timeout,
            failure_threshold: failure_threshold.max(1),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    pub fn from_config(name: &str, config: &CircuitBreakerConfig) -> Self {
        Self::new(name, config.timeout(), config.failure_threshold)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    pub async fn failure_count(&self) -> u32 {
        self.inner.lock().await.failure_count
    }

    /// Run `operation` under the breaker protocol.
    ///
    /// An open breaker fails fast with [`CircuitBreakerError::Open`] without
    /// invoking `operation`, until `timeout` has elapsed since the last
    /// failure; the next call is then a half-open trial.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut inner = self.inner.lock().await;

        if inner.state == BreakerState::Open {
            let expired = inner
                .last_failure
                .map_or(true, |at| at.elapsed() > self.timeout);
            if expired {
                log::info!("Circuit breaker '{}' half-open, allowing trial call", self.name);
                inner.state = BreakerState::HalfOpen;
            } else {
                return Err(CircuitBreakerError::Open {
                    name: self.name.clone(),
                });
            }
        }

        let result = operation().await;

        match (inner.state, &result) {
            (BreakerState::HalfOpen, Ok(_)) => {
                log::info!("Circuit breaker '{}' closed after successful trial", self.name);
                inner.state = BreakerState::Closed;
                inner.failure_count = 0;
            }
            (BreakerState::HalfOpen, Err(_)) => {
                log::warn!("Circuit breaker '{}' trial failed, reopening", self.name);
                inner.state = BreakerState::Open;
                inner.last_failure = Some(Instant::now());
            }
            (_, Ok(_)) => {
                inner.failure_count = 0;
            }
            (_, Err(_)) => {
                inner.failure_count += 1;
                inner.last_failure = Some(Instant::now());
                if inner.failure_count >= self.failure_threshold {
                    log::warn!(
                        "Circuit breaker '{}' opened after {} consecutive failures",
                        self.name,
                        inner.failure_count
                    );
                    inner.state = BreakerState::Open;
                }
            }
        }

        result.map_err(CircuitBreakerError::Operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(10);

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), CircuitBreakerError<String>> {
        breaker
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom".to_string())
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<u32, CircuitBreakerError<String>> {
        breaker
            .call(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(42)
            })
            .await
    }

    async fn tripped(calls: &AtomicUsize) -> CircuitBreaker {
        let breaker = CircuitBreaker::new("test", TIMEOUT, 5);
        for _ in 0..5 {
            let err = fail(&breaker, calls).await.unwrap_err();
            assert_eq!(err, CircuitBreakerError::Operation("boom".to_string()));
        }
        breaker
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_fails_fast() {
        let calls = AtomicUsize::new(0);
        let breaker = tripped(&calls).await;

        assert_eq!(breaker.state().await, BreakerState::Open);
        assert_eq!(breaker.failure_count().await, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let err = succeed(&breaker, &calls).await.unwrap_err();
        assert!(err.is_open());
        // The sixth call never reached the operation
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let calls = AtomicUsize::new(0);
        let breaker = tripped(&calls).await;

        tokio::time::advance(TIMEOUT + Duration::from_millis(1)).await;

        assert_eq!(succeed(&breaker, &calls).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(breaker.state().await, BreakerState::Closed);
        assert_eq!(breaker.failure_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_and_resets_clock() {
        let calls = AtomicUsize::new(0);
        let breaker = tripped(&calls).await;

        tokio::time::advance(TIMEOUT + Duration::from_millis(1)).await;
        assert!(!fail(&breaker, &calls).await.unwrap_err().is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(breaker.state().await, BreakerState::Open);

        // Clock restarted at the trial failure
        tokio::time::advance(TIMEOUT / 2).await;
        assert!(succeed(&breaker, &calls).await.unwrap_err().is_open());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let calls = AtomicUsize::new(0);
        let breaker = CircuitBreaker::new("test", TIMEOUT, 5);

        for _ in 0..4 {
            let _ = fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.failure_count().await, 4);
        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.failure_count().await, 0);
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_open_before_timeout() {
        let calls = AtomicUsize::new(0);
        let breaker = tripped(&calls).await;

        tokio::time::advance(TIMEOUT - Duration::from_millis(1)).await;
        assert!(succeed(&breaker, &calls).await.unwrap_err().is_open());
        assert_eq!(breaker.state().await, BreakerState::Open);
    }
}

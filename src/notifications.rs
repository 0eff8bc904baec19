// src/notifications.rs
use crate::domain::errors::AppResult;
use crate::domain::models::TradeAction;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeAlert {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub strategy: String,
    pub confidence: f64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TradeAlert {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} qty={:.4} price=${:.4} strategy={} confidence={:.2}% reason={}",
            self.symbol,
            self.action,
            self.quantity,
            self.price,
            self.strategy,
            self.confidence * 100.0,
            self.reason
        )
    }
}

/// Outbound alert delivery. Callers log failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_trade_alert(&self, alert: &TradeAlert) -> AppResult<()>;

    async fn notify_emergency_stop(&self, reason: &str) -> AppResult<()>;
}

/// Writes alerts to the application log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_trade_alert(&self, alert: &TradeAlert) -> AppResult<()> {
        log::info!("Trade alert: {}", alert);
        Ok(())
    }

    async fn notify_emergency_stop(&self, reason: &str) -> AppResult<()> {
        log::error!("EMERGENCY STOP: {}", reason);
        Ok(())
    }
}

// src/main.rs
use regime_trader::config::Config;
use regime_trader::domain::errors::AppResult;
use regime_trader::exchange::paper::PaperExchange;
use regime_trader::notifications::LogNotifier;
use regime_trader::trading_bot::TradingBot;

use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting regime_trader v{}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Using {} exchange, {} symbols, cycle every {} minutes",
        config.exchange.name,
        config.trading.top_symbols,
        config.trading.rebalance_minutes
    );
    if !config.trading.auto_trading {
        log::warn!("AUTO_TRADING is disabled, signals will be logged but not executed");
    }

    let exchange = Arc::new(PaperExchange::new());
    let bot = TradingBot::new(config, exchange, Arc::new(LogNotifier));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
            // Keep the sender alive so the bot is not shut down by a closed channel
            std::future::pending::<()>().await;
        }
        log::info!("Received interrupt signal, shutting down...");
        let _ = shutdown_tx.send(true);
    });

    bot.run(shutdown_rx).await?;

    log::info!("Shutdown complete");
    Ok(())
}

// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Trading bot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Exchange connection settings
    pub exchange: ExchangeConfig,

    /// Trading configuration
    pub trading: TradingConfig,

    /// Risk management configuration
    pub risk: RiskConfig,

    /// Circuit breaker protecting external calls
    pub circuit_breaker: CircuitBreakerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Exchange configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name (e.g., "paper")
    pub name: String,

    /// Use testnet
    pub testnet: bool,
}

/// Trading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Number of top symbols traded each cycle
    pub top_symbols: usize,

    /// Minutes between trading cycles
    pub rebalance_minutes: u64,

    /// Forward strategy signals to the exchange
    pub auto_trading: bool,

    /// Absolute correlation above which two symbols are reported together
    pub correlation_threshold: f64,
}

impl TradingConfig {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.rebalance_minutes.max(1) * 60)
    }
}

/// Risk management configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Capital under management in quote currency
    pub total_capital: f64,

    /// Maximum position size per coin (base units)
    pub max_position_per_coin: f64,

    /// Maximum drawdown as a fraction (0.1 = 10%)
    pub max_drawdown: f64,

    /// Stop loss percentage
    pub stop_loss_percent: f64,

    /// Take profit percentage
    pub take_profit_percent: f64,

    /// Profit percentage at which the trailing stop arms itself
    pub trailing_activation_percent: Option<f64>,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Seconds an open breaker waits before allowing a trial call
    pub timeout_secs: u64,

    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

/// Parse an optional environment variable, keeping `default` when unset.
fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            AppError::Config(format!("Invalid value for {}: {}", key, raw))
        }),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let defaults = Config::default();

        let exchange_config = ExchangeConfig {
            name: env::var("EXCHANGE_NAME").unwrap_or(defaults.exchange.name),
            testnet: env_or("TESTNET", defaults.exchange.testnet)?,
        };

        let trading_config = TradingConfig {
            top_symbols: env_or("TOP_SYMBOLS", defaults.trading.top_symbols)?,
            rebalance_minutes: env_or("REBALANCE_MINUTES", defaults.trading.rebalance_minutes)?,
            auto_trading: env_or("AUTO_TRADING", defaults.trading.auto_trading)?,
            correlation_threshold: env_or(
                "CORRELATION_THRESHOLD",
                defaults.trading.correlation_threshold,
            )?,
        };

        let trailing_activation_percent = match env::var("TRAILING_ACTIVATION_PERCENT") {
            Ok(raw) if !raw.trim().is_empty() => Some(raw.trim().parse().map_err(|_| {
                AppError::Config(format!("Invalid value for TRAILING_ACTIVATION_PERCENT: {}", raw))
            })?),
            _ => defaults.risk.trailing_activation_percent,
        };

        let risk_config = RiskConfig {
            total_capital: env_or("TOTAL_CAPITAL", defaults.risk.total_capital)?,
            max_position_per_coin: env_or(
                "MAX_POSITION_PER_COIN",
                defaults.risk.max_position_per_coin,
            )?,
            max_drawdown: env_or("MAX_DRAWDOWN", defaults.risk.max_drawdown)?,
            stop_loss_percent: env_or("STOP_LOSS_PERCENT", defaults.risk.stop_loss_percent)?,
            take_profit_percent: env_or("TAKE_PROFIT_PERCENT", defaults.risk.take_profit_percent)?,
            trailing_activation_percent,
        };

        let breaker_config = CircuitBreakerConfig {
            timeout_secs: env_or("CIRCUIT_BREAKER_TIMEOUT_SECS", defaults.circuit_breaker.timeout_secs)?,
            failure_threshold: env_or(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
                defaults.circuit_breaker.failure_threshold,
            )?,
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.level),
            to_file: env_or("LOG_TO_FILE", defaults.logging.to_file)?,
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            exchange: exchange_config,
            trading: trading_config,
            risk: risk_config,
            circuit_breaker: breaker_config,
            logging: logging_config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Reject values the control loop cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.trading.top_symbols == 0 {
            return Err(AppError::Config("TOP_SYMBOLS must be at least 1".to_string()));
        }
        if self.risk.total_capital <= 0.0 {
            return Err(AppError::Config("TOTAL_CAPITAL must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.risk.max_drawdown) {
            return Err(AppError::Config(format!(
                "MAX_DRAWDOWN must be a fraction in [0, 1], got {}",
                self.risk.max_drawdown
            )));
        }
        if self.risk.stop_loss_percent <= 0.0 || self.risk.stop_loss_percent >= 100.0 {
            return Err(AppError::Config(format!(
                "STOP_LOSS_PERCENT must be in (0, 100), got {}",
                self.risk.stop_loss_percent
            )));
        }
        if self.risk.take_profit_percent <= 0.0 {
            return Err(AppError::Config("TAKE_PROFIT_PERCENT must be positive".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(AppError::Config(
                "CIRCUIT_BREAKER_FAILURE_THRESHOLD must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        // Initialize the logger
        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig {
                name: "paper".to_string(),
                testnet: true,
            },
            trading: TradingConfig {
                top_symbols: 6,
                rebalance_minutes: 5,
                auto_trading: false,
                correlation_threshold: 0.7,
            },
            risk: RiskConfig {
                total_capital: 10_000.0,
                max_position_per_coin: 1_000.0,
                max_drawdown: 0.1,
                stop_loss_percent: 2.0,
                take_profit_percent: 5.0,
                trailing_activation_percent: None,
            },
            circuit_breaker: CircuitBreakerConfig {
                timeout_secs: 10,
                failure_threshold: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.circuit_breaker.timeout(), Duration::from_secs(10));
        assert_eq!(config.trading.cycle_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_bad_drawdown() {
        let mut config = Config::default();
        config.risk.max_drawdown = 1.5;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = Config::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "regime_trader_config_{}.json",
            std::process::id()
        ));
        let mut config = Config::default();
        config.risk.trailing_activation_percent = Some(3.0);

        config.to_file(&path).expect("write config");
        let loaded = Config::from_file(&path).expect("read config");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }
}

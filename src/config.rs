use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{LedgerError, Result};
use crate::ledger::block::MAX_DIFFICULTY;
use crate::ledger::LedgerSettings;

/// Config file used when `LOG_LEDGER_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "log-ledger.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub chain_path: String,
    pub difficulty: usize,
    pub batch_size: usize,
    #[serde(default)]
    pub max_mining_attempts: Option<u64>,
    pub flush_on_shutdown: bool,
}

impl AppConfig {
    /// Load from `LOG_LEDGER_CONFIG` (or the default path) plus environment
    pub fn load() -> Result<Self> {
        let path = env::var("LOG_LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Defaults, then the TOML file at `path` if present, then
    /// `LOG_LEDGER__SECTION__KEY` environment variables
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://data/logs.db")?
            .set_default("ledger.chain_path", "data/blockchain.json")?
            .set_default("ledger.difficulty", 2)?
            .set_default("ledger.batch_size", 5)?
            .set_default("ledger.flush_on_shutdown", true)?
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("LOG_LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.batch_size == 0 {
            return Err(LedgerError::Config("ledger.batch_size must be at least 1".to_string()));
        }
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "ledger.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if self.ledger.chain_path.trim().is_empty() {
            return Err(LedgerError::Config("ledger.chain_path is required".to_string()));
        }
        Ok(())
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            difficulty: self.ledger.difficulty,
            batch_size: self.ledger.batch_size,
            max_mining_attempts: self.ledger.max_mining_attempts,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

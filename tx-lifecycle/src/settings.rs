//! Controller configuration.
//!
//! Settings are read, in increasing priority, from the built-in defaults,
//! the JSON files listed in `CONFIG_FILES` (comma separated) and `TXL_`
//! prefixed environment variables, where `__` separates nested keys, e.g.
//! `TXL_TRACING__LEVEL=debug`.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::store::{DbResult, InMemoryStateDb, RocksStateDb, TransactionStateDb};

pub use trace::{Level, Style, TracingConfig};

mod trace;

const ENV_PREFIX: &str = "TXL";
const DEFAULT_RELAY_STATUS_URL: &str = "https://protect.flashbots.net/tx/";

fn default_tx_history_limit() -> usize {
    40
}

fn default_transaction_confirmations() -> u64 {
    3
}

fn default_deposit_confirmations() -> u64 {
    6
}

fn default_blocks_before_drop() -> u32 {
    4
}

fn default_next_nonce_blocks_before_drop() -> u32 {
    6
}

fn default_status_update_interval_ms() -> u64 {
    3_000
}

fn default_relay_status_url() -> Option<Url> {
    Url::parse(DEFAULT_RELAY_STATUS_URL).ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSettings {
    /// Number of (nonce, chain, day) groups kept once final
    #[serde(default = "default_tx_history_limit")]
    pub tx_history_limit: usize,
    /// Depth a receipt needs before the transaction is verified
    #[serde(default = "default_transaction_confirmations")]
    pub transaction_confirmations: u64,
    /// Depth a deposit transaction needs before it is confirmed
    #[serde(default = "default_deposit_confirmations")]
    pub deposit_confirmations: u64,
    /// Polls without finding a transaction before it is dropped
    #[serde(default = "default_blocks_before_drop")]
    pub blocks_before_drop: u32,
    /// Same, for the transaction holding the account's next expected nonce
    #[serde(default = "default_next_nonce_blocks_before_drop")]
    pub next_nonce_blocks_before_drop: u32,
    #[serde(default = "default_status_update_interval_ms")]
    pub status_update_interval_ms: u64,
    #[serde(default = "default_relay_status_url")]
    pub relay_status_url: Option<Url>,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub tracing: TracingConfig,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tx_history_limit: default_tx_history_limit(),
            transaction_confirmations: default_transaction_confirmations(),
            deposit_confirmations: default_deposit_confirmations(),
            blocks_before_drop: default_blocks_before_drop(),
            next_nonce_blocks_before_drop: default_next_nonce_blocks_before_drop(),
            status_update_interval_ms: default_status_update_interval_ms(),
            relay_status_url: default_relay_status_url(),
            db_path: None,
            tracing: TracingConfig::default(),
        }
    }
}

impl ControllerSettings {
    /// Load settings from `CONFIG_FILES` and the environment
    pub fn load() -> Result<Self> {
        let config_file_paths: Vec<String> = env::var("CONFIG_FILES")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();
        Self::load_from(&config_file_paths, Environment::with_prefix(ENV_PREFIX))
    }

    pub(crate) fn load_from(config_file_paths: &[String], environment: Environment) -> Result<Self> {
        let builder = config_file_paths
            .iter()
            .filter(|path| !path.is_empty())
            .fold(Config::builder(), |builder, path| {
                builder.add_source(File::with_name(path))
            });

        let config = builder
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build controller configuration")?;

        config.try_deserialize::<Self>().with_context(|| {
            format!("Config deserialization error, config files loaded: {config_file_paths:?}")
        })
    }

    pub fn status_update_interval(&self) -> Duration {
        Duration::from_millis(self.status_update_interval_ms)
    }

    /// Persistence of the record table: RocksDB at `db_path`, or memory
    /// only when no path is configured
    pub fn state_db(&self) -> DbResult<Arc<dyn TransactionStateDb>> {
        Ok(match &self.db_path {
            Some(path) => Arc::new(RocksStateDb::from_path(path)?),
            None => Arc::new(InMemoryStateDb::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn empty_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = ControllerSettings::load_from(&[], empty_env()).unwrap();
        assert_eq!(settings.tx_history_limit, 40);
        assert_eq!(settings.transaction_confirmations, 3);
        assert_eq!(settings.deposit_confirmations, 6);
        assert_eq!(settings.blocks_before_drop, 4);
        assert_eq!(settings.next_nonce_blocks_before_drop, 6);
        assert_eq!(settings.status_update_interval(), Duration::from_secs(3));
        assert_eq!(
            settings.relay_status_url.map(|u| u.to_string()),
            Some(DEFAULT_RELAY_STATUS_URL.to_string())
        );
        assert_eq!(settings.tracing.level, Level::Info);
    }

    #[test]
    fn test_file_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "tx_history_limit": 10, "tracing": {{ "level": "debug", "fmt": "json" }} }}"#
        )
        .unwrap();

        let env = Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::from([(
            "TXL_BLOCKS_BEFORE_DROP".to_string(),
            "8".to_string(),
        )])));
        let settings =
            ControllerSettings::load_from(&[path.to_string_lossy().to_string()], env).unwrap();

        assert_eq!(settings.tx_history_limit, 10);
        assert_eq!(settings.blocks_before_drop, 8);
        assert_eq!(settings.tracing.level, Level::Debug);
        assert_eq!(settings.tracing.fmt, Style::Json);
    }

    #[tokio::test]
    async fn test_state_db_follows_db_path() {
        let tx = crate::test_utils::record_with(3, crate::TransactionStatus::Submitted);

        let in_memory = ControllerSettings::default().state_db().unwrap();
        in_memory
            .store_transactions(std::slice::from_ref(&tx))
            .await
            .unwrap();
        let fresh = ControllerSettings::default().state_db().unwrap();
        assert!(fresh.retrieve_transactions().await.unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let settings = ControllerSettings {
            db_path: Some(dir.path().join("state")),
            ..Default::default()
        };
        {
            let db = settings.state_db().unwrap();
            db.store_transactions(std::slice::from_ref(&tx))
                .await
                .unwrap();
        }
        let reopened = settings.state_db().unwrap();
        assert_eq!(reopened.retrieve_transactions().await.unwrap(), vec![tx]);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let level: Level = serde_json::from_str("\"verbose\"").unwrap();
        assert_eq!(level, Level::Info);
    }
}

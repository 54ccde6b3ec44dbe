//! Application configuration.

use crate::error::{AppError, AppResult};
use relay_core::{TaskPhase, TaskType};
use relay_feed::PriceCacheConfig;
use relay_task::{LatencyTable, ProgressConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "RELAY_SYNC_CONFIG";

/// Price cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    /// Decimal places compared when deciding whether a price changed.
    /// Default: 2.
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Minimum spacing between published reports per key (ms). Default: 1000.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
}

fn default_precision() -> u32 {
    relay_core::DEFAULT_PRICE_PRECISION
}

fn default_throttle_ms() -> u64 {
    1_000
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            throttle_ms: default_throttle_ms(),
        }
    }
}

impl PriceConfig {
    pub fn cache_config(&self) -> PriceCacheConfig {
        PriceCacheConfig {
            default_precision: self.precision,
            throttle: Duration::from_millis(self.throttle_ms),
        }
    }
}

/// Order book notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookConfig {
    /// Cooldown per toast identity (ms). Default: 500.
    #[serde(default = "default_toast_cooldown_ms")]
    pub toast_cooldown_ms: u64,
    /// How long a handshake toast stays visible (ms). Default: 5000.
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
}

fn default_toast_cooldown_ms() -> u64 {
    500
}

fn default_toast_duration_ms() -> u64 {
    5_000
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            toast_cooldown_ms: default_toast_cooldown_ms(),
            toast_duration_ms: default_toast_duration_ms(),
        }
    }
}

/// Task progress settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSettings {
    /// Poll interval (ms). Default: 100.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Phases expected to finish sooner than this do not restart the ring
    /// (ms). Default: 5000.
    #[serde(default = "default_min_display_ms")]
    pub min_display_ms: u64,
    /// Time the ring stays visible after the task ends (ms). Default: 5000.
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
    /// Expected phase durations replacing the built-in ones, keyed by task
    /// type then phase (e.g. `Deposit.Proving = 30000`).
    #[serde(default)]
    pub latency_overrides: BTreeMap<String, BTreeMap<String, u64>>,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_min_display_ms() -> u64 {
    5_000
}

fn default_linger_ms() -> u64 {
    5_000
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            min_display_ms: default_min_display_ms(),
            linger_ms: default_linger_ms(),
            latency_overrides: BTreeMap::new(),
        }
    }
}

impl ProgressSettings {
    pub fn progress_config(&self) -> ProgressConfig {
        ProgressConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            min_display: Duration::from_millis(self.min_display_ms),
            linger: Duration::from_millis(self.linger_ms),
        }
    }

    /// Built-in latency table with the configured overrides applied.
    pub fn latency_table(&self) -> AppResult<LatencyTable> {
        let mut overrides: HashMap<TaskType, HashMap<TaskPhase, u64>> = HashMap::new();
        for (task_type, phases) in &self.latency_overrides {
            let task_type: TaskType = task_type.parse()?;
            let entry = overrides.entry(task_type).or_default();
            for (phase, ms) in phases {
                entry.insert(phase.parse::<TaskPhase>()?, *ms);
            }
        }
        Ok(LatencyTable::with_overrides(&overrides))
    }
}

/// Key-value storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file backing the store. In-memory when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub order_book: OrderBookConfig,
    #[serde(default)]
    pub progress: ProgressSettings,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Resolve the configuration: explicit path, then `RELAY_SYNC_CONFIG`,
    /// then built-in defaults.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let path = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());

        match path {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AppResult<()> {
        if self.progress.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "progress.poll_interval_ms must be positive".to_string(),
            ));
        }
        self.progress.latency_table()?;
        Ok(())
    }

    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to render config: {e}")))
    }
}

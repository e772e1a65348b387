//! Layered configuration: environment variables → `.env` → YAML → built-in
//! defaults (spec.md §6 "Environment", grounded on
//! `memory-cli/src/config/*`'s layering convention).

use crate::constants::{
    BACKGROUND_INTERVAL, CLEANUP_THRESHOLD, DEFAULT_LAYER_TIMEOUT_MS, LOCK_CYCLES,
    STABILITY_GROWTH,
};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Per-tier soft timeouts, keyed by layer index 0..4 (spec.md §6:
/// `LAYER{0..4}_TIMEOUT_MS`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerTimeouts {
    pub layer0_ms: u64,
    pub layer1_ms: u64,
    pub layer2_ms: u64,
    pub layer3_ms: u64,
    pub layer4_ms: u64,
}

impl Default for LayerTimeouts {
    fn default() -> Self {
        Self {
            layer0_ms: DEFAULT_LAYER_TIMEOUT_MS,
            layer1_ms: DEFAULT_LAYER_TIMEOUT_MS,
            layer2_ms: DEFAULT_LAYER_TIMEOUT_MS,
            layer3_ms: DEFAULT_LAYER_TIMEOUT_MS,
            layer4_ms: DEFAULT_LAYER_TIMEOUT_MS,
        }
    }
}

/// Redis connection details for the external spotlight KV endpoint
/// (spec.md §6: `REDIS_HOST/PORT/DB/PASSWORD`). The core's in-memory
/// [`crate::spotlight::InMemorySpotlight`] does not require these, but they
/// are recognised and carried for a future networked substrate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: u8,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

/// Full resolved configuration (spec.md §6 "Environment").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub redis: RedisConfig,
    pub layer_timeouts: LayerTimeouts,
    pub log_level: String,
    pub lock_cycles: u32,
    pub stability_growth: f64,
    pub cleanup_threshold: f64,
    pub background_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            layer_timeouts: LayerTimeouts::default(),
            log_level: "info".to_string(),
            lock_cycles: LOCK_CYCLES,
            stability_growth: STABILITY_GROWTH,
            cleanup_threshold: CLEANUP_THRESHOLD,
            background_interval: BACKGROUND_INTERVAL,
        }
    }
}

/// A YAML-shaped partial configuration file, every field optional so a
/// config file can set only what it wants to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct YamlConfig {
    redis_host: Option<String>,
    redis_port: Option<u16>,
    redis_db: Option<u8>,
    redis_password: Option<String>,
    layer0_timeout_ms: Option<u64>,
    layer1_timeout_ms: Option<u64>,
    layer2_timeout_ms: Option<u64>,
    layer3_timeout_ms: Option<u64>,
    layer4_timeout_ms: Option<u64>,
    kitbash_log_level: Option<String>,
    lock_cycles: Option<u32>,
    stability_growth: Option<f64>,
    cleanup_threshold: Option<f64>,
    background_interval: Option<u64>,
}

impl Config {
    fn apply_yaml(&mut self, yaml: YamlConfig) {
        if let Some(v) = yaml.redis_host {
            self.redis.host = v;
        }
        if let Some(v) = yaml.redis_port {
            self.redis.port = v;
        }
        if let Some(v) = yaml.redis_db {
            self.redis.db = v;
        }
        if let Some(v) = yaml.redis_password {
            self.redis.password = Some(v);
        }
        if let Some(v) = yaml.layer0_timeout_ms {
            self.layer_timeouts.layer0_ms = v;
        }
        if let Some(v) = yaml.layer1_timeout_ms {
            self.layer_timeouts.layer1_ms = v;
        }
        if let Some(v) = yaml.layer2_timeout_ms {
            self.layer_timeouts.layer2_ms = v;
        }
        if let Some(v) = yaml.layer3_timeout_ms {
            self.layer_timeouts.layer3_ms = v;
        }
        if let Some(v) = yaml.layer4_timeout_ms {
            self.layer_timeouts.layer4_ms = v;
        }
        if let Some(v) = yaml.kitbash_log_level {
            self.log_level = v;
        }
        if let Some(v) = yaml.lock_cycles {
            self.lock_cycles = v;
        }
        if let Some(v) = yaml.stability_growth {
            self.stability_growth = v;
        }
        if let Some(v) = yaml.cleanup_threshold {
            self.cleanup_threshold = v;
        }
        if let Some(v) = yaml.background_interval {
            self.background_interval = v;
        }
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        macro_rules! apply {
            ($key:expr, $field:expr, $parse:expr) => {
                if let Some(raw) = get($key) {
                    match $parse(&raw) {
                        Ok(v) => $field = v,
                        Err(_) => warn!(key = $key, value = raw, "ignoring unparsable env override"),
                    }
                }
            };
        }

        if let Some(v) = get("REDIS_HOST") {
            self.redis.host = v;
        }
        apply!("REDIS_PORT", self.redis.port, str::parse::<u16>);
        apply!("REDIS_DB", self.redis.db, str::parse::<u8>);
        if let Some(v) = get("REDIS_PASSWORD") {
            self.redis.password = Some(v);
        }
        apply!("LAYER0_TIMEOUT_MS", self.layer_timeouts.layer0_ms, str::parse::<u64>);
        apply!("LAYER1_TIMEOUT_MS", self.layer_timeouts.layer1_ms, str::parse::<u64>);
        apply!("LAYER2_TIMEOUT_MS", self.layer_timeouts.layer2_ms, str::parse::<u64>);
        apply!("LAYER3_TIMEOUT_MS", self.layer_timeouts.layer3_ms, str::parse::<u64>);
        apply!("LAYER4_TIMEOUT_MS", self.layer_timeouts.layer4_ms, str::parse::<u64>);
        if let Some(v) = get("KITBASH_LOG_LEVEL") {
            self.log_level = v;
        }
        apply!("LOCK_CYCLES", self.lock_cycles, str::parse::<u32>);
        apply!("STABILITY_GROWTH", self.stability_growth, str::parse::<f64>);
        apply!("CLEANUP_THRESHOLD", self.cleanup_threshold, str::parse::<f64>);
        apply!("BACKGROUND_INTERVAL", self.background_interval, str::parse::<u64>);
    }

    /// Load in priority order: defaults, then an optional YAML file, then
    /// an optional `.env` file, then process environment variables
    /// (spec.md §6: "highest-priority first: env → .env → YAML → defaults").
    pub fn load(yaml_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = yaml_path {
            if path.exists() {
                let raw = std::fs::read_to_string(path)?;
                let yaml: YamlConfig = serde_yaml::from_str(&raw)?;
                config.apply_yaml(yaml);
                debug!(path = %path.display(), "applied YAML config layer");
            }
        }

        if let Ok(dotenv_path) = dotenvy::dotenv() {
            debug!(path = %dotenv_path.display(), "loaded .env layer");
        }

        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }
}

//! Configuration resolution.
//!
//! Six tunables, each resolved with precedence config file > environment
//! variable > built-in default. Values are coerced per key; a value that
//! fails coercion falls back to the default on load and is rejected on
//! update.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::storage::{self, DEFAULT_CONFIG_FILE};
use crate::strategy::SlippagePolicy;
use crate::types::{value_as_f64, OrderKind, TraderError};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "POLY_CONFIG_PATH";

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// The recognised configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    DefaultSize,
    OrderType,
    SlippageWarn,
    SlippageBlock,
    MinTimeRemaining,
    SigType,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::DefaultSize,
        ConfigKey::OrderType,
        ConfigKey::SlippageWarn,
        ConfigKey::SlippageBlock,
        ConfigKey::MinTimeRemaining,
        ConfigKey::SigType,
    ];

    /// Key as stored in the config file.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::DefaultSize => "default_size",
            ConfigKey::OrderType => "order_type",
            ConfigKey::SlippageWarn => "slippage_warn",
            ConfigKey::SlippageBlock => "slippage_block",
            ConfigKey::MinTimeRemaining => "min_time_remaining",
            ConfigKey::SigType => "sig_type",
        }
    }

    /// Environment variable consulted when the file has no value.
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::DefaultSize => "POLY_DEFAULT_SIZE",
            ConfigKey::OrderType => "POLY_ORDER_TYPE",
            ConfigKey::SlippageWarn => "POLY_SLIPPAGE_WARN",
            ConfigKey::SlippageBlock => "POLY_SLIPPAGE_BLOCK",
            ConfigKey::MinTimeRemaining => "POLY_MIN_TIME",
            ConfigKey::SigType => "POLY_SIG_TYPE",
        }
    }

    /// Coerce a raw file/env value to this key's type, as a JSON value
    /// suitable for storing. `None` when the value does not fit.
    pub fn coerce(&self, raw: &Value) -> Option<Value> {
        match self {
            ConfigKey::DefaultSize | ConfigKey::SlippageWarn | ConfigKey::SlippageBlock => {
                parse_f64(raw).map(Value::from)
            }
            ConfigKey::MinTimeRemaining => parse_i64(raw).map(Value::from),
            ConfigKey::SigType => parse_u8(raw).map(Value::from),
            ConfigKey::OrderType => parse_order_kind(raw).map(|k| Value::from(k.to_string())),
        }
    }

    fn valid_names() -> String {
        Self::ALL.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ConfigKey {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| TraderError::Config(format!("Unknown key: {s}. Valid: {}", Self::valid_names())))
    }
}

// ---------------------------------------------------------------------------
// Per-type parsers
// ---------------------------------------------------------------------------

fn parse_f64(raw: &Value) -> Option<f64> {
    value_as_f64(raw).filter(|x| x.is_finite())
}

fn parse_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.fract() == 0.0 && x.abs() < 1e15).map(|x| x as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_u8(raw: &Value) -> Option<u8> {
    parse_i64(raw).and_then(|x| u8::try_from(x).ok())
}

fn parse_order_kind(raw: &Value) -> Option<OrderKind> {
    raw.as_str().and_then(|s| s.parse::<OrderKind>().ok())
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved trader configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderConfig {
    /// Default notional per order (USDC).
    pub default_size: f64,
    pub order_type: OrderKind,
    /// Slippage (percent) above which a warning is raised.
    pub slippage_warn: f64,
    /// Slippage (percent) above which execution is blocked.
    pub slippage_block: f64,
    /// Minimum seconds left in the window before trading is refused.
    pub min_time_remaining: i64,
    /// Signature scheme id passed through to the signer.
    pub sig_type: u8,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            default_size: 25.0,
            order_type: OrderKind::Gtc,
            slippage_warn: 3.0,
            slippage_block: 5.0,
            min_time_remaining: 30,
            sig_type: 1,
        }
    }
}

impl TraderConfig {
    /// Resolve every key from the file map, then `env`, then the default.
    pub fn resolve<F>(file: &Map<String, Value>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        for key in ConfigKey::ALL {
            let raw = match file.get(key.name()) {
                Some(v) => Some(v.clone()),
                None => env(key.env_var()).filter(|s| !s.is_empty()).map(Value::String),
            };
            if let Some(raw) = raw {
                if !cfg.apply(key, &raw) {
                    warn!(key = key.name(), value = %raw, "Config value has wrong type, using default");
                }
            }
        }
        cfg
    }

    /// Load from `path` and the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let overrides = storage::load_overrides(path)?;
        Ok(Self::resolve(&overrides, |name| std::env::var(name).ok()))
    }

    fn apply(&mut self, key: ConfigKey, raw: &Value) -> bool {
        match key {
            ConfigKey::DefaultSize => parse_f64(raw).map(|v| self.default_size = v).is_some(),
            ConfigKey::OrderType => parse_order_kind(raw).map(|v| self.order_type = v).is_some(),
            ConfigKey::SlippageWarn => parse_f64(raw).map(|v| self.slippage_warn = v).is_some(),
            ConfigKey::SlippageBlock => parse_f64(raw).map(|v| self.slippage_block = v).is_some(),
            ConfigKey::MinTimeRemaining => parse_i64(raw).map(|v| self.min_time_remaining = v).is_some(),
            ConfigKey::SigType => parse_u8(raw).map(|v| self.sig_type = v).is_some(),
        }
    }

    /// Display value for one key.
    pub fn value_of(&self, key: ConfigKey) -> String {
        match key {
            ConfigKey::DefaultSize => self.default_size.to_string(),
            ConfigKey::OrderType => self.order_type.to_string(),
            ConfigKey::SlippageWarn => self.slippage_warn.to_string(),
            ConfigKey::SlippageBlock => self.slippage_block.to_string(),
            ConfigKey::MinTimeRemaining => self.min_time_remaining.to_string(),
            ConfigKey::SigType => self.sig_type.to_string(),
        }
    }

    pub fn slippage_policy(&self) -> SlippagePolicy {
        SlippagePolicy {
            warn_pct: self.slippage_warn,
            block_pct: self.slippage_block,
        }
    }
}

/// Config file location: explicit path, else `POLY_CONFIG_PATH`, else `config.json`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Parse `KEY=VALUE` items into typed updates. Fails on the first bad item.
pub fn parse_updates(items: &[String]) -> Result<Map<String, Value>, TraderError> {
    let mut updates = Map::new();
    for item in items {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| TraderError::Config(format!("Invalid --set format: {item}. Use KEY=VALUE")))?;
        let key: ConfigKey = key.trim().parse()?;
        let typed = key
            .coerce(&Value::String(value.trim().to_string()))
            .ok_or_else(|| TraderError::Config(format!("Invalid value for {key}: {value}")))?;
        updates.insert(key.name().to_string(), typed);
    }
    Ok(updates)
}

/// Validate `items` and merge them into the config file at `path`.
///
/// Nothing is written unless every item is valid.
pub fn update_config(path: &Path, items: &[String]) -> Result<Map<String, Value>> {
    let updates = parse_updates(items)?;
    storage::merge_overrides(path, updates.clone())?;
    Ok(updates)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("btc5m_test_cfg_{}.json", uuid::Uuid::new_v4()));
        p
    }

    fn file(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = TraderConfig::resolve(&Map::new(), no_env);
        assert_eq!(cfg, TraderConfig::default());
        assert_eq!(cfg.default_size, 25.0);
        assert_eq!(cfg.order_type, OrderKind::Gtc);
        assert_eq!(cfg.min_time_remaining, 30);
        assert_eq!(cfg.sig_type, 1);
    }

    #[test]
    fn test_file_beats_env_beats_default() {
        let env: HashMap<&str, &str> = [("POLY_DEFAULT_SIZE", "60"), ("POLY_SLIPPAGE_WARN", "2.5")].into();
        let cfg = TraderConfig::resolve(&file(json!({"default_size": 40})), |k| {
            env.get(k).map(|v| v.to_string())
        });

        assert_eq!(cfg.default_size, 40.0);
        assert_eq!(cfg.slippage_warn, 2.5);
        assert_eq!(cfg.slippage_block, 5.0);
    }

    #[test]
    fn test_env_coercion_failure_falls_back_to_default() {
        let env: HashMap<&str, &str> = [
            ("POLY_MIN_TIME", "thirty"),
            ("POLY_SIG_TYPE", "300"),
            ("POLY_ORDER_TYPE", "fok"),
        ]
        .into();
        let cfg = TraderConfig::resolve(&Map::new(), |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.min_time_remaining, 30);
        assert_eq!(cfg.sig_type, 1);
        assert_eq!(cfg.order_type, OrderKind::Fok);
    }

    #[test]
    fn test_file_coercion_failure_falls_back_to_default() {
        let cfg = TraderConfig::resolve(
            &file(json!({"slippage_block": "lots", "min_time_remaining": "45", "order_type": 3})),
            |_| Some("999".to_string()),
        );
        assert_eq!(cfg.slippage_block, 5.0);
        assert_eq!(cfg.min_time_remaining, 45);
        assert_eq!(cfg.order_type, OrderKind::Gtc);
    }

    #[test]
    fn test_empty_env_ignored() {
        let cfg = TraderConfig::resolve(&Map::new(), |_| Some(String::new()));
        assert_eq!(cfg, TraderConfig::default());
    }

    #[test]
    fn test_config_key_from_str() {
        assert_eq!("sig_type".parse::<ConfigKey>().unwrap(), ConfigKey::SigType);
        let err = "max_size".parse::<ConfigKey>().unwrap_err();
        assert!(err.to_string().contains("Unknown key: max_size"));
        assert!(err.to_string().contains("min_time_remaining"));
    }

    #[test]
    fn test_parse_updates_typed() {
        let updates = parse_updates(&[
            "default_size=50".to_string(),
            "order_type=fok".to_string(),
            "min_time_remaining=45".to_string(),
        ])
        .unwrap();
        assert_eq!(updates.get("default_size"), Some(&json!(50.0)));
        assert_eq!(updates.get("order_type"), Some(&json!("FOK")));
        assert_eq!(updates.get("min_time_remaining"), Some(&json!(45)));
    }

    #[test]
    fn test_parse_updates_rejects_bad_items() {
        assert!(parse_updates(&["default_size".to_string()]).is_err());
        assert!(parse_updates(&["default_size=big".to_string()]).is_err());
        assert!(parse_updates(&["order_type=IOC".to_string()]).is_err());
    }

    #[test]
    fn test_update_round_trip() {
        let path = temp_path();
        update_config(&path, &["default_size=40".to_string()]).unwrap();

        let cfg = TraderConfig::resolve(&storage::load_overrides(&path).unwrap(), no_env);
        assert_eq!(cfg.default_size, 40.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_update_unknown_key_leaves_file_untouched() {
        let path = temp_path();
        std::fs::write(&path, r#"{"default_size": 40}"#).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let err = update_config(&path, &["default_size=10".to_string(), "leverage=3".to_string()])
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<TraderError>(), Some(TraderError::Config(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_slippage_policy_from_config() {
        let cfg = TraderConfig {
            slippage_warn: 1.0,
            slippage_block: 2.0,
            ..TraderConfig::default()
        };
        let policy = cfg.slippage_policy();
        assert_eq!(policy.warn_pct, 1.0);
        assert_eq!(policy.block_pct, 2.0);
    }

    #[test]
    fn test_value_of() {
        let cfg = TraderConfig::default();
        assert_eq!(cfg.value_of(ConfigKey::OrderType), "GTC");
        assert_eq!(cfg.value_of(ConfigKey::DefaultSize), "25");
        assert_eq!(cfg.value_of(ConfigKey::MinTimeRemaining), "30");
    }

    #[test]
    fn test_explicit_config_path_wins() {
        assert_eq!(config_path(Some(Path::new("/etc/btc5m.json"))), PathBuf::from("/etc/btc5m.json"));
    }
}

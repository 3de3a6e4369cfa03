//! Process configuration, loaded once at startup and shared as an
//! immutable snapshot (spec.md §9 "Global state").
//!
//! Grounded on `poruru210-sankey-copier/relay-server/src/config.rs`: a tree
//! of `#[derive(Deserialize)]` structs with `#[serde(default = "fn")]`
//! helpers for every optional key, and a `Config::load` entry point that
//! picks a file by environment. The wire format here is JSON (spec.md §6),
//! not that crate's TOML, so `serde_json` replaces the `config`/`toml`
//! crates; the shape of the pattern is otherwise identical.

use std::collections::HashMap;
use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{BridgeError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChannelsConfig {
    #[serde(default)]
    pub white_list: Vec<i64>,
    #[serde(default)]
    pub black_list: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub api_id: i64,
    pub api_hash: String,
    #[serde(default)]
    pub channels: TelegramChannelsConfig,
}

impl Default for TelegramChannelsConfig {
    fn default() -> Self {
        Self {
            white_list: Vec::new(),
            black_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolsConfig {
    #[serde(default)]
    pub white_list: Vec<String>,
    #[serde(default)]
    pub black_list: Vec<String>,
}

impl Default for SymbolsConfig {
    fn default() -> Self {
        Self {
            white_list: Vec::new(),
            black_list: Vec::new(),
        }
    }
}

fn default_save_profits() -> Vec<u8> {
    vec![25, 25, 25, 25]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaTraderConfig {
    pub server: String,
    pub username: String,
    pub password: String,
    pub path: String,
    /// `"N%"` or a bare decimal lot size — spec.md §4.7.
    pub lot: String,
    #[serde(default)]
    pub high_risk: bool,
    #[serde(default = "default_save_profits")]
    pub save_profits: Vec<u8>,
    pub account_size: Option<f64>,
    #[serde(default)]
    pub closer_price: f64,
    pub expire_pendin_order_in_minutes: Option<i64>,
    #[serde(default = "default_true")]
    pub close_positions_on_trail: bool,
    #[serde(default)]
    pub symbol_mappings: HashMap<String, String>,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    /// Resolves Open Question 3 (spec.md §9): when no alias matches, fall
    /// back to XAUUSD only if this is left enabled. Default preserves the
    /// observed legacy behavior.
    #[serde(default = "default_true")]
    pub default_unresolved_symbol_to_gold: bool,
}

fn default_timer_start() -> String {
    "00:00".to_string()
}

fn default_timer_end() -> String {
    "23:59".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_timer_start")]
    pub start: String,
    #[serde(default = "default_timer_end")]
    pub end: String,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            start: default_timer_start(),
            end: default_timer_end(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub notification: NotificationConfig,
    pub meta_trader: MetaTraderConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub disable_cache: bool,
    /// Path to the symbols reference file (spec.md §6). Defaults to the
    /// conventional location next to the settings file.
    #[serde(default = "default_symbols_file")]
    pub symbols_file: String,
    /// Database file path for the embedded store.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_symbols_file() -> String {
    "data/Symbols.json".to_string()
}

fn default_database_file() -> String {
    "data/bridge.sqlite".to_string()
}

impl Config {
    /// Select a config file by `APP_ENV` (spec.md §6): `development` and
    /// `production` map to dedicated files, anything else falls back to
    /// `./settings.json`.
    pub fn path_for_env() -> String {
        match env::var("APP_ENV").as_deref() {
            Ok("development") => "config.development.json".to_string(),
            Ok("production") => "config.production.json".to_string(),
            _ => "settings.json".to_string(),
        }
    }

    pub fn load() -> Result<Self> {
        Self::from_file(Self::path_for_env())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("reading {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BridgeError::Config(format!("parsing {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "telegram": {
            "api_id": 12345,
            "api_hash": "abc",
            "channels": { "white_list": [1, 2], "black_list": [] }
        },
        "notification": { "token": "tok", "chat_id": 99 },
        "meta_trader": {
            "server": "Demo-Server",
            "username": "u",
            "password": "p",
            "path": "/opt/terminal",
            "lot": "1%",
            "high_risk": true
        }
    }
    "#;

    #[test]
    fn deserializes_minimal_config_with_defaults() {
        let cfg: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(cfg.telegram.api_id, 12345);
        assert_eq!(cfg.meta_trader.save_profits, vec![25, 25, 25, 25]);
        assert!(cfg.meta_trader.close_positions_on_trail);
        assert!(cfg.meta_trader.default_unresolved_symbol_to_gold);
        assert!(!cfg.disable_cache);
        assert_eq!(cfg.timer.start, "00:00");
    }

    #[test]
    fn env_selects_settings_file_by_default() {
        env::remove_var("APP_ENV");
        assert_eq!(Config::path_for_env(), "settings.json");
    }
}

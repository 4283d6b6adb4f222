/*
 *  config.rs
 *
 *  tickertape - LED stock ticker
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::symbol::{sort_symbols, parse_list, Symbol};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Direction glyph family drawn beside the change figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorStyle {
    #[default]
    Arrows,
    ThinArrows,
    Triangles,
}

/// Which inter-batch delay rule the fetcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PacingPolicy {
    /// +1s per batch that saw a 429, capped at 10s
    #[default]
    RateLimit,
    /// +0.5s once two batches in a row fail, capped at 5s
    ErrorAdaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub symbol: Symbol,
    #[serde(default)]
    pub icon: Option<String>,
}

impl StockEntry {
    pub fn new(symbol: &str) -> Self {
        StockEntry { symbol: Symbol::new(symbol), icon: None }
    }
}

/// Effective settings, YAML keys match the field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    /// seconds between fetch cycles while the market is open
    pub update_interval: u64,
    /// pixels per 60 Hz frame
    pub speed: f64,
    pub ticker_height: u32,
    pub width: u32,
    pub show_change_pct: bool,
    pub finnhub_api_key: Option<String>,
    pub finnhub_api_key_2: Option<String>,
    pub proxy: Option<String>,
    pub use_proxy: bool,
    pub cert_file: Option<PathBuf>,
    pub use_cert: bool,
    pub led_bloom_effect: bool,
    /// percent, 10..=300
    pub led_bloom_intensity: u32,
    pub led_ghosting_effect: bool,
    pub led_icon_matrix: bool,
    pub led_glass_glare: bool,
    pub global_text_glow: bool,
    pub price_indicator_style: IndicatorStyle,
    pub screen_index: u32,
    pub play_sound_on_update: bool,
    pub pacing: PacingPolicy,
    pub market_holidays: bool,
    pub icon_cache_limit: usize,
    pub icon_dir: Option<PathBuf>,
    pub stocks: Vec<StockEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: None,
            update_interval: 300,
            speed: 2.0,
            ticker_height: 60,
            width: 1280,
            show_change_pct: true,
            finnhub_api_key: None,
            finnhub_api_key_2: None,
            proxy: None,
            use_proxy: false,
            cert_file: None,
            use_cert: false,
            led_bloom_effect: true,
            led_bloom_intensity: 100,
            led_ghosting_effect: true,
            led_icon_matrix: true,
            led_glass_glare: true,
            global_text_glow: true,
            price_indicator_style: IndicatorStyle::Arrows,
            screen_index: 0,
            play_sound_on_update: true,
            pacing: PacingPolicy::RateLimit,
            market_holidays: true,
            icon_cache_limit: crate::constants::ICON_CACHE_LIMIT,
            icon_dir: None,
            stocks: ["AAPL", "GOOG", "MSFT"].iter().map(|s| StockEntry::new(s)).collect(),
        }
    }
}

impl Settings {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// Symbols in display order.
    pub fn symbols(&self) -> Vec<Symbol> {
        sort_symbols(self.stocks.iter().map(|s| s.symbol.clone()).collect())
    }

    /// Primary key, ignoring blanks.
    pub fn primary_key(&self) -> Option<&str> {
        non_blank(self.finnhub_api_key.as_deref())
    }

    pub fn secondary_key(&self) -> Option<&str> {
        non_blank(self.finnhub_api_key_2.as_deref())
    }

    pub fn proxy_url(&self) -> Option<&str> {
        if self.use_proxy { non_blank(self.proxy.as_deref()) } else { None }
    }

    pub fn cert_path(&self) -> Option<&Path> {
        if self.use_cert { self.cert_file.as_deref() } else { None }
    }

    pub fn icon_dir(&self) -> PathBuf {
        self.icon_dir.clone().unwrap_or_else(|| {
            cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tickertape")
                .join("images")
        })
    }

    /// True when a change needs the segments rebuilt.
    pub fn visuals_differ(&self, other: &Settings) -> bool {
        self.ticker_height != other.ticker_height
            || self.show_change_pct != other.show_change_pct
            || self.led_icon_matrix != other.led_icon_matrix
            || self.global_text_glow != other.global_text_glow
            || self.price_indicator_style != other.price_indicator_style
    }

    /// Sort the stock list into display order, dropping duplicates.
    pub fn normalize_stocks(&mut self) {
        self.stocks.sort_by(|a, b| crate::symbol::display_order(&a.symbol, &b.symbol));
        self.stocks.dedup_by(|a, b| a.symbol == b.symbol);
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(
    name = "tickertape",
    about = "LED style scrolling stock ticker",
    version = crate::LONG_VERSION,
    disable_help_flag = false
)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Primary quote API key
    #[arg(long = "api", short = 'a')]
    pub api: Option<String>,
    /// Comma separated ticker list, replaces the configured stocks
    #[arg(long, short = 't')]
    pub tickers: Option<String>,
    /// Scroll speed, pixels per 60 Hz frame
    #[arg(long, short = 's')]
    pub speed: Option<f64>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub width: Option<u32>,
    /// Seconds between fetch cycles
    #[arg(long, short = 'u')]
    pub update_interval: Option<u64>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    /// Headless: write the current frame to this PNG every 10 seconds
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
    /// Open the preview window (emulator builds)
    #[arg(long, action = ArgAction::SetTrue)]
    pub window: bool,
}

/// Public entry point: read YAML, merge CLI, validate.
pub fn load(cli: &Cli) -> Result<Settings, ConfigError> {
    // 1) YAML file (explicit path or search), defaults fill the gaps
    let mut cfg = if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            read_yaml(p)?
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Settings::default()
    };

    // 2) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);
    cfg.normalize_stocks();

    // 3) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Pretty YAML of the effective config.
pub fn dump(cfg: &Settings) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/tickertape/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/tickertape.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["tickertape.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Settings, ConfigError> {
    let s = fs::read_to_string(path)?;
    // an empty file is a valid "all defaults" config
    if s.trim().is_empty() {
        return Ok(Settings::default());
    }
    let cfg: Settings = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

fn apply_cli_overrides(cfg: &mut Settings, cli: &Cli) {
    if cli.api.is_some()             { cfg.finnhub_api_key = cli.api.clone(); }
    if let Some(s) = cli.speed       { cfg.speed = s; }
    if let Some(h) = cli.height      { cfg.ticker_height = h; }
    if let Some(w) = cli.width       { cfg.width = w; }
    if let Some(u) = cli.update_interval { cfg.update_interval = u; }
    if cli.debug                     { cfg.log_level = Some("debug".into()); }
    if let Some(list) = cli.tickers.as_deref() {
        cfg.stocks = parse_list(list)
            .into_iter()
            .map(|symbol| StockEntry { symbol, icon: None })
            .collect();
    }
}

/// Range checks; a missing API key is allowed (index-only mode).
pub fn validate(cfg: &Settings) -> Result<(), ConfigError> {
    if cfg.ticker_height == 0 || cfg.width == 0 {
        return Err(ConfigError::Validation("ticker width/height must be > 0".into()));
    }
    if !(cfg.speed.is_finite() && cfg.speed > 0.0) {
        return Err(ConfigError::Validation("speed must be > 0".into()));
    }
    if cfg.update_interval == 0 {
        return Err(ConfigError::Validation("update_interval must be > 0".into()));
    }
    if !(10..=300).contains(&cfg.led_bloom_intensity) {
        return Err(ConfigError::Validation("led_bloom_intensity must be 10..=300".into()));
    }
    if cfg.icon_cache_limit == 0 {
        return Err(ConfigError::Validation("icon_cache_limit must be > 0".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_over_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "speed: 3.5\nprice_indicator_style: thin_arrows\npacing: error_adaptive\nstocks:\n  - symbol: msft\n  - symbol: ^dji\n    icon: dow.png").unwrap();
        let cli = Cli { config: Some(f.path().to_path_buf()), ..Default::default() };
        let cfg = load(&cli).unwrap();
        assert_eq!(cfg.speed, 3.5);
        assert_eq!(cfg.update_interval, 300);
        assert_eq!(cfg.price_indicator_style, IndicatorStyle::ThinArrows);
        assert_eq!(cfg.pacing, PacingPolicy::ErrorAdaptive);
        let names: Vec<String> = cfg.symbols().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["^DJI", "MSFT"]);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "speed: 3.5\nfinnhub_api_key: from-file").unwrap();
        let cli = Cli {
            config: Some(f.path().to_path_buf()),
            api: Some("from-cli".into()),
            tickers: Some("ibm, ^gspc".into()),
            speed: Some(1.0),
            ..Default::default()
        };
        let cfg = load(&cli).unwrap();
        assert_eq!(cfg.primary_key(), Some("from-cli"));
        assert_eq!(cfg.speed, 1.0);
        assert_eq!(cfg.stocks[0].symbol.as_str(), "^GSPC");
    }

    #[test]
    fn test_validation() {
        let mut cfg = Settings::default();
        assert!(validate(&cfg).is_ok());
        cfg.led_bloom_intensity = 400;
        assert!(matches!(validate(&cfg), Err(ConfigError::Validation(_))));
        let cfg = Settings { speed: 0.0, ..Default::default() };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let cli = Cli { config: Some(PathBuf::from("/nonexistent/tickertape.yaml")), ..Default::default() };
        assert!(load(&cli).is_err());
    }

    #[test]
    fn test_blank_keys_and_disabled_proxy() {
        let cfg = Settings {
            finnhub_api_key: Some("  ".into()),
            proxy: Some("http://proxy:8080".into()),
            use_proxy: false,
            ..Default::default()
        };
        assert_eq!(cfg.primary_key(), None);
        assert_eq!(cfg.proxy_url(), None);
    }
}

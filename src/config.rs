use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "opponent_radar";
const CONFIG_FILE: &str = "config.json";

/// User-tunable scoring thresholds. Every field carries its documented
/// default, so a partial or missing config file degrades per key rather
/// than failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub suspicious_winrate: f64,
    pub high_winrate: f64,
    pub low_rating_accuracy_threshold: f64,
    pub high_rating_accuracy_threshold: f64,
    pub low_rating_cutoff: f64,
    pub min_games_for_overall: u32,
    pub min_games_for_recent: u32,
    pub min_games_for_accuracy: u32,
    pub high_acc_notable_pct: f64,
    pub high_acc_severe_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            suspicious_winrate: 55.0,
            high_winrate: 70.0,
            low_rating_accuracy_threshold: 80.0,
            high_rating_accuracy_threshold: 90.0,
            low_rating_cutoff: 1500.0,
            min_games_for_overall: 50,
            min_games_for_recent: 20,
            min_games_for_accuracy: 8,
            high_acc_notable_pct: 35.0,
            high_acc_severe_pct: 60.0,
        }
    }
}

impl RiskConfig {
    /// Accuracy cutoff actually applied for a player at `rating`.
    pub fn accuracy_threshold_for(&self, rating: f64) -> f64 {
        if rating < self.low_rating_cutoff {
            self.low_rating_accuracy_threshold
        } else {
            self.high_rating_accuracy_threshold
        }
    }
}

/// Loads the config file if present and well-formed, else defaults.
pub fn load_config() -> RiskConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => RiskConfig::default(),
    }
}

fn load_config_from(path: &Path) -> RiskConfig {
    let Ok(raw) = fs::read_to_string(path) else {
        return RiskConfig::default();
    };
    serde_json::from_str::<RiskConfig>(&raw).unwrap_or_default()
}

pub fn save_config(cfg: &RiskConfig) -> Result<()> {
    let Some(path) = config_path() else {
        return Ok(());
    };
    save_config_to(cfg, &path)
}

fn save_config_to(cfg: &RiskConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(cfg).context("serialize risk config")?;
    fs::write(&tmp, json).context("write risk config")?;
    fs::rename(&tmp, path).context("swap risk config")?;
    Ok(())
}

fn config_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CONFIG_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CONFIG_DIR).join(CONFIG_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join(CONFIG_FILE),
    )
}

//! Configuration resolution and validation.
//!
//! Reads every section through [`ConfigPort`], applies defaults and checks
//! ranges, and hands the pipeline explicit settings values. Nothing below
//! the CLI reads configuration directly.

use crate::domain::error::LeadLagError;
use crate::domain::ohlcv::PriceField;
use crate::domain::portfolio::MAX_CONCURRENT_TRADES;
use crate::domain::sector::StrictModeThresholds;
use crate::domain::universe::{parse_tickers, Universe, UniverseError};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "research";
pub const DEFAULT_MIN_SECTOR_WIN_RATE: f64 = 0.51;
pub const DEFAULT_TOP_GLOBAL_RULES: usize = 10;
pub const DEFAULT_TOP_RULES_PER_SECTOR: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub price_field: PriceField,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Inclusive cut-off applied to the price table.
    pub analysis_date: Option<NaiveDate>,
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionSettings {
    pub min_sector_win_rate: f64,
    pub top_global_rules: usize,
    pub top_rules_per_sector: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            min_sector_win_rate: DEFAULT_MIN_SECTOR_WIN_RATE,
            top_global_rules: DEFAULT_TOP_GLOBAL_RULES,
            top_rules_per_sector: DEFAULT_TOP_RULES_PER_SECTOR,
        }
    }
}

/// Everything a pipeline run needs, resolved from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub engine: EngineSettings,
    pub universe: Universe,
    pub strict_mode: StrictModeThresholds,
    pub selection: SelectionSettings,
    pub max_concurrent_trades: usize,
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<RunSettings, LeadLagError> {
    Ok(RunSettings {
        engine: load_engine_settings(config)?,
        universe: load_universe(config)?,
        strict_mode: load_strict_mode(config)?,
        selection: load_selection(config)?,
        max_concurrent_trades: load_max_concurrent_trades(config)?,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> LeadLagError {
    LeadLagError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Non-empty trimmed value of a key.
fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn float_or(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, LeadLagError> {
    let Some(raw) = non_empty(config, section, key) else {
        return Ok(default);
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(section, key, format!("'{raw}' is not a finite number"))),
    }
}

fn count_or(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, LeadLagError> {
    let Some(raw) = non_empty(config, section, key) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(invalid(section, key, format!("'{raw}' must be a positive integer"))),
    }
}

pub fn load_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, LeadLagError> {
    let price_field = match non_empty(config, "engine", "price_field") {
        Some(raw) => raw
            .parse::<PriceField>()
            .map_err(|e| invalid("engine", "price_field", e.to_string()))?,
        None => PriceField::default(),
    };

    let analysis_date = non_empty(config, "engine", "analysis_date")
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| invalid("engine", "analysis_date", "invalid date format, expected YYYY-MM-DD"))
        })
        .transpose()?;

    Ok(EngineSettings {
        price_field,
        data_dir: non_empty(config, "engine", "data_dir")
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())
            .into(),
        output_dir: non_empty(config, "engine", "output_dir")
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())
            .into(),
        analysis_date,
        parallel: config.get_bool("engine", "parallel", true),
    })
}

/// `[universe]` groups in file order; each value is a ticker list.
pub fn load_universe(config: &dyn ConfigPort) -> Result<Universe, LeadLagError> {
    let entries = config.section_entries("universe");
    if entries.is_empty() {
        return Err(LeadLagError::ConfigMissing {
            section: "universe".to_string(),
            key: "<group>".to_string(),
        });
    }

    let mut groups = Vec::with_capacity(entries.len());
    for (group, list) in entries {
        let tickers = parse_tickers(&list).map_err(|e| invalid("universe", &group, e.to_string()))?;
        groups.push((group, tickers));
    }
    Universe::new(groups).map_err(|e| match e {
        UniverseError::DuplicateGroup(g) => invalid("universe", &g, "group defined twice"),
        other => invalid("universe", "<group>", other.to_string()),
    })
}

pub fn load_strict_mode(config: &dyn ConfigPort) -> Result<StrictModeThresholds, LeadLagError> {
    let d = StrictModeThresholds::default();
    let t = StrictModeThresholds {
        min_mean: float_or(config, "strict_mode", "min_mean", d.min_mean)?,
        min_win_rate: float_or(config, "strict_mode", "min_win_rate", d.min_win_rate)?,
        min_sharpe: float_or(config, "strict_mode", "min_sharpe", d.min_sharpe)?,
        min_sortino: float_or(config, "strict_mode", "min_sortino", d.min_sortino)?,
        min_stability: float_or(config, "strict_mode", "min_stability", d.min_stability)?,
        min_max_dd: float_or(config, "strict_mode", "min_max_dd", d.min_max_dd)?,
    };

    if !(0.0..=1.0).contains(&t.min_win_rate) {
        return Err(invalid("strict_mode", "min_win_rate", "min_win_rate must be between 0 and 1"));
    }
    if t.min_max_dd > 0.0 {
        return Err(invalid("strict_mode", "min_max_dd", "min_max_dd must be zero or negative"));
    }
    Ok(t)
}

pub fn load_selection(config: &dyn ConfigPort) -> Result<SelectionSettings, LeadLagError> {
    let d = SelectionSettings::default();
    let min_sector_win_rate =
        float_or(config, "selection", "min_sector_win_rate", d.min_sector_win_rate)?;
    if !(0.0..=1.0).contains(&min_sector_win_rate) {
        return Err(invalid(
            "selection",
            "min_sector_win_rate",
            "min_sector_win_rate must be between 0 and 1",
        ));
    }
    Ok(SelectionSettings {
        min_sector_win_rate,
        top_global_rules: count_or(config, "selection", "top_global_rules", d.top_global_rules)?,
        top_rules_per_sector: count_or(
            config,
            "selection",
            "top_rules_per_sector",
            d.top_rules_per_sector,
        )?,
    })
}

pub fn load_max_concurrent_trades(config: &dyn ConfigPort) -> Result<usize, LeadLagError> {
    count_or(config, "portfolio", "max_concurrent_trades", MAX_CONCURRENT_TRADES)
}

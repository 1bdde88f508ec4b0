//! Leader/lagger divergence detection.
//!
//! A window qualifies when enough of a group moves together past the group
//! threshold (the leaders) while at least one instrument barely moves (the
//! laggers). Every qualifying lagger becomes its own [`Signal`].

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

use super::grid::SectorGrid;
use super::metrics::sample_std;
use super::rule::{DetectionParams, ParameterSet};
use super::series::{GroupSeries, NormalizedSeries};
use super::universe::Universe;

pub const MIN_LEADERS_PER_SIGNAL: usize = 2;
pub const MIN_LAGGERS_PER_SIGNAL: usize = 1;
/// Windows whose cross-sectional return deviation is below this are noise.
pub const MIN_WINDOW_STD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(Direction::Up),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub group: String,
    /// The lagger this signal proposes to trade.
    pub ticker: String,
    pub direction: Direction,
    pub params: ParameterSet,
    /// Window end.
    pub signal_date: NaiveDate,
    pub start_date: NaiveDate,
    pub leaders: Vec<String>,
    pub lagger_ret: f64,
    pub window_rets: Vec<(String, f64)>,
}

/// Scan one group with one detection parameter set.
///
/// The returned signals carry `params` with zero entry lag and hold; callers
/// that scan for a full [`ParameterSet`] use [`detect_for_params`].
pub fn detect_group_signals(
    group: &GroupSeries<'_>,
    group_name: &str,
    params: DetectionParams,
) -> Vec<Signal> {
    let mut signals = Vec::new();
    let n_tickers = group.tickers.len();
    if n_tickers == 0 {
        return signals;
    }

    for end_idx in params.lookback..group.dates.len() {
        let start_idx = end_idx - params.lookback;
        let window_rets: Vec<f64> = group
            .columns
            .iter()
            .map(|col| col[end_idx] / col[start_idx] - 1.0)
            .collect();

        if matches!(sample_std(&window_rets), Some(std) if std < MIN_WINDOW_STD) {
            continue;
        }

        let up: Vec<usize> = (0..n_tickers)
            .filter(|&i| window_rets[i] >= params.group_thresh)
            .collect();
        let down: Vec<usize> = (0..n_tickers)
            .filter(|&i| window_rets[i] <= -params.group_thresh)
            .collect();
        let frac_up = up.len() as f64 / n_tickers as f64;
        let frac_down = down.len() as f64 / n_tickers as f64;

        let (direction, leaders) = if frac_up >= params.participation && frac_up >= frac_down {
            (Direction::Up, up)
        } else if frac_down >= params.participation && frac_down > frac_up {
            (Direction::Down, down)
        } else {
            continue;
        };

        if leaders.len() < MIN_LEADERS_PER_SIGNAL {
            continue;
        }

        let laggers: Vec<usize> = (0..n_tickers)
            .filter(|i| window_rets[*i].abs() <= params.lagger_max_move && !leaders.contains(i))
            .collect();
        if laggers.len() < MIN_LAGGERS_PER_SIGNAL {
            continue;
        }

        let leader_names: Vec<String> =
            leaders.iter().map(|&i| group.tickers[i].to_string()).collect();
        let window: Vec<(String, f64)> = group
            .tickers
            .iter()
            .zip(&window_rets)
            .map(|(t, r)| (t.to_string(), *r))
            .collect();

        for lagger in laggers {
            signals.push(Signal {
                group: group_name.to_string(),
                ticker: group.tickers[lagger].to_string(),
                direction,
                params: params.with_timing(0, 0),
                signal_date: group.dates[end_idx],
                start_date: group.dates[start_idx],
                leaders: leader_names.clone(),
                lagger_ret: window_rets[lagger],
                window_rets: window.clone(),
            });
        }
    }

    signals
}

/// Scan one group with a full parameter set; signals carry `params` as given.
pub fn detect_for_params(
    group: &GroupSeries<'_>,
    group_name: &str,
    params: &ParameterSet,
) -> Vec<Signal> {
    let mut signals = detect_group_signals(group, group_name, params.detection());
    for signal in &mut signals {
        signal.params = *params;
    }
    signals
}

/// Detect signals for every group of the universe with its adaptive grid.
///
/// Output order is group (universe order), then grid order, then window,
/// then lagger. Parameter sets that differ only in entry lag or hold share
/// one scan; the signals are replicated per parameter set.
pub fn detect_lag_signals(
    series: &NormalizedSeries,
    universe: &Universe,
    grid: &SectorGrid,
    parallel: bool,
) -> Vec<Signal> {
    let mut all_signals = Vec::new();

    for (group_name, tickers) in universe.groups() {
        let group = series.select(tickers);
        if group.is_empty() {
            continue;
        }
        let Some(group_grid) = grid.get(group_name) else {
            continue;
        };

        let mut distinct: Vec<DetectionParams> = Vec::new();
        for p in &group_grid.params {
            let d = p.detection();
            if !distinct.contains(&d) {
                distinct.push(d);
            }
        }

        let scans: Vec<Vec<Signal>> = if parallel {
            distinct
                .par_iter()
                .map(|d| detect_group_signals(&group, group_name, *d))
                .collect()
        } else {
            distinct
                .iter()
                .map(|d| detect_group_signals(&group, group_name, *d))
                .collect()
        };
        let by_detection: HashMap<DetectionParams, Vec<Signal>> =
            distinct.into_iter().zip(scans).collect();

        for params in &group_grid.params {
            if let Some(found) = by_detection.get(&params.detection()) {
                all_signals.extend(found.iter().cloned().map(|mut s| {
                    s.params = *params;
                    s
                }));
            }
        }
    }

    match all_signals.iter().map(|s| s.signal_date).max() {
        Some(latest) => info!(signals = all_signals.len(), %latest, "latest signal date"),
        None => info!("no signals generated"),
    }

    all_signals
}

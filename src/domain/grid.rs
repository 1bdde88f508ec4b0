//! Sector-adaptive parameter grid.
//!
//! Each group gets its own Cartesian grid of [`ParameterSet`]s, chosen from
//! two fingerprints of its simple returns: average per-instrument
//! volatility and average cross-sectional dispersion.

use serde::Serialize;
use tracing::debug;

use super::metrics::{mean, sample_std};
use super::rule::ParameterSet;
use super::series::{GroupSeries, NormalizedSeries};
use super::universe::Universe;

/// Entry lags used while scanning for signals.
pub const DETECTION_ENTRY_LAGS: [usize; 2] = [0, 1];

/// Cap on the lagger threshold derived from a group threshold.
pub const LAGGER_MAX_CAP: f64 = 0.04;
pub const LAGGER_TO_GROUP_RATIO: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectorFingerprint {
    /// Mean over instruments of each instrument's return deviation.
    pub volatility: f64,
    /// Mean over dates of the cross-instrument return deviation.
    pub dispersion: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupGrid {
    pub group: String,
    pub fingerprint: SectorFingerprint,
    pub lookbacks: Vec<usize>,
    pub holds: Vec<usize>,
    pub group_thresholds: Vec<f64>,
    pub participations: Vec<f64>,
    pub lagger_max_moves: Vec<f64>,
    pub entry_lags: Vec<usize>,
    pub params: Vec<ParameterSet>,
}

/// Per-group grids in universe order; groups without usable data are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorGrid {
    groups: Vec<GroupGrid>,
}

impl SectorGrid {
    pub fn get(&self, group: &str) -> Option<&GroupGrid> {
        self.groups.iter().find(|g| g.group == group)
    }

    pub fn groups(&self) -> &[GroupGrid] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl SectorFingerprint {
    /// `None` when the group has no defined return at all.
    pub fn from_group(group: &GroupSeries<'_>) -> Option<Self> {
        let returns = group.simple_returns();
        if returns.iter().all(|col| col.iter().all(Option::is_none)) {
            return None;
        }

        let per_ticker_std: Vec<f64> = returns
            .iter()
            .filter_map(|col| {
                let defined: Vec<f64> = col.iter().flatten().copied().collect();
                sample_std(&defined)
            })
            .collect();

        let n_periods = returns.first().map_or(0, Vec::len);
        let per_date_std: Vec<f64> = (0..n_periods)
            .filter_map(|t| {
                let row: Vec<f64> = returns.iter().filter_map(|col| col[t]).collect();
                sample_std(&row)
            })
            .collect();

        Some(Self {
            volatility: mean(&per_ticker_std).unwrap_or(0.0),
            dispersion: mean(&per_date_std).unwrap_or(0.0),
        })
    }
}

fn lookbacks_and_holds(volatility: f64) -> (Vec<usize>, Vec<usize>) {
    if volatility > 0.03 {
        (vec![2, 3], vec![3, 5])
    } else if volatility > 0.02 {
        (vec![3, 5], vec![3, 5, 7])
    } else {
        (vec![5, 10], vec![5, 7, 10])
    }
}

fn group_thresholds(dispersion: f64) -> Vec<f64> {
    if dispersion > 0.025 {
        vec![0.03, 0.05]
    } else if dispersion > 0.015 {
        vec![0.02, 0.03]
    } else {
        vec![0.015, 0.02]
    }
}

fn participations(dispersion: f64) -> Vec<f64> {
    if dispersion > 0.02 {
        vec![0.6, 0.7]
    } else {
        vec![0.5, 0.6]
    }
}

pub fn lagger_max_move_for(group_thresh: f64) -> f64 {
    f64::min(group_thresh * LAGGER_TO_GROUP_RATIO, LAGGER_MAX_CAP)
}

impl GroupGrid {
    pub fn from_fingerprint(group: &str, fingerprint: SectorFingerprint) -> Self {
        let (lookbacks, holds) = lookbacks_and_holds(fingerprint.volatility);
        let group_thresholds = group_thresholds(fingerprint.dispersion);
        let participations = participations(fingerprint.dispersion);
        let lagger_max_moves: Vec<f64> = group_thresholds
            .iter()
            .map(|&gt| lagger_max_move_for(gt))
            .collect();
        let entry_lags = DETECTION_ENTRY_LAGS.to_vec();

        let mut params = Vec::with_capacity(
            lookbacks.len()
                * group_thresholds.len()
                * participations.len()
                * lagger_max_moves.len()
                * entry_lags.len()
                * holds.len(),
        );
        for &lookback in &lookbacks {
            for &group_thresh in &group_thresholds {
                for &participation in &participations {
                    for &lagger_max_move in &lagger_max_moves {
                        for &entry_lag in &entry_lags {
                            for &hold_days in &holds {
                                params.push(ParameterSet {
                                    lookback,
                                    group_thresh,
                                    participation,
                                    lagger_max_move,
                                    entry_lag,
                                    hold_days,
                                });
                            }
                        }
                    }
                }
            }
        }

        Self {
            group: group.to_string(),
            fingerprint,
            lookbacks,
            holds,
            group_thresholds,
            participations,
            lagger_max_moves,
            entry_lags,
            params,
        }
    }
}

pub fn build_sector_param_grid(series: &NormalizedSeries, universe: &Universe) -> SectorGrid {
    let mut groups = Vec::new();
    for (name, tickers) in universe.groups() {
        let group = series.select(tickers);
        if group.is_empty() {
            debug!(group = name, "no tradable instruments, skipping grid");
            continue;
        }
        let Some(fingerprint) = SectorFingerprint::from_group(&group) else {
            debug!(group = name, "empty return table, skipping grid");
            continue;
        };
        let grid = GroupGrid::from_fingerprint(name, fingerprint);
        debug!(
            group = name,
            volatility = fingerprint.volatility,
            dispersion = fingerprint.dispersion,
            param_sets = grid.params.len(),
            "built sector grid"
        );
        groups.push(grid);
    }
    SectorGrid { groups }
}

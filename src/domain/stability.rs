//! Rule stability: full-period rule stats plus trailing 90/30-day average
//! returns anchored at the latest exit date.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use super::metrics::{mean, win_rate};
use super::rule::{RuleId, RuleKey};
use super::scoring::RuleScore;
use super::trade::Trade;

pub const LONG_WINDOW_DAYS: i64 = 90;
pub const SHORT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleStability {
    pub key: RuleKey,
    pub n_trades: usize,
    pub avg_ret_full: f64,
    pub win_rate: f64,
    pub max_dd: f64,
    pub avg_ret_prev_90d: Option<f64>,
    pub avg_ret_prev_30d: Option<f64>,
    pub rule_id: Option<RuleId>,
    pub rule_quality_score: Option<f64>,
    /// Strictly positive quality score.
    pub is_investable: bool,
}

/// Mean of the returns whose exit is on or after `since`.
fn trailing_mean(exits: &[(NaiveDate, f64)], since: NaiveDate) -> Option<f64> {
    let recent: Vec<f64> = exits
        .iter()
        .filter(|(exit, _)| *exit >= since)
        .map(|(_, r)| *r)
        .collect();
    mean(&recent)
}

fn stability_row(
    key: RuleKey,
    exits: &[(NaiveDate, f64)],
    last_exit: NaiveDate,
    scores: &HashMap<&RuleKey, &RuleScore>,
) -> Option<RuleStability> {
    let rets: Vec<f64> = exits.iter().map(|(_, r)| *r).collect();
    let avg_ret_full = mean(&rets)?;
    let score = scores.get(&key);
    let rule_quality_score = score.map(|s| s.rule_quality_score);

    Some(RuleStability {
        n_trades: rets.len(),
        avg_ret_full,
        win_rate: win_rate(&rets),
        max_dd: rets.iter().copied().fold(f64::INFINITY, f64::min),
        avg_ret_prev_90d: trailing_mean(exits, last_exit - Duration::days(LONG_WINDOW_DAYS)),
        avg_ret_prev_30d: trailing_mean(exits, last_exit - Duration::days(SHORT_WINDOW_DAYS)),
        rule_id: score.map(|s| s.rule_id.clone()),
        rule_quality_score,
        is_investable: rule_quality_score.is_some_and(|q| q > 0.0),
        key,
    })
}

/// Stability table over closed trades, one row per rule key in key order.
/// Rule id and quality are left-joined from `scores`.
pub fn compute_rule_stability(
    trades: &[Trade],
    scores: &[RuleScore],
    parallel: bool,
) -> Vec<RuleStability> {
    if trades.is_empty() || scores.is_empty() {
        return Vec::new();
    }

    let mut groups: BTreeMap<RuleKey, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for trade in trades {
        if let Some(closed) = trade.closed().filter(|(_, r)| r.is_finite()) {
            groups.entry(trade.rule_key()).or_default().push(closed);
        }
    }
    let Some(last_exit) = groups.values().flatten().map(|(d, _)| *d).max() else {
        return Vec::new();
    };

    let lookup: HashMap<&RuleKey, &RuleScore> = scores.iter().map(|s| (&s.key, s)).collect();
    let groups: Vec<(RuleKey, Vec<(NaiveDate, f64)>)> = groups.into_iter().collect();

    let rows: Vec<RuleStability> = if parallel {
        groups
            .into_par_iter()
            .filter_map(|(key, exits)| stability_row(key, &exits, last_exit, &lookup))
            .collect()
    } else {
        groups
            .into_iter()
            .filter_map(|(key, exits)| stability_row(key, &exits, last_exit, &lookup))
            .collect()
    };

    info!(
        rules = rows.len(),
        investable = rows.iter().filter(|r| r.is_investable).count(),
        last_exit = %last_exit,
        "computed rule stability"
    );
    rows
}

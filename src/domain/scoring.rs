//! Rule scoring: aggregate closed trades per rule key into quality metrics.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::info;

use super::error::LeadLagError;
use super::metrics::{mean, win_rate};
use super::rule::{RuleId, RuleKey};
use super::trade::Trade;

/// Columns a trade table must carry before it can be scored.
pub const REQUIRED_TRADE_COLUMNS: [&str; 8] = [
    "lookback",
    "group_thresh",
    "participation",
    "lagger_max_move",
    "entry_lag",
    "hold_days",
    "group",
    "ret",
];

/// Smallest drawdown magnitude used as the quality denominator.
pub const MIN_DRAWDOWN: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    pub key: RuleKey,
    pub rule_id: RuleId,
    pub n_trades: usize,
    pub avg_ret_full: f64,
    pub win_rate: f64,
    /// Worst single-trade return, not a compounded drawdown.
    pub max_dd: f64,
    pub rule_quality_score: f64,
}

/// Fail with [`LeadLagError::MissingColumns`] listing every required column
/// absent from `present`.
pub fn require_columns<S: AsRef<str>>(
    table: &str,
    present: &[S],
    required: &[&str],
) -> Result<(), LeadLagError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !present.iter().any(|p| p.as_ref() == **col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LeadLagError::MissingColumns {
            table: table.to_string(),
            columns: missing,
        })
    }
}

/// Sample-size penalty applied to the quality score.
pub fn sample_penalty(n_trades: usize) -> f64 {
    if n_trades < 50 {
        0.5
    } else if n_trades < 200 {
        0.8
    } else {
        1.0
    }
}

/// `(avg_ret * win_rate * penalty) / max(1e-6, |max_dd|)`.
pub fn rule_quality(avg_ret: f64, win_rate: f64, max_dd: f64, n_trades: usize) -> f64 {
    let dd_term = max_dd.abs().max(MIN_DRAWDOWN);
    (avg_ret * win_rate * sample_penalty(n_trades)) / dd_term
}

/// Closed-trade returns grouped by rule key, in key order.
pub(crate) fn closed_returns_by_rule(trades: &[Trade]) -> BTreeMap<RuleKey, Vec<f64>> {
    let mut groups: BTreeMap<RuleKey, Vec<f64>> = BTreeMap::new();
    for trade in trades {
        if let Some(ret) = trade.ret.filter(|r| r.is_finite()) {
            groups.entry(trade.rule_key()).or_default().push(ret);
        }
    }
    groups
}

fn score_group(key: RuleKey, rets: &[f64]) -> Option<RuleScore> {
    let avg_ret_full = mean(rets)?;
    let win_rate = win_rate(rets);
    let max_dd = rets.iter().copied().fold(f64::INFINITY, f64::min);
    let n_trades = rets.len();
    Some(RuleScore {
        rule_id: key.rule_id(),
        key,
        n_trades,
        avg_ret_full,
        win_rate,
        max_dd,
        rule_quality_score: rule_quality(avg_ret_full, win_rate, max_dd, n_trades),
    })
}

/// One score per rule key with at least one closed trade, ordered by key.
pub fn score_rules(trades: &[Trade], parallel: bool) -> Vec<RuleScore> {
    let groups: Vec<(RuleKey, Vec<f64>)> = closed_returns_by_rule(trades).into_iter().collect();

    let scores: Vec<RuleScore> = if parallel {
        groups
            .into_par_iter()
            .filter_map(|(key, rets)| score_group(key, &rets))
            .collect()
    } else {
        groups
            .into_iter()
            .filter_map(|(key, rets)| score_group(key, &rets))
            .collect()
    };

    info!(
        rules = scores.len(),
        positive = scores.iter().filter(|s| s.rule_quality_score > 0.0).count(),
        "scored rules"
    );
    scores
}

//! Rule selection between the stability table and the portfolio.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::sector::SectorMetrics;
use super::stability::RuleStability;

/// Descending order for optional values, absent values last.
pub(crate) fn desc_absent_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Highest-quality scored rules from sectors whose daily win rate reaches
/// `min_sector_win_rate`. Ties keep stability-table order.
pub fn select_top_global_rules(
    stability: &[RuleStability],
    sectors: &[SectorMetrics],
    min_sector_win_rate: f64,
    top_n: usize,
) -> Vec<RuleStability> {
    let strong: HashSet<&str> = sectors
        .iter()
        .filter(|s| s.win_rate >= min_sector_win_rate)
        .map(|s| s.group.as_str())
        .collect();

    let mut candidates: Vec<&RuleStability> = stability
        .iter()
        .filter(|r| strong.contains(r.key.group.as_str()) && r.rule_quality_score.is_some())
        .collect();
    candidates.sort_by(|a, b| desc_absent_last(a.rule_quality_score, b.rule_quality_score));
    candidates.into_iter().take(top_n).cloned().collect()
}

/// Up to `per_sector` scored rules from every investable sector, ordered by
/// group, then quality descending, then trailing 90-day return descending.
pub fn select_best_rules_per_sector(
    stability: &[RuleStability],
    sectors: &[SectorMetrics],
    per_sector: usize,
) -> Vec<RuleStability> {
    let investable: HashSet<&str> = sectors
        .iter()
        .filter(|s| s.is_investable)
        .map(|s| s.group.as_str())
        .collect();

    let mut candidates: Vec<&RuleStability> = stability
        .iter()
        .filter(|r| investable.contains(r.key.group.as_str()) && r.rule_quality_score.is_some())
        .collect();
    candidates.sort_by(|a, b| {
        a.key
            .group
            .cmp(&b.key.group)
            .then_with(|| desc_absent_last(a.rule_quality_score, b.rule_quality_score))
            .then_with(|| desc_absent_last(a.avg_ret_prev_90d, b.avg_ret_prev_90d))
    });

    let mut selected: Vec<RuleStability> = Vec::new();
    let mut taken = 0;
    for (i, rule) in candidates.iter().enumerate() {
        if i == 0 || candidates[i - 1].key.group != rule.key.group {
            taken = 0;
        }
        if taken < per_sector {
            selected.push((*rule).clone());
            taken += 1;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{ParameterSet, RuleKey};

    fn rule(group: &str, lookback: usize, quality: Option<f64>, prev_90: Option<f64>) -> RuleStability {
        let key = RuleKey::new(
            group,
            ParameterSet {
                lookback,
                group_thresh: 0.02,
                participation: 0.5,
                lagger_max_move: 0.015,
                entry_lag: 0,
                hold_days: 5,
            },
        );
        RuleStability {
            rule_id: quality.map(|_| key.rule_id()),
            key,
            n_trades: 10,
            avg_ret_full: 0.01,
            win_rate: 0.6,
            max_dd: -0.02,
            avg_ret_prev_90d: prev_90,
            avg_ret_prev_30d: None,
            rule_quality_score: quality,
            is_investable: quality.is_some_and(|q| q > 0.0),
        }
    }

    fn sector(group: &str, win_rate: f64, investable: bool) -> SectorMetrics {
        SectorMetrics {
            group: group.into(),
            mean: 0.001,
            win_rate,
            volatility: 0.01,
            sharpe: 0.1,
            sortino: 0.1,
            max_dd: -0.01,
            stability: 0.0,
            is_investable: investable,
            rejection_reasons: vec![],
        }
    }

    fn lookbacks(rules: &[RuleStability]) -> Vec<(String, usize)> {
        rules
            .iter()
            .map(|r| (r.key.group.clone(), r.key.params.lookback))
            .collect()
    }

    #[test]
    fn global_rules_come_from_high_win_rate_sectors() {
        let stability = vec![
            rule("A", 2, Some(0.5), None),
            rule("B", 3, Some(0.9), None),
            rule("A", 5, Some(0.7), None),
            rule("A", 10, None, None),
        ];
        let sectors = vec![sector("A", 0.55, false), sector("B", 0.40, true)];
        let top = select_top_global_rules(&stability, &sectors, 0.51, 10);
        assert_eq!(lookbacks(&top), vec![("A".into(), 5), ("A".into(), 2)]);
    }

    #[test]
    fn global_rules_truncate_and_keep_tie_order() {
        let stability = vec![
            rule("A", 2, Some(0.5), None),
            rule("A", 3, Some(0.5), None),
            rule("A", 5, Some(0.1), None),
        ];
        let sectors = vec![sector("A", 0.6, true)];
        let top = select_top_global_rules(&stability, &sectors, 0.51, 2);
        assert_eq!(lookbacks(&top), vec![("A".into(), 2), ("A".into(), 3)]);
    }

    #[test]
    fn best_rules_per_investable_sector() {
        let stability = vec![
            rule("B", 2, Some(0.3), Some(0.01)),
            rule("B", 3, Some(0.3), Some(0.02)),
            rule("B", 5, Some(0.1), Some(0.05)),
            rule("A", 2, Some(0.2), None),
            rule("C", 2, Some(0.9), None),
        ];
        let sectors = vec![
            sector("A", 0.6, true),
            sector("B", 0.6, true),
            sector("C", 0.6, false),
        ];
        let best = select_best_rules_per_sector(&stability, &sectors, 2);
        assert_eq!(
            lookbacks(&best),
            vec![("A".into(), 2), ("B".into(), 3), ("B".into(), 2)]
        );
    }

    #[test]
    fn absent_trailing_return_sorts_last() {
        let stability = vec![rule("A", 2, Some(0.3), None), rule("A", 3, Some(0.3), Some(-0.5))];
        let sectors = vec![sector("A", 0.6, true)];
        let best = select_best_rules_per_sector(&stability, &sectors, 1);
        assert_eq!(lookbacks(&best), vec![("A".into(), 3)]);
    }

    #[test]
    fn empty_inputs_select_nothing() {
        assert!(select_top_global_rules(&[], &[sector("A", 0.9, true)], 0.51, 10).is_empty());
        assert!(select_best_rules_per_sector(&[rule("A", 2, Some(0.1), None)], &[], 2).is_empty());
    }
}

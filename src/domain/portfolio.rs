//! Capacity-constrained portfolio replay over a rule-filtered trade set.
//!
//! One business day at a time: positions whose exit is before the day are
//! released, then the day's entries are admitted by descending rule quality
//! while fewer than `capacity` positions are open. A trade that misses
//! admission on its entry day is never opened. Open trades never exit, so
//! they hold their slot until the end of the replay.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::attribution::{exit_day_returns, holding_calendar, open_counts, Holding};
use super::metrics::{business_days, compound, mean, PortfolioMetrics};
use super::rule::RuleKey;
use super::selection::desc_absent_last;
use super::stability::RuleStability;
use super::trade::Trade;

pub const MAX_CONCURRENT_TRADES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Working set of open positions plus the ledger of everything admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    capacity: usize,
    open: Vec<Trade>,
    used: Vec<Trade>,
}

impl Portfolio {
    pub fn new(capacity: usize) -> Self {
        Portfolio {
            capacity,
            open: Vec::new(),
            used: Vec::new(),
        }
    }

    pub fn position_count(&self) -> usize {
        self.open.len()
    }

    pub fn is_full(&self) -> bool {
        self.open.len() >= self.capacity
    }

    /// Move positions that exited before `day` to the ledger.
    pub fn release_before(&mut self, day: NaiveDate) {
        let (released, still_open): (Vec<Trade>, Vec<Trade>) = std::mem::take(&mut self.open)
            .into_iter()
            .partition(|t| t.exit_date.is_some_and(|exit| exit < day));
        self.used.extend(released);
        self.open = still_open;
    }

    /// Open `trade` if there is a free slot.
    pub fn admit(&mut self, trade: Trade) -> bool {
        if self.is_full() {
            return false;
        }
        self.open.push(trade);
        true
    }

    /// Close the replay: every still-open position joins the ledger.
    pub fn into_used(mut self) -> Vec<Trade> {
        self.used.append(&mut self.open);
        self.used
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioResult {
    pub equity_curve: Vec<EquityPoint>,
    pub daily_returns: Vec<f64>,
    pub used_trades: Vec<Trade>,
    pub metrics: Option<PortfolioMetrics>,
    /// Open position count on every simulated day, after admission.
    pub daily_open_positions: Vec<(NaiveDate, usize)>,
}

impl PortfolioResult {
    pub fn is_empty(&self) -> bool {
        self.used_trades.is_empty()
    }

    pub fn equity_on(&self, date: NaiveDate) -> Option<f64> {
        self.equity_curve
            .iter()
            .find(|p| p.date == date)
            .map(|p| p.equity)
    }

    /// Equity change on `date` relative to the first point of the curve.
    pub fn change_since_first(&self, date: NaiveDate) -> Option<f64> {
        let first = self.equity_curve.first()?.equity;
        self.equity_on(date).map(|e| (e - first) / first)
    }
}

/// A trade matched to a selected rule, with the rule's return as the
/// admission fallback when no quality score is available.
#[derive(Debug, Clone)]
struct Candidate {
    trade: Trade,
    fallback: f64,
}

/// Keep the trades whose rule key is among `rules`, carrying the rule's id
/// and quality score.
pub fn filter_trades_for_rules(trades: &[Trade], rules: &[RuleStability]) -> Vec<Trade> {
    match_rules(trades, rules).into_iter().map(|c| c.trade).collect()
}

fn match_rules(trades: &[Trade], rules: &[RuleStability]) -> Vec<Candidate> {
    let lookup: HashMap<&RuleKey, &RuleStability> = rules.iter().map(|r| (&r.key, r)).collect();
    trades
        .iter()
        .filter_map(|trade| {
            let rule = lookup.get(&trade.rule_key())?;
            let mut trade = trade.clone();
            trade.rule_id = rule.rule_id.clone();
            trade.rule_quality_score = rule.rule_quality_score;
            Some(Candidate {
                trade,
                fallback: rule.avg_ret_full,
            })
        })
        .collect()
}

/// Replay the trades of the selected rules under a concurrency cap.
/// Empty trades or rules give an empty result.
pub fn run_portfolio_for_rules(
    trades: &[Trade],
    rules: &[RuleStability],
    capacity: usize,
) -> PortfolioResult {
    if trades.is_empty() || rules.is_empty() {
        return PortfolioResult::default();
    }
    let mut candidates = match_rules(trades, rules);
    if candidates.is_empty() {
        return PortfolioResult::default();
    }
    candidates.sort_by_key(|c| c.trade.entry_date);
    simulate(candidates, capacity)
}

fn admission_order(batch: &mut [Candidate]) {
    if batch.iter().any(|c| c.trade.rule_quality_score.is_some()) {
        batch.sort_by(|a, b| desc_absent_last(a.trade.rule_quality_score, b.trade.rule_quality_score));
    } else {
        batch.sort_by(|a, b| b.fallback.total_cmp(&a.fallback));
    }
}

fn simulate(candidates: Vec<Candidate>, capacity: usize) -> PortfolioResult {
    let first = candidates.iter().map(|c| c.trade.entry_date).min();
    let last = candidates
        .iter()
        .flat_map(|c| [Some(c.trade.entry_date), c.trade.exit_date])
        .flatten()
        .max();
    let (Some(first), Some(last)) = (first, last) else {
        return PortfolioResult::default();
    };

    let mut by_entry: BTreeMap<NaiveDate, Vec<Candidate>> = BTreeMap::new();
    for c in candidates {
        by_entry.entry(c.trade.entry_date).or_default().push(c);
    }

    let mut portfolio = Portfolio::new(capacity);
    let mut daily_open_positions = Vec::new();
    let mut skipped = 0usize;

    for day in business_days(first, last) {
        portfolio.release_before(day);
        if let Some(mut batch) = by_entry.remove(&day) {
            admission_order(&mut batch);
            for c in batch {
                if !portfolio.admit(c.trade) {
                    skipped += 1;
                }
            }
        }
        daily_open_positions.push((day, portfolio.position_count()));
    }

    let used_trades = portfolio.into_used();
    debug!(used = used_trades.len(), skipped, "portfolio replay finished");

    let holdings: Vec<Holding> = used_trades
        .iter()
        .filter_map(|t| {
            t.closed().map(|(exit, ret)| Holding {
                entry: t.entry_date,
                exit,
                ret,
            })
        })
        .collect();
    let days = holding_calendar(&holdings);
    let daily_returns = exit_day_returns(&holdings, &days);
    let equity = compound(&daily_returns);
    let counts: Vec<f64> = open_counts(&holdings, &days)
        .into_iter()
        .map(|c| c as f64)
        .collect();
    let metrics = PortfolioMetrics::compute(
        &daily_returns,
        &equity,
        used_trades.len(),
        mean(&counts).unwrap_or(0.0),
    );

    let equity_curve = days
        .into_iter()
        .zip(equity)
        .map(|(date, equity)| EquityPoint { date, equity })
        .collect();

    info!(
        used = used_trades.len(),
        open = used_trades.iter().filter(|t| t.is_open).count(),
        total_return = metrics.as_ref().map_or(0.0, |m| m.total_return),
        "portfolio simulated"
    );

    PortfolioResult {
        equity_curve,
        daily_returns,
        used_trades,
        metrics,
        daily_open_positions,
    }
}

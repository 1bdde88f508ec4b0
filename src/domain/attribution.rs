//! Exit-day return attribution over overlapping holdings.
//!
//! A holding is open on every business day in `[entry, exit]`. Its return is
//! booked once, on its exit day, split equally among everything open that
//! day. Open counts come from a single sweep over entry/exit events rather
//! than rescanning every holding per day.

use chrono::NaiveDate;

use super::metrics::business_days;

/// A closed position reduced to what attribution needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Holding {
    pub entry: NaiveDate,
    pub exit: NaiveDate,
    pub ret: f64,
}

/// Business days from the earliest entry to the latest exit.
pub fn holding_calendar(holdings: &[Holding]) -> Vec<NaiveDate> {
    let start = holdings.iter().map(|h| h.entry).min();
    let end = holdings.iter().map(|h| h.exit).max();
    match (start, end) {
        (Some(start), Some(end)) => business_days(start, end),
        _ => Vec::new(),
    }
}

/// Index range of `days` covered by `[entry, exit]`, or `None` if no day
/// falls inside it.
fn covered(days: &[NaiveDate], h: &Holding) -> Option<(usize, usize)> {
    let first = days.partition_point(|d| *d < h.entry);
    let past = days.partition_point(|d| *d <= h.exit);
    (first < past).then(|| (first, past - 1))
}

/// Number of holdings open on each of `days`.
pub fn open_counts(holdings: &[Holding], days: &[NaiveDate]) -> Vec<usize> {
    let mut delta = vec![0_i64; days.len() + 1];
    for h in holdings {
        if let Some((first, last)) = covered(days, h) {
            delta[first] += 1;
            delta[last + 1] -= 1;
        }
    }
    delta
        .iter()
        .take(days.len())
        .scan(0_i64, |open, d| {
            *open += d;
            Some(*open as usize)
        })
        .collect()
}

/// Per-day return: for each holding exiting on a day, `ret / open_count`.
/// Days with no exit return 0. Exits that are not in `days` are not booked.
pub fn exit_day_returns(holdings: &[Holding], days: &[NaiveDate]) -> Vec<f64> {
    let open = open_counts(holdings, days);
    let mut daily = vec![0.0; days.len()];
    for h in holdings {
        let Ok(idx) = days.binary_search(&h.exit) else {
            continue;
        };
        // The exiting holding is itself open, so the count is at least one.
        let weight = 1.0 / open[idx].max(1) as f64;
        daily[idx] += h.ret * weight;
    }
    daily
}

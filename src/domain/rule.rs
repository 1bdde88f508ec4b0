//! Rule identity: parameter sets, the seven-field rule key and its
//! deterministic fingerprint.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Parameters of one leader/lagger rule, excluding its group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSet {
    pub lookback: usize,
    pub group_thresh: f64,
    pub participation: f64,
    pub lagger_max_move: f64,
    pub entry_lag: usize,
    pub hold_days: usize,
}

impl ParameterSet {
    pub fn detection(&self) -> DetectionParams {
        DetectionParams {
            lookback: self.lookback,
            group_thresh: self.group_thresh,
            participation: self.participation,
            lagger_max_move: self.lagger_max_move,
        }
    }

    pub fn with_timing(&self, entry_lag: usize, hold_days: usize) -> Self {
        Self {
            entry_lag,
            hold_days,
            ..*self
        }
    }
}

/// The four fields the signal detector actually consumes; shared between
/// the detection grid and the trade grid.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub lookback: usize,
    pub group_thresh: f64,
    pub participation: f64,
    pub lagger_max_move: f64,
}

impl DetectionParams {
    pub fn with_timing(&self, entry_lag: usize, hold_days: usize) -> ParameterSet {
        ParameterSet {
            lookback: self.lookback,
            group_thresh: self.group_thresh,
            participation: self.participation,
            lagger_max_move: self.lagger_max_move,
            entry_lag,
            hold_days,
        }
    }

    fn bits(&self) -> (usize, u64, u64, u64) {
        (
            self.lookback,
            self.group_thresh.to_bits(),
            self.participation.to_bits(),
            self.lagger_max_move.to_bits(),
        )
    }
}

impl PartialEq for DetectionParams {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for DetectionParams {}

impl Hash for DetectionParams {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl Ord for DetectionParams {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lookback
            .cmp(&other.lookback)
            .then_with(|| self.group_thresh.total_cmp(&other.group_thresh))
            .then_with(|| self.participation.total_cmp(&other.participation))
            .then_with(|| self.lagger_max_move.total_cmp(&other.lagger_max_move))
    }
}

impl PartialOrd for DetectionParams {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Unique identity of a rule: group plus all six parameters.
///
/// Ordering is lookback, group_thresh, participation, lagger_max_move,
/// entry_lag, hold_days, then group.
#[derive(Debug, Clone)]
pub struct RuleKey {
    pub group: String,
    pub params: ParameterSet,
}

impl RuleKey {
    pub fn new(group: impl Into<String>, params: ParameterSet) -> Self {
        Self {
            group: group.into(),
            params,
        }
    }

    pub fn rule_id(&self) -> RuleId {
        RuleId::for_key(self)
    }
}

impl PartialEq for RuleKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RuleKey {}

impl Hash for RuleKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.params.detection().hash(state);
        self.params.entry_lag.hash(state);
        self.params.hold_days.hash(state);
        self.group.hash(state);
    }
}

impl Ord for RuleKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.params
            .detection()
            .cmp(&other.params.detection())
            .then_with(|| self.params.entry_lag.cmp(&other.params.entry_lag))
            .then_with(|| self.params.hold_days.cmp(&other.params.hold_days))
            .then_with(|| self.group.cmp(&other.group))
    }
}

impl PartialOrd for RuleKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Short deterministic rule fingerprint, e.g. `R_1A2B3C4D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleId(pub String);

impl RuleId {
    const HEX_DIGITS: usize = 8;

    /// BLAKE3 over the canonical (sorted-key) JSON form of the rule key.
    pub fn for_key(key: &RuleKey) -> Self {
        let canonical = canonical_json(key);
        let hash = blake3::hash(canonical.as_bytes());
        let hex = hash.to_hex();
        Self(format!("R_{}", hex[..Self::HEX_DIGITS].to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `json!` objects are backed by a sorted map, so keys serialize in
/// lexicographic order whatever order they are written in here.
pub fn canonical_json(key: &RuleKey) -> String {
    use serde_json::json;

    let p = &key.params;
    json!({
        "group": key.group,
        "lookback": p.lookback,
        "group_thresh": p.group_thresh,
        "participation": p.participation,
        "lagger_max_move": p.lagger_max_move,
        "entry_lag": p.entry_lag,
        "hold_days": p.hold_days,
    })
    .to_string()
}

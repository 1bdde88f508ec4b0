//! Research tables as CSV files in one output directory.
//!
//! Rows are flattened into plain records before writing: the `csv` crate
//! cannot serialize nested structs, so parameter sets are spread into
//! columns, lists are joined into a single cell and absent values become
//! empty cells.

use crate::domain::error::LeadLagError;
use crate::domain::portfolio::PortfolioResult;
use crate::domain::rule::{ParameterSet, RuleId};
use crate::domain::scoring::{require_columns, RuleScore, REQUIRED_TRADE_COLUMNS};
use crate::domain::sector::SectorMetrics;
use crate::domain::signal::Direction;
use crate::domain::stability::RuleStability;
use crate::domain::trade::Trade;
use crate::ports::research_port::{ResearchPort, TradeTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const INITIAL_TRADES_FILE: &str = "all_trades_initial.csv";
pub const RULE_SCORES_FILE: &str = "rule_scores.csv";
pub const TRADES_WITH_RULE_ID_FILE: &str = "all_trades_with_rule_id.csv";
pub const RULE_STABILITY_FILE: &str = "rule_stability.csv";
pub const SECTOR_INVESTABILITY_FILE: &str = "sector_investability.csv";
pub const EQUITY_CURVE_FILE: &str = "portfolio_equity_curve.csv";
pub const USED_TRADES_FILE: &str = "portfolio_used_trades.csv";

const LEADER_SEPARATOR: &str = ",";
const REASON_SEPARATOR: &str = " | ";

pub struct CsvResearchAdapter {
    output_dir: PathBuf,
}

impl CsvResearchAdapter {
    /// Creates the output directory if it does not exist yet.
    pub fn new(output_dir: PathBuf) -> Result<Self, LeadLagError> {
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn write_rows<R: Serialize>(&self, file: &str, rows: impl IntoIterator<Item = R>) -> Result<(), LeadLagError> {
        let path = self.output_dir.join(file);
        let export_err = |e: csv::Error| LeadLagError::Export {
            reason: format!("{}: {}", path.display(), e),
        };
        let mut wtr = csv::Writer::from_path(&path).map_err(export_err)?;
        let mut count = 0usize;
        for row in rows {
            wtr.serialize(row).map_err(export_err)?;
            count += 1;
        }
        wtr.flush()?;
        info!(file, rows = count, "wrote research table");
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TradeRow {
    group: String,
    ticker: String,
    direction: i8,
    signal_date: NaiveDate,
    entry_date: NaiveDate,
    #[serde(default)]
    exit_date: Option<NaiveDate>,
    lookback: usize,
    group_thresh: f64,
    participation: f64,
    lagger_max_move: f64,
    entry_lag: usize,
    hold_days: usize,
    ret: Option<f64>,
    #[serde(default)]
    leaders: String,
    #[serde(default)]
    is_open: Option<bool>,
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    rule_quality_score: Option<f64>,
}

impl From<&Trade> for TradeRow {
    fn from(t: &Trade) -> Self {
        let p = &t.params;
        TradeRow {
            group: t.group.clone(),
            ticker: t.ticker.clone(),
            direction: t.direction.sign(),
            signal_date: t.signal_date,
            entry_date: t.entry_date,
            exit_date: t.exit_date,
            lookback: p.lookback,
            group_thresh: p.group_thresh,
            participation: p.participation,
            lagger_max_move: p.lagger_max_move,
            entry_lag: p.entry_lag,
            hold_days: p.hold_days,
            ret: t.ret,
            leaders: t.leaders.join(LEADER_SEPARATOR),
            is_open: Some(t.is_open),
            rule_id: t.rule_id.as_ref().map(|id| id.to_string()),
            rule_quality_score: t.rule_quality_score,
        }
    }
}

impl TradeRow {
    fn into_trade(self) -> Result<Trade, String> {
        let direction = Direction::from_sign(i64::from(self.direction))
            .ok_or_else(|| format!("invalid direction {}", self.direction))?;
        let leaders = self
            .leaders
            .split(LEADER_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(Trade {
            group: self.group,
            ticker: self.ticker,
            direction,
            signal_date: self.signal_date,
            entry_date: self.entry_date,
            exit_date: self.exit_date,
            params: ParameterSet {
                lookback: self.lookback,
                group_thresh: self.group_thresh,
                participation: self.participation,
                lagger_max_move: self.lagger_max_move,
                entry_lag: self.entry_lag,
                hold_days: self.hold_days,
            },
            is_open: self.is_open.unwrap_or(self.ret.is_none()),
            ret: self.ret,
            leaders,
            rule_id: self.rule_id.filter(|s| !s.is_empty()).map(RuleId),
            rule_quality_score: self.rule_quality_score,
        })
    }
}

#[derive(Debug, Serialize)]
struct RuleScoreRow<'a> {
    rule_id: &'a str,
    group: &'a str,
    lookback: usize,
    group_thresh: f64,
    participation: f64,
    lagger_max_move: f64,
    entry_lag: usize,
    hold_days: usize,
    n_trades: usize,
    avg_ret_full: f64,
    win_rate: f64,
    max_dd: f64,
    rule_quality_score: f64,
}

impl<'a> From<&'a RuleScore> for RuleScoreRow<'a> {
    fn from(s: &'a RuleScore) -> Self {
        let p = &s.key.params;
        RuleScoreRow {
            rule_id: s.rule_id.as_str(),
            group: &s.key.group,
            lookback: p.lookback,
            group_thresh: p.group_thresh,
            participation: p.participation,
            lagger_max_move: p.lagger_max_move,
            entry_lag: p.entry_lag,
            hold_days: p.hold_days,
            n_trades: s.n_trades,
            avg_ret_full: s.avg_ret_full,
            win_rate: s.win_rate,
            max_dd: s.max_dd,
            rule_quality_score: s.rule_quality_score,
        }
    }
}

#[derive(Debug, Serialize)]
struct RuleStabilityRow<'a> {
    rule_id: Option<&'a str>,
    group: &'a str,
    lookback: usize,
    group_thresh: f64,
    participation: f64,
    lagger_max_move: f64,
    entry_lag: usize,
    hold_days: usize,
    n_trades: usize,
    avg_ret_full: f64,
    win_rate: f64,
    max_dd: f64,
    avg_ret_prev_90d: Option<f64>,
    avg_ret_prev_30d: Option<f64>,
    rule_quality_score: Option<f64>,
    is_investable: bool,
}

impl<'a> From<&'a RuleStability> for RuleStabilityRow<'a> {
    fn from(r: &'a RuleStability) -> Self {
        let p = &r.key.params;
        RuleStabilityRow {
            rule_id: r.rule_id.as_ref().map(RuleId::as_str),
            group: &r.key.group,
            lookback: p.lookback,
            group_thresh: p.group_thresh,
            participation: p.participation,
            lagger_max_move: p.lagger_max_move,
            entry_lag: p.entry_lag,
            hold_days: p.hold_days,
            n_trades: r.n_trades,
            avg_ret_full: r.avg_ret_full,
            win_rate: r.win_rate,
            max_dd: r.max_dd,
            avg_ret_prev_90d: r.avg_ret_prev_90d,
            avg_ret_prev_30d: r.avg_ret_prev_30d,
            rule_quality_score: r.rule_quality_score,
            is_investable: r.is_investable,
        }
    }
}

#[derive(Debug, Serialize)]
struct SectorRow<'a> {
    group: &'a str,
    mean: f64,
    win_rate: f64,
    volatility: f64,
    sharpe: f64,
    sortino: f64,
    max_dd: f64,
    stability: f64,
    is_investable: bool,
    rejection_reasons: String,
}

impl<'a> From<&'a SectorMetrics> for SectorRow<'a> {
    fn from(m: &'a SectorMetrics) -> Self {
        SectorRow {
            group: &m.group,
            mean: m.mean,
            win_rate: m.win_rate,
            volatility: m.volatility,
            sharpe: m.sharpe,
            sortino: m.sortino,
            max_dd: m.max_dd,
            stability: m.stability,
            is_investable: m.is_investable,
            rejection_reasons: m.rejection_reasons.join(REASON_SEPARATOR),
        }
    }
}

#[derive(Debug, Serialize)]
struct EquityRow {
    date: NaiveDate,
    daily_return: f64,
    equity: f64,
}

impl ResearchPort for CsvResearchAdapter {
    fn write_trades(&self, table: TradeTable, trades: &[Trade]) -> Result<(), LeadLagError> {
        let file = match table {
            TradeTable::Initial => INITIAL_TRADES_FILE,
            TradeTable::WithRuleId => TRADES_WITH_RULE_ID_FILE,
        };
        self.write_rows(file, trades.iter().map(TradeRow::from))
    }

    fn write_rule_scores(&self, scores: &[RuleScore]) -> Result<(), LeadLagError> {
        self.write_rows(RULE_SCORES_FILE, scores.iter().map(RuleScoreRow::from))
    }

    fn write_rule_stability(&self, rows: &[RuleStability]) -> Result<(), LeadLagError> {
        self.write_rows(RULE_STABILITY_FILE, rows.iter().map(RuleStabilityRow::from))
    }

    fn write_sector_investability(&self, rows: &[SectorMetrics]) -> Result<(), LeadLagError> {
        self.write_rows(SECTOR_INVESTABILITY_FILE, rows.iter().map(SectorRow::from))
    }

    fn write_portfolio(&self, result: &PortfolioResult) -> Result<(), LeadLagError> {
        let equity = result
            .equity_curve
            .iter()
            .zip(&result.daily_returns)
            .map(|(point, r)| EquityRow {
                date: point.date,
                daily_return: *r,
                equity: point.equity,
            });
        self.write_rows(EQUITY_CURVE_FILE, equity)?;
        self.write_rows(USED_TRADES_FILE, result.used_trades.iter().map(TradeRow::from))
    }
}

/// Trade columns a row cannot be rebuilt without, beyond the scoring set.
const TRADE_IDENTITY_COLUMNS: [&str; 4] = ["ticker", "direction", "signal_date", "entry_date"];

/// Read a trade table previously written by this adapter (or any CSV with
/// the same columns). The header is checked for every column without a
/// default before any row is parsed.
pub fn read_trades(path: &Path) -> Result<Vec<Trade>, LeadLagError> {
    let invalid = |reason: String| {
        LeadLagError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{}: {}", path.display(), reason),
        ))
    };

    let content = fs::read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let header: Vec<String> = rdr
        .headers()
        .map_err(|e| invalid(e.to_string()))?
        .iter()
        .map(String::from)
        .collect();
    let required: Vec<&str> = REQUIRED_TRADE_COLUMNS
        .iter()
        .chain(&TRADE_IDENTITY_COLUMNS)
        .copied()
        .collect();
    require_columns("trades", &header, &required)?;

    let mut trades = Vec::new();
    for (line, result) in rdr.deserialize::<TradeRow>().enumerate() {
        let row = result.map_err(|e| invalid(format!("row {}: {}", line + 1, e)))?;
        trades.push(row.into_trade().map_err(|e| invalid(format!("row {}: {}", line + 1, e)))?);
    }
    info!(path = %path.display(), trades = trades.len(), "read trade table");
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::EquityPoint;
    use crate::domain::rule::RuleKey;
    use tempfile::TempDir;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn params() -> ParameterSet {
        ParameterSet {
            lookback: 5,
            group_thresh: 0.03,
            participation: 0.6,
            lagger_max_move: 0.0225,
            entry_lag: 1,
            hold_days: 3,
        }
    }

    fn closed_trade() -> Trade {
        Trade {
            group: "TELECOM".into(),
            ticker: "VZ".into(),
            direction: Direction::Down,
            signal_date: date(4),
            entry_date: date(5),
            exit_date: Some(date(8)),
            params: params(),
            ret: Some(0.0125),
            leaders: vec!["TMUS".into(), "T".into()],
            is_open: false,
            rule_id: Some(RuleKey::new("TELECOM", params()).rule_id()),
            rule_quality_score: Some(0.4),
        }
    }

    fn open_trade() -> Trade {
        Trade {
            exit_date: None,
            ret: None,
            is_open: true,
            rule_id: None,
            rule_quality_score: None,
            leaders: vec![],
            ..closed_trade()
        }
    }

    fn read(dir: &TempDir, file: &str) -> String {
        fs::read_to_string(dir.path().join(file)).unwrap()
    }

    #[test]
    fn new_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let adapter = CsvResearchAdapter::new(nested.clone()).unwrap();
        assert!(nested.is_dir());
        assert_eq!(adapter.output_dir(), nested.as_path());
    }

    #[test]
    fn trade_tables_flatten_parameters_and_leaders() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        adapter
            .write_trades(TradeTable::WithRuleId, &[closed_trade(), open_trade()])
            .unwrap();

        let text = read(&dir, TRADES_WITH_RULE_ID_FILE);
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "group,ticker,direction,signal_date,entry_date,exit_date,lookback,group_thresh,\
             participation,lagger_max_move,entry_lag,hold_days,ret,leaders,is_open,rule_id,\
             rule_quality_score"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("TELECOM,VZ,-1,2024-03-04,2024-03-05,2024-03-08,5,"));
        assert!(first.contains("\"TMUS,T\""));
        let second = lines.next().unwrap();
        assert!(second.contains("2024-03-05,,5,"));
        assert!(second.ends_with(",,true,,"));
    }

    #[test]
    fn initial_and_scored_tables_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        adapter.write_trades(TradeTable::Initial, &[open_trade()]).unwrap();
        assert!(dir.path().join(INITIAL_TRADES_FILE).exists());
        assert!(!dir.path().join(TRADES_WITH_RULE_ID_FILE).exists());
    }

    #[test]
    fn trade_table_reads_back() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        let trades = vec![closed_trade(), open_trade()];
        adapter.write_trades(TradeTable::Initial, &trades).unwrap();

        let back = read_trades(&dir.path().join(INITIAL_TRADES_FILE)).unwrap();
        assert_eq!(back, trades);
    }

    #[test]
    fn read_trades_rejects_missing_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.csv");
        fs::write(
            &path,
            "group,ticker,direction,signal_date,entry_date,lookback\nTELECOM,VZ,1,2024-03-04,2024-03-05,5\n",
        )
        .unwrap();

        match read_trades(&path) {
            Err(LeadLagError::MissingColumns { table, columns }) => {
                assert_eq!(table, "trades");
                assert!(columns.contains(&"ret".to_string()));
                assert!(columns.contains(&"hold_days".to_string()));
                assert!(!columns.contains(&"lookback".to_string()));
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }

        let header = "group,ticker,direction,signal_date,exit_date,lookback,group_thresh,\
                      participation,lagger_max_move,entry_lag,hold_days,ret";
        fs::write(
            &path,
            format!("{header}\nTELECOM,VZ,1,2024-03-04,2024-03-11,5,0.03,0.7,0.01,1,5,0.02\n"),
        )
        .unwrap();
        match read_trades(&path) {
            Err(LeadLagError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, vec!["entry_date".to_string()]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn read_trades_defaults_optional_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minimal.csv");
        fs::write(
            &path,
            "group,ticker,direction,signal_date,entry_date,lookback,group_thresh,participation,\
             lagger_max_move,entry_lag,hold_days,ret\n\
             TELECOM,VZ,1,2024-03-04,2024-03-05,5,0.03,0.6,0.0225,1,3,\n",
        )
        .unwrap();

        let trades = read_trades(&path).unwrap();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].is_open);
        assert!(trades[0].leaders.is_empty());
        assert_eq!(trades[0].exit_date, None);
    }

    #[test]
    fn sector_reasons_are_joined() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        let row = SectorMetrics {
            group: "TELECOM".into(),
            mean: -0.001,
            win_rate: 0.4,
            volatility: 0.01,
            sharpe: -0.1,
            sortino: -0.2,
            max_dd: -0.3,
            stability: 0.0,
            is_investable: false,
            rejection_reasons: vec!["reason one".into(), "reason two".into()],
        };
        adapter.write_sector_investability(&[row]).unwrap();
        assert!(read(&dir, SECTOR_INVESTABILITY_FILE).contains("false,reason one | reason two"));
    }

    #[test]
    fn stability_absent_windows_are_empty_cells() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        let row = RuleStability {
            key: RuleKey::new("TELECOM", params()),
            n_trades: 1,
            avg_ret_full: 0.01,
            win_rate: 1.0,
            max_dd: 0.01,
            avg_ret_prev_90d: None,
            avg_ret_prev_30d: None,
            rule_id: None,
            rule_quality_score: None,
            is_investable: false,
        };
        adapter.write_rule_stability(&[row]).unwrap();
        let text = read(&dir, RULE_STABILITY_FILE);
        assert!(text.lines().nth(1).unwrap().starts_with(",TELECOM,5,"));
        assert!(text.lines().nth(1).unwrap().ends_with(",,,,false"));
    }

    #[test]
    fn portfolio_writes_curve_and_used_trades() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvResearchAdapter::new(dir.path().to_path_buf()).unwrap();
        let result = PortfolioResult {
            equity_curve: vec![
                EquityPoint { date: date(5), equity: 1.0 },
                EquityPoint { date: date(8), equity: 1.0125 },
            ],
            daily_returns: vec![0.0, 0.0125],
            used_trades: vec![closed_trade()],
            metrics: None,
            daily_open_positions: vec![],
        };
        adapter.write_portfolio(&result).unwrap();

        let curve = read(&dir, EQUITY_CURVE_FILE);
        let lines: Vec<&str> = curve.lines().collect();
        assert_eq!(lines[0], "date,daily_return,equity");
        assert_eq!(lines[2], "2024-03-08,0.0125,1.0125");
        assert_eq!(read(&dir, USED_TRADES_FILE).lines().count(), 2);
    }
}

//! CLI integration tests with real files on disk.
//!
//! Tests cover:
//! - `validate` on good and broken configuration files
//! - `run` end to end: price CSV directory in, research CSV tables out
//! - Command-line overrides of data and output directories
//! - `grid` over the same price directory
//! - `score` re-scoring an exported trade table, including a table with
//!   missing columns

mod common;

use clap::Parser;
use common::*;
use leadlag::adapters::csv_research_adapter::{
    read_trades, EQUITY_CURVE_FILE, INITIAL_TRADES_FILE, RULE_SCORES_FILE, RULE_STABILITY_FILE,
    SECTOR_INVESTABILITY_FILE, TRADES_WITH_RULE_ID_FILE, USED_TRADES_FILE,
};
use leadlag::cli::{self, Cli};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ExitCode doesn't implement PartialEq, so compare the debug form.
fn same_code(actual: ExitCode, expected: u8) -> bool {
    format!("{actual:?}") == format!("{:?}", ExitCode::from(expected))
}

fn run_args(args: &[&str]) -> ExitCode {
    let mut argv = vec!["leadlag"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

fn config_for(data_dir: &Path, output_dir: &Path) -> String {
    format!(
        r#"
[engine]
price_field = HL2
data_dir = {}
output_dir = {}
parallel = true

[universe]
CHEMICALS = AAA,BBB,CCC,DDD
METALS = EEE,FFF,GGG,HHH

[strict_mode]
min_mean = 0.0
min_win_rate = 0.5
min_sharpe = 0.0
min_sortino = 0.0
min_stability = 0.0
min_max_dd = -0.2

[selection]
min_sector_win_rate = 0.51
top_global_rules = 10
top_rules_per_sector = 2

[portfolio]
max_concurrent_trades = 3
"#,
        data_dir.display(),
        output_dir.display()
    )
}

struct Workspace {
    _root: TempDir,
    data: std::path::PathBuf,
    research: std::path::PathBuf,
    config: tempfile::NamedTempFile,
}

fn workspace() -> Workspace {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    let research = root.path().join("research");
    fs::create_dir_all(&data).unwrap();
    write_price_csvs(&data, &cycle_price_port(160));
    let config = write_temp_ini(&config_for(&data, &research));
    Workspace {
        _root: root,
        data,
        research,
        config,
    }
}

mod validate {
    use super::*;

    #[test]
    fn valid_config_succeeds() {
        let ws = workspace();
        let code = run_args(&["validate", "--config", ws.config.path().to_str().unwrap()]);
        assert!(same_code(code, 0));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let code = run_args(&["validate", "--config", "/nonexistent/path/leadlag.ini"]);
        assert!(same_code(code, 2));
    }

    #[test]
    fn empty_universe_is_a_config_error() {
        let file = write_temp_ini("[engine]\nprice_field = HL2\n");
        let code = run_args(&["validate", "--config", file.path().to_str().unwrap()]);
        assert!(same_code(code, 2));
    }

    #[test]
    fn unknown_price_field_is_a_config_error() {
        let file = write_temp_ini("[engine]\nprice_field = OHLC4\n\n[universe]\nA = X,Y\n");
        let code = run_args(&["validate", "--config", file.path().to_str().unwrap()]);
        assert!(same_code(code, 2));
    }
}

mod run {
    use super::*;

    #[test]
    fn writes_every_research_table() {
        let ws = workspace();
        let code = run_args(&["run", "--config", ws.config.path().to_str().unwrap()]);
        assert!(same_code(code, 0));

        for file in [
            INITIAL_TRADES_FILE,
            RULE_SCORES_FILE,
            TRADES_WITH_RULE_ID_FILE,
            RULE_STABILITY_FILE,
            SECTOR_INVESTABILITY_FILE,
        ] {
            assert!(ws.research.join(file).exists(), "{file} missing");
        }
        assert_eq!(
            ws.research.join(EQUITY_CURVE_FILE).exists(),
            ws.research.join(USED_TRADES_FILE).exists()
        );

        let trades = read_trades(&ws.research.join(TRADES_WITH_RULE_ID_FILE)).unwrap();
        assert!(!trades.is_empty());
        assert!(trades
            .iter()
            .filter(|t| t.ret.is_some())
            .all(|t| t.rule_id.is_some()));
    }

    #[test]
    fn output_dir_override_wins() {
        let ws = workspace();
        let elsewhere = TempDir::new().unwrap();
        let out = elsewhere.path().join("out");
        let code = run_args(&[
            "run",
            "--config",
            ws.config.path().to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);
        assert!(same_code(code, 0));
        assert!(out.join(RULE_SCORES_FILE).exists());
        assert!(!ws.research.join(RULE_SCORES_FILE).exists());
    }

    #[test]
    fn empty_data_dir_is_a_price_error() {
        let ws = workspace();
        let empty = TempDir::new().unwrap();
        let code = run_args(&[
            "run",
            "--config",
            ws.config.path().to_str().unwrap(),
            "--data-dir",
            empty.path().to_str().unwrap(),
        ]);
        assert!(same_code(code, 3));
    }

    #[test]
    fn analysis_date_limits_the_trade_table() {
        let ws = workspace();
        let code = run_args(&[
            "run",
            "--config",
            ws.config.path().to_str().unwrap(),
            "--analysis-date",
            "2024-04-30",
        ]);
        assert!(same_code(code, 0));

        let cutoff = date(2024, 4, 30);
        let trades = read_trades(&ws.research.join(INITIAL_TRADES_FILE)).unwrap();
        assert!(trades.iter().all(|t| t.entry_date <= cutoff));
    }
}

mod grid {
    use super::*;

    #[test]
    fn grid_reads_the_price_directory() {
        let ws = workspace();
        let code = run_args(&[
            "grid",
            "--config",
            ws.config.path().to_str().unwrap(),
            "--data-dir",
            ws.data.to_str().unwrap(),
        ]);
        assert!(same_code(code, 0));
        assert!(!ws.research.exists());
    }
}

mod score {
    use super::*;

    #[test]
    fn rescoring_matches_the_run() {
        let ws = workspace();
        assert!(same_code(
            run_args(&["run", "--config", ws.config.path().to_str().unwrap()]),
            0
        ));

        let rescored = TempDir::new().unwrap();
        let code = run_args(&[
            "score",
            "--trades",
            ws.research.join(INITIAL_TRADES_FILE).to_str().unwrap(),
            "--output-dir",
            rescored.path().to_str().unwrap(),
        ]);
        assert!(same_code(code, 0));

        let original = fs::read_to_string(ws.research.join(RULE_SCORES_FILE)).unwrap();
        let again = fs::read_to_string(rescored.path().join(RULE_SCORES_FILE)).unwrap();
        assert_eq!(original, again);
    }

    #[test]
    fn missing_columns_exit_with_contract_code() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        fs::write(&path, "group,ticker,ret\nTELECOM,VZ,0.01\n").unwrap();
        let code = run_args(&[
            "score",
            "--trades",
            path.to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);
        assert!(same_code(code, 4));
        assert!(!dir.path().join(RULE_SCORES_FILE).exists());
    }

    #[test]
    fn missing_entry_date_exits_with_contract_code() {
        let ws = workspace();
        assert!(same_code(
            run_args(&["run", "--config", ws.config.path().to_str().unwrap()]),
            0
        ));

        // Drop the entry_date column from an exported table.
        let exported = fs::read_to_string(ws.research.join(INITIAL_TRADES_FILE)).unwrap();
        let mut rdr = csv::Reader::from_reader(exported.as_bytes());
        let header = rdr.headers().unwrap().clone();
        let drop = header.iter().position(|h| h == "entry_date").unwrap();
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(header.iter().enumerate().filter(|(i, _)| *i != drop).map(|(_, h)| h))
            .unwrap();
        for record in rdr.records() {
            let record = record.unwrap();
            wtr.write_record(record.iter().enumerate().filter(|(i, _)| *i != drop).map(|(_, f)| f))
                .unwrap();
        }
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        fs::write(&path, wtr.into_inner().unwrap()).unwrap();

        let code = run_args(&[
            "score",
            "--trades",
            path.to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);
        assert!(same_code(code, 4));
    }
}

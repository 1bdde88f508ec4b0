//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_research_adapter::{read_trades, CsvResearchAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{validate_config, RunSettings, DEFAULT_OUTPUT_DIR};
use crate::domain::error::LeadLagError;
use crate::domain::grid::build_sector_param_grid;
use crate::domain::pipeline::{load_price_table, prepare_series, run_pipeline, PipelineOutput};
use crate::domain::portfolio::PortfolioResult;
use crate::domain::scoring::score_rules;
use crate::domain::sector::SectorMetrics;
use crate::domain::stability::RuleStability;
use crate::domain::summary::{rule_narrative, SectorPerformance, TradeSummary};
use crate::ports::price_port::PricePort;
use crate::ports::research_port::ResearchPort;

#[derive(Parser, Debug)]
#[command(name = "leadlag", about = "Leader/lagger sector momentum research")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full research pipeline
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [engine] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override [engine] output_dir
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Ignore prices after this date (YYYY-MM-DD)
        #[arg(long)]
        analysis_date: Option<NaiveDate>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the adaptive parameter grid per group
    Grid {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Score an exported trade table
    Score {
        #[arg(short, long)]
        trades: PathBuf,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

/// Log to stderr; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            data_dir,
            output_dir,
            analysis_date,
        } => run_research(&config, data_dir, output_dir, analysis_date),
        Command::Validate { config } => run_validate(&config),
        Command::Grid { config, data_dir } => run_grid(&config, data_dir),
        Command::Score { trades, output_dir } => run_score(&trades, output_dir),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = LeadLagError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_settings(path: &Path) -> Result<RunSettings, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_config(&adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn run_research(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    analysis_date: Option<NaiveDate>,
) -> ExitCode {
    let mut settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if let Some(dir) = data_dir {
        settings.engine.data_dir = dir;
    }
    if let Some(dir) = output_dir {
        settings.engine.output_dir = dir;
    }
    if analysis_date.is_some() {
        settings.engine.analysis_date = analysis_date;
    }

    eprintln!(
        "Running {} groups, {} tickers, price field {}",
        settings.universe.count(),
        settings.universe.all_tickers().len(),
        settings.engine.price_field
    );

    let prices = CsvAdapter::new(settings.engine.data_dir.clone());
    let research = match CsvResearchAdapter::new(settings.engine.output_dir.clone()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let output = match run_pipeline(&prices, Some(&research as &dyn ResearchPort), &settings) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_run_summary(&output);
    eprintln!(
        "\nResearch tables written to: {}",
        research.output_dir().display()
    );
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let engine = &settings.engine;
    eprintln!("\nEngine:");
    eprintln!("  price_field:   {}", engine.price_field);
    eprintln!("  data_dir:      {}", engine.data_dir.display());
    eprintln!("  output_dir:    {}", engine.output_dir.display());
    match engine.analysis_date {
        Some(d) => eprintln!("  analysis_date: {}", d),
        None => eprintln!("  analysis_date: (latest)"),
    }
    eprintln!("  parallel:      {}", engine.parallel);

    eprintln!("\nUniverse:");
    for (group, tickers) in settings.universe.groups() {
        eprintln!("  {}: {}", group, tickers.join(", "));
    }

    match CsvAdapter::new(engine.data_dir.clone()).list_symbols() {
        Ok(available) => {
            let missing: Vec<String> = settings
                .universe
                .all_tickers()
                .into_iter()
                .filter(|t| !available.contains(t))
                .collect();
            if !missing.is_empty() {
                eprintln!("  no price file for: {}", missing.join(", "));
            }
        }
        Err(e) => eprintln!("  warning: cannot list {}: {e}", engine.data_dir.display()),
    }

    let t = &settings.strict_mode;
    eprintln!("\nStrict mode:");
    eprintln!(
        "  mean >= {}, win rate >= {}, sharpe >= {}, sortino >= {}, stability >= {}, max dd >= {}",
        t.min_mean, t.min_win_rate, t.min_sharpe, t.min_sortino, t.min_stability, t.min_max_dd
    );
    eprintln!(
        "\nPortfolio: max {} concurrent trades, top {} global rules",
        settings.max_concurrent_trades, settings.selection.top_global_rules
    );

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_grid(config_path: &Path, data_dir: Option<PathBuf>) -> ExitCode {
    let mut settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if let Some(dir) = data_dir {
        settings.engine.data_dir = dir;
    }

    let prices = CsvAdapter::new(settings.engine.data_dir.clone());
    let series = match load_price_table(&prices, &settings.universe)
        .and_then(|table| prepare_series(&table, &settings))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let grid = build_sector_param_grid(&series, &settings.universe);
    if grid.is_empty() {
        eprintln!("No group has enough history for a parameter grid.");
        return ExitCode::SUCCESS;
    }

    eprintln!("\n=== Adaptive Grid ===");
    for g in grid.groups() {
        eprintln!(
            "  {}: vol {:.4}, dispersion {:.4}, {} parameter sets",
            g.group,
            g.fingerprint.volatility,
            g.fingerprint.dispersion,
            g.params.len()
        );
        eprintln!("    lookbacks:     {:?}", g.lookbacks);
        eprintln!("    holds:         {:?}", g.holds);
        eprintln!("    thresholds:    {:?}", g.group_thresholds);
        eprintln!("    participation: {:?}", g.participations);
        eprintln!("    lagger max:    {:?}", g.lagger_max_moves);
    }
    ExitCode::SUCCESS
}

fn run_score(trades_path: &Path, output_dir: Option<PathBuf>) -> ExitCode {
    eprintln!("Reading trades from {}", trades_path.display());
    let trades = match read_trades(trades_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let scores = score_rules(&trades, true);
    let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let written = CsvResearchAdapter::new(output_dir).and_then(|r| r.write_rule_scores(&scores));
    if let Err(e) = written {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("Scored {} rules from {} trades", scores.len(), trades.len());
    ExitCode::SUCCESS
}

fn print_run_summary(output: &PipelineOutput) {
    eprintln!("\n=== Research Run ===");
    eprintln!("Groups with a grid: {}", output.grid.groups().len());
    eprintln!("Signals:            {}", output.n_signals);
    eprintln!("Trades:             {}", output.trades.len());
    eprintln!("Rules scored:       {}", output.scores.len());

    print_sectors(&output.sectors);
    print_top_rules(&output.top_rules);
    print_best_rules_per_sector(&output.best_rules_per_sector);
    if let Some(summary) = &output.trade_summary {
        print_trade_summary(summary);
    }
    print_sector_performance(&output.sector_performance);
    print_portfolio(&output.portfolio);
}

fn print_sectors(sectors: &[SectorMetrics]) {
    let mut investable: Vec<&SectorMetrics> = sectors.iter().filter(|s| s.is_investable).collect();
    if investable.is_empty() {
        eprintln!("\nNo investable sectors.");
        return;
    }
    investable.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));

    eprintln!("\n=== Investable Sectors ===");
    for s in investable {
        eprintln!(
            "  {}:  win rate {:.1}%, mean {:.3}%, sharpe {:.2}, max dd {:.1}%",
            s.group,
            s.win_rate * 100.0,
            s.mean * 100.0,
            s.sharpe,
            s.max_dd * 100.0,
        );
    }
}

fn print_top_rules(rules: &[RuleStability]) {
    if rules.is_empty() {
        eprintln!("\nNo rules selected.");
        return;
    }
    eprintln!("\n=== Top Rules ===");
    for (i, r) in rules.iter().enumerate() {
        let id = r.rule_id.as_ref().map_or("-", |id| id.as_str());
        eprintln!(
            "  {}. {} [{}] quality {:.3}, {} trades, avg {:.2}%, win rate {:.1}%",
            i + 1,
            id,
            r.key.group,
            r.rule_quality_score.unwrap_or(0.0),
            r.n_trades,
            r.avg_ret_full * 100.0,
            r.win_rate * 100.0,
        );
        eprintln!("     {}", rule_narrative(&r.key));
    }
}

fn print_best_rules_per_sector(rules: &[RuleStability]) {
    if rules.is_empty() {
        return;
    }
    eprintln!("\n=== Best Rules per Sector ===");
    let mut current = "";
    for r in rules {
        if r.key.group != current {
            current = r.key.group.as_str();
            eprintln!("  {}:", current);
        }
        let prev_90d = r
            .avg_ret_prev_90d
            .map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0));
        eprintln!(
            "    {} quality {:.3}, {} trades, avg {:.2}%, prev 90d {}",
            r.rule_id.as_ref().map_or("-", |id| id.as_str()),
            r.rule_quality_score.unwrap_or(0.0),
            r.n_trades,
            r.avg_ret_full * 100.0,
            prev_90d,
        );
    }
}

fn print_trade_summary(s: &TradeSummary) {
    eprintln!("\n=== Trade Summary ===");
    eprintln!("Closed Trades:    {}", s.n_trades);
    eprintln!("Win Rate:         {:.1}%", s.win_rate * 100.0);
    eprintln!("Average Return:   {:.3}%", s.avg_ret * 100.0);
    eprintln!("Median Return:    {:.3}%", s.median_ret * 100.0);
    match s.profit_factor {
        Some(pf) => eprintln!("Profit Factor:    {:.2}", pf),
        None => eprintln!("Profit Factor:    n/a"),
    }
    eprintln!("Expectancy:       {:.3}%", s.expectancy * 100.0);
    eprintln!("Summed Return:    {:.2}%", s.total_ret * 100.0);
}

fn print_sector_performance(rows: &[SectorPerformance]) {
    if rows.is_empty() {
        return;
    }
    eprintln!("\n=== Sector Leaderboard ===");
    for r in rows {
        let sharpe = r
            .sharpe
            .map_or_else(|| "n/a".to_string(), |s| format!("{:.2}", s));
        eprintln!(
            "  {}:  {} trades, mean {:.3}%, {:.1}% win rate, max dd {:.1}%, sharpe {}",
            r.group,
            r.count,
            r.mean_pct,
            r.win_rate * 100.0,
            r.max_drawdown * 100.0,
            sharpe,
        );
    }
}

fn print_portfolio(result: &PortfolioResult) {
    let Some(m) = &result.metrics else {
        eprintln!("\nPortfolio: no closed trades to simulate.");
        return;
    };

    eprintln!("\n=== Portfolio ===");
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", m.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", m.volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Trades Used:      {}", m.n_trades);
    eprintln!("Avg Concurrent:   {:.2}", m.avg_concurrent_trades);

    eprintln!("\n=== Portfolio Trades ===");
    for t in &result.used_trades {
        let leaders = t.leaders.join(", ");
        let (exit, ret, change) = match (t.exit_date, t.ret) {
            (Some(exit), Some(r)) => (
                exit.to_string(),
                format!("{:+.2}%", r * 100.0),
                result
                    .change_since_first(exit)
                    .map_or_else(|| "n/a".to_string(), |c| format!("{:+.2}%", c * 100.0)),
            ),
            _ => ("OPEN".to_string(), "n/a".to_string(), "n/a".to_string()),
        };
        eprintln!(
            "  {:<10} {:<25.25} {:>6} {:>2} {} -> {:<10} {:>8} {:>8}",
            t.rule_id.as_ref().map_or("-", |id| id.as_str()),
            leaders,
            t.ticker,
            t.direction.sign(),
            t.entry_date,
            exit,
            ret,
            change,
        );
    }
}

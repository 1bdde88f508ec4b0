//! End-to-end research run: prices through the portfolio replay.

use tracing::{info, warn};

use super::config_validation::RunSettings;
use super::error::LeadLagError;
use super::grid::{build_sector_param_grid, SectorGrid};
use super::portfolio::{run_portfolio_for_rules, PortfolioResult};
use super::scoring::{score_rules, RuleScore};
use super::sector::{compute_investable_sectors, SectorMetrics};
use super::selection::{select_best_rules_per_sector, select_top_global_rules};
use super::series::{NormalizedSeries, PriceTable};
use super::signal::detect_lag_signals;
use super::stability::{compute_rule_stability, RuleStability};
use super::summary::{summarize_sector_performance, SectorPerformance, TradeSummary};
use super::trade::{attach_rule_scores, generate_trades, Trade};
use super::universe::Universe;
use crate::ports::price_port::PricePort;
use crate::ports::research_port::{ResearchPort, TradeTable};

/// Everything a run produces, for console reporting.
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub grid: SectorGrid,
    pub n_signals: usize,
    pub trades: Vec<Trade>,
    pub scores: Vec<RuleScore>,
    pub stability: Vec<RuleStability>,
    pub sectors: Vec<SectorMetrics>,
    pub top_rules: Vec<RuleStability>,
    pub best_rules_per_sector: Vec<RuleStability>,
    pub portfolio: PortfolioResult,
    pub trade_summary: Option<TradeSummary>,
    pub sector_performance: Vec<SectorPerformance>,
}

/// Fetch every universe ticker. Tickers the provider has no data for are
/// dropped; any other provider failure aborts.
pub fn load_price_table(prices: &dyn PricePort, universe: &Universe) -> Result<PriceTable, LeadLagError> {
    let mut series = Vec::new();
    for ticker in universe.all_tickers() {
        match prices.fetch_ohlcv(&ticker) {
            Ok(bars) if bars.is_empty() => warn!(ticker = %ticker, "empty price history, skipping"),
            Ok(bars) => series.push((ticker, bars)),
            Err(LeadLagError::NoData { .. }) => warn!(ticker = %ticker, "no price data, skipping"),
            Err(e) => return Err(e),
        }
    }
    let table = PriceTable::from_bars(series);
    if table.is_empty() {
        return Err(LeadLagError::PriceData {
            reason: "no usable price data for any universe ticker".into(),
        });
    }
    Ok(table)
}

/// Price table to normalized series, honouring the analysis cut-off.
pub fn prepare_series(table: &PriceTable, settings: &RunSettings) -> Result<NormalizedSeries, LeadLagError> {
    let table = match settings.engine.analysis_date {
        Some(cutoff) => table.truncate_to(cutoff),
        None => table.clone(),
    };
    if table.is_empty() {
        return Err(LeadLagError::PriceData {
            reason: "no prices on or before the analysis date".into(),
        });
    }
    let series = NormalizedSeries::from_prices(&table, settings.engine.price_field);
    info!(
        dates = series.len(),
        tickers = series.tickers().len(),
        field = %settings.engine.price_field,
        "normalized price series"
    );
    Ok(series)
}

/// Run every stage; tables are handed to `research` as they are produced.
pub fn run_pipeline(
    prices: &dyn PricePort,
    research: Option<&dyn ResearchPort>,
    settings: &RunSettings,
) -> Result<PipelineOutput, LeadLagError> {
    let parallel = settings.engine.parallel;
    let table = load_price_table(prices, &settings.universe)?;
    let series = prepare_series(&table, settings)?;

    let grid = build_sector_param_grid(&series, &settings.universe);
    let signals = detect_lag_signals(&series, &settings.universe, &grid, parallel);

    let initial = generate_trades(&series, &signals);
    if let Some(sink) = research {
        sink.write_trades(TradeTable::Initial, &initial)?;
    }

    let scores = score_rules(&initial, parallel);
    if let Some(sink) = research {
        sink.write_rule_scores(&scores)?;
    }

    let trades = attach_rule_scores(initial, &scores);
    if let Some(sink) = research {
        sink.write_trades(TradeTable::WithRuleId, &trades)?;
    }

    let stability = compute_rule_stability(&trades, &scores, parallel);
    if let Some(sink) = research {
        sink.write_rule_stability(&stability)?;
    }

    let sectors = compute_investable_sectors(&trades, &settings.strict_mode);
    if let Some(sink) = research {
        sink.write_sector_investability(&sectors)?;
    }

    let selection = &settings.selection;
    let top_rules = select_top_global_rules(
        &stability,
        &sectors,
        selection.min_sector_win_rate,
        selection.top_global_rules,
    );
    let best_rules_per_sector =
        select_best_rules_per_sector(&stability, &sectors, selection.top_rules_per_sector);

    let portfolio = if top_rules.is_empty() {
        info!("no rules selected, skipping portfolio replay");
        PortfolioResult::default()
    } else {
        run_portfolio_for_rules(&trades, &top_rules, settings.max_concurrent_trades)
    };
    if let (Some(sink), false) = (research, portfolio.is_empty()) {
        sink.write_portfolio(&portfolio)?;
    }

    Ok(PipelineOutput {
        n_signals: signals.len(),
        trade_summary: TradeSummary::from_trades(&trades),
        sector_performance: summarize_sector_performance(&trades),
        grid,
        trades,
        scores,
        stability,
        sectors,
        top_rules,
        best_rules_per_sector,
        portfolio,
    })
}

//! Research output port trait.

use crate::domain::error::LeadLagError;
use crate::domain::portfolio::PortfolioResult;
use crate::domain::scoring::RuleScore;
use crate::domain::sector::SectorMetrics;
use crate::domain::stability::RuleStability;
use crate::domain::trade::Trade;

/// Which trade table is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeTable {
    /// First pass, before rule metadata is attached.
    Initial,
    /// Second pass, with rule id and quality score.
    WithRuleId,
}

/// Sink for the tables a pipeline run produces.
pub trait ResearchPort {
    fn write_trades(&self, table: TradeTable, trades: &[Trade]) -> Result<(), LeadLagError>;
    fn write_rule_scores(&self, scores: &[RuleScore]) -> Result<(), LeadLagError>;
    fn write_rule_stability(&self, rows: &[RuleStability]) -> Result<(), LeadLagError>;
    fn write_sector_investability(&self, rows: &[SectorMetrics]) -> Result<(), LeadLagError>;
    /// Equity curve and used trades.
    fn write_portfolio(&self, result: &PortfolioResult) -> Result<(), LeadLagError>;
}

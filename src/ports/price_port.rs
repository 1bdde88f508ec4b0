//! Price data port trait.

use crate::domain::error::LeadLagError;
use crate::domain::ohlcv::OhlcvBar;

/// Source of finished, gap-free daily OHLCV history.
pub trait PricePort {
    /// Full bar history for one symbol, ordered by date.
    ///
    /// Returns [`LeadLagError::NoData`] when the provider has nothing for
    /// the symbol.
    fn fetch_ohlcv(&self, symbol: &str) -> Result<Vec<OhlcvBar>, LeadLagError>;

    fn list_symbols(&self) -> Result<Vec<String>, LeadLagError>;
}

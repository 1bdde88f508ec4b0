//! Domain error types.

/// Top-level error type for leadlag.
#[derive(Debug, thiserror::Error)]
pub enum LeadLagError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error("unknown price field: {0} (expected High, Low, Close, HL2 or HLC3)")]
    UnknownPriceField(String),

    #[error("{table}: missing required columns: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("export error: {reason}")]
    Export { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&LeadLagError> for std::process::ExitCode {
    fn from(err: &LeadLagError) -> Self {
        let code: u8 = match err {
            LeadLagError::Io(_) | LeadLagError::Export { .. } => 1,
            LeadLagError::ConfigParse { .. }
            | LeadLagError::ConfigMissing { .. }
            | LeadLagError::ConfigInvalid { .. } => 2,
            LeadLagError::NoData { .. }
            | LeadLagError::PriceData { .. }
            | LeadLagError::UnknownPriceField(_) => 3,
            LeadLagError::MissingColumns { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

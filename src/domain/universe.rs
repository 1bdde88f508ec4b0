//! Group (sector) universe: an ordered mapping of group name to tickers.
//!
//! Parsed from the `[universe]` configuration section, one key per group
//! with a comma-separated ticker list.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    groups: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("duplicate group: {0}")]
    DuplicateGroup(String),

    #[error("universe has no groups")]
    Empty,
}

impl Universe {
    pub fn new(groups: Vec<(String, Vec<String>)>) -> Result<Self, UniverseError> {
        if groups.is_empty() {
            return Err(UniverseError::Empty);
        }
        let mut seen = HashSet::new();
        for (name, _) in &groups {
            if !seen.insert(name.as_str()) {
                return Err(UniverseError::DuplicateGroup(name.clone()));
            }
        }
        Ok(Self { groups })
    }

    /// Build from `(group, "T1,T2,...")` pairs in configuration order.
    pub fn from_entries<I>(entries: I) -> Result<Self, UniverseError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let groups = entries
            .into_iter()
            .map(|(group, list)| parse_tickers(&list).map(|tickers| (group, tickers)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(groups)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups.iter().map(|(g, t)| (g.as_str(), t.as_slice()))
    }

    pub fn tickers(&self, group: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, t)| t.as_slice())
    }

    pub fn count(&self) -> usize {
        self.groups.len()
    }

    /// Every distinct ticker, first occurrence order.
    pub fn all_tickers(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.groups
            .iter()
            .flat_map(|(_, t)| t.iter())
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect()
    }
}

/// Parse a comma-separated ticker list; tickers are trimmed and upper-cased.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

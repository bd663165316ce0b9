//! Tradable asset list parsing.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in asset list")]
    EmptyToken,

    #[error("duplicate asset: {0}")]
    DuplicateAsset(String),

    #[error("{0} is the quote asset and cannot be traded against itself")]
    QuoteAsset(String),
}

/// Parse a comma-separated asset list, uppercasing each name.
pub fn parse_assets(input: &str, quote_asset: &str) -> Result<Vec<String>, UniverseError> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let asset = trimmed.to_uppercase();
        if asset == quote_asset {
            return Err(UniverseError::QuoteAsset(asset));
        }
        if !seen.insert(asset.clone()) {
            return Err(UniverseError::DuplicateAsset(asset));
        }
        assets.push(asset);
    }

    Ok(assets)
}

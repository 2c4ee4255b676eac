//! Engine-wide configuration.

use std::collections::HashSet;

use crate::order::Symbol;

/// Tunables for a `MatchingEngine` instance. Constructed once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// If `Some`, only these symbols may be submitted against; orders for
    /// any other symbol are rejected with `ValidationError::UnsupportedSymbol`.
    /// If `None`, a book is created lazily for the first symbol seen.
    pub supported_symbols: Option<HashSet<Symbol>>,
    /// Default number of price levels returned by `get_depth` when the
    /// caller doesn't specify one.
    pub default_depth_levels: usize,
    /// Upper bound on the `levels` a caller may request from `get_depth`.
    pub max_depth_levels: usize,
    /// Maximum number of recent trades retained per symbol.
    pub recent_trades_capacity: usize,
    /// Upper bound on the `limit` a caller may request from
    /// `get_recent_trades`.
    pub max_recent_trades_query: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supported_symbols: None,
            default_depth_levels: 10,
            max_depth_levels: 100,
            recent_trades_capacity: 1000,
            max_recent_trades_query: 1000,
        }
    }
}

impl EngineConfig {
    pub fn with_supported_symbols(mut self, symbols: impl IntoIterator<Item = Symbol>) -> Self {
        self.supported_symbols = Some(symbols.into_iter().collect());
        self
    }

    pub fn with_default_depth_levels(mut self, levels: usize) -> Self {
        self.default_depth_levels = levels;
        self
    }

    pub fn with_max_depth_levels(mut self, levels: usize) -> Self {
        self.max_depth_levels = levels;
        self
    }

    pub fn with_recent_trades_capacity(mut self, capacity: usize) -> Self {
        self.recent_trades_capacity = capacity;
        self
    }

    pub fn with_max_recent_trades_query(mut self, limit: usize) -> Self {
        self.max_recent_trades_query = limit;
        self
    }

    pub fn allows_symbol(&self, symbol: &str) -> bool {
        match &self.supported_symbols {
            Some(symbols) => symbols.contains(symbol),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_allows_any_symbol() {
        let config = EngineConfig::default();
        assert!(config.allows_symbol("BTC-USDT"));
    }

    #[test]
    fn restricted_config_rejects_unknown_symbols() {
        let config = EngineConfig::default().with_supported_symbols(["BTC-USDT".to_string()]);
        assert!(config.allows_symbol("BTC-USDT"));
        assert!(!config.allows_symbol("ETH-USDT"));
    }
}

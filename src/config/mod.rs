//! Application Configuration
//!
//! Loaded from environment variables (prefix `SPOTMATCH_`) with development
//! defaults. Symbols are configured as comma-separated
//! `SYMBOL:price_scale:quantity_scale` entries, e.g.
//! `BTC-USDT:2:6,ETH-USDT:2:6`.

use anyhow::{bail, Context};
use config::{Config, Environment};
use serde::Deserialize;

use crate::engine::SymbolSpec;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    /// Bounded recent-trades tail size
    pub recent_trades_cap: usize,
    /// Snapshot depth when a request does not specify one
    pub default_depth: usize,
    /// Registered trading pairs with scales
    pub symbols: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::builder()
            .set_default("environment", "development")?
            .set_default("port", 8080)?
            .set_default("recent_trades_cap", 1000)?
            .set_default("default_depth", 20)?
            .set_default("symbols", "BTC-USDT:2:6,ETH-USDT:2:6")?
            .add_source(Environment::with_prefix("SPOTMATCH"))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.symbol_specs()?;
        Ok(config)
    }

    /// Parse the configured trading pairs
    pub fn symbol_specs(&self) -> anyhow::Result<Vec<SymbolSpec>> {
        let mut specs = Vec::new();
        for entry in self.symbols.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = entry.split(':').collect();
            let [symbol, price_scale, quantity_scale] = parts.as_slice() else {
                bail!("bad symbol entry {entry:?}, expected SYMBOL:price_scale:quantity_scale");
            };
            let price_scale: u32 = price_scale
                .parse()
                .with_context(|| format!("bad price scale in {entry:?}"))?;
            let quantity_scale: u32 = quantity_scale
                .parse()
                .with_context(|| format!("bad quantity scale in {entry:?}"))?;
            if price_scale > 8 {
                bail!("price scale {price_scale} for {symbol} exceeds the supported 8 decimal places");
            }
            specs.push(SymbolSpec {
                symbol: symbol.to_string(),
                price_scale,
                quantity_scale,
            });
        }
        if specs.is_empty() {
            bail!("no trading pairs configured");
        }
        Ok(specs)
    }

    pub fn get_trading_pairs(&self) -> Vec<String> {
        self.symbol_specs()
            .map(|specs| specs.into_iter().map(|s| s.symbol).collect())
            .unwrap_or_default()
    }

    pub fn is_valid_trading_pair(&self, symbol: &str) -> bool {
        self.get_trading_pairs().iter().any(|s| s == symbol)
    }
}

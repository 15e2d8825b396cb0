//! Engine configuration loading.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults
//! 2. JSON file named by `STOCKLEDGER_CONFIG`
//! 3. per-role env vars (`STOCKLEDGER_CASH_ACCOUNT`, ...),
//!    `STOCKLEDGER_STOCK_RETRIES` and `STOCKLEDGER_RECEIPT_CACHE`

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use stockledger_accounting::{AccountMapping, AccountRole};
use stockledger_core::AccountId;

pub const CONFIG_PATH_ENV: &str = "STOCKLEDGER_CONFIG";
pub const STOCK_RETRIES_ENV: &str = "STOCKLEDGER_STOCK_RETRIES";
pub const RECEIPT_CACHE_ENV: &str = "STOCKLEDGER_RECEIPT_CACHE";

pub const DEFAULT_STOCK_RETRIES: u32 = 5;
pub const DEFAULT_RECEIPT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Logical role → account id.
    pub accounts: AccountMapping,
    /// Re-read/re-check attempts after losing a quantity compare-and-swap.
    pub max_stock_retries: u32,
    /// Committed receipts kept for idempotent replay; oldest are evicted.
    pub receipt_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accounts: AccountMapping::default(),
            max_stock_retries: DEFAULT_STOCK_RETRIES,
            receipt_cache_capacity: DEFAULT_RECEIPT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new(accounts: AccountMapping) -> Self {
        Self {
            accounts,
            ..Self::default()
        }
    }

    pub fn with_max_stock_retries(mut self, retries: u32) -> Self {
        self.max_stock_retries = retries;
        self
    }

    pub fn with_receipt_cache_capacity(mut self, capacity: usize) -> Self {
        self.receipt_cache_capacity = capacity;
        self
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid engine configuration JSON")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine configuration {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for role in AccountRole::ALL {
            let key = role_env_var(role);
            if let Some(raw) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                let id: AccountId = raw
                    .parse()
                    .with_context(|| format!("{key} is not a valid account id"))?;
                self.accounts.set(role, id);
            }
        }

        if let Some(raw) = lookup(STOCK_RETRIES_ENV).filter(|v| !v.trim().is_empty()) {
            self.max_stock_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{STOCK_RETRIES_ENV} must be a non-negative integer"))?;
        }

        if let Some(raw) = lookup(RECEIPT_CACHE_ENV).filter(|v| !v.trim().is_empty()) {
            self.receipt_cache_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{RECEIPT_CACHE_ENV} must be a non-negative integer"))?;
        }
        Ok(())
    }
}

/// `STOCKLEDGER_<ROLE>_ACCOUNT`
pub fn role_env_var(role: AccountRole) -> String {
    format!("STOCKLEDGER_{}_ACCOUNT", role.as_str().to_ascii_uppercase())
}

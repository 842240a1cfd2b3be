/// Grid configuration
///
/// Loaded from JSON or from `DYNTABLE_*` environment variables.

use crate::error::{GridError, Result};
use crate::history::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    /// Rows per page when a grid is first loaded
    pub page_size: usize,
    /// Page sizes offered to the user
    pub page_size_options: Vec<usize>,
    /// Maximum undo snapshots kept per session
    pub history_limit: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: vec![10, 20, 50, 100],
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl GridConfig {
    /// Defaults overridden by `DYNTABLE_PAGE_SIZE` and `DYNTABLE_HISTORY_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = GridConfig::default();
        if let Some(raw) = lookup("DYNTABLE_PAGE_SIZE") {
            config.page_size = parse_count("DYNTABLE_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("DYNTABLE_HISTORY_LIMIT") {
            config.history_limit = parse_count("DYNTABLE_HISTORY_LIMIT", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: GridConfig = serde_json::from_str(json)
            .map_err(|e| GridError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(GridError::InvalidPageSize);
        }
        if self.history_limit == 0 {
            return Err(GridError::InvalidConfig(
                "history limit must be at least 1".to_string(),
            ));
        }
        if self.page_size_options.contains(&0) {
            return Err(GridError::InvalidConfig(
                "page size options must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_count(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| GridError::InvalidConfig(format!("{} must be a number, got '{}'", name, raw)))
}

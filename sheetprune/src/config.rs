//! Engine configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::removal::RemovalOptions;

/// Sheet removed when the caller does not name one.
pub const DEFAULT_SHEET_NAME: &str = "Input";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration error: {0}")]
    Invalid(String),
}

/// Which implementation performs the removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// In-process package editing
    #[default]
    Package,
    /// Delegate to an external program
    External,
}

/// External program used by [`StrategyKind::External`].
///
/// The input package is written to its stdin and the result read from its
/// stdout. `{sheet}` in any argument is replaced with the sheet name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommandConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Main engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sheet to remove when none is given explicitly
    pub sheet_name: String,
    pub strategy: StrategyKind,
    /// Re-open the result and compare formatting of every surviving sheet
    pub verify: bool,
    /// Shift `localSheetId` and workbook view indices after a removal
    pub reindex_sheet_references: bool,
    /// Drop `[Content_Types].xml` overrides for deleted parts
    pub prune_content_types: bool,
    /// Delete `xl/calcChain.xml` when it has entries for the removed sheet
    pub drop_stale_calc_chain: bool,
    pub external: Option<ExternalCommandConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            strategy: StrategyKind::Package,
            verify: false,
            reindex_sheet_references: true,
            prune_content_types: false,
            drop_stale_calc_chain: true,
            external: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheet_name.is_empty() {
            return Err(ConfigError::Invalid("sheet_name must not be empty".into()));
        }
        if self.strategy == StrategyKind::External {
            match &self.external {
                None => {
                    return Err(ConfigError::Invalid(
                        "strategy = \"external\" requires an [external] section".into(),
                    ));
                }
                Some(external) if external.program.trim().is_empty() => {
                    return Err(ConfigError::Invalid(
                        "[external] program must not be empty".into(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn removal_options(&self) -> RemovalOptions {
        RemovalOptions {
            reindex_sheet_references: self.reindex_sheet_references,
            prune_content_types: self.prune_content_types,
            drop_stale_calc_chain: self.drop_stale_calc_chain,
            verify: self.verify,
        }
    }
}

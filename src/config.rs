//! Calculator configuration
//!
//! Loaded from a TOML file; every field is optional and a missing file means
//! defaults.
//!
//! ```toml
//! cycle_preference = ["HeavyOilCracking"]
//!
//! [overrides]
//! HeavyOil = "AdvancedOilProcessing"
//!
//! [facilities.AssemblingMachine]
//! tiers = [{ name = "AssemblingMachine2", speed = 0.75 }]
//!
//! [logistics]
//! pipe_throughput = 1000.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::calculator::ResolveOptions;
use crate::facility::{self, FacilityTiers, Logistics};
use crate::selector::Overrides;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalculatorConfig {
    /// Item -> recipe identifier.
    pub overrides: Overrides,
    /// Recipes kept running first when a cycle leaves a choice.
    pub cycle_preference: Vec<String>,
    /// Replaces the built-in tiers of the facilities it names.
    pub facilities: BTreeMap<String, FacilityTiers>,
    pub logistics: Logistics,
}

impl CalculatorConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::from_toml_file(path)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, facility) in &self.facilities {
            if facility.tiers.is_empty() {
                return Err(ConfigError::Invalid(format!("facility {name} has no tiers")));
            }
            if let Some(tier) = facility.tiers.iter().find(|t| !(t.speed > 0.0)) {
                return Err(ConfigError::Invalid(format!(
                    "tier {} of {name} needs a positive speed",
                    tier.name
                )));
            }
        }
        if !(self.logistics.pipe_throughput > 0.0) {
            return Err(ConfigError::Invalid("pipe_throughput must be positive".into()));
        }
        if let Some(belt) = self.logistics.belts.iter().find(|b| !(b.items_per_second > 0.0)) {
            return Err(ConfigError::Invalid(format!(
                "belt {} needs a positive throughput",
                belt.name
            )));
        }
        Ok(())
    }

    /// Built-in facilities with this config's entries laid over them.
    pub fn facility_table(&self) -> BTreeMap<String, FacilityTiers> {
        let mut table = facility::default_facilities();
        table.extend(self.facilities.clone());
        table
    }

    /// Resolution options with `extra` overrides taking precedence over the
    /// file's.
    pub fn resolve_options(
        &self,
        extra: impl IntoIterator<Item = (String, String)>,
        prefer: impl IntoIterator<Item = String>,
    ) -> ResolveOptions {
        let mut overrides = self.overrides.clone();
        overrides.extend(extra);
        let mut cycle_preference: Vec<String> = prefer.into_iter().collect();
        cycle_preference.extend(
            self.cycle_preference
                .iter()
                .filter(|r| !cycle_preference.contains(*r))
                .cloned()
                .collect::<Vec<_>>(),
        );
        ResolveOptions {
            overrides,
            cycle_preference,
        }
    }
}

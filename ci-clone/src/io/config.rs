//! Optional clone settings file (TOML).
//!
//! Every field is optional; values set here sit between built-in defaults and
//! explicit command-line flags or environment variables.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::core::types::CloneConfig;

/// Clone settings as written by humans, e.g.
///
/// ```toml
/// depth = 50
/// tags = true
/// attempts = 3
/// backoff = "10s"
///
/// [submodule_override]
/// vendor = "https://mirror.example.com/vendor.git"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CloneSettings {
    pub depth: Option<u32>,
    pub tags: Option<bool>,
    pub skip_verify: Option<bool>,
    pub recursive: Option<bool>,
    pub submodule_update_remote: Option<bool>,
    pub submodule_override: BTreeMap<String, String>,
    pub attempts: Option<u32>,
    #[serde(deserialize_with = "humantime_opt::deserialize")]
    pub backoff: Option<Duration>,
    pub backoff_attempts: Option<u32>,
}

impl CloneSettings {
    pub fn validate(&self) -> Result<()> {
        if self.submodule_override.keys().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("submodule_override names must be non-empty"));
        }
        if self.submodule_override.values().any(|url| url.trim().is_empty()) {
            return Err(anyhow!("submodule_override urls must be non-empty"));
        }
        Ok(())
    }

    /// Fill a [`CloneConfig`] from these settings, defaulting unset fields.
    pub fn into_config(self) -> CloneConfig {
        let defaults = CloneConfig::default();
        CloneConfig {
            depth: self.depth.unwrap_or(defaults.depth),
            tags: self.tags.unwrap_or(defaults.tags),
            skip_verify: self.skip_verify.unwrap_or(defaults.skip_verify),
            recursive: self.recursive.unwrap_or(defaults.recursive),
            submodule_remote: self
                .submodule_update_remote
                .unwrap_or(defaults.submodule_remote),
            submodule_overrides: self.submodule_override,
            outer_attempts: self.attempts.unwrap_or(defaults.outer_attempts),
            backoff: self.backoff.unwrap_or(defaults.backoff),
            backoff_attempts: self.backoff_attempts.unwrap_or(defaults.backoff_attempts),
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `CloneSettings::default()`.
pub fn load_settings(path: &Path) -> Result<CloneSettings> {
    if !path.exists() {
        debug!(path = %path.display(), "settings file missing, using defaults");
        return Ok(CloneSettings::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: CloneSettings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings.validate()?;
    Ok(settings)
}

mod humantime_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

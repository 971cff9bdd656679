use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{model::GeoCoordinates, scroll::MomentumOptions};

/// Home location of the card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// IANA zone used to group forecast samples into days, e.g. "Europe/Berlin".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Example TOML:
    /// [location]
    /// latitude = 48.137
    /// longitude = 11.575
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationConfig>,

    #[serde(default)]
    pub scroll: MomentumOptions,
}

impl Config {
    /// Configured location, if present and valid.
    pub fn coordinates(&self) -> Option<GeoCoordinates> {
        self.location
            .and_then(|loc| GeoCoordinates::new(loc.latitude, loc.longitude))
    }

    /// Store a validated location.
    pub fn set_location(&mut self, coordinates: GeoCoordinates) {
        self.location = Some(LocationConfig {
            latitude: coordinates.latitude(),
            longitude: coordinates.longitude(),
        });
    }

    /// Configured time zone, or UTC when none is set.
    pub fn time_zone(&self) -> Result<Tz> {
        match self.timezone.as_deref() {
            None => Ok(Tz::UTC),
            Some(name) => name.parse::<Tz>().map_err(|_| {
                anyhow!(
                    "Unknown time zone '{name}'.\n\
                     Hint: use an IANA name such as \"Europe/Berlin\" or run `weather-card configure`."
                )
            }),
        }
    }

    pub fn momentum_options(&self) -> MomentumOptions {
        self.scroll.clone().sanitized()
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-card", "weather-card")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

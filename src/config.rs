use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::achievements::XpCurve;
use crate::error::LiftRsError;
use crate::forecast::ForecastConfig;
use crate::logging::LogConfig;
use crate::overload::OverloadConfig;
use crate::recovery::RecoveryConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// General application settings
    pub settings: AppSettings,

    /// Logging setup for the CLI
    #[serde(default)]
    pub logging: LogConfig,

    /// Training intelligence tunables
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// SQLite database holding set history and engine state
    pub database_path: PathBuf,

    /// User the CLI acts for when `--user` is omitted
    pub default_user_id: Option<String>,
}

/// Every tunable owned by the training intelligence engine
///
/// All thresholds are adjustable from the config file so they can be tuned
/// or A/B-tested without touching control flow.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub recovery: RecoveryConfig,

    #[serde(default)]
    pub overload: OverloadConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub achievements: XpCurve,
}

impl EngineConfig {
    /// Reject values that would make the models divide by zero or never progress
    pub fn validate(&self) -> crate::error::Result<()> {
        let recovery = &self.recovery;
        let overload = &self.overload;
        let forecast = &self.forecast;

        for group in crate::models::MuscleGroup::ALL {
            positive(&format!("recovery.base_hours.{group}"), recovery.base_hours.hours_for(group))?;
        }
        finite("recovery.light_session_delta_hours", recovery.light_session_delta_hours)?;
        for row in &recovery.volume_adjustments {
            finite("recovery.volume_adjustments.delta_hours", row.delta_hours)?;
        }

        positive("overload.trend_threshold_pct", overload.trend_threshold_pct)?;
        positive("overload.increase_reps", overload.increase_reps)?;
        positive("overload.high_confidence_reps", overload.high_confidence_reps)?;
        positive("overload.deload_reps", overload.deload_reps)?;
        positive("overload.deload_step", overload.deload_step)?;
        positive("overload.deload_factor", overload.deload_factor)?;
        positive("overload.rounding_increment", overload.rounding_increment)?;
        positive("overload.increments.small", overload.increments.small)?;
        positive("overload.increments.large", overload.increments.large)?;
        positive("overload.increments.magnitude_ceiling", overload.increments.magnitude_ceiling)?;
        if overload.min_sessions < 2 {
            return Err(invalid("overload analysis needs at least 2 sessions"));
        }

        positive("forecast.slope_threshold", forecast.slope_threshold)?;
        finite("forecast.min_r_squared", forecast.min_r_squared)?;
        positive("forecast.pr_margin", forecast.pr_margin)?;
        positive("forecast.suggested_weight_factor", forecast.suggested_weight_factor)?;
        positive("forecast.rounding_increment", forecast.rounding_increment)?;
        if forecast.min_sessions < 2 {
            return Err(invalid("trend regression needs at least 2 sessions"));
        }
        if forecast.cache_ttl_hours <= 0 {
            return Err(invalid("prediction cache TTL must be positive"));
        }

        positive("achievements.scale", self.achievements.scale)?;
        finite("achievements.exponent", self.achievements.exponent)?;
        if self.achievements.exponent < MIN_XP_EXPONENT {
            return Err(invalid(&format!(
                "achievements.exponent must be at least {MIN_XP_EXPONENT}"
            )));
        }
        Ok(())
    }
}

/// Flatter XP curves would need absurdly many levels per point of XP
const MIN_XP_EXPONENT: f64 = 1.0;

fn invalid(msg: &str) -> LiftRsError {
    LiftRsError::Configuration(msg.to_string())
}

fn finite(name: &str, value: f64) -> crate::error::Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be a finite number")))
    }
}

// NaN fails every comparison, so test for the accepted range rather than the rejected one
fn positive(name: &str, value: f64) -> crate::error::Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be a positive finite number")))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AppSettings::default(),
            logging: LogConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("liftrs")
                .join("liftrs.db"),
            default_user_id: None,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        config
            .engine
            .validate()
            .with_context(|| format!("Invalid engine settings in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".liftrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    ///
    /// A missing file silently yields defaults. A file that fails to load
    /// also yields defaults, and the error is handed back so the caller can
    /// report it once logging is up.
    pub fn load_or_default(path: &Path) -> (Self, Option<anyhow::Error>) {
        if !path.exists() {
            return (Self::default(), None);
        }

        match Self::load_from_file(path) {
            Ok(config) => (config, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    /// Resolve the user to act for
    pub fn resolve_user(&self, explicit: Option<String>) -> Option<String> {
        explicit.or_else(|| self.settings.default_user_id.clone())
    }
}

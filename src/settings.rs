use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::model::IdScheme;
use crate::relevance::{RelevanceConfig, DEFAULT_MAGNITUDE_THRESHOLD};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub struct Settings {
    #[serde(alias = "SETTINGS")]
    pub settings: SettingsSection,
    #[serde(alias = "FEED")]
    pub feed: FeedSettings,
    #[serde(alias = "ALERT")]
    pub alert: AlertSettings,
    #[serde(alias = "LOCATION")]
    pub location: LocationSettings,
    #[serde(alias = "SCHEDULER")]
    pub scheduler: SchedulerSettings,
    #[serde(alias = "LOG")]
    pub log: LogNotifierSettings,
    #[serde(alias = "DISCORD")]
    pub discord: DiscordSettings,
    #[serde(alias = "GOOGLECHAT")]
    pub googlechat: GoogleChatSettings,
    #[serde(alias = "WEB")]
    pub web: WebSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct SettingsSection {
    /// Where preferences.json lives.
    #[serde(alias = "DATA_DIR")]
    pub data_dir: PathBuf,
    #[serde(alias = "DEBUG")]
    pub debug: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct FeedSettings {
    #[serde(alias = "BASE_URL")]
    pub base_url: String,
    #[serde(alias = "TIMEOUT_SECS")]
    pub timeout_secs: u64,
    #[serde(alias = "ID_SCHEME")]
    pub id_scheme: IdScheme,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct AlertSettings {
    #[serde(alias = "MAGNITUDE_THRESHOLD")]
    pub magnitude_threshold: f64,
    /// Keep the last alerted id in the preference store so a restart does not re-alert.
    #[serde(alias = "PERSIST_LAST_ALERTED")]
    pub persist_last_alerted: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub struct LocationSettings {
    #[serde(alias = "LATITUDE")]
    pub latitude: Option<f64>,
    #[serde(alias = "LONGITUDE")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct SchedulerSettings {
    #[serde(alias = "NAME")]
    pub name: String,
    #[serde(alias = "INTERVAL_SECS")]
    pub interval_secs: u64,
    /// Extra random delay added to each interval, 0 for a flat cadence.
    #[serde(alias = "FLEX_SECS")]
    pub flex_secs: u64,
    #[serde(alias = "INITIAL_DELAY_SECS")]
    pub initial_delay_secs: u64,
    #[serde(alias = "RETRY_BASE_SECS")]
    pub retry_base_secs: u64,
    #[serde(alias = "RETRY_MAX_SECS")]
    pub retry_max_secs: u64,
    /// Host probed before each run; the run is skipped when unreachable.
    #[serde(alias = "PROBE_HOST")]
    pub probe_host: String,
    #[serde(alias = "PROBE_PORT")]
    pub probe_port: u16,
    #[serde(alias = "PROBE_TIMEOUT_SECS")]
    pub probe_timeout_secs: u64,
    /// How often a running monitor re-reads the notifications switch.
    #[serde(alias = "WATCH_SECS")]
    pub watch_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct LogNotifierSettings {
    #[serde(alias = "ENABLED")]
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct DiscordSettings {
    #[serde(alias = "ENABLED")]
    pub enabled: bool,
    #[serde(alias = "WEBHOOK_URL")]
    pub webhook_url: String,
    #[serde(alias = "USE_EMBED")]
    pub use_embed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct GoogleChatSettings {
    #[serde(alias = "ENABLED")]
    pub enabled: bool,
    #[serde(alias = "WEBHOOK_URL")]
    pub webhook_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "lowercase")]
pub struct WebSettings {
    #[serde(alias = "ENABLED")]
    pub enabled: bool,
    #[serde(alias = "BIND")]
    pub bind: String,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|d| d.join("quake-watch"))
                .unwrap_or_else(|| PathBuf::from("quake-watch")),
            debug: false,
        }
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.boostr.cl/earthquakes/".to_string(),
            timeout_secs: 30,
            id_scheme: IdScheme::Legacy,
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            magnitude_threshold: DEFAULT_MAGNITUDE_THRESHOLD,
            persist_last_alerted: false,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            name: "earthquake_periodic_check".to_string(),
            interval_secs: 15 * 60,
            flex_secs: 0,
            initial_delay_secs: 60,
            retry_base_secs: 30,
            retry_max_secs: 15 * 60,
            probe_host: "api.boostr.cl".to_string(),
            probe_port: 443,
            probe_timeout_secs: 5,
            watch_secs: 10,
        }
    }
}

impl Default for LogNotifierSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: "n/a".to_string(),
            use_embed: true,
        }
    }
}

impl Default for GoogleChatSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: "n/a".to_string(),
        }
    }
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AlertSettings {
    pub fn relevance(&self) -> RelevanceConfig {
        RelevanceConfig {
            magnitude_threshold: self.magnitude_threshold,
        }
    }
}

impl Settings {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Load defaults
        let default_settings = Settings::default();
        builder = builder.add_source(config::Config::try_from(&default_settings)?);

        // 2. Load from file if specified
        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            } else {
                warn!("Configuration file not found: {:?}", path);
            }
        } else if let Some(home) = dirs::home_dir() {
            let toml_path = home.join(".quake-watch").join("settings.toml");
            let yaml_path = home.join(".quake-watch").join("settings.yaml");

            if toml_path.exists() {
                builder = builder.add_source(File::from(toml_path));
            } else if yaml_path.exists() {
                builder = builder.add_source(File::from(yaml_path));
            }
        }

        // 3. Environment variables
        builder = builder.add_source(
            Environment::with_prefix("QUAKEWATCH")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        if let Ok(table) = config.clone().try_deserialize::<serde_json::Value>() {
            if let Some(map) = table.as_object() {
                let known_sections = [
                    "settings", "feed", "alert", "location", "scheduler", "log", "discord",
                    "googlechat", "web",
                ];
                for key in map.keys() {
                    let lower_key = key.to_lowercase();
                    if !known_sections.contains(&lower_key.as_str()) {
                        warn!("Unknown configuration section: {}", key);
                    }
                }
            }
        }

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        for (key, value) in [
            ("interval_secs", scheduler.interval_secs),
            ("retry_base_secs", scheduler.retry_base_secs),
            ("watch_secs", scheduler.watch_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "scheduler.{} must be greater than zero",
                    key
                )));
            }
        }
        Ok(())
    }

    pub fn dump(&self, format: &str) -> Result<String, Box<dyn std::error::Error>> {
        match format.to_lowercase().as_str() {
            "toml" => Ok(toml::to_string_pretty(self)?),
            "yaml" | "yml" => Ok(serde_yaml::to_string(self)?),
            _ => Err("Unsupported format".into()),
        }
    }
}

//! Settings types and their defaults.

use crate::errors::ConfigError;
use crate::storage::DedupPolicy;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which trigger sources are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// Periodic scheduler only; manual triggers are rejected.
    Background,
    /// Manual triggers only; the scheduler does not run.
    Manual,
    /// Both sources.
    #[default]
    Both,
}

impl TriggerMode {
    /// Whether the periodic scheduler may run.
    #[must_use]
    pub fn allows_scheduler(self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Whether manual triggers are accepted.
    #[must_use]
    pub fn allows_manual(self) -> bool {
        !matches!(self, Self::Background)
    }
}

impl<'de> Deserialize<'de> for TriggerMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "manual" => Ok(Self::Manual),
            "both" => Ok(Self::Both),
            _ => Err(de::Error::unknown_variant(&raw, &["background", "manual", "both"])),
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => write!(f, "background"),
            Self::Manual => write!(f, "manual"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Remote file detection and scheduling.
    #[serde(default)]
    pub ftp_detection: FtpDetectionSettings,
    /// Default remote connection.
    #[serde(default)]
    pub ftp_connection: FtpConnectionSettings,
    /// Object storage key prefixes.
    #[serde(default)]
    pub storage_paths: StoragePathsSettings,
    /// Where pipeline definitions live.
    #[serde(default)]
    pub pipeline_definition: PipelineDefinitionSettings,
    /// Log sink behaviour.
    #[serde(default)]
    pub sink: SinkSettings,
    /// Tracing subscriber setup.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Handler opt-outs.
    #[serde(default)]
    pub handlers: HandlerSettings,
}

impl PipelineSettings {
    /// Parses settings from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Reads settings from a JSON file. When no definition base directory is
    /// configured, the settings file's directory is used.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_json_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if settings.pipeline_definition.base_directory.is_none() {
            settings.pipeline_definition.base_directory =
                path.parent().map(Path::to_path_buf);
        }
        Ok(settings)
    }

    /// Whether the handler for `step_name` is switched on.
    #[must_use]
    pub fn is_handler_enabled(&self, step_name: &str) -> bool {
        !self
            .handlers
            .disabled
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(step_name))
    }
}

/// Remote detection defaults; every value can be overridden per step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpDetectionSettings {
    /// Default scheduler period. Zero or negative disables the scheduler.
    #[serde(default = "default_period")]
    pub period_in_seconds: i64,
    /// Remote directory to scan.
    #[serde(default = "default_search_path")]
    pub search_path: String,
    /// Filename wildcard.
    #[serde(default = "default_mask")]
    pub mask: String,
    /// Maximum file age. Zero or negative disables the freshness filter.
    #[serde(default = "default_not_older_than")]
    pub not_older_than_seconds: i64,
    /// Delay between the two size checks. Zero disables the stability check.
    #[serde(default)]
    pub stable_for_seconds: u64,
    /// Processed-file marker location.
    #[serde(default)]
    pub state_store: StateStoreSettings,
    /// Duplicate content handling.
    #[serde(default)]
    pub deduplication: DeduplicationSettings,
    /// Active trigger sources.
    #[serde(default)]
    pub trigger_mode: TriggerMode,
}

fn default_period() -> i64 {
    60
}

fn default_search_path() -> String {
    "/".to_string()
}

fn default_mask() -> String {
    "*.csv".to_string()
}

fn default_not_older_than() -> i64 {
    3600
}

impl Default for FtpDetectionSettings {
    fn default() -> Self {
        Self {
            period_in_seconds: default_period(),
            search_path: default_search_path(),
            mask: default_mask(),
            not_older_than_seconds: default_not_older_than(),
            stable_for_seconds: 0,
            state_store: StateStoreSettings::default(),
            deduplication: DeduplicationSettings::default(),
            trigger_mode: TriggerMode::default(),
        }
    }
}

impl FtpDetectionSettings {
    /// Default scheduler period, or `None` when scheduling is disabled.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        u64::try_from(self.period_in_seconds)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

/// Processed-marker layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateStoreSettings {
    /// Key prefix for markers.
    #[serde(default = "default_state_prefix")]
    pub prefix: String,
}

fn default_state_prefix() -> String {
    "state".to_string()
}

impl Default for StateStoreSettings {
    fn default() -> Self {
        Self {
            prefix: default_state_prefix(),
        }
    }
}

/// Duplicate handling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicationSettings {
    /// `skip` or `emit`.
    #[serde(default)]
    pub mode: DedupPolicy,
}

/// Default remote connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionSettings {
    /// Host name.
    #[serde(default)]
    pub host: String,
    /// Port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// User name.
    #[serde(default)]
    pub user: String,
    /// Password.
    #[serde(default)]
    pub password: String,
    /// Use explicit TLS.
    #[serde(default)]
    pub use_ssl: bool,
}

fn default_port() -> u16 {
    21
}

impl Default for FtpConnectionSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            use_ssl: false,
        }
    }
}

impl fmt::Debug for FtpConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

/// Object storage prefixes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePathsSettings {
    /// Prefix for raw file copies.
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,
    /// Prefix for parsed JSON documents.
    #[serde(default = "default_parsed_prefix")]
    pub parsed_prefix: String,
}

fn default_raw_prefix() -> String {
    "raw/".to_string()
}

fn default_parsed_prefix() -> String {
    "parsed/".to_string()
}

impl Default for StoragePathsSettings {
    fn default() -> Self {
        Self {
            raw_prefix: default_raw_prefix(),
            parsed_prefix: default_parsed_prefix(),
        }
    }
}

/// Definition file locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinitionSettings {
    /// Single definition file.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Several definition files; takes precedence over `file_name`.
    #[serde(default)]
    pub file_names: Vec<String>,
    /// Base for relative file names.
    #[serde(default)]
    pub base_directory: Option<PathBuf>,
}

/// Log sink behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkSettings {
    /// Log the parsed document itself rather than its item count.
    #[serde(default)]
    pub log_json: bool,
}

/// Tracing subscriber setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Handler opt-outs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSettings {
    /// Step names whose handlers are not subscribed.
    #[serde(default)]
    pub disabled: Vec<String>,
}

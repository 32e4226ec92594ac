//! Configuration for the VIGIA sentry.

use crate::camera::{CameraConstraints, Facing};
use crate::core::MotionDebouncer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the sentry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera request and sampling cadence
    pub camera: CameraConfig,

    /// Motion heuristic parameters
    pub detector: DetectorConfig,

    /// Narrative delays
    pub timing: TimingConfig,

    /// Speech synthesis settings
    pub voice: VoiceConfig,

    /// Generative-AI collaborator settings
    pub ai: AiConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a file, or the defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a file, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigia-sentry")
            .join("config.json")
    }
}

/// Which camera to request and how often to sample it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: Facing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Sampling cadence (display refresh rate)
    #[serde(with = "duration_serde")]
    pub frame_interval: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let constraints = CameraConstraints::default();
        Self {
            facing: constraints.facing,
            ideal_width: constraints.ideal_width,
            ideal_height: constraints.ideal_height,
            frame_interval: Duration::from_millis(16),
        }
    }
}

impl CameraConfig {
    pub fn constraints(&self) -> CameraConstraints {
        CameraConstraints {
            facing: self.facing,
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
        }
    }
}

/// Motion heuristic parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Per-pixel score (0-765) a frame must exceed
    pub threshold: f64,
    /// Consecutive qualifying frames that confirm motion
    pub required_streak: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: crate::core::DEFAULT_THRESHOLD,
            required_streak: crate::core::DEFAULT_REQUIRED_STREAK,
        }
    }
}

impl DetectorConfig {
    pub fn debouncer(&self) -> MotionDebouncer {
        MotionDebouncer::new(self.threshold, self.required_streak)
    }
}

/// Narrative delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Alert tone to challenge phrase
    #[serde(with = "duration_serde")]
    pub challenge_delay: Duration,
    /// Entering scanning to photo capture
    #[serde(with = "duration_serde")]
    pub capture_delay: Duration,
    /// Entering generating to the verdict
    #[serde(with = "duration_serde")]
    pub verdict_delay: Duration,
    /// Verdict to automatic chat start
    #[serde(with = "duration_serde")]
    pub chat_auto_start: Duration,
    /// Pause before listening again after a recognized utterance
    #[serde(with = "duration_serde")]
    pub listen_restart: Duration,
    /// Pause before listening again after a recognition error
    #[serde(with = "duration_serde")]
    pub listen_retry: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            challenge_delay: Duration::from_millis(2000),
            capture_delay: Duration::from_millis(2000),
            verdict_delay: Duration::from_millis(3000),
            chat_auto_start: Duration::from_millis(2000),
            listen_restart: Duration::from_millis(500),
            listen_retry: Duration::from_millis(1000),
        }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub locale: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Text-to-speech program; detected on `PATH` when unset
    pub command: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "es-ES".to_string(),
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            command: None,
        }
    }
}

/// Generative-AI collaborator settings. The credential itself is never
/// stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-2.0-flash-exp".to_string(),
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "VIGIA_GEMINI_API_KEY".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration, as integer milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

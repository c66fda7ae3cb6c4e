// Configuration module
// Centralized management of application configuration

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{AppResult, SynthesisError};

pub mod tts; // TTS configuration

pub use tts::{EngineConfig, FadeCurve, GenerationParams, ReferenceConfig, TrimmerConfig};

/// Substring the model runtime prints when a device-side assertion fires.
pub const DEFAULT_FATAL_MARKER: &str = "device-side assert triggered";

/// Настройки восстановления после ошибок бэкенда
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub fatal_marker: String,
    /// Куда складываются записи о фатальных сбоях и референсы
    pub diagnostics_dir: PathBuf,
    /// Service the restart request targets. `None` disables restarts.
    pub service_id: Option<String>,
    pub restart_endpoint: Option<String>,
    pub restart_token: Option<String>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            fatal_marker: DEFAULT_FATAL_MARKER.to_string(),
            diagnostics_dir: PathBuf::from("diagnostics"),
            service_id: None,
            restart_endpoint: None,
            restart_token: None,
        }
    }
}

/// Адрес сервера модели
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub sample_rate: u32,
    /// Ask the model server to transcribe references given without a transcript.
    pub transcribe: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7860".to_string(),
            sample_rate: tts::REFERENCE_SAMPLE_RATE,
            transcribe: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub language: String,
    pub backend: BackendConfig,
    pub generation: GenerationParams,
    pub reference: ReferenceConfig,
    pub engine: EngineConfig,
    pub trimmer: TrimmerConfig,
    pub recovery: RecoveryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: "vi".to_string(),
            backend: BackendConfig::default(),
            generation: GenerationParams::default(),
            reference: ReferenceConfig::default(),
            engine: EngineConfig::default(),
            trimmer: TrimmerConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Загружает конфигурацию из JSON файла.
    ///
    /// A missing file yields the defaults; a file that exists but cannot be
    /// parsed is a configuration error.
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            SynthesisError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.generation.validate().map_err(SynthesisError::Configuration)?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

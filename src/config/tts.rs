use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate of the reference deployment, the unit the trimming
/// heuristic was tuned against.
pub const REFERENCE_SAMPLE_RATE: u32 = 24_000;

/// Параметры генерации, передаваемые бэкенду для каждого чанка
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Number of denoising steps. More is slower but can be cleaner.
    pub nfe_steps: u32,
    /// How strongly generation sticks to the reference voice.
    pub cfg_strength: f32,
    /// Speech rate multiplier, 1.0 is the natural rate.
    pub speed: f32,
    /// Overlap between neighbouring chunks, in seconds.
    pub cross_fade_duration: f32,
    pub temperature: f32,
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            nfe_steps: 32,
            cfg_strength: 2.0,
            speed: 1.0,
            cross_fade_duration: 0.15,
            temperature: 1.0,
            repetition_penalty: 1.0,
        }
    }
}

impl GenerationParams {
    /// Проверяет параметры до обращения к бэкенду
    pub fn validate(&self) -> Result<(), String> {
        if self.nfe_steps == 0 {
            return Err("nfe_steps must be greater than zero".to_string());
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(format!("speed must be a positive number, got {}", self.speed));
        }
        if !(self.cross_fade_duration.is_finite() && self.cross_fade_duration >= 0.0) {
            return Err(format!(
                "cross_fade_duration must be non-negative, got {}",
                self.cross_fade_duration
            ));
        }
        if !(self.cfg_strength.is_finite() && self.temperature.is_finite() && self.repetition_penalty.is_finite()) {
            return Err("cfg_strength, temperature and repetition_penalty must be finite".to_string());
        }
        Ok(())
    }
}

/// Настройки подготовки референсного голоса
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Longest reference clip kept when clipping is requested, in seconds.
    pub max_reference_secs: f32,
    /// Quiet references are boosted to this RMS before conditioning.
    pub target_rms: f32,
    pub clip_short: bool,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            max_reference_secs: 12.0,
            target_rms: 0.1,
            clip_short: true,
        }
    }
}

/// Кривая кроссфейда между чанками
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    Linear,
    #[default]
    RaisedCosine,
}

/// Настройки оркестратора синтеза
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend_timeout_secs: u64,
    /// 1 means chunks are synthesized one after another.
    pub max_concurrent_chunks: usize,
    /// Pack consecutive sentences into one chunk while they fit. `None`
    /// keeps one sentence per chunk.
    pub max_chunk_chars: Option<usize>,
    /// Without an explicit budget, derive one from the reference speech rate.
    pub derive_chunk_budget: bool,
    pub fade_curve: FadeCurve,
    /// Languages accepted by the engine. Empty accepts everything.
    pub supported_languages: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_timeout_secs: 120,
            max_concurrent_chunks: 1,
            max_chunk_chars: None,
            derive_chunk_budget: false,
            fade_curve: FadeCurve::default(),
            supported_languages: vec!["vi".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs.max(1))
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty()
            || self
                .supported_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }
}

/// Настройки обрезки коротких фраз
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimmerConfig {
    /// Scripts without whitespace-delimited words; the heuristic is skipped.
    pub untrimmed_languages: Vec<String>,
}

impl Default for TrimmerConfig {
    fn default() -> Self {
        Self {
            untrimmed_languages: ["zh", "ja", "th", "lo", "km", "my"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

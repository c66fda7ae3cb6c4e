//! # Voice Cloner
//!
//! Фасад над конвейером: хранит один подготовленный референс и
//! синтезирует текст его голосом.

use log::info;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::{AppConfig, GenerationParams};
use crate::errors::{AppResult, SynthesisError};
use crate::models::{AudioClip, ReferenceVoice, SynthesisResult};
use crate::services::audio::format::encode_wav;
use crate::services::recovery::{RecoveryController, ServiceStateHandle};
use crate::services::text::{LanguageNormalizer, TextNormalizer};
use crate::services::tts::backend::{ModelBackend, Transcriber};
use crate::services::tts::engine::{SynthesisEngine, SynthesisOptions};
use crate::services::voice::ReferenceVoiceProcessor;

pub struct VoiceClonerBuilder {
    backend: Arc<dyn ModelBackend>,
    config: AppConfig,
    transcriber: Option<Arc<dyn Transcriber>>,
    language_normalizer: Option<Arc<dyn LanguageNormalizer>>,
    recovery: Option<Arc<RecoveryController>>,
}

impl VoiceClonerBuilder {
    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn language_normalizer(mut self, normalizer: Arc<dyn LanguageNormalizer>) -> Self {
        self.language_normalizer = Some(normalizer);
        self
    }

    /// Replaces the recovery controller built from the config.
    pub fn recovery(mut self, recovery: Arc<RecoveryController>) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub fn build(self) -> VoiceCloner {
        let config = self.config;
        let recovery = self.recovery.unwrap_or_else(|| {
            Arc::new(RecoveryController::from_config(&config.recovery, ServiceStateHandle::new()))
        });

        let mut processor = ReferenceVoiceProcessor::new(
            self.backend.clone(),
            recovery.clone(),
            config.reference.clone(),
            config.engine.backend_timeout(),
        );
        if let Some(transcriber) = self.transcriber {
            processor = processor.with_transcriber(transcriber);
        }

        let mut engine = SynthesisEngine::new(
            self.backend,
            recovery.clone(),
            config.engine.clone(),
            config.trimmer.clone(),
        );
        if let Some(normalizer) = self.language_normalizer {
            engine = engine.with_normalizer(TextNormalizer::new(normalizer));
        }

        VoiceCloner {
            processor,
            engine,
            recovery,
            reference: RwLock::new(None),
            config,
        }
    }
}

pub struct VoiceCloner {
    processor: ReferenceVoiceProcessor,
    engine: SynthesisEngine,
    recovery: Arc<RecoveryController>,
    /// Единственный слот референса; синтез держит read guard весь вызов
    reference: RwLock<Option<Arc<ReferenceVoice>>>,
    config: AppConfig,
}

impl VoiceCloner {
    pub fn builder(backend: Arc<dyn ModelBackend>, config: AppConfig) -> VoiceClonerBuilder {
        VoiceClonerBuilder {
            backend,
            config,
            transcriber: None,
            language_normalizer: None,
            recovery: None,
        }
    }

    pub fn new(backend: Arc<dyn ModelBackend>, config: AppConfig) -> Self {
        Self::builder(backend, config).build()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &ServiceStateHandle {
        self.recovery.state()
    }

    /// Готовит референс и заменяет им предыдущий.
    ///
    /// Waits for in-flight syntheses; on failure the previous reference stays.
    /// `clip_short: None` follows the `reference.clip_short` setting.
    pub async fn preprocess_reference(
        &self,
        audio: AudioClip,
        transcript: Option<&str>,
        clip_short: Option<bool>,
    ) -> AppResult<Arc<ReferenceVoice>> {
        let mut slot = self.reference.write().await;
        let voice = Arc::new(self.processor.preprocess(audio, transcript, clip_short).await?);
        *slot = Some(voice.clone());
        Ok(voice)
    }

    pub async fn preprocess_reference_file<P: AsRef<Path>>(
        &self,
        path: P,
        transcript: Option<&str>,
        clip_short: Option<bool>,
    ) -> AppResult<Arc<ReferenceVoice>> {
        let mut slot = self.reference.write().await;
        let voice = Arc::new(self.processor.preprocess_file(path, transcript, clip_short).await?);
        *slot = Some(voice.clone());
        Ok(voice)
    }

    pub async fn current_reference(&self) -> Option<Arc<ReferenceVoice>> {
        self.reference.read().await.clone()
    }

    /// Длительность используемого референса в секундах
    pub async fn reference_duration(&self) -> Option<f32> {
        self.reference.read().await.as_ref().map(|v| v.duration_secs)
    }

    /// Синтез с языком и параметрами генерации из конфигурации.
    pub async fn synthesize(&self, text: &str, options: SynthesisOptions) -> AppResult<SynthesisResult> {
        let language = self.config.language.clone();
        let params = self.config.generation.clone();
        self.synthesize_with(text, &language, true, &params, options).await
    }

    pub async fn synthesize_with(
        &self,
        text: &str,
        language: &str,
        normalize: bool,
        params: &GenerationParams,
        options: SynthesisOptions,
    ) -> AppResult<SynthesisResult> {
        let slot = self.reference.read().await;
        let reference = slot.as_ref().ok_or_else(|| {
            SynthesisError::Configuration("no reference voice has been preprocessed".to_string())
        })?;

        self.engine
            .synthesize(text, language, reference, normalize, params, options)
            .await
    }

    /// Синтезирует текст и сохраняет результат в моно WAV.
    pub async fn synthesize_to_file<P: AsRef<Path>>(
        &self,
        text: &str,
        output_path: P,
        options: SynthesisOptions,
    ) -> AppResult<SynthesisResult> {
        let result = self.synthesize(text, options).await?;

        let output_path = output_path.as_ref().to_path_buf();
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let waveform = result.waveform.clone();
        let sample_rate = result.sample_rate;
        let path = output_path.clone();
        tokio::task::spawn_blocking(move || encode_wav(&waveform, sample_rate, &path))
            .await
            .map_err(|e| SynthesisError::Audio(format!("WAV writer panicked: {}", e)))??;

        info!("Audio saved to {}", output_path.display());
        Ok(result)
    }
}

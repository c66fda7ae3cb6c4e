//! # Reference Voice Processing
//!
//! Подготовка референсного голоса: обрезка, транскрипт, громкость,
//! ресемплинг и извлечение conditioning через бэкенд.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ReferenceConfig;
use crate::errors::{AppResult, BackendError, SynthesisError};
use crate::models::{AudioClip, ConditioningParams, ReferenceVoice};
use crate::services::audio::format::{compute_rms, decode_audio_file};
use crate::services::audio::resample::resample_mono;
use crate::services::recovery::{FailureContext, RecoveryController};
use crate::services::tts::backend::{ModelBackend, Transcriber};

/// Завершает транскрипт знаком конца предложения, как ожидает модель.
pub fn terminate_transcript(transcript: &str) -> String {
    let trimmed = transcript.trim();
    match trimmed.chars().last() {
        Some('。') => trimmed.to_string(),
        Some('.' | '!' | '?' | '…') => format!("{} ", trimmed),
        _ => format!("{}. ", trimmed),
    }
}

pub struct ReferenceVoiceProcessor {
    backend: Arc<dyn ModelBackend>,
    transcriber: Option<Arc<dyn Transcriber>>,
    recovery: Arc<RecoveryController>,
    config: ReferenceConfig,
    backend_timeout: Duration,
}

impl ReferenceVoiceProcessor {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        recovery: Arc<RecoveryController>,
        config: ReferenceConfig,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            transcriber: None,
            recovery,
            config,
            backend_timeout,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Декодирует файл и готовит из него референс.
    ///
    /// Any failure to read or decode the file is reported as bad reference audio.
    pub async fn preprocess_file<P: AsRef<Path>>(
        &self,
        path: P,
        transcript: Option<&str>,
        clip_short: Option<bool>,
    ) -> AppResult<ReferenceVoice> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let display = path.display().to_string();

        let clip = tokio::task::spawn_blocking(move || decode_audio_file(&path))
            .await
            .map_err(|e| SynthesisError::Audio(format!("decoder task panicked: {}", e)))?
            .map_err(|e| SynthesisError::BadReference(format!("{}: {}", display, e)))?;

        self.preprocess(clip, transcript, clip_short).await
    }

    /// Готовит референсный голос из моно клипа.
    ///
    /// `clip_short` overrides `ReferenceConfig::clip_short` when given.
    pub async fn preprocess(
        &self,
        audio: AudioClip,
        transcript: Option<&str>,
        clip_short: Option<bool>,
    ) -> AppResult<ReferenceVoice> {
        self.recovery.ensure_available()?;

        if audio.is_empty() {
            return Err(SynthesisError::Validation("reference audio is empty".to_string()));
        }
        if audio.sample_rate == 0 {
            return Err(SynthesisError::Validation("reference audio has no sample rate".to_string()));
        }

        let clip = self.clip(audio, clip_short.unwrap_or(self.config.clip_short));
        let duration_secs = clip.duration_secs();
        let id = Uuid::new_v4().to_string();

        let transcript = match transcript.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => self.transcribe(&id, &clip).await?,
        };
        let transcript = terminate_transcript(&transcript);

        let rms = clip.rms();
        let target_rms = self.config.target_rms;
        let mut samples = clip.samples;
        if rms > 0.0 && rms < target_rms {
            let gain = target_rms / rms;
            debug!("Boosting quiet reference (rms {:.4}) by {:.2}", rms, gain);
            samples.iter_mut().for_each(|s| *s *= gain);
        }

        let sample_rate = self.backend.sample_rate();
        let samples = resample_mono(&samples, clip.sample_rate, sample_rate)?;
        let prepared = AudioClip::new(samples, sample_rate);

        let params = ConditioningParams {
            transcript: transcript.clone(),
            target_rms,
        };
        let conditioning = match tokio::time::timeout(
            self.backend_timeout,
            self.backend.get_conditioning(&prepared, &params),
        )
        .await
        .unwrap_or(Err(BackendError::Timeout(self.backend_timeout)))
        {
            Ok(conditioning) => conditioning,
            Err(e) => {
                let context = FailureContext::for_pending_reference(&transcript, &id, &prepared);
                return Err(self.recovery.handle(e, context).await);
            }
        };

        info!(
            "Prepared reference voice {} ({:.2}s, rms {:.4}, {} Hz)",
            id, duration_secs, rms, sample_rate
        );

        Ok(ReferenceVoice {
            id,
            samples: prepared.samples,
            sample_rate,
            transcript,
            conditioning,
            duration_secs,
            rms,
            target_rms,
        })
    }

    // Обрезка с начала клипа, детерминированно
    fn clip(&self, mut audio: AudioClip, clip_short: bool) -> AudioClip {
        if !clip_short {
            return audio;
        }
        let max_samples = (self.config.max_reference_secs as f64 * audio.sample_rate as f64).round() as usize;
        if max_samples > 0 && audio.samples.len() > max_samples {
            info!(
                "Reference audio is {:.2}s, clipping to {:.2}s",
                audio.duration_secs(),
                self.config.max_reference_secs
            );
            audio.samples.truncate(max_samples);
        }
        audio
    }

    async fn transcribe(&self, id: &str, clip: &AudioClip) -> AppResult<String> {
        let transcriber = self.transcriber.as_ref().ok_or_else(|| {
            SynthesisError::Configuration(
                "reference transcript is missing and no transcriber is configured".to_string(),
            )
        })?;

        info!("No reference transcript given, transcribing {:.2}s of audio", clip.duration_secs());
        let result = tokio::time::timeout(self.backend_timeout, transcriber.transcribe(clip))
            .await
            .unwrap_or(Err(BackendError::Timeout(self.backend_timeout)));

        match result {
            Ok(text) if !text.trim().is_empty() => Ok(text),
            Ok(_) => Err(SynthesisError::BadReference(
                "no speech recognized in reference audio".to_string(),
            )),
            Err(e) => {
                let context = FailureContext::for_pending_reference("", id, clip);
                Err(self.recovery.handle(e, context).await)
            }
        }
    }
}

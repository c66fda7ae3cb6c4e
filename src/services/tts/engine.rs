//! # Chunked Synthesis Engine
//!
//! Центральный оркестратор: нормализация, сегментация, вызов бэкенда по
//! чанкам, обрезка коротких фраз и склейка с кроссфейдом.

use futures::future::join_all;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, GenerationParams, TrimmerConfig};
use crate::errors::{AppResult, BackendError, SynthesisError};
use crate::models::{ProgressUpdate, ReferenceVoice, SynthesisMetrics, SynthesisResult, TextChunk};
use crate::services::audio::merge::{crossfade_samples, merge_with_crossfade};
use crate::services::recovery::{FailureContext, RecoveryController};
use crate::services::text::segmenter::speakable_text;
use crate::services::text::{SentenceSegmenter, TextNormalizer};
use crate::services::tts::backend::ModelBackend;
use crate::services::tts::trimmer::ShortUtteranceTrimmer;

/// Необязательные параметры одного запроса синтеза
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    pub progress_sender: Option<Sender<ProgressUpdate>>,
    /// Checked before every chunk; an in-flight backend call is not interrupted.
    pub cancel: Option<CancellationToken>,
}

impl SynthesisOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Never waits: a full or closed channel drops the update.
    fn report(&self, update: ProgressUpdate) {
        if let Some(sender) = &self.progress_sender {
            match sender.try_send(update) {
                Ok(()) => {}
                Err(TrySendError::Full(update)) => debug!("Progress channel full, dropping {:?}", update),
                Err(TrySendError::Closed(_)) => debug!("Progress receiver is gone"),
            }
        }
    }
}

pub struct SynthesisEngine {
    backend: Arc<dyn ModelBackend>,
    normalizer: TextNormalizer,
    trimmer: ShortUtteranceTrimmer,
    recovery: Arc<RecoveryController>,
    config: EngineConfig,
}

impl SynthesisEngine {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        recovery: Arc<RecoveryController>,
        config: EngineConfig,
        trimmer: TrimmerConfig,
    ) -> Self {
        Self {
            backend,
            normalizer: TextNormalizer::default(),
            trimmer: ShortUtteranceTrimmer::new(trimmer),
            recovery,
            config,
        }
    }

    pub fn with_normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    /// Синтезирует текст голосом референса.
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        reference: &ReferenceVoice,
        normalize: bool,
        params: &GenerationParams,
        options: SynthesisOptions,
    ) -> AppResult<SynthesisResult> {
        self.recovery.ensure_available()?;
        self.validate(text, language, params)?;

        let start = Instant::now();

        let text = if normalize && self.normalizer.supports(language) {
            self.normalizer.normalize(text, language)
        } else {
            text.to_string()
        };

        let budget = self
            .config
            .max_chunk_chars
            .or_else(|| self.config.derive_chunk_budget.then(|| reference.max_chunk_chars()).flatten());
        let chunks = SentenceSegmenter::new(budget).segment(&text, language);
        if chunks.is_empty() {
            return Err(SynthesisError::Validation("text is too short".to_string()));
        }

        let total = chunks.len();
        info!("Synthesizing {} chunks ({} chars) in '{}'", total, text.chars().count(), language);
        options.report(ProgressUpdate::Started { total });

        let raw = if self.config.max_concurrent_chunks > 1 && total > 1 {
            self.infer_concurrent(&chunks, reference, params, &options).await?
        } else {
            self.infer_sequential(&chunks, reference, params, &options).await?
        };

        let sample_rate = self.backend.sample_rate();
        let gain = reference.output_gain();
        let segments: Vec<Vec<f32>> = raw
            .into_iter()
            .zip(chunks.iter())
            .map(|(wave, chunk)| {
                let mut wave = self.trimmer.trim(wave, &chunk.text, language, sample_rate);
                if gain != 1.0 {
                    wave.iter_mut().for_each(|s| *s *= gain);
                }
                wave
            })
            .collect();

        options.report(ProgressUpdate::Stitching);
        let overlap = crossfade_samples(params.cross_fade_duration, sample_rate);
        let waveform = merge_with_crossfade(&segments, overlap, self.config.fade_curve);

        let audio_secs = waveform.len() as f32 / sample_rate as f32;
        let metrics = SynthesisMetrics::new(start.elapsed(), audio_secs, total);
        info!(
            "Synthesized {:.2}s of audio in {:.2}s (RTF {:.3})",
            audio_secs,
            metrics.elapsed.as_secs_f32(),
            metrics.real_time_factor
        );
        options.report(ProgressUpdate::Finished { audio_secs });

        Ok(SynthesisResult {
            segments,
            waveform,
            sample_rate,
            metrics,
        })
    }

    fn validate(&self, text: &str, language: &str, params: &GenerationParams) -> AppResult<()> {
        if !text.chars().any(char::is_alphanumeric) {
            return Err(SynthesisError::Validation("text is too short".to_string()));
        }
        if !self.config.supports_language(language) {
            return Err(SynthesisError::Validation(format!("unsupported language: {}", language)));
        }
        params.validate().map_err(SynthesisError::Validation)
    }

    async fn infer_chunk(
        &self,
        chunk: &TextChunk,
        reference: &ReferenceVoice,
        params: &GenerationParams,
    ) -> Result<Vec<f32>, BackendError> {
        let timeout = self.config.backend_timeout();
        let text = speakable_text(chunk);
        debug!("Chunk {}: {:?}", chunk.index, text);

        tokio::time::timeout(timeout, self.backend.infer(text, &reference.conditioning, params))
            .await
            .unwrap_or(Err(BackendError::Timeout(timeout)))
    }

    async fn infer_sequential(
        &self,
        chunks: &[TextChunk],
        reference: &ReferenceVoice,
        params: &GenerationParams,
        options: &SynthesisOptions,
    ) -> AppResult<Vec<Vec<f32>>> {
        let total = chunks.len();
        let mut outputs = Vec::with_capacity(total);

        for chunk in chunks {
            if options.is_cancelled() {
                info!("Synthesis cancelled before chunk {}", chunk.index);
                return Err(SynthesisError::Cancelled(chunk.index));
            }
            self.recovery.ensure_available()?;

            match self.infer_chunk(chunk, reference, params).await {
                Ok(wave) => outputs.push(wave),
                Err(e) => {
                    let context = FailureContext::for_chunk(&chunk.text, reference);
                    return Err(self.recovery.handle(e, context).await);
                }
            }

            options.report(ProgressUpdate::ChunkCompleted { index: chunk.index, total });
        }

        Ok(outputs)
    }

    /// Чанки считаются параллельно, но результат возвращается в порядке индексов.
    ///
    /// A failed chunk goes through recovery as soon as it fails, so a FATAL
    /// transition stops chunks still waiting for a permit.
    async fn infer_concurrent(
        &self,
        chunks: &[TextChunk],
        reference: &ReferenceVoice,
        params: &GenerationParams,
        options: &SynthesisOptions,
    ) -> AppResult<Vec<Vec<f32>>> {
        let total = chunks.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_chunks));

        let tasks = chunks.iter().map(|chunk| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| SynthesisError::Recoverable(e.to_string()))?;

                if options.is_cancelled() {
                    return Err(SynthesisError::Cancelled(chunk.index));
                }
                self.recovery.ensure_available()?;

                match self.infer_chunk(chunk, reference, params).await {
                    Ok(wave) => {
                        options.report(ProgressUpdate::ChunkCompleted { index: chunk.index, total });
                        Ok::<Vec<f32>, SynthesisError>(wave)
                    }
                    Err(e) => {
                        let context = FailureContext::for_chunk(&chunk.text, reference);
                        Err(self.recovery.handle(e, context).await)
                    }
                }
            }
        });

        let mut outputs = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(wave) => outputs.push(wave),
                Err(e) => failures.push(e),
            }
        }
        if failures.is_empty() {
            return Ok(outputs);
        }

        // Фатальная ошибка в любом чанке важнее остальных
        let position = failures
            .iter()
            .position(|e| matches!(e, SynthesisError::ServiceUnavailable(_)))
            .unwrap_or(0);
        let error = failures.swap_remove(position);
        if !failures.is_empty() {
            warn!("{} more chunks failed in the same request", failures.len());
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudioClip, Conditioning, ConditioningParams};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Возвращает по 0.5 с постоянного сигнала на чанк
    struct ScriptedBackend {
        calls: Mutex<Vec<String>>,
        fail_on: Option<(String, BackendError)>,
        delay: Duration,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self { calls: Mutex::new(Vec::new()), fail_on: None, delay: Duration::from_millis(1) }
        }

        fn failing(needle: &str, error: BackendError) -> Self {
            Self { fail_on: Some((needle.to_string(), error)), ..Self::new() }
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn infer(&self, text: &str, _c: &Conditioning, _p: &GenerationParams) -> Result<Vec<f32>, BackendError> {
            self.calls.lock().unwrap().push(text.to_string());
            // Сбой возвращается сразу, успешные чанки работают `delay`
            if let Some((needle, error)) = &self.fail_on {
                if text.contains(needle.as_str()) {
                    return Err(error.clone());
                }
            }
            tokio::time::sleep(self.delay).await;
            Ok(vec![0.5; 12_000])
        }

        async fn get_conditioning(&self, _clip: &AudioClip, _p: &ConditioningParams) -> Result<Conditioning, BackendError> {
            Ok(Conditioning::new(Vec::new(), vec![0]))
        }

        fn sample_rate(&self) -> u32 {
            24_000
        }
    }

    fn reference(rms: f32) -> ReferenceVoice {
        ReferenceVoice {
            id: "ref-1".to_string(),
            samples: vec![0.1; 2400],
            sample_rate: 24_000,
            transcript: "Xin chào. ".to_string(),
            conditioning: Conditioning::new(Vec::new(), vec![0]),
            duration_secs: 0.1,
            rms,
            target_rms: 0.1,
        }
    }

    fn engine(backend: Arc<ScriptedBackend>, config: EngineConfig) -> SynthesisEngine {
        SynthesisEngine::new(backend, Arc::new(RecoveryController::default()), config, TrimmerConfig::default())
    }

    const LONG: &str = "Một hai ba bốn năm sáu bảy tám chín mười. Mười một mười hai mười ba mười bốn mười lăm mười sáu.";

    #[tokio::test]
    async fn test_single_short_sentence() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend.clone(), EngineConfig::default());

        let result = engine
            .synthesize("Xin chào.", "vi", &reference(0.2), true, &GenerationParams::default(), SynthesisOptions::default())
            .await
            .unwrap();

        assert_eq!(result.segments.len(), 1);
        // 2 слова, 1 знак: 15000*2 + 2000 больше 12000, обрезки нет
        assert_eq!(result.waveform.len(), 12_000);
        assert!(result.metrics.real_time_factor > 0.0);
        assert_eq!(result.metrics.chunk_count, 1);
        assert_eq!(backend.calls.lock().unwrap()[0], "Xin chào.\u{2009}");
    }

    #[tokio::test]
    async fn test_stitching_two_chunks() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend, EngineConfig::default());

        let result = engine
            .synthesize(LONG, "vi", &reference(0.2), true, &GenerationParams::default(), SynthesisOptions::default())
            .await
            .unwrap();

        assert_eq!(result.segments.len(), 2);
        // 0.15 с при 24 кГц = 3600 семплов перекрытия
        assert_eq!(result.waveform.len(), 2 * 12_000 - 3_600);
        assert!(result.waveform.len() <= result.segments.iter().map(Vec::len).sum());
    }

    #[tokio::test]
    async fn test_quiet_reference_output_is_rescaled() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend, EngineConfig::default());

        let result = engine
            .synthesize("Xin chào.", "vi", &reference(0.05), true, &GenerationParams::default(), SynthesisOptions::default())
            .await
            .unwrap();
        assert!((result.waveform[0] - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_validation_happens_before_backend() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend.clone(), EngineConfig::default());
        let params = GenerationParams::default();

        for (text, language) in [("...", "vi"), ("", "vi"), ("Hello there.", "en")] {
            let err = engine
                .synthesize(text, language, &reference(0.2), true, &params, SynthesisOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, SynthesisError::Validation(_)));
        }

        let bad = GenerationParams { nfe_steps: 0, ..GenerationParams::default() };
        let err = engine
            .synthesize("Xin chào.", "vi", &reference(0.2), true, &bad, SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Validation(_)));
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_failure_blocks_further_requests() {
        let backend = Arc::new(ScriptedBackend::failing(
            "Mười một",
            BackendError::from("CUDA error: device-side assert triggered"),
        ));
        let engine = engine(backend.clone(), EngineConfig::default());
        let params = GenerationParams::default();

        let err = engine
            .synthesize(LONG, "vi", &reference(0.2), true, &params, SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));

        let calls_before = backend.calls.lock().unwrap().len();
        let err = engine
            .synthesize("Xin chào.", "vi", &reference(0.2), true, &params, SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));
        assert_eq!(backend.calls.lock().unwrap().len(), calls_before);
    }

    #[tokio::test]
    async fn test_concurrent_chunks_keep_order_and_prefer_fatal() {
        let text = "Một. Hai. Ba. Bốn.";

        let backend = Arc::new(ScriptedBackend::new());
        let config = EngineConfig { max_concurrent_chunks: 3, ..EngineConfig::default() };
        let params = GenerationParams { cross_fade_duration: 0.0, ..GenerationParams::default() };
        let result = engine(backend, config.clone())
            .synthesize(text, "vi", &reference(0.2), true, &params, SynthesisOptions::default())
            .await
            .unwrap();
        assert_eq!(result.segments.len(), 4);

        let backend = Arc::new(ScriptedBackend::failing("Ba", BackendError::from("device-side assert triggered")));
        let err = engine(backend, config)
            .synthesize(text, "vi", &reference(0.2), true, &params, SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_recoverable() {
        let backend = Arc::new(ScriptedBackend { delay: Duration::from_secs(5), ..ScriptedBackend::new() });
        let mut engine = engine(backend, EngineConfig::default());
        engine.config.backend_timeout_secs = 1;

        let err = engine
            .synthesize("Xin chào.", "vi", &reference(0.2), true, &GenerationParams::default(), SynthesisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Recoverable(_)));
        assert!(!engine.recovery.state().is_fatal());
    }

    #[tokio::test]
    async fn test_cancellation_and_progress() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend.clone(), EngineConfig::default());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = SynthesisOptions { progress_sender: None, cancel: Some(cancel) };
        let err = engine
            .synthesize(LONG, "vi", &reference(0.2), true, &GenerationParams::default(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Cancelled(0)));
        assert!(backend.calls.lock().unwrap().is_empty());

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let options = SynthesisOptions { progress_sender: Some(tx), cancel: None };
        engine
            .synthesize(LONG, "vi", &reference(0.2), true, &GenerationParams::default(), options)
            .await
            .unwrap();

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.first(), Some(&ProgressUpdate::Started { total: 2 }));
        assert!(updates.contains(&ProgressUpdate::ChunkCompleted { index: 1, total: 2 }));
        assert!(matches!(updates.last(), Some(ProgressUpdate::Finished { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_fatal_stops_queued_chunks() {
        let backend = Arc::new(ScriptedBackend {
            delay: Duration::from_millis(50),
            ..ScriptedBackend::failing("Một", BackendError::from("CUDA error: device-side assert triggered"))
        });
        let config = EngineConfig { max_concurrent_chunks: 2, ..EngineConfig::default() };
        let engine = engine(backend.clone(), config);

        let err = engine
            .synthesize(
                "Một. Hai. Ba. Bốn. Năm. Sáu.",
                "vi",
                &reference(0.2),
                true,
                &GenerationParams::default(),
                SynthesisOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));
        assert!(engine.recovery.state().is_fatal());
        // Только чанк с ошибкой и тот, что уже занимал второй слот
        let calls = backend.calls.lock().unwrap().clone();
        assert!(calls.len() <= 2, "backend called {} times: {:?}", calls.len(), calls);
    }

    #[tokio::test]
    async fn test_full_progress_channel_does_not_block() {
        let backend = Arc::new(ScriptedBackend::new());
        let engine = engine(backend, EngineConfig::default());

        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let options = SynthesisOptions { progress_sender: Some(tx), cancel: None };
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            engine.synthesize("Một. Hai. Ba.", "vi", &reference(0.2), true, &GenerationParams::default(), options),
        )
        .await
        .expect("synthesis waited on the progress channel")
        .unwrap();

        assert_eq!(result.segments.len(), 3);
        assert_eq!(rx.try_recv().ok(), Some(ProgressUpdate::Started { total: 3 }));
    }
}

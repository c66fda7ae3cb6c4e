use log::{error, info, warn};
use std::sync::Arc;

use crate::config::RecoveryConfig;
use crate::errors::{AppResult, BackendError, SynthesisError};
use crate::models::{AudioClip, FailureKind, FailureRecord, ReferenceVoice};
use crate::services::recovery::classifier::FailureClassifier;
use crate::services::recovery::diagnostics::{DiagnosticsStore, FileDiagnosticsStore};
use crate::services::recovery::restart::{HttpRestartControl, RestartControl, RestartOutcome};
use crate::services::recovery::state::ServiceStateHandle;

/// Что выполнялось в момент сбоя
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureContext<'a> {
    pub text: &'a str,
    pub reference: Option<&'a ReferenceVoice>,
    /// Референс, который ещё готовится: id и клип до conditioning
    pub pending_reference: Option<(&'a str, &'a AudioClip)>,
}

impl<'a> FailureContext<'a> {
    pub fn for_chunk(text: &'a str, reference: &'a ReferenceVoice) -> Self {
        Self { text, reference: Some(reference), pending_reference: None }
    }

    pub fn for_pending_reference(text: &'a str, id: &'a str, audio: &'a AudioClip) -> Self {
        Self { text, reference: None, pending_reference: Some((id, audio)) }
    }

    fn reference_id(&self) -> Option<String> {
        self.reference
            .map(|r| r.id.clone())
            .or_else(|| self.pending_reference.map(|(id, _)| id.to_string()))
    }
}

/// Контроллер восстановления: NORMAL -> FATAL при повреждении бэкенда
pub struct RecoveryController {
    classifier: FailureClassifier,
    state: ServiceStateHandle,
    diagnostics: Option<Arc<dyn DiagnosticsStore>>,
    restart: Option<Arc<dyn RestartControl>>,
    service_id: Option<String>,
}

impl Default for RecoveryController {
    fn default() -> Self {
        Self::new(FailureClassifier::default(), ServiceStateHandle::new())
    }
}

impl RecoveryController {
    pub fn new(classifier: FailureClassifier, state: ServiceStateHandle) -> Self {
        Self {
            classifier,
            state,
            diagnostics: None,
            restart: None,
            service_id: None,
        }
    }

    pub fn from_config(config: &RecoveryConfig, state: ServiceStateHandle) -> Self {
        let mut controller = Self::new(FailureClassifier::new(config.fatal_marker.clone()), state)
            .with_diagnostics(Arc::new(FileDiagnosticsStore::new(&config.diagnostics_dir)));

        match (&config.restart_endpoint, &config.service_id) {
            (Some(endpoint), Some(service_id)) => {
                controller = controller.with_restart(
                    Arc::new(HttpRestartControl::new(endpoint.clone(), config.restart_token.clone())),
                    service_id.clone(),
                );
            }
            _ => info!("Restart control not configured; fatal failures will only be recorded"),
        }
        controller
    }

    pub fn with_diagnostics(mut self, store: Arc<dyn DiagnosticsStore>) -> Self {
        self.diagnostics = Some(store);
        self
    }

    pub fn with_restart(mut self, control: Arc<dyn RestartControl>, service_id: impl Into<String>) -> Self {
        self.restart = Some(control);
        self.service_id = Some(service_id.into());
        self
    }

    pub fn state(&self) -> &ServiceStateHandle {
        &self.state
    }

    /// Fails with SERVICE_UNAVAILABLE while the service is FATAL.
    pub fn ensure_available(&self) -> AppResult<()> {
        if self.state.is_fatal() {
            return Err(SynthesisError::ServiceUnavailable(
                "backend is in a fatal state and awaits restart".to_string(),
            ));
        }
        Ok(())
    }

    /// Переводит ошибку бэкенда в ошибку для вызывающей стороны.
    ///
    /// Fatal failures flip the service state, get recorded and trigger a
    /// restart request. Everything else is returned as recoverable without
    /// side effects.
    pub async fn handle(&self, error: BackendError, context: FailureContext<'_>) -> SynthesisError {
        let message = error.message();

        match self.classifier.classify(&error) {
            FailureKind::Fatal => self.handle_fatal(message, context).await,
            FailureKind::BadReference => {
                warn!("Backend rejected reference audio: {}", message);
                SynthesisError::BadReference(message)
            }
            FailureKind::Transient => {
                warn!("Transient backend failure: {}", message);
                SynthesisError::Recoverable(message)
            }
            FailureKind::Unexpected => {
                warn!("Unexpected backend failure: {}", message);
                SynthesisError::Recoverable(message)
            }
        }
    }

    async fn handle_fatal(&self, message: String, context: FailureContext<'_>) -> SynthesisError {
        let transitioned = self.state.mark_fatal();
        error!("Fatal backend failure, service marked FATAL: {}", message);

        let record = FailureRecord::new(
            FailureKind::Fatal,
            context.text,
            context.reference_id(),
            message.clone(),
        );

        if let Some(store) = &self.diagnostics {
            let owned = match context.pending_reference {
                Some(_) => None,
                None => context.reference.map(|r| AudioClip::new(r.samples.clone(), r.sample_rate)),
            };
            let clip = context.pending_reference.map(|(_, audio)| audio).or(owned.as_ref());
            if let Err(e) = store.persist(&record, clip).await {
                error!("Failed to persist failure record {}: {}", record.id, e);
            }
        }

        // Перезапуск запрашивается один раз, при самом переходе в FATAL
        if transitioned {
            if let (Some(control), Some(service_id)) = (&self.restart, &self.service_id) {
                match control.request_restart(service_id).await {
                    RestartOutcome::Requested => info!("Restart requested for {}", service_id),
                    RestartOutcome::DeploymentInProgress => {
                        info!("Deployment in progress for {}, restart left to infrastructure", service_id)
                    }
                    RestartOutcome::Failed(e) => error!("Restart request for {} failed: {}", service_id, e),
                }
            }
        }

        SynthesisError::ServiceUnavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingStore {
        records: Mutex<Vec<(FailureRecord, bool)>>,
    }

    #[async_trait]
    impl DiagnosticsStore for RecordingStore {
        async fn persist(&self, record: &FailureRecord, reference_audio: Option<&AudioClip>) -> AppResult<()> {
            self.records
                .lock()
                .unwrap()
                .push((record.clone(), reference_audio.is_some()));
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl DiagnosticsStore for FailingStore {
        async fn persist(&self, _record: &FailureRecord, _reference_audio: Option<&AudioClip>) -> AppResult<()> {
            Err(SynthesisError::Io(std::io::Error::other("disk full")))
        }
    }

    struct CountingRestart {
        calls: AtomicUsize,
        outcome: RestartOutcome,
    }

    #[async_trait]
    impl RestartControl for CountingRestart {
        async fn request_restart(&self, _service_id: &str) -> RestartOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn fatal_error() -> BackendError {
        BackendError::from("RuntimeError: CUDA error: device-side assert triggered")
    }

    #[tokio::test]
    async fn test_fatal_flow() {
        let store = Arc::new(RecordingStore::default());
        let restart = Arc::new(CountingRestart {
            calls: AtomicUsize::new(0),
            outcome: RestartOutcome::Requested,
        });
        let controller = RecoveryController::default()
            .with_diagnostics(store.clone())
            .with_restart(restart.clone(), "svc-1");

        let context = FailureContext { text: "Xin chào", ..FailureContext::default() };
        let err = controller.handle(fatal_error(), context).await;

        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));
        assert!(controller.state().is_fatal());
        assert!(controller.ensure_available().is_err());

        let records = store.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.text, "Xin chào");
        assert_eq!(records[0].0.category, FailureKind::Fatal);
        assert_eq!(restart.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_requested_once() {
        let restart = Arc::new(CountingRestart {
            calls: AtomicUsize::new(0),
            outcome: RestartOutcome::DeploymentInProgress,
        });
        let controller = RecoveryController::default().with_restart(restart.clone(), "svc-1");

        controller.handle(fatal_error(), FailureContext::default()).await;
        controller.handle(fatal_error(), FailureContext::default()).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 1);

        // После сброса новый сбой снова запрашивает перезапуск
        controller.state().reset();
        assert!(controller.ensure_available().is_ok());
        controller.handle(fatal_error(), FailureContext::default()).await;
        assert_eq!(restart.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_mask_fatal() {
        let controller = RecoveryController::default().with_diagnostics(Arc::new(FailingStore));
        let err = controller.handle(fatal_error(), FailureContext::default()).await;
        assert!(matches!(err, SynthesisError::ServiceUnavailable(_)));
        assert!(controller.state().is_fatal());
    }

    #[tokio::test]
    async fn test_recoverable_has_no_side_effects() {
        let store = Arc::new(RecordingStore::default());
        let controller = RecoveryController::default().with_diagnostics(store.clone());

        let err = controller
            .handle(BackendError::Decode("bad header".into()), FailureContext::default())
            .await;
        assert!(matches!(err, SynthesisError::BadReference(_)));

        let err = controller
            .handle(BackendError::from("out of memory"), FailureContext::default())
            .await;
        assert!(matches!(err, SynthesisError::Recoverable(_)));
        assert!(err.is_retryable());

        assert!(!controller.state().is_fatal());
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_writes_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecoveryConfig {
            diagnostics_dir: dir.path().to_path_buf(),
            ..RecoveryConfig::default()
        };
        let controller = RecoveryController::from_config(&config, ServiceStateHandle::new());

        controller.handle(fatal_error(), FailureContext { text: "Xin chào", ..FailureContext::default() }).await;
        assert!(dir.path().join("failures.jsonl").exists());
    }

    #[tokio::test]
    async fn test_pending_reference_audio_is_persisted() {
        let store = Arc::new(RecordingStore::default());
        let controller = RecoveryController::default().with_diagnostics(store.clone());
        let clip = AudioClip::new(vec![0.1; 240], 24_000);

        let context = FailureContext::for_pending_reference("Xin chào. ", "ref-7", &clip);
        controller.handle(fatal_error(), context).await;

        let records = store.records.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.reference_id.as_deref(), Some("ref-7"));
        assert!(records[0].1);
    }
}

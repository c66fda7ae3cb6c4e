//! Append-only хранилище записей о фатальных сбоях.

use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::errors::{AppResult, SynthesisError};
use crate::models::{AudioClip, FailureRecord};
use crate::services::audio::format::encode_wav;

const FAILURE_LOG: &str = "failures.jsonl";

#[async_trait]
pub trait DiagnosticsStore: Send + Sync {
    /// Сохраняет запись и, если есть, референсное аудио
    async fn persist(&self, record: &FailureRecord, reference_audio: Option<&AudioClip>) -> AppResult<()>;
}

/// Хранилище в директории на диске.
///
/// Каждая запись дописывается строкой в `failures.jsonl` и отдельно
/// сохраняется как `{timestamp}_{uuid}.json`, референс как `.wav`.
pub struct FileDiagnosticsStore {
    dir: PathBuf,
}

impl FileDiagnosticsStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(FAILURE_LOG)
    }
}

#[async_trait]
impl DiagnosticsStore for FileDiagnosticsStore {
    async fn persist(&self, record: &FailureRecord, reference_audio: Option<&AudioClip>) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut log_file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .await?;
        log_file.write_all(line.as_bytes()).await?;
        log_file.flush().await?;

        let stem = record.file_stem();
        let record_path = self.dir.join(format!("{}.json", stem));
        tokio::fs::write(&record_path, serde_json::to_vec_pretty(record)?).await?;

        if let Some(clip) = reference_audio.filter(|c| !c.is_empty()) {
            let wav_path = self.dir.join(format!("{}.wav", stem));
            let samples = clip.samples.clone();
            let sample_rate = clip.sample_rate;
            tokio::task::spawn_blocking(move || encode_wav(&samples, sample_rate, &wav_path))
                .await
                .map_err(|e| SynthesisError::Audio(format!("diagnostics writer panicked: {}", e)))??;
        }

        info!("Persisted failure record {} to {}", record.id, self.dir.display());
        Ok(())
    }
}

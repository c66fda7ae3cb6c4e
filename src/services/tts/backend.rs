//! Capabilities of the external generative model.
//!
//! Модель, вокодер и распознавание речи живут вне этого крейта; оркестратор
//! видит их только через эти трейты.

use async_trait::async_trait;

use crate::config::GenerationParams;
use crate::errors::BackendError;
use crate::models::{AudioClip, Conditioning, ConditioningParams};

/// Голосо-обусловленная модель синтеза
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate a waveform for `text` in the voice described by `conditioning`.
    async fn infer(
        &self,
        text: &str,
        conditioning: &Conditioning,
        params: &GenerationParams,
    ) -> Result<Vec<f32>, BackendError>;

    /// Derive conditioning from a prepared reference clip.
    async fn get_conditioning(
        &self,
        clip: &AudioClip,
        params: &ConditioningParams,
    ) -> Result<Conditioning, BackendError>;

    /// Частота дискретизации, с которой работает модель
    fn sample_rate(&self) -> u32;
}

/// Автоматическое распознавание транскрипта референса
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, BackendError>;
}

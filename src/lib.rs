//! Voice-cloning speech synthesis pipeline.
//!
//! Подготовка референсного голоса, нормализация и сегментация текста,
//! синтез по чанкам через внешнюю модель со склейкой кроссфейдом и
//! восстановление после фатальных сбоев бэкенда.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use errors::{AppResult, BackendError, ErrorCategory, SynthesisError, SynthesisFailure};
pub use models::{AudioClip, Conditioning, ReferenceVoice, SynthesisResult, TextChunk};
pub use services::tts::{ModelBackend, SynthesisOptions, Transcriber};
pub use services::{VoiceCloner, VoiceClonerBuilder};

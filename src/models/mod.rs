// Data models shared across the synthesis pipeline

pub mod audio;
pub mod failure;
pub mod synthesis;
pub mod voice;

pub use audio::AudioClip;
pub use failure::{FailureKind, FailureRecord, ServiceState};
pub use synthesis::{ProgressUpdate, SynthesisMetrics, SynthesisResult, TextChunk};
pub use voice::{Conditioning, ConditioningParams, ReferenceVoice};

pub use crate::config::GenerationParams;

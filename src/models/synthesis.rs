use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Фрагмент текста, синтезируемый одним вызовом бэкенда
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Позиция чанка во входном тексте
    pub index: usize,
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisMetrics {
    pub elapsed: Duration,
    pub audio_secs: f32,
    /// Wall-clock seconds spent per second of produced audio.
    pub real_time_factor: f32,
    pub chunk_count: usize,
}

impl SynthesisMetrics {
    pub fn new(elapsed: Duration, audio_secs: f32, chunk_count: usize) -> Self {
        let real_time_factor = if audio_secs > 0.0 {
            elapsed.as_secs_f32() / audio_secs
        } else {
            0.0
        };
        Self {
            elapsed,
            audio_secs,
            real_time_factor,
            chunk_count,
        }
    }
}

/// Результат синтеза: сегменты по чанкам и склеенная волна
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Обрезанные сегменты, по одному на чанк, в порядке чанков
    pub segments: Vec<Vec<f32>>,
    pub waveform: Vec<f32>,
    pub sample_rate: u32,
    pub metrics: SynthesisMetrics,
}

impl SynthesisResult {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.waveform.len() as f32 / self.sample_rate as f32
    }
}

/// Обновления о прогрессе синтеза
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProgressUpdate {
    /// Начало синтеза, известно число чанков
    Started { total: usize },
    /// Чанк синтезирован
    ChunkCompleted { index: usize, total: usize },
    /// Склейка сегментов
    Stitching,
    /// Синтез завершен
    Finished { audio_secs: f32 },
}

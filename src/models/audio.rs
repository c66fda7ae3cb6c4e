use crate::services::audio::format::{compute_rms, duration_in_seconds};

/// Моно аудио в формате f32 с частотой дискретизации
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// PCM семплы (32-bit float, mono)
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        duration_in_seconds(self.samples.len(), self.sample_rate)
    }

    pub fn rms(&self) -> f32 {
        compute_rms(&self.samples)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

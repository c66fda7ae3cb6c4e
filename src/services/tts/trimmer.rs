//! Обрезка хвоста у очень коротких фраз.
//!
//! The sample counts are an empirically tuned compatibility heuristic, defined
//! at 24 kHz. A voice-activity detector would be the proper replacement.

use log::debug;

use crate::config::TrimmerConfig;
use crate::config::tts::REFERENCE_SAMPLE_RATE;

const PUNCTUATION: [char; 4] = ['.', '!', '?', ','];

/// Число слов: все токены между пробелами, включая отдельную пунктуацию
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn punctuation_count(text: &str) -> usize {
    text.chars().filter(|c| PUNCTUATION.contains(c)).count()
}

#[derive(Debug, Clone, Default)]
pub struct ShortUtteranceTrimmer {
    config: TrimmerConfig,
}

impl ShortUtteranceTrimmer {
    pub fn new(config: TrimmerConfig) -> Self {
        Self { config }
    }

    /// Number of samples to keep, or `None` when the waveform stays as is.
    pub fn keep_samples(&self, text: &str, language: &str, sample_rate: u32) -> Option<usize> {
        if self
            .config
            .untrimmed_languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
        {
            return None;
        }

        let words = word_count(text);
        let punct = punctuation_count(text);
        let at_24k = match words {
            0..=4 => 15_000 * words + 2_000 * punct,
            5..=9 => 13_000 * words + 2_000 * punct,
            _ => return None,
        };

        let scaled = at_24k as u64 * sample_rate as u64 / REFERENCE_SAMPLE_RATE as u64;
        Some(scaled as usize)
    }

    /// Обрезает волну; никогда не удлиняет её.
    pub fn trim(&self, mut waveform: Vec<f32>, text: &str, language: &str, sample_rate: u32) -> Vec<f32> {
        if let Some(keep) = self.keep_samples(text, language, sample_rate) {
            if keep < waveform.len() {
                debug!("Trimming short utterance from {} to {} samples", waveform.len(), keep);
                waveform.truncate(keep);
            }
        }
        waveform
    }
}

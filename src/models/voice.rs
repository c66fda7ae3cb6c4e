use serde::{Deserialize, Serialize};

/// Opaque conditioning tensor produced by the model backend from a reference clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditioning {
    pub values: Vec<f32>,
    pub shape: Vec<usize>,
}

impl Conditioning {
    pub fn new(values: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { values, shape }
    }
}

/// Параметры извлечения conditioning из референса
#[derive(Debug, Clone, PartialEq)]
pub struct ConditioningParams {
    /// Транскрипт референсного аудио
    pub transcript: String,
    pub target_rms: f32,
}

/// Подготовленный референсный голос.
///
/// Создаётся один раз на вызов предобработки и дальше только читается;
/// следующая предобработка заменяет его целиком.
#[derive(Debug, Clone)]
pub struct ReferenceVoice {
    pub id: String,
    /// Семплы после обрезки, нормализации громкости и ресемплинга
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub transcript: String,
    pub conditioning: Conditioning,
    /// Длительность после обрезки, в секундах
    pub duration_secs: f32,
    /// RMS до нормализации громкости
    pub rms: f32,
    /// RMS, к которому был поднят тихий референс
    pub target_rms: f32,
}

impl ReferenceVoice {
    /// Whether the clip was boosted before conditioning, in which case
    /// generated audio is scaled back by `rms / target_rms`.
    pub fn was_boosted(&self) -> bool {
        self.rms > 0.0 && self.rms < self.target_rms
    }

    pub fn output_gain(&self) -> f32 {
        if self.was_boosted() {
            self.rms / self.target_rms
        } else {
            1.0
        }
    }

    /// Бюджет символов на чанк, выведенный из темпа речи референса.
    ///
    /// Speech rate of the reference (bytes of transcript per second) times the
    /// room left in a 22 second window. `None` when the reference is too long
    /// to leave any room.
    pub fn max_chunk_chars(&self) -> Option<usize> {
        if self.duration_secs <= 0.0 {
            return None;
        }
        let room = 22.0 - self.duration_secs;
        if room <= 0.0 {
            return None;
        }
        let rate = self.transcript.len() as f32 / self.duration_secs;
        let budget = (rate * room) as usize;
        (budget > 0).then_some(budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(rms: f32, duration_secs: f32, transcript: &str) -> ReferenceVoice {
        ReferenceVoice {
            id: "ref".to_string(),
            samples: Vec::new(),
            sample_rate: 24_000,
            transcript: transcript.to_string(),
            conditioning: Conditioning::new(Vec::new(), vec![0]),
            duration_secs,
            rms,
            target_rms: 0.1,
        }
    }

    #[test]
    fn test_output_gain() {
        assert_eq!(voice(0.2, 5.0, "a").output_gain(), 1.0);
        assert!((voice(0.05, 5.0, "a").output_gain() - 0.5).abs() < 1e-6);
        // Тишина не усиливается
        assert_eq!(voice(0.0, 5.0, "a").output_gain(), 1.0);
    }

    #[test]
    fn test_max_chunk_chars() {
        // 50 байт за 10 секунд = 5 байт/с, запас 12 секунд
        let transcript = "a".repeat(50);
        assert_eq!(voice(0.1, 10.0, &transcript).max_chunk_chars(), Some(60));
        assert_eq!(voice(0.1, 25.0, &transcript).max_chunk_chars(), None);
        assert_eq!(voice(0.1, 0.0, &transcript).max_chunk_chars(), None);
    }
}

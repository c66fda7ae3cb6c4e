use crate::config::DEFAULT_FATAL_MARKER;
use crate::errors::BackendError;
use crate::models::FailureKind;

// Сообщения, по которым бэкенд сообщает о битом референсе
const DECODE_PATTERNS: [&str; 7] = [
    "failed to decode",
    "could not decode",
    "unable to decode",
    "decoding failed",
    "invalid data found",
    "not a valid audio",
    "corrupted audio",
];

/// Классификатор ошибок бэкенда.
///
/// This is the only place in the crate that inspects backend error text.
#[derive(Debug, Clone)]
pub struct FailureClassifier {
    fatal_marker: String,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FATAL_MARKER)
    }
}

impl FailureClassifier {
    pub fn new(fatal_marker: impl Into<String>) -> Self {
        Self {
            fatal_marker: fatal_marker.into(),
        }
    }

    pub fn classify(&self, error: &BackendError) -> FailureKind {
        let message = error.message();
        if !self.fatal_marker.is_empty() && message.contains(&self.fatal_marker) {
            return FailureKind::Fatal;
        }

        match error {
            BackendError::Decode(_) => FailureKind::BadReference,
            BackendError::Timeout(_) => FailureKind::Transient,
            BackendError::Failed(msg) => {
                let lower = msg.to_lowercase();
                if DECODE_PATTERNS.iter().any(|p| lower.contains(p)) {
                    FailureKind::BadReference
                } else {
                    FailureKind::Unexpected
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fatal_marker() {
        let classifier = FailureClassifier::default();
        let err = BackendError::from("CUDA error: device-side assert triggered\nCompile with TORCH_USE_CUDA_DSA");
        assert_eq!(classifier.classify(&err), FailureKind::Fatal);

        // Маркер важнее типа ошибки
        let err = BackendError::Decode("device-side assert triggered".into());
        assert_eq!(classifier.classify(&err), FailureKind::Fatal);
    }

    #[test]
    fn test_custom_marker() {
        let classifier = FailureClassifier::new("illegal memory access");
        assert_eq!(
            classifier.classify(&BackendError::from("an illegal memory access was encountered")),
            FailureKind::Fatal
        );
        assert_eq!(
            classifier.classify(&BackendError::from("device-side assert triggered")),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn test_bad_reference() {
        let classifier = FailureClassifier::default();
        assert_eq!(
            classifier.classify(&BackendError::Decode("bad header".into())),
            FailureKind::BadReference
        );
        assert_eq!(
            classifier.classify(&BackendError::from("Invalid data found when processing input")),
            FailureKind::BadReference
        );
    }

    #[test]
    fn test_transient_and_unexpected() {
        let classifier = FailureClassifier::default();
        assert_eq!(
            classifier.classify(&BackendError::Timeout(Duration::from_secs(5))),
            FailureKind::Transient
        );
        assert_eq!(
            classifier.classify(&BackendError::from("out of memory")),
            FailureKind::Unexpected
        );
    }
}

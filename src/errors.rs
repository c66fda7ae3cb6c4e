// Error handling module
// Taxonomy of synthesis failures and the raw error surface of the model backend

use serde::Serialize;
use thiserror::Error;

/// Категория ошибки, видимая вызывающей стороне
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Не хватает обязательных входных данных
    Configuration,
    /// Некорректный текст, язык или параметры
    Validation,
    /// Повторяемая ошибка бэкенда
    RecoverableBackend,
    /// Повреждение состояния бэкенда, требуется перезапуск
    FatalBackend,
    /// Запрос отменён между чанками
    Cancelled,
    /// Ошибка ввода/вывода вне бэкенда
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Validation => "validation",
            Self::RecoverableBackend => "recoverable_backend",
            Self::FatalBackend => "fatal_backend",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure reported by the opaque model backend.
///
/// This is the only error type that may carry an unclassified message; it is
/// translated into [`SynthesisError`] by the failure classifier.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("failed to decode reference audio: {0}")]
    Decode(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Failed(String),
}

impl BackendError {
    /// Описание ошибки в том виде, в каком его вернул бэкенд
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<String> for BackendError {
    fn from(err: String) -> Self {
        BackendError::Failed(err)
    }
}

impl From<&str> for BackendError {
    fn from(err: &str) -> Self {
        BackendError::Failed(err.to_string())
    }
}

// Application error type
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad reference audio: {0}")]
    BadReference(String),

    #[error("Backend failure: {0}")]
    Recoverable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Synthesis cancelled before chunk {0}")]
    Cancelled(usize),

    #[error("Audio processing error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynthesisError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::BadReference(_) | Self::Recoverable(_) => ErrorCategory::RecoverableBackend,
            Self::ServiceUnavailable(_) => ErrorCategory::FatalBackend,
            Self::Cancelled(_) => ErrorCategory::Cancelled,
            Self::Audio(_) | Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Может ли вызывающая сторона повторить тот же запрос
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Recoverable(_) | Self::Cancelled(_))
    }

    /// Человекочитаемая подсказка для пользователя
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Provide the missing input (for example a reference transcript) and try again.",
            Self::Validation(_) => "Check the input text, language and generation parameters.",
            Self::BadReference(_) => "The reference audio could not be used. Upload a different, valid audio clip.",
            Self::Recoverable(_) => "Unexpected failure. Please retry the request.",
            Self::ServiceUnavailable(_) => "The service is restarting. Try again in a few minutes.",
            Self::Cancelled(_) => "The request was cancelled.",
            Self::Audio(_) | Self::Io(_) => "Internal audio error. Please retry the request.",
        }
    }

    /// Структурированное представление для передачи клиенту
    pub fn to_failure(&self) -> SynthesisFailure {
        SynthesisFailure {
            category: self.category(),
            message: self.to_string(),
            hint: self.hint().to_string(),
        }
    }
}

impl From<hound::Error> for SynthesisError {
    fn from(err: hound::Error) -> Self {
        SynthesisError::Audio(err.to_string())
    }
}

impl From<serde_json::Error> for SynthesisError {
    fn from(err: serde_json::Error) -> Self {
        SynthesisError::Configuration(err.to_string())
    }
}

/// Structured failure returned to callers instead of a raw error.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisFailure {
    pub category: ErrorCategory,
    pub message: String,
    pub hint: String,
}

// Result type alias for the crate
pub type AppResult<T> = Result<T, SynthesisError>;

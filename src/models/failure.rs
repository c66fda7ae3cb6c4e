use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Класс ошибки бэкенда после классификации
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Device-side assertion; the process has to be restarted.
    Fatal,
    /// Референс не удалось декодировать
    BadReference,
    /// Таймаут или временная недоступность
    Transient,
    Unexpected,
}

impl FailureKind {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureKind::Fatal)
    }
}

/// Запись о фатальном сбое, сохраняемая для диагностики
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: FailureKind,
    /// Текст запроса, на котором упал бэкенд
    pub text: String,
    pub reference_id: Option<String>,
    pub message: String,
}

impl FailureRecord {
    pub fn new(
        category: FailureKind,
        text: impl Into<String>,
        reference_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category,
            text: text.into(),
            reference_id,
            message: message.into(),
        }
    }

    /// Stem shared by every file written for this record.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.timestamp.format("%Y%m%d_%H%M%S"), self.id)
    }
}

/// Состояние сервиса
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceState {
    Normal = 0,
    Fatal = 1,
}

impl ServiceState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceState::Normal,
            _ => ServiceState::Fatal,
        }
    }
}

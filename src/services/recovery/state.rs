use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::models::ServiceState;

/// Shared NORMAL/FATAL flag. Cloning shares the same flag.
#[derive(Debug, Clone)]
pub struct ServiceStateHandle {
    inner: Arc<AtomicU8>,
}

impl Default for ServiceStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceStateHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(ServiceState::Normal as u8)),
        }
    }

    pub fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.inner.load(Ordering::SeqCst))
    }

    pub fn is_fatal(&self) -> bool {
        self.get() == ServiceState::Fatal
    }

    /// Переводит сервис в FATAL. Returns `true` only for the call that made
    /// the transition.
    pub fn mark_fatal(&self) -> bool {
        self.inner
            .compare_exchange(
                ServiceState::Normal as u8,
                ServiceState::Fatal as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Возврат в NORMAL (действие оператора или супервизора)
    pub fn reset(&self) {
        self.inner.store(ServiceState::Normal as u8, Ordering::SeqCst);
    }
}

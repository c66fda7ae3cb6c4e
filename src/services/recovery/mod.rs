// Classification of backend failures and recovery from fatal ones

pub mod classifier;
pub mod controller;
pub mod diagnostics;
pub mod restart;
pub mod state;

pub use classifier::FailureClassifier;
pub use controller::{FailureContext, RecoveryController};
pub use diagnostics::{DiagnosticsStore, FileDiagnosticsStore};
pub use restart::{HttpRestartControl, RestartControl, RestartOutcome};
pub use state::ServiceStateHandle;

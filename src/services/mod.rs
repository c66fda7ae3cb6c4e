// Services module
// Contains the synthesis pipeline and its collaborators

pub mod audio;
pub mod batch;
pub mod cloner;
pub mod recovery;
pub mod text;
pub mod tts;
pub mod voice;

pub use cloner::{VoiceCloner, VoiceClonerBuilder};

// Reference voice preparation

pub mod reference;

pub use reference::{ReferenceVoiceProcessor, terminate_transcript};

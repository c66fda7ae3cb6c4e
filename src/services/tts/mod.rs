// Speech synthesis: backend capabilities, chunked orchestration and trimming

pub mod backend;
pub mod engine;
pub mod http_backend;
pub mod trimmer;

pub use backend::{ModelBackend, Transcriber};
pub use engine::{SynthesisEngine, SynthesisOptions};
pub use http_backend::HttpModelBackend;
pub use trimmer::ShortUtteranceTrimmer;

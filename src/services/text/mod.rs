// Text preparation: normalization and sentence segmentation

pub mod normalizer;
pub mod segmenter;

pub use normalizer::{LanguageNormalizer, PassthroughNormalizer, TextNormalizer};
pub use segmenter::{PAUSE_MARKER, SentenceSegmenter};

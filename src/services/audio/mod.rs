// Audio helpers: decoding, encoding, resampling and chunk stitching

pub mod format;
pub mod merge;
pub mod resample;

pub use format::{compute_rms, decode_audio_file, duration_in_seconds, encode_wav};
pub use merge::{crossfade_samples, merge_with_crossfade};
pub use resample::resample_mono;

//! Resampling of reference clips to the rate the model backend expects.

use log::debug;
use rubato::{FftFixedIn, Resampler};

use crate::errors::{AppResult, SynthesisError};

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Ресемплинг моно сигнала в произвольную частоту
pub fn resample_mono(input: &[f32], sr_in: u32, sr_out: u32) -> AppResult<Vec<f32>> {
    if sr_in == sr_out || input.is_empty() {
        return Ok(input.to_vec());
    }
    if sr_in == 0 || sr_out == 0 {
        return Err(SynthesisError::Audio(format!(
            "invalid sample rates: {} -> {}",
            sr_in, sr_out
        )));
    }

    let mut resampler = FftFixedIn::<f32>::new(sr_in as usize, sr_out as usize, CHUNK, SUB_CHUNKS, 1)
        .map_err(|e| SynthesisError::Audio(format!("failed to create resampler: {}", e)))?;

    let expected_len = (input.len() as f64 * sr_out as f64 / sr_in as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(expected_len + delay + CHUNK);

    // Последний неполный блок дополняется нулями, затем прогоняем хвост,
    // пока задержка фильтра не будет вытолкнута
    let mut pos = 0;
    while pos < input.len() || out.len() < expected_len + delay {
        let end = (pos + CHUNK).min(input.len());
        let mut block = vec![0.0; CHUNK];
        if pos < end {
            block[..end - pos].copy_from_slice(&input[pos..end]);
        }

        let block = vec![block];
        let frames = resampler
            .process(&block, None)
            .map_err(|e| SynthesisError::Audio(format!("resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);

        pos = end.max(pos + CHUNK);
    }

    // FFT ресемплер вносит задержку, отбрасываем её
    out.drain(..delay.min(out.len()));
    out.resize(expected_len, 0.0);

    debug!("Resampled {} samples {} Hz -> {} samples {} Hz", input.len(), sr_in, out.len(), sr_out);
    Ok(out)
}

use log::debug;

use crate::config::FadeCurve;

/// Число семплов перекрытия для длительности кроссфейда
pub fn crossfade_samples(duration_secs: f32, sample_rate: u32) -> usize {
    if !(duration_secs.is_finite() && duration_secs > 0.0) {
        return 0;
    }
    (duration_secs * sample_rate as f32) as usize
}

/// Веса (fade_out, fade_in) для позиции `j` в окне из `n` семплов.
/// The two weights always sum to one.
fn fade_weights(curve: FadeCurve, j: usize, n: usize) -> (f32, f32) {
    let fade_out = match curve {
        FadeCurve::RaisedCosine => {
            0.5 * (1.0 + ((std::f32::consts::PI * j as f32) / n as f32).cos())
        }
        FadeCurve::Linear => 1.0 - j as f32 / n as f32,
    };
    (fade_out, 1.0 - fade_out)
}

/// Склеивает сегменты с кроссфейдом.
///
/// Each boundary overlaps by `crossfade_samples`, clamped to the shorter of the
/// two neighbours, so the result is `sum(len) - sum(overlap)` samples long.
/// A zero overlap is plain concatenation.
pub fn merge_with_crossfade(segments: &[Vec<f32>], crossfade_samples: usize, curve: FadeCurve) -> Vec<f32> {
    let Some((first, rest)) = segments.split_first() else {
        return Vec::new();
    };

    let capacity = segments.iter().map(Vec::len).sum::<usize>();
    let mut result = Vec::with_capacity(capacity);
    result.extend_from_slice(first);

    // Длина предыдущего сегмента, а не всего накопленного результата
    let mut prev_len = first.len();

    for segment in rest {
        let overlap = crossfade_samples.min(prev_len).min(segment.len());

        if overlap == 0 {
            result.extend_from_slice(segment);
        } else {
            let fade_start = result.len() - overlap;
            for j in 0..overlap {
                let (fade_out, fade_in) = fade_weights(curve, j, overlap);
                result[fade_start + j] = result[fade_start + j] * fade_out + segment[j] * fade_in;
            }
            result.extend_from_slice(&segment[overlap..]);
        }

        debug!("Merged segment of {} samples with {} samples overlap", segment.len(), overlap);
        prev_len = segment.len();
    }

    result
}

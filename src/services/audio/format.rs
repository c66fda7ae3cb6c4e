//! # Audio Format Handling
//!
//! Декодирование референсных клипов и кодирование результата в WAV.
//!
//! - WAV читается через hound (8/16/24/32 бит, целочисленный и float)
//! - MP3, M4A, AAC, FLAC, OGG декодируются через Symphonia
//! - Многоканальное аудио сводится в моно
//! - Результат синтеза пишется как моно WAV 32-bit float

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::errors::{AppResult, SynthesisError};
use crate::models::AudioClip;

/// Вычисляет длительность аудио в секундах
pub fn duration_in_seconds(sample_count: usize, sample_rate: u32) -> f32 {
    sample_count as f32 / sample_rate as f32
}

/// Вычисляет среднеквадратичное значение (RMS) для массива семплов.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Декодирует аудиофайл в моно клип.
///
/// Формат определяется по расширению: WAV читается через hound, остальные
/// поддерживаемые форматы через Symphonia.
pub fn decode_audio_file<P: AsRef<Path>>(file_path: P) -> AppResult<AudioClip> {
    let file_path = file_path.as_ref();
    let extension = file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "wav" => decode_wav_file(file_path),
        "mp3" | "m4a" | "aac" | "flac" | "ogg" => {
            let data = std::fs::read(file_path)?;
            let clip = decode_audio_bytes(data, Some(&extension))?;
            info!(
                "Decoded {} samples from {} at {} Hz",
                clip.samples.len(),
                file_path.display(),
                clip.sample_rate
            );
            Ok(clip)
        }
        _ => Err(SynthesisError::Audio(format!(
            "unsupported audio format: {}",
            extension
        ))),
    }
}

/// Декодирует бинарные данные любого формата, известного Symphonia.
pub fn decode_audio_bytes(data: Vec<u8>, extension: Option<&str>) -> AppResult<AudioClip> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| SynthesisError::Audio(format!("failed to probe audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SynthesisError::Audio("no audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SynthesisError::Audio(format!("failed to create decoder: {}", e)))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SynthesisError::Audio("unknown sample rate".to_string()))?;

    let mut pcm_data = Vec::new();

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                // Interleaved копия, каналы сводятся по фреймам
                sample_buf.copy_interleaved_ref(decoded);
                pcm_data.extend(downmix(sample_buf.samples(), channels));
            }
            Err(e) => {
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
        }
    }

    if pcm_data.is_empty() {
        return Err(SynthesisError::Audio("decoded audio is empty".to_string()));
    }

    Ok(AudioClip::new(pcm_data, sample_rate))
}

/// Декодирует WAV-файл в моно клип.
pub fn decode_wav_file<P: AsRef<Path>>(file_path: P) -> AppResult<AudioClip> {
    let reader = WavReader::open(file_path.as_ref())?;
    decode_wav(reader)
}

fn decode_wav<R: std::io::Read>(mut reader: WavReader<R>) -> AppResult<AudioClip> {
    let spec = reader.spec();

    let pcm_data: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|s| s as f32 / 128.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|s| s as f32 / 32768.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 8388608.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|s| s as f32 / 2147483648.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        _ => {
            return Err(SynthesisError::Audio(format!(
                "unsupported WAV format: {:?}, {} bits",
                spec.sample_format, spec.bits_per_sample
            )));
        }
    };

    let channels = spec.channels as usize;
    debug!(
        "Decoded WAV: {} samples, {} channels, {} Hz",
        pcm_data.len(),
        channels,
        spec.sample_rate
    );
    Ok(AudioClip::new(downmix(&pcm_data, channels), spec.sample_rate))
}

// Сводит interleaved каналы в моно
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Кодирует PCM семплы в моно WAV-файл (32-bit float).
pub fn encode_wav<P: AsRef<Path>>(pcm_data: &[f32], sample_rate: u32, output_path: P) -> AppResult<()> {
    let output_path = output_path.as_ref();
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(output_path, spec)?;
    for &sample in pcm_data {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!(
        "Saved WAV file: {} ({} samples, {} Hz)",
        output_path.display(),
        pcm_data.len(),
        sample_rate
    );
    Ok(())
}

//! Пакетная озвучка директории текстовых файлов.

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::{AppResult, SynthesisError, SynthesisFailure};
use crate::services::cloner::VoiceCloner;
use crate::services::tts::engine::SynthesisOptions;
use crate::utils::common::{check_file_exists_and_valid, output_file_name};

/// Итог пакетной обработки
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, SynthesisFailure)>,
}

/// Text files directly inside `input_dir`, sorted by name.
pub fn collect_text_files<P: AsRef<Path>>(input_dir: P) -> AppResult<Vec<PathBuf>> {
    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        return Err(SynthesisError::Configuration(format!(
            "input directory {} does not exist",
            input_dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Output stem: the file name up to its first dot.
pub fn output_stem(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or("output")
        .to_string()
}

/// Озвучивает каждый `.txt` файл в `{stem}_1.wav`.
///
/// Recoverable failures are recorded and the batch continues; once the
/// service turns unavailable the batch stops.
pub async fn run_batch<P: AsRef<Path>, Q: AsRef<Path>>(
    cloner: &VoiceCloner,
    input_dir: P,
    output_dir: Q,
    skip_existing: bool,
) -> AppResult<BatchReport> {
    let output_dir = output_dir.as_ref();
    tokio::fs::create_dir_all(output_dir).await?;

    let files = collect_text_files(input_dir)?;
    info!("Found {} text files", files.len());

    let mut report = BatchReport::default();
    for path in files {
        let output_path = output_dir.join(output_file_name(&output_stem(&path), 1));

        if skip_existing && check_file_exists_and_valid(&output_path).await {
            info!("Skipping {}, output already exists", path.display());
            report.skipped.push(output_path);
            continue;
        }

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                report.failed.push((path, SynthesisError::from(e).to_failure()));
                continue;
            }
        };
        match cloner
            .synthesize_to_file(&text, &output_path, SynthesisOptions::default())
            .await
        {
            Ok(result) => {
                info!(
                    "Saved {} ({:.2}s audio, RTF {:.3})",
                    output_path.display(),
                    result.metrics.audio_secs,
                    result.metrics.real_time_factor
                );
                report.written.push(output_path);
            }
            Err(e @ SynthesisError::ServiceUnavailable(_)) => {
                error!("Stopping batch at {}: {}", path.display(), e);
                report.failed.push((path, e.to_failure()));
                break;
            }
            Err(e) => {
                warn!("Failed to synthesize {}: {}", path.display(), e);
                report.failed.push((path, e.to_failure()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(Path::new("/books/chuong_1.txt")), "chuong_1");
        assert_eq!(output_stem(Path::new("/books/truyen.phan2.txt")), "truyen");
    }

    #[test]
    fn test_collect_text_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "Hai.").unwrap();
        std::fs::write(dir.path().join("a.TXT"), "Một.").unwrap();
        std::fs::write(dir.path().join("cover.png"), b"png").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.txt"), "Ba.").unwrap();

        let files = collect_text_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);

        assert!(collect_text_files(dir.path().join("missing")).is_err());
    }
}

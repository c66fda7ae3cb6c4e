//! Common utility functions used across the application

use std::path::Path;

/// Name of the n-th produced audio file, 1-based: `{name}_{index}.wav`
pub fn output_file_name(name: &str, index: usize) -> String {
    format!("{}_{}.wav", name, index)
}

/// Check if a file exists and has valid content (non-zero size)
pub async fn check_file_exists_and_valid(path: &Path) -> bool {
    if let Ok(metadata) = tokio::fs::metadata(path).await {
        if metadata.is_file() && metadata.len() > 0 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("chuong_1", 1), "chuong_1_1.wav");
        assert_eq!(output_file_name("truyen", 3), "truyen_3.wav");
    }

    #[tokio::test]
    async fn test_check_file_exists_and_valid() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        let full = dir.path().join("full.wav");
        std::fs::write(&full, b"RIFF").unwrap();

        assert!(!check_file_exists_and_valid(&empty).await);
        assert!(check_file_exists_and_valid(&full).await);
        assert!(!check_file_exists_and_valid(&dir.path().join("none.wav")).await);
    }
}

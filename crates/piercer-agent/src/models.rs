//! Scanning the models directory for installed weights.

use std::path::Path;

/// Filenames of `*.gguf`/`*.ggml` files directly under `dir`, sorted.
///
/// An unreadable directory (not yet created, permissions) reports no
/// installed models rather than failing; the agent still connects and can
/// report an empty fleet contribution.
pub fn scan_installed_models(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut models: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            let ext = path.extension()?.to_str()?;
            if ext == "gguf" || ext == "ggml" {
                path.file_name()?.to_str().map(str::to_owned)
            } else {
                None
            }
        })
        .collect();
    models.sort();
    models
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn only_model_extensions_are_reported() {
        let dir = std::env::temp_dir().join(format!("piercer-agent-models-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("llama.gguf"), b"").unwrap();
        std::fs::write(dir.join("old.ggml"), b"").unwrap();
        std::fs::write(dir.join("README.md"), b"").unwrap();

        let mut found = scan_installed_models(&dir);
        found.sort();
        assert_eq!(found, vec!["llama.gguf".to_string(), "old.ggml".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn a_missing_directory_reports_no_models() {
        let dir = std::env::temp_dir().join(format!("piercer-agent-missing-{}", uuid::Uuid::new_v4()));
        assert!(scan_installed_models(&dir).is_empty());
    }
}

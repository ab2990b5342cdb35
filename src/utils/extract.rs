// src/utils/extract.rs

use std::path::Path;

/// Best-effort text extraction from an uploaded file.
///
/// Text-like files are read as lossy UTF-8. Binary presentation and PDF
/// formats are outside this service's scope and yield an empty string,
/// which the generation pipeline treats as "no material" and answers with
/// the mock question set. A real extractor can slot in behind this
/// function without touching the upload handler.
pub async fn extract_text_from_file(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") | Some("ppt") | Some("pptx") => String::new(),
        _ => match tokio::fs::read(path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_text_from_plain_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, "Hello Engauge").await.unwrap();

        let text = extract_text_from_file(&path).await;
        assert!(text.contains("Hello Engauge"));
    }

    #[tokio::test]
    async fn unsupported_binary_formats_yield_empty_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        tokio::fs::write(&path, b"PK\x03\x04not really a deck").await.unwrap();

        assert_eq!(extract_text_from_file(&path).await, "");
    }

    #[tokio::test]
    async fn missing_file_yields_empty_text() {
        let path = Path::new("definitely/not/here.txt");
        assert_eq!(extract_text_from_file(path).await, "");
    }
}

// src/storage/mod.rs
use crate::models::ExtractionOutput;
use crate::utils::error::StorageError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of an output file named after the document stem.
    pub fn path_for(&self, stem: &str, suffix: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", stem, suffix))
    }

    /// Saves the extraction result as `<stem>.json`
    pub fn save_result(&self, stem: &str, output: &ExtractionOutput) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(stem, ".json");

        let json = serde_json::to_string_pretty(output)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut file = fs::File::create(&file_path).map_err(StorageError::IoError)?;
        file.write_all(json.as_bytes()).map_err(StorageError::IoError)?;

        tracing::info!("Saved result to {}", file_path.display());

        Ok(file_path)
    }

    /// Saves run metadata as `<stem>_meta.json`
    pub fn save_metadata(
        &self,
        stem: &str,
        source_file: &str,
        line_count: usize,
        sections: &[u32],
        from_image: bool,
    ) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(stem, "_meta.json");

        let metadata = serde_json::json!({
            "source_file": source_file,
            "line_count": line_count,
            "sections": sections,
            "from_image": from_image,
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());

        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractedData, ExtractedField, Metadata, Position};

    fn output() -> ExtractionOutput {
        let metadata = Metadata {
            start_box: Position { page_number: 1, x_proportion: 0.1, y_proportion: 0.2 },
            end_box: None,
        };
        ExtractionOutput {
            data_extracted: ExtractedData {
                product: Some(ExtractedField::new("DEGRAISSANT X200".to_string(), metadata)),
                ..ExtractedData::default()
            },
            from_image: false,
        }
    }

    #[test]
    fn test_creates_missing_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("sds");
        let storage = StorageManager::new(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(storage.base_dir(), nested.as_path());
    }

    #[test]
    fn test_save_result_writes_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let path = storage.save_result("fds_acme", &output()).unwrap();

        assert_eq!(path, dir.path().join("fds_acme.json"));
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["fromImage"], false);
        assert_eq!(written["dataExtracted"]["product"]["value"], "DEGRAISSANT X200");
        assert_eq!(written["dataExtracted"]["product"]["metadata"]["startBox"]["pageNumber"], 1);
        assert!(written["dataExtracted"].get("date").is_none());
        assert_eq!(written["dataExtracted"]["dangers"], serde_json::json!([]));
    }

    #[test]
    fn test_save_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path()).unwrap();

        let path = storage.save_metadata("fds_acme", "fds_acme.pdf", 42, &[1, 2, 9], true).unwrap();

        assert_eq!(path, dir.path().join("fds_acme_meta.json"));
        let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["source_file"], "fds_acme.pdf");
        assert_eq!(written["line_count"], 42);
        assert_eq!(written["sections"], serde_json::json!([1, 2, 9]));
        assert_eq!(written["from_image"], true);
        assert!(written["extraction_timestamp"].is_string());
    }
}

use crate::import::file_key::FileRef;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a regular file")]
    NotAFile(String),
    #[error("{0} is empty")]
    Empty(String),
}

/// Converts one staged file into a self-contained textual representation.
///
/// Implementations hold no per-call shared state, so the tracker may run any
/// number of encodes at once. Each call resolves exactly once.
#[async_trait::async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, file: &FileRef) -> Result<String, EncodeError>;
}

/// Reads the file with tokio and renders it as a base64 `data:` URI
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUriEncoder;

#[async_trait::async_trait]
impl Encoder for DataUriEncoder {
    async fn encode(&self, file: &FileRef) -> Result<String, EncodeError> {
        let read_error = |source| EncodeError::Read {
            name: file.name().to_string(),
            source,
        };

        let metadata = tokio::fs::metadata(file.path()).await.map_err(read_error)?;
        if !metadata.is_file() {
            return Err(EncodeError::NotAFile(file.name().to_string()));
        }

        let bytes = tokio::fs::read(file.path()).await.map_err(read_error)?;
        trace!("Read {} bytes from {}", bytes.len(), file.name());
        if bytes.is_empty() {
            return Err(EncodeError::Empty(file.name().to_string()));
        }

        Ok(to_data_uri(&bytes, &media_type(file)))
    }
}

/// Media type for a file: its own hint, else a guess from the extension
pub fn media_type(file: &FileRef) -> String {
    file.mime_hint()
        .map(str::to_string)
        .or_else(|| mime_guess::from_path(file.path()).first_raw().map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

pub fn to_data_uri(bytes: &[u8], media_type: &str) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_format() {
        assert_eq!(to_data_uri(b"hi", "image/png"), "data:image/png;base64,aGk=");
        assert_eq!(to_data_uri(b"", "image/gif"), "data:image/gif;base64,");
    }

    #[test]
    fn test_media_type_fallbacks() {
        let hinted = FileRef::new("/x/scan", "scan", 1, Some("image/webp".into()));
        assert_eq!(media_type(&hinted), "image/webp");

        let guessed = FileRef::new("/x/scan.png", "scan.png", 1, None);
        assert_eq!(media_type(&guessed), "image/png");

        let unknown = FileRef::new("/x/scan", "scan", 1, None);
        assert_eq!(media_type(&unknown), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_encodes_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let file = FileRef::from_path(&path).unwrap();
        let uri = DataUriEncoder.encode(&file).await.unwrap();
        assert_eq!(uri, "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let file = FileRef::new("/definitely/not/here.png", "here.png", 3, None);
        let err = DataUriEncoder.encode(&file).await.unwrap_err();
        assert!(matches!(err, EncodeError::Read { .. }));
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        std::fs::write(&path, b"").unwrap();

        let file = FileRef::from_path(&path).unwrap();
        let err = DataUriEncoder.encode(&file).await.unwrap_err();
        assert!(matches!(err, EncodeError::Empty(_)));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileRef::new(dir.path(), "folder", 0, None);
        let err = DataUriEncoder.encode(&file).await.unwrap_err();
        assert!(matches!(err, EncodeError::NotAFile(_)));
    }
}

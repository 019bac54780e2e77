use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of a staged file within one batch: name followed by byte size.
///
/// Two files with the same name and size are treated as the same logical entry
/// even when their contents differ. This is not a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileKey(String);

impl FileKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to user-selected binary content. Immutable once staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    path: PathBuf,
    name: String,
    byte_size: u64,
    mime_hint: Option<String>,
}

impl FileRef {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        byte_size: u64,
        mime_hint: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            byte_size,
            mime_hint,
        }
    }

    /// Stage a file from disk, reading its size now and guessing its media type
    /// from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime_hint = mime_guess::from_path(path).first_raw().map(str::to_string);

        Ok(Self::new(path, name, metadata.len(), mime_hint))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn mime_hint(&self) -> Option<&str> {
        self.mime_hint.as_deref()
    }

    pub fn key(&self) -> FileKey {
        key(self)
    }
}

/// Derive the batch identity of a file. Pure and total.
pub fn key(file: &FileRef) -> FileKey {
    FileKey(format!("{}{}", file.name, file.byte_size))
}

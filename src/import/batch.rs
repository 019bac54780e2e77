use crate::import::file_key::{FileKey, FileRef};

/// Ordered list of files staged for one upload or edit.
///
/// Files are appended as selected or dropped. Identical name+size files are
/// kept as separate list entries; they only collapse in the tracker.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    files: Vec<FileRef>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append files in selection order. Returns how many were added.
    pub fn add_files<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = FileRef>,
    {
        let before = self.files.len();
        self.files.extend(files);
        self.files.len() - before
    }

    /// Remove the file at a list position
    pub fn remove(&mut self, index: usize) -> Option<FileRef> {
        if index < self.files.len() {
            Some(self.files.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains_key(&self, key: &FileKey) -> bool {
        self.files.iter().any(|f| &f.key() == key)
    }

    /// Distinct keys in first-seen order
    pub fn unique_keys(&self) -> Vec<FileKey> {
        let mut keys: Vec<FileKey> = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let key = file.key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

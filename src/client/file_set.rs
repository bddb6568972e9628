use std::path::Path;

use tracing::debug;

/// A single user-selected file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Upper-cased extension used in the selection summary
    pub fn extension_label(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or(&self.name)
            .to_uppercase()
    }
}

/// Ordered set of files keyed by filename
///
/// Adding a file whose name is already present replaces its content in place,
/// so the upload order stays the order in which names were first selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<FileBlob>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: FileBlob) {
        match self.files.iter_mut().find(|f| f.name == file.name) {
            Some(existing) => {
                debug!("Replacing selected file {}", file.name);
                existing.bytes = file.bytes;
            }
            None => {
                debug!("Adding selected file {}", file.name);
                self.files.push(file);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = FileBlob>>(&mut self, files: I) {
        for file in files {
            self.add(file);
        }
    }

    /// Read a file from disk and add it under its file name
    pub async fn add_path(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{} has no file name", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        self.add(FileBlob::new(name, bytes));
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<FileBlob> {
        let idx = self.files.iter().position(|f| f.name == name)?;
        Some(self.files.remove(idx))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileBlob> {
        self.files.iter()
    }

    /// Human readable selection line, empty when nothing is selected
    pub fn summary(&self) -> String {
        if self.files.is_empty() {
            return String::new();
        }
        let list: Vec<String> = self
            .files
            .iter()
            .map(|f| format!("{} ({})", f.name, f.extension_label()))
            .collect();
        format!("Selected: {}", list.join(", "))
    }
}

impl FromIterator<FileBlob> for FileSet {
    fn from_iter<I: IntoIterator<Item = FileBlob>>(iter: I) -> Self {
        let mut set = FileSet::new();
        set.extend(iter);
        set
    }
}

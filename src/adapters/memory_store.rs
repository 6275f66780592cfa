use std::collections::BTreeMap;
use std::io::Cursor;

use bytes::Bytes;

use crate::ports::file_store::{
    FileInfo, FileStore, FileStoreError, OpenFuture, OpenedFile, base_name, validate_path,
};

/// A file store kept in memory.
///
/// Directories are implied by the paths of the files below them.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<String, Bytes>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Bytes>) {
        self.files.insert(path.into(), contents.into());
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }
}

impl FileStore for MemoryFileStore {
    fn open<'a>(&'a self, path: &'a str) -> OpenFuture<'a> {
        Box::pin(async move {
            validate_path(path)?;
            let name = base_name(path).to_string();

            if let Some(contents) = self.files.get(path) {
                return Ok(OpenedFile::new(
                    FileInfo { name, is_dir: false },
                    Cursor::new(contents.clone()),
                ));
            }
            if self.is_dir(path) {
                return Ok(OpenedFile::directory(name));
            }
            Err(FileStoreError::NotFound(path.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_files_and_implied_directories() {
        let store = MemoryFileStore::new()
            .with_file("index.html", "Hello there.\n")
            .with_file("folder/index.html", "This is in a folder.\n");

        let mut file = store.open("index.html").await.unwrap();
        let mut body = String::new();
        file.reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "Hello there.\n");

        let dir = store.open("folder").await.unwrap();
        assert!(dir.info.is_dir);

        assert!(matches!(
            store.open("fold").await,
            Err(FileStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.open("../index.html").await,
            Err(FileStoreError::InvalidPath(_))
        ));
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ports::file_store::{
    FileInfo, FileStore, FileStoreError, FileStoreResult, OpenFuture, OpenedFile, base_name,
    validate_path,
};

/// A file store rooted at a directory on the local disk
#[derive(Debug, Clone)]
pub struct DirFileStore {
    root: PathBuf,
}

impl DirFileStore {
    /// Creates a store serving files below `root`
    ///
    /// Fails when `root` does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> FileStoreResult<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| FileStoreError::InvalidPath(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(FileStoreError::InvalidPath(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn open_entry(&self, path: &str) -> FileStoreResult<OpenedFile> {
        validate_path(path)?;
        let full_path = tokio::fs::canonicalize(self.root.join(path))
            .await
            .map_err(|e| map_io_error(path, e))?;
        if !full_path.starts_with(&self.root) {
            tracing::warn!(path = %path, resolved = %full_path.display(), "Path escapes the store root");
            return Err(FileStoreError::InvalidPath(path.to_string()));
        }

        let metadata = tokio::fs::metadata(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        let name = base_name(path).to_string();

        if metadata.is_dir() {
            return Ok(OpenedFile::directory(name));
        }

        let file = tokio::fs::File::open(&full_path)
            .await
            .map_err(|e| map_io_error(path, e))?;
        Ok(OpenedFile::new(FileInfo { name, is_dir: false }, file))
    }
}

impl FileStore for DirFileStore {
    fn open<'a>(&'a self, path: &'a str) -> OpenFuture<'a> {
        Box::pin(self.open_entry(path))
    }
}

fn map_io_error(path: &str, err: std::io::Error) -> FileStoreError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => FileStoreError::NotFound(path.to_string()),
        _ => FileStoreError::IoError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "Disallow: *\n").unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        std::fs::write(dir.path().join("folder/index.html"), "This is in a folder.\n").unwrap();
        dir
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirFileStore::new(dir.path().join("nope"));
        assert!(matches!(result, Err(FileStoreError::InvalidPath(_))));
    }

    #[test]
    fn test_new_rejects_file_root() {
        let dir = fixture();
        let result = DirFileStore::new(dir.path().join("robots.txt"));
        assert!(matches!(result, Err(FileStoreError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_open_file_and_read() {
        let dir = fixture();
        let store = DirFileStore::new(dir.path()).unwrap();

        let mut file = store.open("robots.txt").await.unwrap();
        assert_eq!(
            file.info,
            FileInfo {
                name: "robots.txt".to_string(),
                is_dir: false
            }
        );

        let mut body = String::new();
        file.reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "Disallow: *\n");
    }

    #[tokio::test]
    async fn test_open_directory() {
        let dir = fixture();
        let store = DirFileStore::new(dir.path()).unwrap();

        let entry = store.open("folder").await.unwrap();
        assert!(entry.info.is_dir);
        assert_eq!(entry.info.name, "folder");
    }

    #[tokio::test]
    async fn test_missing_and_escaping_paths() {
        let dir = fixture();
        let store = DirFileStore::new(dir.path()).unwrap();

        assert!(matches!(
            store.open("missing.txt").await,
            Err(FileStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.open("robots.txt/child").await,
            Err(FileStoreError::NotFound(_)) | Err(FileStoreError::IoError(_))
        ));
        assert!(matches!(
            store.open("../etc/passwd").await,
            Err(FileStoreError::InvalidPath(_))
        ));
    }
}

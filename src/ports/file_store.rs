use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio::io::AsyncRead;

/// Error type for file store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileStoreError {
    /// Nothing exists at the requested path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error when path is invalid or would escape the store root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Error when encountering an IO issue
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for file store operations
pub type FileStoreResult<T> = Result<T, FileStoreError>;

/// Type alias for async open results
pub type OpenFuture<'a> = Pin<Box<dyn Future<Output = FileStoreResult<OpenedFile>> + Send + 'a>>;

/// Metadata of an opened store entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the entry, used for content type inference
    pub name: String,
    pub is_dir: bool,
}

/// An open store entry. Dropping it releases the underlying handle.
pub struct OpenedFile {
    pub info: FileInfo,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl OpenedFile {
    pub fn new(info: FileInfo, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            info,
            reader: Box::new(reader),
        }
    }

    /// A directory entry has nothing to read.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(
            FileInfo {
                name: name.into(),
                is_dir: true,
            },
            tokio::io::empty(),
        )
    }
}

impl std::fmt::Debug for OpenedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedFile").field("info", &self.info).finish()
    }
}

/// FileStore defines the port (interface) for a hierarchical byte store
pub trait FileStore: Send + Sync + 'static {
    /// Open an entry of the store
    ///
    /// # Arguments
    /// * `path` - Slash separated path relative to the store root, without a leading slash
    ///
    /// # Returns
    /// A future that resolves to the opened entry or an error. Callers treat every
    /// error as "not found".
    fn open<'a>(&'a self, path: &'a str) -> OpenFuture<'a>;
}

/// Check that `path` is a clean relative store path.
///
/// Rejects empty paths, leading or trailing slashes, empty, `.` and `..`
/// segments and backslashes, so no valid path can leave the store root.
pub fn validate_path(path: &str) -> FileStoreResult<()> {
    if path.is_empty() {
        return Err(FileStoreError::InvalidPath("empty path".to_string()));
    }
    if path.contains('\\') || path.contains('\0') {
        return Err(FileStoreError::InvalidPath(path.to_string()));
    }
    let clean = path
        .split('/')
        .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if !clean {
        return Err(FileStoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Last segment of a store path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path_accepts_nested_paths() {
        assert!(validate_path("index.html").is_ok());
        assert!(validate_path("_next/static/app.js").is_ok());
        assert!(validate_path("folder/.well-known").is_ok());
    }

    #[test]
    fn test_validate_path_rejects_escapes() {
        for path in [
            "",
            "/etc/passwd",
            "../secret",
            "a/../../b",
            "a//b",
            "a/./b",
            "dir/",
            "a\\b",
        ] {
            assert!(
                matches!(validate_path(path), Err(FileStoreError::InvalidPath(_))),
                "expected {path:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.css"), "c.css");
        assert_eq!(base_name("robots.txt"), "robots.txt");
    }
}

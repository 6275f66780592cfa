use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};

/// Type alias for async body writes
pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

/// ResponseWriter defines the port for the outbound side of a request.
///
/// Status and headers stay buffered until the first `write_header` or `write`
/// call commits them. After that the transport ignores header changes and
/// further `write_header` calls.
pub trait ResponseWriter: Send {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the status code and the current headers
    fn write_header(&mut self, status: StatusCode);

    /// Write a chunk of the body, committing status 200 first if nothing was committed yet
    fn write<'a>(&'a mut self, chunk: Bytes) -> WriteFuture<'a>;
}

/// A writer that mirrors what passes through it.
///
/// `written` flips on the first `write_header` or `write`. `status` is 200
/// until a `write_header` arrives before anything was written; once `written`
/// is set it no longer changes, matching what the transport committed.
pub struct ResponseRecorder<'w> {
    inner: &'w mut dyn ResponseWriter,
    written: bool,
    status: StatusCode,
    started: Instant,
}

impl<'w> ResponseRecorder<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter) -> Self {
        Self {
            inner,
            written: false,
            status: StatusCode::OK,
            started: Instant::now(),
        }
    }

    pub fn written(&self) -> bool {
        self.written
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Time since the recorder was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl ResponseWriter for ResponseRecorder<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if !self.written {
            self.status = status;
            self.written = true;
        }
        self.inner.write_header(status);
    }

    fn write<'a>(&'a mut self, chunk: Bytes) -> WriteFuture<'a> {
        self.written = true;
        self.inner.write(chunk)
    }
}

/// In-memory writer that keeps the whole response; useful for tests and for
/// handlers that want to post-process a body.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
    pub body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, 200 when a body was written without one
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write<'a>(&'a mut self, chunk: Bytes) -> WriteFuture<'a> {
        Box::pin(async move {
            self.status.get_or_insert(StatusCode::OK);
            self.body.extend_from_slice(&chunk);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recorder_defaults_to_ok_and_unwritten() {
        let mut buffer = BufferedResponse::new();
        let recorder = ResponseRecorder::new(&mut buffer);

        assert!(!recorder.written());
        assert_eq!(recorder.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_recorder_tracks_status_and_writes() {
        let mut buffer = BufferedResponse::new();
        {
            let mut recorder = ResponseRecorder::new(&mut buffer);
            recorder.write_header(StatusCode::NOT_FOUND);
            assert!(recorder.written());
            assert_eq!(recorder.status(), StatusCode::NOT_FOUND);

            recorder.write(Bytes::from_static(b"gone")).await.unwrap();
        }

        assert_eq!(buffer.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(buffer.body_string(), "gone");
    }

    #[tokio::test]
    async fn test_recorder_write_marks_written_without_status_change() {
        let mut buffer = BufferedResponse::new();
        let mut recorder = ResponseRecorder::new(&mut buffer);

        recorder.write(Bytes::from_static(b"x")).await.unwrap();

        assert!(recorder.written());
        assert_eq!(recorder.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_recorder_status_is_frozen_after_write() {
        let mut buffer = BufferedResponse::new();
        let mut recorder = ResponseRecorder::new(&mut buffer);

        recorder.write(Bytes::from_static(b"x")).await.unwrap();
        recorder.write_header(StatusCode::NOT_FOUND);
        assert_eq!(recorder.status(), StatusCode::OK);

        recorder.write_header(StatusCode::CREATED);
        assert_eq!(recorder.status(), StatusCode::OK);
        drop(recorder);

        assert_eq!(buffer.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_buffered_response_keeps_first_status() {
        let mut buffer = BufferedResponse::new();
        buffer.write_header(StatusCode::TEMPORARY_REDIRECT);
        buffer.write_header(StatusCode::OK);

        assert_eq!(buffer.status(), Some(StatusCode::TEMPORARY_REDIRECT));
    }
}

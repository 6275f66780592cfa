use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use hyper::header::{self, HeaderValue};
use hyper::{HeaderMap, Request, StatusCode};

use crate::core::headers;
use crate::core::middleware::Middleware;
use crate::core::path;
use crate::core::service::PathPredicate;
use crate::ports::http_server::{Handler, HandlerFuture};
use crate::ports::response_writer::{ResponseRecorder, ResponseWriter, WriteFuture};

const GZIP_TOKEN: &str = "gzip";

/// Cache headers by path: immutable for matching paths, no caching for the rest.
///
/// Headers are set before delegating, so anything downstream can still replace them.
#[derive(Clone)]
pub struct CachePolicy {
    predicates: Arc<[PathPredicate]>,
}

impl CachePolicy {
    pub fn new(predicates: Vec<PathPredicate>) -> Self {
        Self {
            predicates: predicates.into(),
        }
    }
}

impl Middleware for CachePolicy {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(CachePolicyHandler {
            predicates: self.predicates.clone(),
            next,
        })
    }
}

struct CachePolicyHandler {
    predicates: Arc<[PathPredicate]>,
    next: Arc<dyn Handler>,
}

impl Handler for CachePolicyHandler {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        let cacheable = {
            let decoded = path::decoded_path(req.uri());
            let request_path = decoded.as_deref().unwrap_or(req.uri().path());
            self.predicates.iter().any(|matches| matches(request_path))
        };

        if cacheable {
            headers::cache_forever(w.headers_mut());
        } else {
            headers::do_not_cache(w.headers_mut());
        }
        self.next.serve(req, w)
    }
}

/// Gzip compression of the response body for clients that accept it
#[derive(Debug, Clone, Copy)]
pub struct GzipCompression {
    level: Compression,
}

impl GzipCompression {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level),
        }
    }
}

impl Default for GzipCompression {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Middleware for GzipCompression {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(GzipHandler {
            level: self.level,
            next,
        })
    }
}

struct GzipHandler {
    level: Compression,
    next: Arc<dyn Handler>,
}

/// Request extension marking a chain already running under a gzip pass
#[derive(Debug, Clone, Copy)]
struct GzipScope;

impl Handler for GzipHandler {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        let accepts_gzip = headers::header_contains(req.headers(), header::ACCEPT_ENCODING, GZIP_TOKEN);
        // A re-entered chain runs inside an outer pass that already encodes.
        let nested = req.extensions().get::<GzipScope>().is_some();
        let already_encoded = w.headers().contains_key(header::CONTENT_ENCODING);
        if !accepts_gzip || nested || already_encoded {
            return self.next.serve(req, w);
        }

        Box::pin(async move {
            req.extensions_mut().insert(GzipScope);
            let mut gzip = GzipWriter::new(w, self.level);
            let served = self.next.serve(req, &mut gzip).await;
            // Nothing reached the client yet: let the transport answer the failure.
            if served.is_err() && !gzip.body_started() {
                return served;
            }
            let finished = gzip.finish().await;
            served?;
            finished?;
            Ok(())
        })
    }
}

/// Writer compressing everything written through it.
///
/// The status is held back until the first body chunk, so a response without
/// a body goes out unencoded. [`GzipWriter::finish`] must be called to flush
/// the gzip trailer or the held status.
pub struct GzipWriter<'w> {
    inner: &'w mut dyn ResponseWriter,
    encoder: GzEncoder<Vec<u8>>,
    pending_status: Option<StatusCode>,
    body_started: bool,
}

impl<'w> GzipWriter<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter, level: Compression) -> Self {
        Self {
            inner,
            encoder: GzEncoder::new(Vec::new(), level),
            pending_status: None,
            body_started: false,
        }
    }

    /// Whether a body chunk was compressed, committing the encoded head
    pub fn body_started(&self) -> bool {
        self.body_started
    }

    /// Write the remaining compressed bytes and the trailer, or the held
    /// status when no body was written
    pub async fn finish(self) -> std::io::Result<()> {
        let GzipWriter {
            inner,
            encoder,
            pending_status,
            body_started,
        } = self;
        if !body_started {
            if let Some(status) = pending_status {
                inner.write_header(status);
            }
            return Ok(());
        }
        let tail = encoder.finish()?;
        inner.write(Bytes::from(tail)).await
    }

    fn start_body(&mut self) {
        self.body_started = true;
        let headers = self.inner.headers_mut();
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(GZIP_TOKEN));
        strip_length(headers);
        self.inner
            .write_header(self.pending_status.unwrap_or(StatusCode::OK));
    }
}

impl ResponseWriter for GzipWriter<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.body_started {
            self.inner.write_header(status);
        } else if self.pending_status.is_none() {
            self.pending_status = Some(status);
        }
    }

    fn write<'a>(&'a mut self, chunk: Bytes) -> WriteFuture<'a> {
        Box::pin(async move {
            if chunk.is_empty() {
                if !self.body_started {
                    self.pending_status.get_or_insert(StatusCode::OK);
                }
                return Ok(());
            }
            if !self.body_started {
                self.start_body();
            }
            self.encoder.write_all(&chunk)?;
            let compressed = std::mem::take(self.encoder.get_mut());
            if compressed.is_empty() {
                return Ok(());
            }
            self.inner.write(Bytes::from(compressed)).await
        })
    }
}

// The compressed length differs from anything set upstream.
fn strip_length(headers: &mut HeaderMap) {
    headers.remove(header::CONTENT_LENGTH);
}

/// Logs each request once the inner chain is done with it
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogging;

impl Middleware for RequestLogging {
    fn wrap(&self, next: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(RequestLoggingHandler { next })
    }
}

struct RequestLoggingHandler {
    next: Arc<dyn Handler>,
}

impl Handler for RequestLoggingHandler {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let method = req.method().clone();
            let uri_path = req.uri().path().to_string();

            let mut recorder = ResponseRecorder::new(w);
            let result = self.next.serve(req, &mut recorder).await;

            match &result {
                Ok(()) => tracing::info!(
                    method = %method,
                    path = %uri_path,
                    status = recorder.status().as_u16(),
                    written = recorder.written(),
                    elapsed_ms = recorder.elapsed().as_secs_f64() * 1000.0,
                    "Request served"
                ),
                Err(err) => tracing::error!(
                    method = %method,
                    path = %uri_path,
                    status = recorder.status().as_u16(),
                    elapsed_ms = recorder.elapsed().as_secs_f64() * 1000.0,
                    error = %err,
                    "Request failed"
                ),
            }
            result
        })
    }
}

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Request, StatusCode};

use crate::core::headers;
use crate::core::path;
use crate::core::resolver::write_file;
use crate::core::service::ServiceInner;
use crate::ports::http_server::{Handler, ServeResult};
use crate::ports::response_writer::ResponseWriter;

const NOT_FOUND_BODY: &[u8] = b"404 page not found\n";

/// Request extension marking a request that was already rewritten to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    RetriedAtIndex,
}

/// What to answer when a path does not resolve to a file
#[derive(Clone, Default)]
pub enum NotFound {
    /// Plain text 404
    #[default]
    Default,
    /// Serve a store file with status 404
    File(String),
    /// Hand the request to another handler
    Handler {
        handler: Arc<dyn Handler>,
        /// Only requests accepting `text/html` reach the handler
        html_only: bool,
    },
    /// Serve the index document for unknown paths
    Spa,
}

impl fmt::Debug for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Default => f.write_str("Default"),
            NotFound::File(path) => f.debug_tuple("File").field(path).finish(),
            NotFound::Handler { html_only, .. } => f
                .debug_struct("Handler")
                .field("html_only", html_only)
                .finish_non_exhaustive(),
            NotFound::Spa => f.write_str("Spa"),
        }
    }
}

impl NotFound {
    pub(crate) async fn serve(
        &self,
        service: &ServiceInner,
        req: &mut Request<()>,
        w: &mut dyn ResponseWriter,
    ) -> ServeResult<()> {
        match self {
            NotFound::Default => respond_not_found(w).await,
            NotFound::File(path) => serve_not_found_file(service, path, w).await,
            NotFound::Handler { handler, html_only } => {
                if *html_only && !headers::header_contains(req.headers(), header::ACCEPT, "text/html") {
                    return respond_not_found(w).await;
                }
                handler.serve(req, w).await
            }
            NotFound::Spa => serve_spa_fallback(service, req, w).await,
        }
    }
}

/// Minimal plain text 404
pub async fn respond_not_found(w: &mut dyn ResponseWriter) -> ServeResult<()> {
    let headers = w.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    w.write_header(StatusCode::NOT_FOUND);
    w.write(Bytes::from_static(NOT_FOUND_BODY)).await?;
    Ok(())
}

async fn serve_not_found_file(
    service: &ServiceInner,
    path: &str,
    w: &mut dyn ResponseWriter,
) -> ServeResult<()> {
    headers::do_not_cache(w.headers_mut());

    match service.store.open(path).await {
        Ok(file) if !file.info.is_dir => write_file(w, file, StatusCode::NOT_FOUND).await,
        Ok(_) => {
            tracing::warn!(path = %path, "Not-found file is a directory, using default 404");
            respond_not_found(w).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "Failed to open not-found file, using default 404");
            respond_not_found(w).await
        }
    }
}

async fn serve_spa_fallback(
    service: &ServiceInner,
    req: &mut Request<()>,
    w: &mut dyn ResponseWriter,
) -> ServeResult<()> {
    let already_retried = req.extensions().get::<FallbackState>().is_some();
    let at_index = path::decoded_path(req.uri())
        .is_some_and(|p| p.strip_prefix('/').unwrap_or(&p) == service.index);
    if already_retried || at_index {
        tracing::debug!(path = %req.uri().path(), "Index document not found");
        return respond_not_found(w).await;
    }

    let index_path = format!("/{}", path::encode_store_path(&service.index));
    let Some(uri) = path::with_path(req.uri(), &index_path) else {
        tracing::warn!(index = %service.index, "Index name does not form a valid URI path");
        return respond_not_found(w).await;
    };

    tracing::debug!(from = %req.uri().path(), to = %index_path, "Falling back to index document");
    *req.uri_mut() = uri;
    req.extensions_mut().insert(FallbackState::RetriedAtIndex);
    service.composed.serve(req, w).await
}

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use hyper::Request;
use thiserror::Error;

use crate::ports::response_writer::ResponseWriter;

/// Error type for request handling.
///
/// Resolution failures never show up here: they are answered with a 404 by the
/// not-found handler. A `ServeError` means the response could not be produced
/// or finished.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ServeError {
    /// Reading the store or writing the transport failed
    #[error("IO error while serving: {0}")]
    Io(#[from] std::io::Error),

    /// A header value could not be built
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] hyper::header::InvalidHeaderValue),

    /// A payload could not be encoded
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// An XML payload could not be serialized
    #[error("Failed to encode XML payload: {0}")]
    XmlEncode(String),

    /// A handler panicked while producing the response
    #[error("Handler panicked")]
    Panicked,

    /// The service was dropped while one of its handlers was still running
    #[error("Service is no longer available")]
    ServiceGone,
}

/// Result type alias for request handling
pub type ServeResult<T> = Result<T, ServeError>;

/// Type alias for HTTP server run futures
pub type ServerRunFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Type alias for handler futures
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = ServeResult<()>> + Send + 'a>>;

/// HttpServer defines the port (interface) for a listening server
pub trait HttpServer: Send + Sync + 'static {
    /// Run the HTTP server
    ///
    /// # Returns
    /// A future that resolves when the server shuts down or encounters an error
    fn run<'a>(&'a self) -> ServerRunFuture<'a>;
}

/// Handler is a single step of request handling.
///
/// The request is mutable so a handler can rewrite it before delegating; the
/// response goes out through `w`.
pub trait Handler: Send + Sync + 'static {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a>;
}

/// Handler backed by a closure, see [`handler_fn`]
pub struct HandlerFn<F>(F);

/// Build a handler from a closure returning a boxed future
///
/// ```ignore
/// let hello = handler_fn(|_req, w| {
///     Box::pin(async move {
///         w.write(Bytes::from_static(b"hello")).await?;
///         Ok(())
///     })
/// });
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request<()>, &'a mut dyn ResponseWriter) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    HandlerFn(f)
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Request<()>, &'a mut dyn ResponseWriter) -> HandlerFuture<'a>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        (self.0)(req, w)
    }
}

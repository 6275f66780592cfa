use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::stream;
use hyper::{HeaderMap, Request, Response, StatusCode};
use tokio::sync::{mpsc, oneshot};

use crate::core::service::Service;
use crate::ports::http_server::{Handler, ServeError};
use crate::ports::response_writer::{ResponseWriter, WriteFuture};

const BODY_CHANNEL_CAPACITY: usize = 8;

/// Committed status line and headers
#[derive(Debug)]
struct Head {
    status: StatusCode,
    headers: HeaderMap,
}

/// ResponseWriter feeding a streaming hyper response.
///
/// The head is handed over on the first `write_header`/`write`, or when the
/// writer is dropped without having committed anything.
pub struct ChannelWriter {
    headers: HeaderMap,
    status: StatusCode,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: mpsc::Sender<io::Result<Bytes>>,
}

/// The receiving side of a [`ChannelWriter`]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Head>,
    body_rx: mpsc::Receiver<io::Result<Bytes>>,
}

/// Create a connected writer and pending response
pub fn response_channel() -> (ChannelWriter, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
    (
        ChannelWriter {
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            head_tx: Some(head_tx),
            body_tx,
        },
        PendingResponse { head_rx, body_rx },
    )
}

impl ChannelWriter {
    pub fn is_committed(&self) -> bool {
        self.head_tx.is_none()
    }

    fn commit(&mut self, status: StatusCode) {
        if let Some(head_tx) = self.head_tx.take() {
            self.status = status;
            let head = Head {
                status,
                headers: self.headers.clone(),
            };
            if head_tx.send(head).is_err() {
                tracing::debug!("Response receiver dropped before the head was sent");
            }
        }
    }

    /// Terminate the response after a failure.
    ///
    /// Before anything was committed this becomes a 500; afterwards the body
    /// stream ends with an error so the transport aborts the response.
    pub async fn fail(mut self, err: &ServeError) {
        if !self.is_committed() {
            self.headers.clear();
            self.commit(StatusCode::INTERNAL_SERVER_ERROR);
            return;
        }
        let aborted = io::Error::other(err.to_string());
        if self.body_tx.send(Err(aborted)).await.is_err() {
            tracing::debug!("Response body receiver dropped before the abort");
        }
    }
}

impl ResponseWriter for ChannelWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.is_committed() {
            tracing::warn!(
                committed = self.status.as_u16(),
                requested = status.as_u16(),
                "Superfluous write_header call"
            );
            return;
        }
        self.commit(status);
    }

    fn write<'a>(&'a mut self, chunk: Bytes) -> WriteFuture<'a> {
        Box::pin(async move {
            if !self.is_committed() {
                self.commit(StatusCode::OK);
            }
            if chunk.is_empty() {
                return Ok(());
            }
            self.body_tx.send(Ok(chunk)).await.map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "response body receiver dropped")
            })
        })
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        if self.is_committed() {
            if std::thread::panicking() {
                let aborted = io::Error::other(ServeError::Panicked.to_string());
                if self.body_tx.try_send(Err(aborted)).is_err() {
                    tracing::debug!("Could not signal the aborted body");
                }
            }
            return;
        }
        if std::thread::panicking() {
            self.headers.clear();
            self.commit(StatusCode::INTERNAL_SERVER_ERROR);
        } else {
            self.commit(StatusCode::OK);
        }
    }
}

impl PendingResponse {
    /// Wait for the head and build a response streaming the rest of the body
    pub async fn into_response(self) -> Response<AxumBody> {
        let PendingResponse { head_rx, body_rx } = self;
        let head = match head_rx.await {
            Ok(head) => head,
            Err(_) => {
                tracing::error!("Handler finished without producing a response head");
                Head {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    headers: HeaderMap::new(),
                }
            }
        };

        let body = stream::unfold(body_rx, |mut body_rx| async move {
            body_rx.recv().await.map(|chunk| (chunk, body_rx))
        });

        let mut response = Response::new(AxumBody::from_stream(body));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}

/// Run `handler` for `req` on its own task and return the streaming response.
pub async fn serve_request<H, B>(handler: H, req: Request<B>) -> Response<AxumBody>
where
    H: Handler,
{
    let (writer, pending) = response_channel();
    let mut req = req.map(|_| ());

    tokio::spawn(async move {
        let mut writer = writer;
        let outcome = AssertUnwindSafe(handler.serve(&mut req, &mut writer))
            .catch_unwind()
            .await;
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(_) => ServeError::Panicked,
        };
        tracing::error!(path = %req.uri().path(), error = %err, "Failed to serve request");
        writer.fail(&err).await;
    });

    pending.into_response().await
}

impl<B> tower::Service<Request<B>> for Service
where
    B: Send + 'static,
{
    type Response = Response<AxumBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(serve_request(service, req).await) })
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;
    use crate::ports::http_server::handler_fn;

    async fn body_of(response: Response<AxumBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_streams_committed_head_and_body() {
        let handler = handler_fn(|_req, w| {
            Box::pin(async move {
                w.headers_mut()
                    .insert("x-test", hyper::header::HeaderValue::from_static("yes"));
                w.write_header(StatusCode::CREATED);
                w.write(Bytes::from_static(b"one ")).await?;
                w.write(Bytes::from_static(b"two")).await?;
                Ok(())
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-test"], "yes");
        assert_eq!(body_of(response).await, "one two");
    }

    #[tokio::test]
    async fn test_headers_after_commit_are_ignored() {
        let handler = handler_fn(|_req, w| {
            Box::pin(async move {
                w.write(Bytes::from_static(b"body")).await?;
                w.headers_mut()
                    .insert("x-late", hyper::header::HeaderValue::from_static("1"));
                w.write_header(StatusCode::NOT_FOUND);
                Ok(())
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-late").is_none());
        assert_eq!(body_of(response).await, "body");
    }

    #[tokio::test]
    async fn test_silent_handler_yields_empty_ok() {
        let handler = handler_fn(|_req, _w| Box::pin(async move { Ok(()) }));

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_before_commit_is_500() {
        let handler = handler_fn(|_req, w| {
            Box::pin(async move {
                w.headers_mut()
                    .insert("x-partial", hyper::header::HeaderValue::from_static("1"));
                Err(ServeError::ServiceGone)
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-partial").is_none());
    }

    #[tokio::test]
    async fn test_failure_after_commit_aborts_body() {
        let handler = handler_fn(|_req, w| {
            Box::pin(async move {
                w.write(Bytes::from_static(b"partial")).await?;
                Err(ServeError::from(io::Error::other("read failed")))
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn test_panic_after_commit_aborts_body() {
        let handler = handler_fn(|_req, w| {
            Box::pin(async move {
                w.write(Bytes::from_static(b"partial")).await?;
                let broken = true;
                if broken {
                    panic!("handler blew up");
                }
                Ok(())
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
    }

    #[tokio::test]
    async fn test_panic_before_commit_is_500() {
        let handler = handler_fn(|_req, _w| {
            Box::pin(async move {
                let broken = true;
                if broken {
                    panic!("handler blew up");
                }
                Ok(())
            })
        });

        let response = serve_request(handler, Request::new(())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_writer_dropped_while_panicking_aborts_body() {
        let (writer, pending) = response_channel();
        let panicked = std::thread::spawn(move || {
            let mut writer = writer;
            writer.write_header(StatusCode::OK);
            let broken = true;
            if broken {
                panic!("unwinding with a committed head");
            }
        })
        .join();

        assert!(panicked.is_err());
        let response = pending.into_response().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.into_body().collect().await.is_err());
    }
}

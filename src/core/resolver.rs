use std::sync::Weak;

use bytes::BytesMut;
use hyper::header::{self, HeaderValue};
use hyper::{Request, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::headers;
use crate::core::path;
use crate::core::service::ServiceInner;
use crate::ports::file_store::OpenedFile;
use crate::ports::http_server::{Handler, HandlerFuture, ServeError, ServeResult};
use crate::ports::response_writer::ResponseWriter;

const CHUNK_SIZE: usize = 32 * 1024;

/// The terminal handler: maps the request path to a store entry and streams it.
pub(crate) struct FileResolver {
    service: Weak<ServiceInner>,
}

impl FileResolver {
    pub(crate) fn new(service: Weak<ServiceInner>) -> Self {
        Self { service }
    }
}

impl Handler for FileResolver {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let service = self.service.upgrade().ok_or(ServeError::ServiceGone)?;
            resolve(&service, req, w).await
        })
    }
}

async fn resolve(
    service: &ServiceInner,
    req: &mut Request<()>,
    w: &mut dyn ResponseWriter,
) -> ServeResult<()> {
    let Some(url_path) = path::decoded_path(req.uri()).map(|p| p.into_owned()) else {
        tracing::debug!(path = %req.uri().path(), "Request path is not valid UTF-8");
        return not_found(service, req, w).await;
    };
    let store_path = path::normalize(&url_path, &service.index);

    let file = match service.store.open(&store_path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(path = %store_path, error = %err, "File not resolvable");
            return not_found(service, req, w).await;
        }
    };

    if file.info.is_dir {
        if url_path.ends_with('/') {
            // Only reachable when the index name itself is a directory.
            tracing::debug!(path = %store_path, "Index entry is a directory");
            return not_found(service, req, w).await;
        }
        let location = path::trailing_slash_location(req.uri());
        tracing::debug!(path = %store_path, location = %location, "Redirecting directory request");
        headers::do_not_cache(w.headers_mut());
        w.headers_mut()
            .insert(header::LOCATION, HeaderValue::try_from(location)?);
        w.write_header(StatusCode::TEMPORARY_REDIRECT);
        return Ok(());
    }

    write_file(w, file, StatusCode::OK).await
}

async fn not_found(
    service: &ServiceInner,
    req: &mut Request<()>,
    w: &mut dyn ResponseWriter,
) -> ServeResult<()> {
    headers::do_not_cache(w.headers_mut());
    service.not_found.serve(service, req, w).await
}

/// Stream an opened file with `status` and a content type from its name.
///
/// The file handle is dropped on return, whatever the outcome.
pub(crate) async fn write_file(
    w: &mut dyn ResponseWriter,
    file: OpenedFile,
    status: StatusCode,
) -> ServeResult<()> {
    let OpenedFile { info, mut reader } = file;
    headers::set_content_type(w.headers_mut(), &info.name);
    w.write_header(status);

    let copied = copy_body(&mut reader, w).await?;
    tracing::trace!(name = %info.name, bytes = copied, "File streamed");
    Ok(())
}

async fn copy_body<R>(reader: &mut R, w: &mut dyn ResponseWriter) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut total = 0u64;
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    loop {
        buf.reserve(CHUNK_SIZE);
        let read = reader.read_buf(&mut buf).await?;
        if read == 0 {
            return Ok(total);
        }
        total += read as u64;
        w.write(buf.split().freeze()).await?;
    }
}

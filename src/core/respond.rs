use bytes::Bytes;
use hyper::StatusCode;
use hyper::header::{self, HeaderValue};
use quick_xml::se::Serializer as XmlSerializer;
use serde::Serialize;

use crate::ports::http_server::{ServeError, ServeResult};
use crate::ports::response_writer::ResponseWriter;

/// Serialize `payload` as the JSON body of a response with `status`.
///
/// Encoding happens before anything is written, so a failure leaves the
/// response untouched.
pub async fn respond_json<T>(
    w: &mut dyn ResponseWriter,
    status: StatusCode,
    payload: &T,
) -> ServeResult<()>
where
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(payload)?;
    w.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    w.write_header(status);
    w.write(Bytes::from(body)).await?;
    Ok(())
}

const XML_PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Serialize `payload` as an indented XML document with `status`.
///
/// The root element is named after the payload type.
pub async fn respond_xml<T>(
    w: &mut dyn ResponseWriter,
    status: StatusCode,
    payload: &T,
) -> ServeResult<()>
where
    T: Serialize + ?Sized,
{
    let mut body = String::from(XML_PROLOG);
    let mut serializer = XmlSerializer::new(&mut body);
    serializer.indent(' ', 4);
    payload
        .serialize(serializer)
        .map_err(|e| ServeError::XmlEncode(e.to_string()))?;

    w.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    w.write_header(status);
    w.write(Bytes::from(body)).await?;
    Ok(())
}

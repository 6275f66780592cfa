use std::path::Path;

use hyper::HeaderMap;
use hyper::header::{self, HeaderValue};

pub const NO_CACHE_CONTROL: &str = "no-store, no-cache, must-revalidate";
pub const CACHE_FOREVER_CONTROL: &str = "public,max-age=31536000,immutable";

/// Mark a response as never cacheable
pub fn do_not_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(NO_CACHE_CONTROL),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

/// Mark a response as immutable for a year
pub fn cache_forever(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_FOREVER_CONTROL),
    );
    headers.remove(header::PRAGMA);
    headers.remove(header::EXPIRES);
}

/// Media type for a file name, inferred from its extension.
///
/// Textual types carry an explicit utf-8 charset. Unknown extensions give `None`.
pub fn content_type_for(name: &str) -> Option<HeaderValue> {
    let ext = Path::new(name).extension()?.to_str()?;
    let mime = mime_guess::from_ext(ext).first()?;

    let value = if mime.type_().as_str() == "text" {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.to_string()
    };
    HeaderValue::from_str(&value).ok()
}

/// Set or clear `Content-Type` according to the file name
pub fn set_content_type(headers: &mut HeaderMap, name: &str) {
    match content_type_for(name) {
        Some(value) => {
            headers.insert(header::CONTENT_TYPE, value);
        }
        None => {
            headers.remove(header::CONTENT_TYPE);
        }
    }
}

/// Case-insensitive substring match of `token` against a request header
pub fn header_contains(headers: &HeaderMap, name: header::HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains(token))
}

use std::borrow::Cow;

use hyper::Uri;
use http::uri::PathAndQuery;

/// Percent-decoded path of the request URI, `None` when it is not valid UTF-8.
pub fn decoded_path(uri: &Uri) -> Option<Cow<'_, str>> {
    urlencoding::decode(uri.path()).ok()
}

/// Map a URL path to a store path.
///
/// The leading slash is dropped. An empty result or a path ending in `/`
/// gets the index name appended, exactly once.
pub fn normalize(url_path: &str, index: &str) -> String {
    let trimmed = url_path.strip_prefix('/').unwrap_or(url_path);
    if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{trimmed}{index}")
    } else {
        trimmed.to_string()
    }
}

/// Build a URI with the same query as `uri` but a new, already encoded, path.
pub fn with_path(uri: &Uri, encoded_path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{encoded_path}?{query}"),
        None => encoded_path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// Percent-encode a store path segment by segment, keeping the slashes.
pub fn encode_store_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `Location` target for a directory request: same path plus `/`, query kept.
pub fn trailing_slash_location(uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_appends_index_once() {
        assert_eq!(normalize("/", "index.html"), "index.html");
        assert_eq!(normalize("", "index.html"), "index.html");
        assert_eq!(normalize("/docs/", "index.html"), "docs/index.html");
        assert_eq!(normalize("/docs/index.html", "index.html"), "docs/index.html");
        assert_eq!(normalize("/robots.txt", "index.html"), "robots.txt");
    }

    #[test]
    fn test_normalize_uses_custom_index() {
        assert_eq!(normalize("/app/", "main.htm"), "app/main.htm");
    }

    #[test]
    fn test_decoded_path() {
        let uri: Uri = "/my%20file.txt?x=1".parse().unwrap();
        assert_eq!(decoded_path(&uri).unwrap(), "/my file.txt");

        let invalid: Uri = "/%FF%FE".parse().unwrap();
        assert!(decoded_path(&invalid).is_none());
    }

    #[test]
    fn test_with_path_keeps_query() {
        let uri: Uri = "/missing/route?tab=2".parse().unwrap();
        let rewritten = with_path(&uri, "/index.html").unwrap();
        assert_eq!(rewritten.path(), "/index.html");
        assert_eq!(rewritten.query(), Some("tab=2"));
    }

    #[test]
    fn test_encode_store_path() {
        assert_eq!(encode_store_path("index.html"), "index.html");
        assert_eq!(encode_store_path("spa shell/index.html"), "spa%20shell/index.html");
    }

    #[test]
    fn test_trailing_slash_location() {
        let uri: Uri = "/folder?a=b".parse().unwrap();
        assert_eq!(trailing_slash_location(&uri), "/folder/?a=b");

        let uri: Uri = "/folder".parse().unwrap();
        assert_eq!(trailing_slash_location(&uri), "/folder/");
    }
}

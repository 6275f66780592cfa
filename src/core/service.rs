use std::fmt;
use std::sync::Arc;

use hyper::Request;
use regex::Regex;
use thiserror::Error;

use crate::adapters::middleware::{CachePolicy, GzipCompression, RequestLogging};
use crate::core::middleware::{Middleware, compose};
use crate::core::not_found::NotFound;
use crate::core::resolver::FileResolver;
use crate::ports::file_store::{FileStore, validate_path};
use crate::ports::http_server::{Handler, HandlerFuture};
use crate::ports::response_writer::ResponseWriter;

pub const DEFAULT_INDEX: &str = "index.html";

/// Errors raised while building a [`Service`]
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Invalid index name '{name}': {reason}")]
    InvalidIndex { name: String, reason: String },

    #[error("Invalid not-found file '{path}': {reason}")]
    InvalidNotFoundFile { path: String, reason: String },

    #[error("Invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration failed: {0}")]
    Custom(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A path classifier used by the cache policy
pub type PathPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One step of service configuration, applied in order by [`Service::new`]
pub type ConfigOption = Box<dyn FnOnce(&mut ServiceConfig) -> ConfigResult<()> + Send>;

/// Mutable view of a service while it is being built
pub struct ServiceConfig {
    index: String,
    not_found: NotFound,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl ServiceConfig {
    fn new() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            not_found: NotFound::Default,
            middlewares: Vec::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn set_index(&mut self, index: impl Into<String>) -> ConfigResult<()> {
        let index = index.into();
        if let Err(err) = validate_path(&index) {
            return Err(ConfigError::InvalidIndex {
                name: index,
                reason: err.to_string(),
            });
        }
        self.index = index;
        Ok(())
    }

    pub fn not_found(&self) -> &NotFound {
        &self.not_found
    }

    /// Replace the not-found strategy; the last one set wins
    pub fn set_not_found(&mut self, not_found: NotFound) {
        self.not_found = not_found;
    }

    pub fn push_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }
}

pub(crate) struct ServiceInner {
    pub(crate) store: Arc<dyn FileStore>,
    pub(crate) index: String,
    pub(crate) not_found: NotFound,
    pub(crate) composed: Arc<dyn Handler>,
    middleware_count: usize,
}

/// Static file service: the composed middleware chain around the file resolver.
///
/// Cheap to clone; every clone shares the same frozen configuration.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    /// Build a service over `store`, applying `options` in order.
    ///
    /// The first failing option aborts construction; later options are not applied.
    pub fn new<S, I>(store: S, options: I) -> ConfigResult<Self>
    where
        S: FileStore,
        I: IntoIterator<Item = ConfigOption>,
    {
        Self::with_shared_store(Arc::new(store), options)
    }

    pub fn with_shared_store<I>(store: Arc<dyn FileStore>, options: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        let mut config = ServiceConfig::new();
        for option in options {
            option(&mut config)?;
        }

        let ServiceConfig {
            index,
            not_found,
            middlewares,
        } = config;
        let middleware_count = middlewares.len();

        let inner = Arc::new_cyclic(|weak| {
            let terminal: Arc<dyn Handler> = Arc::new(FileResolver::new(weak.clone()));
            ServiceInner {
                store,
                index,
                not_found,
                composed: compose(&middlewares, terminal),
                middleware_count,
            }
        });

        tracing::debug!(
            index = %inner.index,
            not_found = ?inner.not_found,
            middlewares = middleware_count,
            "Static file service built"
        );
        Ok(Self { inner })
    }

    pub fn index(&self) -> &str {
        &self.inner.index
    }

    pub fn not_found(&self) -> &NotFound {
        &self.inner.not_found
    }

    pub fn middleware_count(&self) -> usize {
        self.inner.middleware_count
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("index", &self.inner.index)
            .field("not_found", &self.inner.not_found)
            .field("middlewares", &self.inner.middleware_count)
            .finish_non_exhaustive()
    }
}

impl Handler for Service {
    fn serve<'a>(
        &'a self,
        req: &'a mut Request<()>,
        w: &'a mut dyn ResponseWriter,
    ) -> HandlerFuture<'a> {
        self.inner.composed.serve(req, w)
    }
}

/// Register a middleware; the first registered runs outermost
pub fn with_middleware(middleware: impl Middleware) -> ConfigOption {
    Box::new(move |config: &mut ServiceConfig| {
        config.push_middleware(Arc::new(middleware));
        Ok(())
    })
}

/// Use `index` instead of `index.html` as the index document
pub fn with_index(index: impl Into<String>) -> ConfigOption {
    let index = index.into();
    Box::new(move |config: &mut ServiceConfig| config.set_index(index))
}

/// Long-lived caching for paths matching any predicate, no caching otherwise
pub fn with_cache_policy(predicates: Vec<PathPredicate>) -> ConfigOption {
    with_middleware(CachePolicy::new(predicates))
}

/// Gzip the body when the client accepts it
pub fn with_gzip_compression() -> ConfigOption {
    with_middleware(GzipCompression::default())
}

/// Log every request with its final status and duration
pub fn with_request_logging() -> ConfigOption {
    with_middleware(RequestLogging)
}

/// Serve `path` from the store with status 404 for unresolved requests
pub fn with_not_found_file(path: impl Into<String>) -> ConfigOption {
    let path = path.into();
    Box::new(move |config: &mut ServiceConfig| {
        let path = path.trim_start_matches('/').to_string();
        if let Err(err) = validate_path(&path) {
            return Err(ConfigError::InvalidNotFoundFile {
                path,
                reason: err.to_string(),
            });
        }
        config.set_not_found(NotFound::File(path));
        Ok(())
    })
}

/// Delegate unresolved requests that accept HTML to `handler`; others get a plain 404
pub fn with_not_found_handler(handler: impl Handler) -> ConfigOption {
    let handler: Arc<dyn Handler> = Arc::new(handler);
    Box::new(move |config: &mut ServiceConfig| {
        config.set_not_found(NotFound::Handler {
            handler,
            html_only: true,
        });
        Ok(())
    })
}

/// Delegate every unresolved request to `handler`
pub fn with_not_found_handler_ungated(handler: impl Handler) -> ConfigOption {
    let handler: Arc<dyn Handler> = Arc::new(handler);
    Box::new(move |config: &mut ServiceConfig| {
        config.set_not_found(NotFound::Handler {
            handler,
            html_only: false,
        });
        Ok(())
    })
}

/// Serve the index document for every path that does not resolve
pub fn with_spa() -> ConfigOption {
    Box::new(|config: &mut ServiceConfig| {
        config.set_not_found(NotFound::Spa);
        Ok(())
    })
}

/// Matches paths starting with `prefix`
pub fn path_prefix(prefix: impl Into<String>) -> PathPredicate {
    let prefix = prefix.into();
    Arc::new(move |path: &str| path.starts_with(&prefix))
}

/// Matches paths against a regular expression
pub fn path_regex(pattern: &str) -> ConfigResult<PathPredicate> {
    let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(Arc::new(move |path: &str| regex.is_match(path)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::adapters::memory_store::MemoryFileStore;

    fn store() -> MemoryFileStore {
        MemoryFileStore::new().with_file("index.html", "Hello there.\n")
    }

    #[test]
    fn test_defaults() {
        let service = Service::new(store(), Vec::new()).unwrap();
        assert_eq!(service.index(), "index.html");
        assert!(matches!(service.not_found(), NotFound::Default));
        assert_eq!(service.middleware_count(), 0);
    }

    #[test]
    fn test_options_apply_in_order() {
        let service = Service::new(
            store(),
            vec![
                with_index("app.html"),
                with_not_found_file("404.html"),
                with_spa(),
                with_gzip_compression(),
                with_cache_policy(vec![path_prefix("/_next/")]),
            ],
        )
        .unwrap();

        assert_eq!(service.index(), "app.html");
        assert!(matches!(service.not_found(), NotFound::Spa));
        assert_eq!(service.middleware_count(), 2);
    }

    #[test]
    fn test_first_failing_option_aborts() {
        let applied = Arc::new(AtomicBool::new(false));
        let flag = applied.clone();
        let later: ConfigOption = Box::new(move |_config: &mut ServiceConfig| {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let result = Service::new(
            store(),
            vec![
                Box::new(|_config: &mut ServiceConfig| {
                    Err::<(), _>(ConfigError::Custom("bad template".into()))
                }) as ConfigOption,
                later,
            ],
        );

        assert!(matches!(result, Err(ConfigError::Custom(_))));
        assert!(!applied.load(Ordering::SeqCst));
    }

    #[test]
    fn test_invalid_index_is_rejected() {
        for index in ["", "dir/", "../index.html", "/index.html"] {
            let result = Service::new(store(), vec![with_index(index)]);
            assert!(
                matches!(result, Err(ConfigError::InvalidIndex { .. })),
                "expected {index:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_not_found_file_is_validated() {
        let result = Service::new(store(), vec![with_not_found_file("../404.html")]);
        assert!(matches!(result, Err(ConfigError::InvalidNotFoundFile { .. })));

        let service = Service::new(store(), vec![with_not_found_file("/404.html")]).unwrap();
        assert!(matches!(service.not_found(), NotFound::File(path) if path == "404.html"));
    }

    #[test]
    fn test_path_predicates() {
        let next = path_prefix("/_next/");
        assert!(next("/_next/app.js"));
        assert!(!next("/app.js"));

        let hashed = path_regex(r"\.[0-9a-f]{8}\.(js|css)$").unwrap();
        assert!(hashed("/static/app.1a2b3c4d.js"));
        assert!(!hashed("/static/app.js"));

        assert!(matches!(
            path_regex("(unclosed"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}

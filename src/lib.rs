/// Harbor - A static file server for web applications
///
/// This crate provides a composable static asset service with features like:
/// - Index documents and directory redirects
/// - Cache policy and gzip middlewares
/// - Custom not-found files and handlers
/// - Client-side routing (SPA) fallback
pub mod adapters;
pub mod config;
pub mod core;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub use crate::adapters::{DirFileStore, MemoryFileStore, StaticServer};
pub use crate::core::{
    ConfigError, ConfigOption, Middleware, NotFound, Service, ServiceConfig, path_prefix,
    path_regex, respond_json, respond_not_found, respond_xml, with_cache_policy,
    with_gzip_compression, with_index, with_middleware, with_not_found_file,
    with_not_found_handler, with_not_found_handler_ungated, with_request_logging, with_spa,
};
pub use crate::ports::{FileStore, Handler, HttpServer, ResponseWriter, handler_fn};

pub mod headers;
pub mod middleware;
pub mod not_found;
pub mod path;
pub mod resolver;
pub mod respond;
pub mod service;


pub use middleware::Middleware;
pub use not_found::{FallbackState, NotFound, respond_not_found};
pub use respond::{respond_json, respond_xml};
pub use service::{
    ConfigError, ConfigOption, ConfigResult, DEFAULT_INDEX, PathPredicate, Service, ServiceConfig,
    path_prefix, path_regex, with_cache_policy, with_gzip_compression, with_index, with_middleware,
    with_not_found_file, with_not_found_handler, with_not_found_handler_ungated,
    with_request_logging, with_spa,
};

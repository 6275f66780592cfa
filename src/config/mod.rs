pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{LoaderError, load_config};
pub use models::{CachePolicyConfig, LogFormat, ServerConfig};
pub use validation::{ConfigValidator, ValidationError};

pub mod file_system;
pub mod http;
pub mod memory_store;
pub mod middleware;

pub use file_system::DirFileStore;
pub use http::StaticServer;
pub use memory_store::MemoryFileStore;
pub use middleware::{CachePolicy, GzipCompression, RequestLogging};

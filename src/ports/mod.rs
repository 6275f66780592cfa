pub mod file_store;
pub mod http_server;
pub mod response_writer;

pub use file_store::{FileInfo, FileStore, FileStoreError, FileStoreResult, OpenedFile};
pub use http_server::{Handler, HandlerFuture, HttpServer, ServeError, ServeResult, handler_fn};
pub use response_writer::{BufferedResponse, ResponseRecorder, ResponseWriter, WriteFuture};

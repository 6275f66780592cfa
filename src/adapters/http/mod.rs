pub mod server;
pub mod transport;

pub use server::StaticServer;
pub use transport::{ChannelWriter, PendingResponse, response_channel, serve_request};

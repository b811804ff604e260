pub mod channel;
pub mod message;
pub mod registry;
pub mod state;
pub mod transport;

pub use channel::{LiveChannel, LiveConsumer};
pub use message::LiveEvent;
pub use registry::ChannelRegistry;
pub use state::{ChannelState, ReconnectPolicy};
pub use transport::{Connector, Frame, Transport, WsConnector};

#[derive(thiserror::Error, Debug)]
pub enum LiveError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid channel url: {0}")]
    InvalidUrl(String),
}

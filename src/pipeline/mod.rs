pub mod delivery;
pub mod dispatcher;
pub mod negotiation;
mod reports;
pub mod sender_loop;

pub use delivery::DeliveryQueue;
pub use dispatcher::EventDispatcher;
pub use negotiation::{NegotiationError, SchemaNegotiator};
pub use sender_loop::SenderLoop;

use crate::app::ConfigError;
use crate::codec::CodecError;
use crate::sender::ClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatcherError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Client(#[from] ClientError),
    #[error("Custom event schema error: {0}")]
    Schema(#[from] CodecError),
}

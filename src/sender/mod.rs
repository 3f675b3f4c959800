pub mod client;
pub mod schema;
pub mod transmission;

pub use client::{ClientConfig, ClientError, ConnectionStats, HttpClient};
pub use schema::SchemaStatus;
pub use transmission::{BatchTransmitter, DeliveryResult, TransmissionError};

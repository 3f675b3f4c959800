use crate::reliability::{BatchStore, StoreError};
use crate::sender::{BatchTransmitter, SchemaStatus, TransmissionError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("Schema handshake failed: {0}")]
    Transmission(#[from] TransmissionError),
    #[error("Schema blob for version {version} unavailable: {source}")]
    MissingSchema {
        version: u32,
        #[source]
        source: StoreError,
    },
}

/// Remembers the last schema version the collector accepted.
#[derive(Debug, Default)]
pub struct SchemaNegotiator {
    negotiated_version: Option<u32>,
}

impl SchemaNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn negotiated_version(&self) -> Option<u32> {
        self.negotiated_version
    }

    pub async fn ensure_registered(
        &mut self,
        version: u32,
        store: &BatchStore,
        transmitter: &BatchTransmitter,
        cancel: &CancellationToken,
    ) -> Result<(), NegotiationError> {
        if version == 0 || self.negotiated_version == Some(version) {
            return Ok(());
        }

        match transmitter.query_schema(version, cancel).await? {
            SchemaStatus::Known(ids) => {
                tracing::debug!(version, mapped = ids.len(), "Custom event schema already known");
            }
            SchemaStatus::NeedsRegistration => {
                let set = store
                    .load_schema(version)
                    .await
                    .map_err(|source| NegotiationError::MissingSchema { version, source })?;
                transmitter.register_schema(&set, cancel).await?;
            }
        }

        self.negotiated_version = Some(version);
        Ok(())
    }
}

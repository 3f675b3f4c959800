//! Custom event schema handshake against the registration endpoint.

use super::transmission::{
    BatchTransmitter, HEADER_SCHEMA_COUNT, HEADER_SCHEMA_VERSION, HEADER_TOKEN,
    TransmissionError, cancellable,
};
use crate::codec::CustomEventSet;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// Server-side ids for the version's events.
    Known(Vec<u16>),
    NeedsRegistration,
}

impl BatchTransmitter {
    fn schema_headers(&self, version: u32) -> Result<HeaderMap, TransmissionError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(HEADER_TOKEN), self.token_header()?);
        headers.insert(
            HeaderName::from_static(HEADER_SCHEMA_VERSION),
            HeaderValue::from(version),
        );
        Ok(headers)
    }

    /// 200 with an even-length body of `u16` ids means known, 204 means the
    /// version must be registered. Anything else is an error.
    pub async fn query_schema(
        &self,
        version: u32,
        cancel: &CancellationToken,
    ) -> Result<SchemaStatus, TransmissionError> {
        let start = Instant::now();
        let request = self
            .client
            .client
            .get(self.client.registration_url.clone())
            .headers(self.schema_headers(version)?)
            .send();

        let response = cancellable(cancel, request).await?;
        let status = response.status();
        let answered = status == StatusCode::OK || status == StatusCode::NO_CONTENT;
        self.client.stats.record_request(answered, start.elapsed());

        match status {
            StatusCode::NO_CONTENT => {
                debug!(version, "Collector does not know custom event schema");
                Ok(SchemaStatus::NeedsRegistration)
            }
            StatusCode::OK => {
                let body = cancellable(cancel, response.bytes()).await?;
                if body.len() % 2 != 0 {
                    return Err(TransmissionError::MalformedIdMapping(body.len()));
                }
                let ids = body
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                Ok(SchemaStatus::Known(ids))
            }
            other => Err(TransmissionError::UnexpectedStatus(other.as_u16())),
        }
    }

    /// Uploads the gzip table. Success is 200 or 201.
    pub async fn register_schema(
        &self,
        set: &CustomEventSet,
        cancel: &CancellationToken,
    ) -> Result<(), TransmissionError> {
        let start = Instant::now();
        let mut headers = self.schema_headers(set.version)?;
        headers.insert(
            HeaderName::from_static(HEADER_SCHEMA_COUNT),
            HeaderValue::from(set.event_count),
        );
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );

        let request = self
            .client
            .client
            .post(self.client.registration_url.clone())
            .headers(headers)
            .body(set.gzip_data.clone())
            .send();

        let response = cancellable(cancel, request).await?;
        let status = response.status();
        let success = status == StatusCode::OK || status == StatusCode::CREATED;
        self.client.stats.record_request(success, start.elapsed());

        if success {
            info!(
                version = set.version,
                events = set.event_count,
                "Registered custom event schema"
            );
            Ok(())
        } else {
            Err(TransmissionError::UnexpectedStatus(status.as_u16()))
        }
    }
}

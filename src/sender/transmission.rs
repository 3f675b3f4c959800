use super::HttpClient;
use crate::domain::BatchMeta;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub const HEADER_TOKEN: &str = "k-token";
pub const HEADER_INSTALL_ID: &str = "k-installid";
pub const HEADER_USER_ID: &str = "k-uid";
pub const HEADER_DATA_SESSION: &str = "k-ds";
pub const HEADER_BATCH_NUM: &str = "k-batch";
pub const HEADER_BATCH_START: &str = "k-batchstarttime";
pub const HEADER_BATCH_END: &str = "k-batchendtime";
pub const HEADER_SCHEMA_VERSION: &str = "k-customeventhash";
pub const HEADER_SCHEMA_COUNT: &str = "k-customeventcount";
pub const HEADER_TESTER: &str = "k-tester";

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),
    #[error("Malformed id mapping body of {0} bytes")]
    MalformedIdMapping(usize),
}

#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub success: bool,
    pub status_code: u16,
    pub latency: Duration,
    pub bytes_sent: usize,
}

/// Stateless request functions against the collector.
#[derive(Debug, Clone)]
pub struct BatchTransmitter {
    pub client: HttpClient,
}

pub(crate) fn header_value(value: &str, what: &str) -> Result<HeaderValue, TransmissionError> {
    HeaderValue::from_str(value)
        .map_err(|e| TransmissionError::InvalidHeaderValue(format!("Invalid {what}: {e}")))
}

fn format_id(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

/// Runs `request` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, reqwest::Error>>,
) -> Result<T, TransmissionError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransmissionError::Cancelled),
        result = request => Ok(result?),
    }
}

impl BatchTransmitter {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// POSTs one queue file payload. Any 2xx is success; other statuses are
    /// reported through `DeliveryResult::success`.
    pub async fn deliver_batch(
        &self,
        meta: &BatchMeta,
        payload: Bytes,
        test_user: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DeliveryResult, TransmissionError> {
        let start = Instant::now();
        let bytes_sent = payload.len();
        let headers = self.build_headers(meta, test_user)?;

        debug!(
            batch_num = meta.batch_num,
            end_time = meta.end_time,
            bytes = bytes_sent,
            "Sending batch"
        );

        let request = self
            .client
            .client
            .post(self.client.ingress_url.clone())
            .headers(headers)
            .body(payload)
            .send();

        let response = match cancellable(cancel, request).await {
            Ok(response) => response,
            Err(e) => {
                self.client.stats.record_request(false, start.elapsed());
                return Err(e);
            }
        };
        let latency = start.elapsed();
        let status_code = response.status().as_u16();
        let success = response.status().is_success();

        self.client.stats.record_request(success, latency);

        if success {
            debug!(
                batch_num = meta.batch_num,
                status = status_code,
                latency_ms = latency.as_millis() as u64,
                "Batch delivered"
            );
        } else {
            warn!(
                batch_num = meta.batch_num,
                end_time = meta.end_time,
                status = status_code,
                "Collector rejected batch"
            );
        }

        Ok(DeliveryResult {
            success,
            status_code,
            latency,
            bytes_sent,
        })
    }

    pub fn token_header(&self) -> Result<HeaderValue, TransmissionError> {
        header_value(&self.client.config.app_secret, "app secret")
    }

    pub fn build_headers(
        &self,
        meta: &BatchMeta,
        test_user: Option<&str>,
    ) -> Result<HeaderMap, TransmissionError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(HeaderName::from_static(HEADER_TOKEN), self.token_header()?);

        headers.insert(
            HeaderName::from_static(HEADER_INSTALL_ID),
            header_value(&format_id(&meta.install_id), "install id")?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_USER_ID),
            header_value(&format_id(&meta.user_id), "user id")?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_DATA_SESSION),
            header_value(&format_id(&meta.data_session_id), "data session id")?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_BATCH_NUM),
            HeaderValue::from(meta.batch_num),
        );
        headers.insert(
            HeaderName::from_static(HEADER_BATCH_START),
            HeaderValue::from(meta.start_time),
        );
        headers.insert(
            HeaderName::from_static(HEADER_BATCH_END),
            HeaderValue::from(meta.end_time),
        );
        headers.insert(
            HeaderName::from_static(HEADER_SCHEMA_VERSION),
            HeaderValue::from(meta.custom_events_version),
        );

        if let Some(tester) = test_user {
            headers.insert(
                HeaderName::from_static(HEADER_TESTER),
                header_value(tester, "test user name")?,
            );
        }

        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::ClientConfig;

    fn transmitter() -> BatchTransmitter {
        BatchTransmitter::new(
            HttpClient::new(ClientConfig {
                app_secret: "secret".to_string(),
                ..ClientConfig::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_build_headers_carries_batch_metadata() {
        let install = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let meta = BatchMeta {
            batch_num: 4,
            start_time: 100,
            end_time: 130,
            custom_events_version: 77,
            ..BatchMeta::new(install, Uuid::nil(), Uuid::nil())
        };

        let headers = transmitter().build_headers(&meta, None).unwrap();
        assert_eq!(headers["k-installid"], "00112233-4455-6677-8899-aabbccddeeff");
        assert_eq!(headers["k-uid"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(headers["k-batch"], "4");
        assert_eq!(headers["k-batchstarttime"], "100");
        assert_eq!(headers["k-batchendtime"], "130");
        assert_eq!(headers["k-customeventhash"], "77");
        assert_eq!(headers["k-token"], "secret");
        assert_eq!(headers[CONTENT_TYPE], "application/octet-stream");
        assert!(!headers.contains_key("k-tester"));
    }

    #[test]
    fn test_test_user_header_is_optional() {
        let meta = BatchMeta::new(Uuid::nil(), Uuid::nil(), Uuid::nil());
        let headers = transmitter().build_headers(&meta, Some("qa-phone")).unwrap();
        assert_eq!(headers["k-tester"], "qa-phone");

        let err = transmitter().build_headers(&meta, Some("bad\nname")).unwrap_err();
        assert!(matches!(err, TransmissionError::InvalidHeaderValue(_)));
    }
}

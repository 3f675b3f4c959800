use crate::codec::decode_records;
use crate::domain::{BatchMeta, CustomEventTable, EventRecord};
use crate::reliability::{BatchStore, PendingBatchInfo};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct QueuedFileReport {
    pub file: String,
    pub size: u64,
    pub batch_num: i32,
    pub start_time: u32,
    pub end_time: u32,
    pub user_id: Option<Uuid>,
    pub data_session_id: Option<Uuid>,
    pub custom_events_version: Option<u32>,
    pub records: Vec<EventRecord>,
    pub error: Option<String>,
}

impl QueuedFileReport {
    fn failed(info: &PendingBatchInfo, error: String) -> Self {
        Self {
            file: info.file_name(),
            size: info.size,
            batch_num: info.batch_num,
            start_time: 0,
            end_time: info.end_time,
            user_id: None,
            data_session_id: None,
            custom_events_version: None,
            records: Vec::new(),
            error: Some(error),
        }
    }
}

/// Decodes every queued file in delivery order. Problems are reported per
/// file rather than aborting the listing.
pub async fn inspect_queue(store: &BatchStore) -> anyhow::Result<Vec<QueuedFileReport>> {
    let pending = store.scan().await?;
    let mut tables: HashMap<u32, Result<CustomEventTable, String>> = HashMap::new();
    let mut reports = Vec::with_capacity(pending.len());

    for info in &pending {
        let loaded = match store.load_batch(info, Uuid::nil()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                reports.push(QueuedFileReport::failed(info, e.to_string()));
                continue;
            }
        };
        let meta: BatchMeta = loaded.meta;

        let version = meta.custom_events_version;
        if version != 0 && !tables.contains_key(&version) {
            let table = match store.load_schema(version).await {
                Ok(set) => set.decode_table().map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            tables.insert(version, table);
        }
        let table = match tables.get(&version) {
            Some(Ok(table)) => Some(table),
            Some(Err(_)) | None => None,
        };

        let (records, error) = match decode_records(&loaded.payload, table) {
            Ok(records) => (records, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        reports.push(QueuedFileReport {
            file: info.file_name(),
            size: info.size,
            batch_num: meta.batch_num,
            start_time: meta.start_time,
            end_time: meta.end_time,
            user_id: Some(meta.user_id),
            data_session_id: Some(meta.data_session_id),
            custom_events_version: Some(version),
            records,
            error,
        });
    }

    Ok(reports)
}

pub fn write_table(out: &mut impl Write, reports: &[QueuedFileReport]) -> std::io::Result<()> {
    writeln!(out, "{:<24} {:>10} {:>8} {:>12}  STATUS", "FILE", "BYTES", "RECORDS", "SCHEMA")?;
    for report in reports {
        let schema = report
            .custom_events_version
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        let status = report.error.as_deref().unwrap_or("ok");
        writeln!(
            out,
            "{:<24} {:>10} {:>8} {:>12}  {}",
            report.file,
            report.size,
            report.records.len(),
            schema,
            status
        )?;
    }
    let total: u64 = reports.iter().map(|r| r.size).sum();
    writeln!(out, "{} files, {} bytes queued", reports.len(), total)
}

use crate::codec::{
    CodecError, CustomEventSet, decode_batch_file, decode_schema_file, encode_batch_file,
    encode_schema_file,
};
use crate::domain::BatchMeta;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub const BATCH_FILE_EXTENSION: &str = "kwub";
pub const SCHEMA_FILE_SUFFIX: &str = ".map.gz";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt file: {0}")]
    Codec(#[from] CodecError),
}

/// Index entry for one queued file. `(end_time, batch_num)` is both the
/// file name and the delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBatchInfo {
    pub end_time: u32,
    pub batch_num: i32,
    pub size: u64,
}

impl PendingBatchInfo {
    pub fn key(&self) -> (u32, i32) {
        (self.end_time, self.batch_num)
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.{BATCH_FILE_EXTENSION}", self.end_time, self.batch_num)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub meta: BatchMeta,
    pub payload: Bytes,
}

/// Queue files and schema blobs inside one work directory.
#[derive(Debug, Clone)]
pub struct BatchStore {
    work_dir: PathBuf,
}

impl BatchStore {
    /// Creates the directory if needed. A failure here only surfaces later as
    /// failed writes.
    pub async fn open(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        if let Err(e) = fs::create_dir_all(&work_dir).await {
            tracing::warn!(path = %work_dir.display(), error = %e, "Failed to create work directory");
        }
        Self { work_dir }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn batch_path(&self, info: &PendingBatchInfo) -> PathBuf {
        self.work_dir.join(info.file_name())
    }

    pub fn schema_path(&self, version: u32) -> PathBuf {
        self.work_dir.join(format!("{version}{SCHEMA_FILE_SUFFIX}"))
    }

    pub async fn save_batch(
        &self,
        meta: &BatchMeta,
        payload: &[u8],
    ) -> Result<PendingBatchInfo, StoreError> {
        let data = encode_batch_file(meta, payload);
        let info = PendingBatchInfo {
            end_time: meta.end_time,
            batch_num: meta.batch_num,
            size: data.len() as u64,
        };
        write_atomic(&self.batch_path(&info), &data).await?;

        tracing::debug!(
            file = %info.file_name(),
            bytes = info.size,
            "Stored batch file"
        );
        Ok(info)
    }

    pub async fn load_batch(
        &self,
        info: &PendingBatchInfo,
        install_id: Uuid,
    ) -> Result<LoadedBatch, StoreError> {
        let data = fs::read(self.batch_path(info)).await?;
        let (meta, payload) = decode_batch_file(Bytes::from(data), install_id)?;
        Ok(LoadedBatch { meta, payload })
    }

    /// A file that is already gone counts as deleted.
    pub async fn delete_batch(&self, info: &PendingBatchInfo) -> Result<(), StoreError> {
        match fs::remove_file(self.batch_path(info)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuilds the queue index from the directory listing, sorted in
    /// delivery order.
    pub async fn scan(&self) -> Result<Vec<PendingBatchInfo>, StoreError> {
        let mut pending = Vec::new();
        let mut entries = fs::read_dir(&self.work_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_stale_temp_file(&file_name) {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => tracing::debug!(file = %file_name, "Removed interrupted write"),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(file = %file_name, error = %e, "Failed to remove interrupted write");
                    }
                }
                continue;
            }
            let Some((end_time, batch_num)) = parse_batch_file_name(&file_name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            pending.push(PendingBatchInfo {
                end_time,
                batch_num,
                size: metadata.len(),
            });
        }

        pending.sort_by_key(PendingBatchInfo::key);
        Ok(pending)
    }

    pub async fn save_schema(&self, set: &CustomEventSet) -> Result<(), StoreError> {
        write_atomic(&self.schema_path(set.version), &encode_schema_file(set)).await?;
        tracing::debug!(
            version = set.version,
            events = set.event_count,
            "Stored custom event schema"
        );
        Ok(())
    }

    pub async fn load_schema(&self, version: u32) -> Result<CustomEventSet, StoreError> {
        let data = fs::read(self.schema_path(version)).await?;
        Ok(decode_schema_file(Bytes::from(data))?)
    }
}

/// Parses `{end_time}_{batch_num}.kwub`.
pub fn parse_batch_file_name(file_name: &str) -> Option<(u32, i32)> {
    let stem = file_name.strip_suffix(BATCH_FILE_EXTENSION)?.strip_suffix('.')?;
    let (end_time, batch_num) = stem.split_once('_')?;
    Some((end_time.parse().ok()?, batch_num.parse().ok()?))
}

/// Temporaries of queue files and schema blobs. Other `.tmp` files in the
/// work directory belong to the profile writers and are left alone.
fn is_stale_temp_file(file_name: &str) -> bool {
    file_name.strip_suffix(TEMP_SUFFIX).is_some_and(|target| {
        parse_batch_file_name(target).is_some() || target.ends_with(SCHEMA_FILE_SUFFIX)
    })
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), std::io::Error> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(TEMP_SUFFIX);
    let tmp_path = PathBuf::from(tmp_path);
    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

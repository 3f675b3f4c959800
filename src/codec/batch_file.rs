//! Queue file layout:
//!
//! ```text
//! i32 magic | u32 formatVersion | 16B userId | 16B dataSessionId | i32 batchNum
//! u32 startTime | u32 endTime | i32 payloadLength | payload | u32 customEventsVersion
//! ```

use super::CodecError;
use super::primitives::{ensure, get_i32, get_u32, get_uuid, put_uuid};
use crate::domain::BatchMeta;
use bytes::{BufMut, Bytes};
use uuid::Uuid;

/// "KWUB"
pub const BATCH_MAGIC: i32 = 0x5755_4242;
pub const BATCH_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 16 + 16 + 4 + 4 + 4 + 4;
const TRAILER_LEN: usize = 4;

/// Bytes a queue file adds on top of its payload.
pub const BATCH_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

pub fn encode_batch_file(meta: &BatchMeta, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(BATCH_OVERHEAD + payload.len());
    out.put_i32_le(BATCH_MAGIC);
    out.put_u32_le(BATCH_FORMAT_VERSION);
    put_uuid(&mut out, &meta.user_id);
    put_uuid(&mut out, &meta.data_session_id);
    out.put_i32_le(meta.batch_num);
    out.put_u32_le(meta.start_time);
    out.put_u32_le(meta.end_time);
    out.put_i32_le(payload.len() as i32);
    out.put_slice(payload);
    out.put_u32_le(meta.custom_events_version);
    out
}

/// Parses a queue file. The payload is a zero-copy slice of `data`.
pub fn decode_batch_file(mut data: Bytes, install_id: Uuid) -> Result<(BatchMeta, Bytes), CodecError> {
    let magic = get_i32(&mut data)?;
    if magic != BATCH_MAGIC {
        return Err(CodecError::BadMagic(magic));
    }
    let version = get_u32(&mut data)?;
    if version != BATCH_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let user_id = get_uuid(&mut data)?;
    let data_session_id = get_uuid(&mut data)?;
    let batch_num = get_i32(&mut data)?;
    let start_time = get_u32(&mut data)?;
    let end_time = get_u32(&mut data)?;

    let payload_len = get_i32(&mut data)?;
    if payload_len < 0 {
        return Err(CodecError::InvalidPayloadLength(payload_len));
    }
    ensure(&data, payload_len as usize)?;
    let payload = data.split_to(payload_len as usize);
    let custom_events_version = get_u32(&mut data)?;

    let meta = BatchMeta {
        install_id,
        user_id,
        data_session_id,
        batch_num,
        start_time,
        end_time,
        custom_events_version,
    };
    Ok((meta, payload))
}

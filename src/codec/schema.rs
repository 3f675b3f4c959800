//! Custom event schema snapshot and its `{version}.map.gz` file layout:
//!
//! ```text
//! u8 fileFormatVersion(=1) | u32 version | u16 eventCount | i32 compressedLength | gzip bytes
//! ```
//!
//! The gzip stream holds `{u16 id, string name, u16 typeCode}` per event.

use super::CodecError;
use super::primitives::{ensure, get_i32, get_string, get_u8, get_u16, get_u32, put_string};
use crate::domain::{CustomEventDef, CustomEventTable, CustomEventType, FIRST_CUSTOM_EVENT_ID};
use bytes::{BufMut, Bytes};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, Crc};
use std::io::{Read, Write};

pub const SCHEMA_FILE_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomEventSet {
    /// Zero means "no custom events".
    pub version: u32,
    pub event_count: u16,
    pub gzip_data: Bytes,
}

impl CustomEventSet {
    pub fn empty() -> Self {
        Self {
            version: 0,
            event_count: 0,
            gzip_data: Bytes::new(),
        }
    }

    pub fn from_table(table: &CustomEventTable) -> Result<Self, CodecError> {
        if table.is_empty() {
            return Ok(Self::empty());
        }

        let raw = encode_table(table);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let gzip_data = encoder.finish()?;

        let mut crc = Crc::new();
        crc.update(&gzip_data);
        let version = match crc.sum() {
            0 => 1,
            sum => sum,
        };

        Ok(Self {
            version,
            event_count: table.len() as u16,
            gzip_data: Bytes::from(gzip_data),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }

    /// Inflates the snapshot back into a table. Ids must be contiguous from 2500.
    pub fn decode_table(&self) -> Result<CustomEventTable, CodecError> {
        if self.is_empty() {
            return Ok(CustomEventTable::default());
        }

        let mut raw = Vec::new();
        GzDecoder::new(&self.gzip_data[..]).read_to_end(&mut raw)?;

        let mut cursor = &raw[..];
        let mut events = Vec::with_capacity(self.event_count as usize);
        for expected in (FIRST_CUSTOM_EVENT_ID..=u16::MAX).take(self.event_count as usize) {
            let id = get_u16(&mut cursor)?;
            if id != expected {
                return Err(CodecError::SchemaIdMismatch {
                    expected,
                    found: id,
                });
            }
            let name = get_string(&mut cursor)?;
            let type_code = get_u16(&mut cursor)?;
            let event_type = CustomEventType::from_code(type_code)
                .ok_or(CodecError::UnknownCustomEventType { id, type_code })?;
            events.push(CustomEventDef { name, event_type });
        }
        Ok(CustomEventTable::new(events))
    }
}

fn encode_table(table: &CustomEventTable) -> Vec<u8> {
    let mut out = Vec::new();
    for (id, def) in table.iter() {
        out.put_u16_le(id);
        put_string(&mut out, &def.name);
        out.put_u16_le(def.event_type.code());
    }
    out
}

pub fn encode_schema_file(set: &CustomEventSet) -> Vec<u8> {
    let mut out = Vec::with_capacity(11 + set.gzip_data.len());
    out.put_u8(SCHEMA_FILE_VERSION);
    out.put_u32_le(set.version);
    out.put_u16_le(set.event_count);
    out.put_i32_le(set.gzip_data.len() as i32);
    out.put_slice(&set.gzip_data);
    out
}

pub fn decode_schema_file(mut data: Bytes) -> Result<CustomEventSet, CodecError> {
    let format = get_u8(&mut data)?;
    if format != SCHEMA_FILE_VERSION {
        return Err(CodecError::UnsupportedSchemaVersion(format));
    }
    let version = get_u32(&mut data)?;
    let event_count = get_u16(&mut data)?;
    let len = get_i32(&mut data)?;
    if len < 0 {
        return Err(CodecError::InvalidPayloadLength(len));
    }
    ensure(&data, len as usize)?;
    let gzip_data = data.split_to(len as usize);

    Ok(CustomEventSet {
        version,
        event_count,
        gzip_data,
    })
}

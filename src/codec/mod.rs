pub mod batch_file;
pub mod primitives;
pub mod record;
pub mod schema;

pub use batch_file::{
    BATCH_FORMAT_VERSION, BATCH_MAGIC, BATCH_OVERHEAD, decode_batch_file, encode_batch_file,
};
pub use record::{decode_records, drop_marker, encode_payload, encode_record};
pub use schema::{CustomEventSet, decode_schema_file, encode_schema_file};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("Malformed 7-bit encoded length prefix")]
    InvalidLengthPrefix,
    #[error("Invalid UTF-8 in string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid encoded char")]
    InvalidChar,
    #[error("Invalid bool byte: {0}")]
    InvalidBool(u8),
    #[error("Negative item count: {0}")]
    NegativeCount(i32),
    #[error("Unknown event type code: {0}")]
    UnknownEventType(u16),
    #[error("Bad batch magic: {0:#010x}")]
    BadMagic(i32),
    #[error("Unsupported batch format version: {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid payload length: {0}")]
    InvalidPayloadLength(i32),
    #[error("Unsupported schema file version: {0}")]
    UnsupportedSchemaVersion(u8),
    #[error("Unknown custom event type {type_code} for event {id}")]
    UnknownCustomEventType { id: u16, type_code: u16 },
    #[error("Custom event id mismatch: expected {expected}, found {found}")]
    SchemaIdMismatch { expected: u16, found: u16 },
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),
}

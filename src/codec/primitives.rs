//! Little-endian field helpers shared by every on-disk and on-wire layout.
//!
//! Readers never panic on short input: every `get_*` checks the remaining
//! length first and reports [`CodecError::UnexpectedEof`].

use super::CodecError;
use bytes::{Buf, BufMut};
use uuid::Uuid;

pub fn ensure(buf: &impl Buf, needed: usize) -> Result<(), CodecError> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(CodecError::UnexpectedEof { needed, remaining });
    }
    Ok(())
}

pub fn get_u8(buf: &mut impl Buf) -> Result<u8, CodecError> {
    ensure(&*buf, 1)?;
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut impl Buf) -> Result<u16, CodecError> {
    ensure(&*buf, 2)?;
    Ok(buf.get_u16_le())
}

pub fn get_u32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    ensure(&*buf, 4)?;
    Ok(buf.get_u32_le())
}

pub fn get_i32(buf: &mut impl Buf) -> Result<i32, CodecError> {
    ensure(&*buf, 4)?;
    Ok(buf.get_i32_le())
}

/// Ids use the mixed-endian GUID layout.
pub fn put_uuid(dst: &mut impl BufMut, id: &Uuid) {
    dst.put_slice(&id.to_bytes_le());
}

pub fn get_uuid(buf: &mut impl Buf) -> Result<Uuid, CodecError> {
    ensure(&*buf, 16)?;
    let mut raw = [0u8; 16];
    buf.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes_le(raw))
}

fn put_7bit_len(dst: &mut impl BufMut, len: usize) {
    let mut value = len as u32;
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

fn get_7bit_len(buf: &mut impl Buf) -> Result<usize, CodecError> {
    let mut value = 0u32;
    for shift in (0..35).step_by(7) {
        let byte = get_u8(buf)?;
        // The fifth byte may only carry the top four bits.
        if shift == 28 && byte > 0x0f {
            return Err(CodecError::InvalidLengthPrefix);
        }
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value as usize);
        }
    }
    Err(CodecError::InvalidLengthPrefix)
}

pub fn put_string(dst: &mut impl BufMut, value: &str) {
    put_7bit_len(dst, value.len());
    dst.put_slice(value.as_bytes());
}

pub fn get_string(buf: &mut impl Buf) -> Result<String, CodecError> {
    let len = get_7bit_len(buf)?;
    ensure(&*buf, len)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    Ok(String::from_utf8(raw)?)
}

pub fn put_char(dst: &mut impl BufMut, value: char) {
    let mut tmp = [0u8; 4];
    dst.put_slice(value.encode_utf8(&mut tmp).as_bytes());
}

pub fn get_char(buf: &mut impl Buf) -> Result<char, CodecError> {
    let lead = get_u8(buf)?;
    let width = match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => return Err(CodecError::InvalidChar),
    };
    ensure(&*buf, width - 1)?;
    let mut raw = [lead, 0, 0, 0];
    buf.copy_to_slice(&mut raw[1..width]);
    std::str::from_utf8(&raw[..width])
        .ok()
        .and_then(|s| s.chars().next())
        .ok_or(CodecError::InvalidChar)
}

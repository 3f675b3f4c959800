use super::CodecError;
use super::primitives::{
    get_char, get_i32, get_string, get_u8, get_u16, get_u32, put_char, put_string,
};
use crate::domain::{
    CustomEventTable, DropReason, EventKind, EventRecord, Item, Payload, PayloadShape,
};
use bytes::{Buf, BufMut};

const BOOL_FALSE: u8 = 1;
const BOOL_TRUE: u8 = 2;

pub fn encode_record(dst: &mut impl BufMut, code: u16, payload: &Payload) {
    dst.put_u16_le(code);
    encode_payload(dst, payload);
}

pub fn encode_payload(dst: &mut impl BufMut, payload: &Payload) {
    match payload {
        Payload::Empty => {}
        Payload::Str(value) => put_string(dst, value),
        Payload::U32(value) | Payload::Timestamp(value) => dst.put_u32_le(*value),
        Payload::I32(value) => dst.put_i32_le(*value),
        // Zero is never written so a zeroed tail reads as corruption.
        Payload::Bool(value) => dst.put_u8(if *value { BOOL_TRUE } else { BOOL_FALSE }),
        Payload::Coord { x, y } => {
            dst.put_u16_le(*x);
            dst.put_u16_le(*y);
        }
        Payload::ItemsExchange { location, from, to } => {
            put_string(dst, location);
            put_items(dst, from);
            put_items(dst, to);
        }
        Payload::ItemsReset { location, items } => {
            put_string(dst, location);
            put_items(dst, items);
        }
        Payload::AbTestAssignment { test, group } => {
            put_string(dst, test);
            put_char(dst, *group);
        }
    }
}

fn put_items(dst: &mut impl BufMut, items: &[Item]) {
    dst.put_i32_le(items.len() as i32);
    for item in items {
        put_string(dst, &item.name);
        dst.put_u32_le(item.count);
    }
}

fn get_items(buf: &mut impl Buf) -> Result<Vec<Item>, CodecError> {
    let count = get_i32(buf)?;
    if count < 0 {
        return Err(CodecError::NegativeCount(count));
    }
    // Smallest item is a one-byte name prefix plus a u32.
    let mut items = Vec::with_capacity((count as usize).min(buf.remaining() / 5));
    for _ in 0..count {
        let name = get_string(buf)?;
        let count = get_u32(buf)?;
        items.push(Item { name, count });
    }
    Ok(items)
}

pub fn decode_payload(buf: &mut impl Buf, shape: PayloadShape) -> Result<Payload, CodecError> {
    let payload = match shape {
        PayloadShape::Empty => Payload::Empty,
        PayloadShape::Str => Payload::Str(get_string(buf)?),
        PayloadShape::U32 => Payload::U32(get_u32(buf)?),
        PayloadShape::I32 => Payload::I32(get_i32(buf)?),
        PayloadShape::Timestamp => Payload::Timestamp(get_u32(buf)?),
        PayloadShape::Bool => match get_u8(buf)? {
            BOOL_FALSE => Payload::Bool(false),
            BOOL_TRUE => Payload::Bool(true),
            other => return Err(CodecError::InvalidBool(other)),
        },
        PayloadShape::Coord => Payload::Coord {
            x: get_u16(buf)?,
            y: get_u16(buf)?,
        },
        PayloadShape::ItemsExchange => Payload::ItemsExchange {
            location: get_string(buf)?,
            from: get_items(buf)?,
            to: get_items(buf)?,
        },
        PayloadShape::ItemsReset => Payload::ItemsReset {
            location: get_string(buf)?,
            items: get_items(buf)?,
        },
        PayloadShape::AbTestAssignment => Payload::AbTestAssignment {
            test: get_string(buf)?,
            group: get_char(buf)?,
        },
    };
    Ok(payload)
}

fn shape_of(code: u16, custom: Option<&CustomEventTable>) -> Option<PayloadShape> {
    EventKind::from_code(code)
        .map(EventKind::shape)
        .or_else(|| custom.and_then(|table| table.shape_of(code)))
}

/// Decodes a concatenated record stream. Custom codes resolve through `custom`.
pub fn decode_records(
    mut data: &[u8],
    custom: Option<&CustomEventTable>,
) -> Result<Vec<EventRecord>, CodecError> {
    let mut records = Vec::new();
    while data.has_remaining() {
        let code = get_u16(&mut data)?;
        let shape = shape_of(code, custom).ok_or(CodecError::UnknownEventType(code))?;
        let payload = decode_payload(&mut data, shape)?;
        records.push(EventRecord { code, payload });
    }
    Ok(records)
}

/// Payload that replaces a batch whose events had to be discarded.
pub fn drop_marker(reason: DropReason) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    encode_record(
        &mut out,
        EventKind::BatchDropped.code(),
        &Payload::U32(reason.code()),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CustomEventDef, CustomEventType};

    fn encode_all(records: &[EventRecord]) -> Vec<u8> {
        let mut out = Vec::new();
        for record in records {
            encode_record(&mut out, record.code, &record.payload);
        }
        out
    }

    #[test]
    fn test_mixed_stream_decodes_in_order() {
        let records = vec![
            EventRecord::new(EventKind::AppLaunch, Payload::from("1.2.3")),
            EventRecord::new(EventKind::GenuinityCheck, Payload::Bool(false)),
            EventRecord::new(EventKind::RamSize, Payload::I32(-1)),
            EventRecord::new(EventKind::ScreenResolution, Payload::Coord { x: 1920, y: 1080 }),
            EventRecord::new(EventKind::LowMemWarning, Payload::Empty),
            EventRecord::new(EventKind::AppPause, Payload::Timestamp(1_700_000_000)),
            EventRecord::new(
                EventKind::ItemsExchange,
                Payload::ItemsExchange {
                    location: "shop".to_string(),
                    from: vec![Item::new("gold", 100)],
                    to: vec![Item::single("sword"), Item::new("potion", 3)],
                },
            ),
            EventRecord::new(
                EventKind::AbTestAssignment,
                Payload::AbTestAssignment {
                    test: "onboarding_v2".to_string(),
                    group: 'B',
                },
            ),
        ];

        let encoded = encode_all(&records);
        assert_eq!(decode_records(&encoded, None).unwrap(), records);
    }

    #[test]
    fn test_bool_encoding_never_uses_zero() {
        let mut out = Vec::new();
        encode_payload(&mut out, &Payload::Bool(false));
        encode_payload(&mut out, &Payload::Bool(true));
        assert_eq!(out, vec![1, 2]);

        let mut zeroed: &[u8] = &[0];
        assert!(matches!(
            decode_payload(&mut zeroed, PayloadShape::Bool),
            Err(CodecError::InvalidBool(0))
        ));
    }

    #[test]
    fn test_custom_codes_need_the_table() {
        let table = CustomEventTable::new(vec![CustomEventDef::new(
            "BossDefeated",
            CustomEventType::UnsignedInt,
        )]);
        let encoded = encode_all(&[EventRecord::new(2500u16, Payload::U32(7))]);

        assert!(matches!(
            decode_records(&encoded, None),
            Err(CodecError::UnknownEventType(2500))
        ));
        assert_eq!(
            decode_records(&encoded, Some(&table)).unwrap(),
            vec![EventRecord::new(2500u16, Payload::U32(7))]
        );
    }

    #[test]
    fn test_truncated_record_fails() {
        let mut encoded = encode_all(&[EventRecord::new(
            EventKind::ButtonClick,
            Payload::from("Play"),
        )]);
        encoded.pop();
        assert!(decode_records(&encoded, None).is_err());
    }

    #[test]
    fn test_drop_marker_layout() {
        assert_eq!(drop_marker(DropReason::TooManyUnsentEvents), vec![42, 0, 2, 0, 0, 0]);
    }
}

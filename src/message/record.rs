//! Decode exactly one record from the front of a buffer.
//!
//! Layout after the 4 byte [`Header`]:
//!
//! Kind     | Byte 0  | Byte 1                           | Byte 2..
//! FixedLen | command | value                            |
//! VarLen   | command | type (high nibble), len (low)    | `len` data bytes
//!
//! Variable length commands in the history range carry a whole
//! [history record](super::history) instead.

use tracing::trace;

use crate::error::DecodeError;
use crate::field::DecodedValue;
use crate::message::header::{Header, ValueKind};
use crate::message::history::{self, HISTORY_COMMANDS};
use crate::registry::Registry;

/// Header plus the two bytes every payload starts with
pub const MIN_RECORD_LEN: usize = Header::LEN + 2;

const COMMAND_POS: usize = 0;
const LENGTH_TYPE_POS: usize = 1;
const DATA_POS: usize = 2;

/// Decode the record at the start of `buffer`, which must begin at a signature match.
///
/// Returns the decoded values and the total length of the record including its header.
/// On `NeedMoreData`/`Truncated` nothing should be dropped from the buffer; on other
/// errors [`DecodeError::skip`] tells how far to skip, if known.
pub fn decode_one(registry: &Registry, buffer: &[u8]) -> Result<(Vec<DecodedValue>, usize), DecodeError> {
    let need_more = || DecodeError::NeedMoreData {
        available: buffer.len(),
        required: MIN_RECORD_LEN,
    };

    let [b0, b1, b2, b3, ..] = buffer else {
        return Err(need_more());
    };
    let header = Header::decode([*b0, *b1, *b2, *b3])?;
    if buffer.len() < MIN_RECORD_LEN {
        return Err(need_more());
    }

    let payload = &buffer[Header::LEN..];
    let (values, used) = match header.kind {
        ValueKind::FixedLen => decode_fixed_len(registry, &header, payload)?,
        ValueKind::VarLen => decode_var_len(registry, &header, payload)?,
    };
    Ok((values, Header::LEN + used))
}

fn decode_fixed_len(
    registry: &Registry,
    header: &Header,
    payload: &[u8],
) -> Result<(Vec<DecodedValue>, usize), DecodeError> {
    const USED: usize = 2;

    let data_type = payload[COMMAND_POS];
    let raw = &payload[1..USED];

    let field = registry
        .category(header.kind, header.category_id)
        .and_then(|table| table.field(data_type))
        .ok_or(DecodeError::UnknownCommand {
            category: header.category_id,
            command: data_type,
            consumed: Header::LEN + USED,
        })?;

    Ok((vec![field.decode(raw)], USED))
}

fn decode_var_len(
    registry: &Registry,
    header: &Header,
    payload: &[u8],
) -> Result<(Vec<DecodedValue>, usize), DecodeError> {
    let command = payload[COMMAND_POS];
    if HISTORY_COMMANDS.contains(&command) {
        return history::decode_history(command, payload);
    }

    let length_type = payload[LENGTH_TYPE_POS];
    let length = (length_type & 0x0f) as usize;
    trace!("command 0x{command:02x}, type 0x{:x}, {length} data bytes", length_type >> 4);

    let used = DATA_POS + length;
    if payload.len() < used {
        return Err(DecodeError::NeedMoreData {
            available: Header::LEN + payload.len(),
            required: Header::LEN + used,
        });
    }
    let data = &payload[DATA_POS..used];

    let field = registry
        .category(header.kind, header.category_id)
        .and_then(|table| table.field(command))
        .ok_or(DecodeError::UnknownCommand {
            category: header.category_id,
            command,
            consumed: Header::LEN + used,
        })?;

    Ok((vec![field.decode(data)], used))
}

#[cfg(test)]
use crate::registry::DeviceModel;

#[cfg(test)]
fn shunt() -> &'static Registry {
    Registry::for_model(DeviceModel::Smartshunt)
}

#[test]
fn test_decode_known_values() {
    let fixtures = [
        ("080319ed8c4446fcffff", "Current", "-0.954", "A", 10),
        ("080319ed8e42f3ff", "Power", "-13.0", "W", 8),
        ("080319ed7d42ffff", "Starter", "-0.01", "V", 8),
        ("080319ed8d422f05", "Voltage", "13.27", "V", 8),
    ];
    for (data, label, value, unit, length) in fixtures {
        let input = hex::decode(data).unwrap();
        let (values, consumed) = decode_one(shunt(), &input).unwrap();
        assert_eq!(values, vec![DecodedValue::new(label, unit, value)]);
        assert_eq!(consumed, length);
    }
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let input = hex::decode("080319ed8d422f05080319").unwrap();
    let (values, consumed) = decode_one(shunt(), &input).unwrap();
    assert_eq!(values[0].value, "13.27");
    assert_eq!(consumed, 8);
}

#[test]
fn test_decode_fixed_len() {
    let input = hex::decode("090319ed8d85").unwrap();
    let (values, consumed) = decode_one(shunt(), &input).unwrap();
    assert_eq!(values, vec![DecodedValue::new("Voltage", "V", "1.33")]);
    assert_eq!(consumed, 6);

    let input = hex::decode("0903190fff64").unwrap();
    let (values, _) = decode_one(shunt(), &input).unwrap();
    assert_eq!(values, vec![DecodedValue::new("Charge Status", "%", "1.0")]);
}

#[test]
fn test_decode_need_more_data() {
    for data in ["080319", "080319ed", "080319ed8c", "080319ed8c4446fcff"] {
        let input = hex::decode(data).unwrap();
        let result = decode_one(shunt(), &input);
        assert!(
            matches!(result, Err(DecodeError::NeedMoreData { .. })),
            "{data}: {result:?}"
        );
    }
}

#[test]
fn test_decode_unknown_command() {
    let input = hex::decode("080319ed4242aaaa").unwrap();
    assert_eq!(
        decode_one(shunt(), &input),
        Err(DecodeError::UnknownCommand { category: 0xED190308, command: 0x42, consumed: 8 })
    );

    // known command, unknown category
    let input = hex::decode("080319778d422f05").unwrap();
    assert_eq!(
        decode_one(shunt(), &input),
        Err(DecodeError::UnknownCommand { category: 0x77190308, command: 0x8d, consumed: 8 })
    );
}

#[test]
fn test_decode_unknown_fixed_len_command() {
    let input = hex::decode("09031900ee64").unwrap();
    assert_eq!(
        decode_one(shunt(), &input),
        Err(DecodeError::UnknownCommand { category: 0x00190309, command: 0xee, consumed: 6 })
    );

    // known category, unknown command
    let input = hex::decode("090319ed4285").unwrap();
    assert_eq!(
        decode_one(shunt(), &input),
        Err(DecodeError::UnknownCommand { category: 0xED190309, command: 0x42, consumed: 6 })
    );
}

#[test]
fn test_decode_unknown_kind() {
    let input = hex::decode("050319ed8d422f05").unwrap();
    assert_eq!(decode_one(shunt(), &input), Err(DecodeError::UnknownValueKind(0x05)));
}

#[test]
fn test_decode_history_record() {
    let mut input = hex::decode("080319ed").unwrap();
    input.extend(history::history_payload(0x50));
    let (values, consumed) = decode_one(shunt(), &input).unwrap();
    assert_eq!(consumed, 40);
    assert_eq!(values.len(), 5);
    assert_eq!(values[0], DecodedValue::new("Battery Voltage Max", "V", "14.5"));
}

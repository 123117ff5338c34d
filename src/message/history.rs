//! Daily history records.
//!
//! Commands in [`HISTORY_COMMANDS`] don't carry a single field. They carry one day of
//! solar charger history with a fixed layout and their own length byte, so they bypass
//! the field tables.

use std::ops::RangeInclusive;

use tracing::{debug, trace};

use crate::error::DecodeError;
use crate::field::{DecodedValue, FieldDescriptor as F, Group::History};
use crate::message::header::Header;

/// One command per day for the last 32 days, the lowest being today. `0x7D` above the
/// range is the starter voltage field, not history.
pub const HISTORY_COMMANDS: RangeInclusive<u8> = 0x50..=0x6F;

/// Position of the total record length in the payload
const LENGTH_POS: usize = 2;

const DAY_INDEX_POS: usize = 35;

/// The device's day index is offset by this from the command's day
const DAY_INDEX_OFFSET: i32 = 54;

/// (offset, width, field) within the payload. The payload is 36 bytes on all devices seen.
const SOLAR_HISTORY: &[(usize, usize, F)] = &[
    (12, 2, F::number(0x00, History, "Battery Voltage Max", "V", 100.0, true)),
    (14, 2, F::number(0x00, History, "Battery Voltage Min", "V", 100.0, true)),
    (21, 2, F::number(0x00, History, "Total Work", "kWh", 100.0, false)),
    (27, 1, F::number(0x00, History, "Solar Power Max", "W", 1.0, false)),
    (33, 2, F::number(0x00, History, "Solar Voltage Max", "V", 100.0, true)),
];

/// Decode a history record from its payload (everything after the header).
///
/// Returns the decoded fields and the number of payload bytes the record declares.
pub fn decode_history(command: u8, payload: &[u8]) -> Result<(Vec<DecodedValue>, usize), DecodeError> {
    let Some(&declared) = payload.get(LENGTH_POS) else {
        return Err(DecodeError::NeedMoreData {
            available: Header::LEN + payload.len(),
            required: Header::LEN + LENGTH_POS + 1,
        });
    };
    let declared = declared as usize;

    if payload.len() < declared {
        return Err(DecodeError::Truncated {
            declared: Header::LEN + declared,
            available: Header::LEN + payload.len(),
        });
    }
    let record = &payload[..declared];

    let mut values = Vec::with_capacity(SOLAR_HISTORY.len());
    for (offset, width, field) in SOLAR_HISTORY {
        match record.get(*offset..*offset + *width) {
            Some(raw) => values.push(field.decode(raw)),
            None => trace!("history record 0x{command:02x} too short for {}", field.label),
        }
    }

    if let Some(&day_index) = record.get(DAY_INDEX_POS) {
        let day = i32::from(day_index) - DAY_INDEX_OFFSET;
        let expected = i32::from(command) - i32::from(*HISTORY_COMMANDS.start());
        if day != expected {
            debug!("history record 0x{command:02x}: day index {day} doesn't match command day {expected}");
        }
    }

    Ok((values, declared))
}

#[cfg(test)]
pub(crate) fn history_payload(command: u8) -> Vec<u8> {
    let mut payload = vec![0u8; 36];
    payload[0] = command;
    payload[2] = 36;
    payload[12..14].copy_from_slice(&1450u16.to_le_bytes());
    payload[14..16].copy_from_slice(&1230u16.to_le_bytes());
    payload[21..23].copy_from_slice(&1234u16.to_le_bytes());
    payload[27] = 200;
    payload[33..35].copy_from_slice(&4567u16.to_le_bytes());
    payload[35] = 54 + (command - 0x50);
    payload
}

#[test]
fn test_decode_history() {
    let payload = history_payload(0x51);
    let (values, used) = decode_history(0x51, &payload).unwrap();
    assert_eq!(used, 36);
    assert_eq!(
        values,
        vec![
            DecodedValue::new("Battery Voltage Max", "V", "14.5"),
            DecodedValue::new("Battery Voltage Min", "V", "12.3"),
            DecodedValue::new("Total Work", "kWh", "12.34"),
            DecodedValue::new("Solar Power Max", "W", "200.0"),
            DecodedValue::new("Solar Voltage Max", "V", "45.67"),
        ]
    );
}

#[test]
fn test_truncated_history() {
    let payload = history_payload(0x50);
    assert_eq!(
        decode_history(0x50, &payload[..20]),
        Err(DecodeError::Truncated { declared: 40, available: 24 })
    );
    assert!(matches!(
        decode_history(0x50, &payload[..2]),
        Err(DecodeError::NeedMoreData { .. })
    ));
}

#[test]
fn test_short_declared_length_skips_fields() {
    let mut payload = history_payload(0x50);
    payload[2] = 16;
    let (values, used) = decode_history(0x50, &payload).unwrap();
    assert_eq!(used, 16);
    assert_eq!(values.len(), 2);
}

//! SmartShunt values published as individual GATT characteristics.
//!
//! Besides the record stream, the SmartShunt exposes a second vendor service with one
//! characteristic per live value. Each characteristic holds a single little-endian
//! integer, so the characteristic UUID takes the place of category and command.
//!
//! UUID                                 | Value           | Type | Scale | Unit | Not available
//! 6597eeff-4bda-4c1e-af4b-551c4cf74769 | Consumed Ah     | sn32 | 0.1   | Ah   |
//! 6597ed8e-4bda-4c1e-af4b-551c4cf74769 | Power           | sn16 | 1     | W    | 0x7FFF
//! 6597ed8d-4bda-4c1e-af4b-551c4cf74769 | Voltage         | sn16 | 0.01  | V    | 0x7FFF
//! 6597ed8c-4bda-4c1e-af4b-551c4cf74769 | Current         | sn32 | 0.001 | A    | 0x7FFFFFFF
//! 65970fff-4bda-4c1e-af4b-551c4cf74769 | State of charge | un16 | 0.01  | %    | 0xFFFF
//!
//! The device only keeps the values fresh while the keep-alive characteristic
//! (`6597ffff-…`, un16 seconds/1000) is written; `0xFFFF` means forever.

use bluest::Uuid;
use tracing::warn;

use crate::convert;
use crate::field::{DecodedValue, FieldDescriptor as F, Group::Latest};

pub const SERVICE_ID: Uuid = Uuid::from_u128(0x65970000_4bda_4c1e_af4b_551c4cf74769);
pub const KEEP_ALIVE_ID: Uuid = Uuid::from_u128(0x6597ffff_4bda_4c1e_af4b_551c4cf74769);
/// Keep-alive value that never expires
pub const KEEP_ALIVE_FOREVER: [u8; 2] = [0xff, 0xff];

const NOT_AVAILABLE: &str = "not available";

/// One value characteristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacteristicField {
    pub uuid: Uuid,
    pub field: F,
    /// Raw value the device sends while it has no reading
    pub unavailable: Option<u64>,
}

pub const SMARTSHUNT: &[CharacteristicField] = &[
    CharacteristicField {
        uuid: Uuid::from_u128(0x6597eeff_4bda_4c1e_af4b_551c4cf74769),
        field: F::number(0xFF, Latest, "Used Energy", "Ah", 10.0, true),
        unavailable: None,
    },
    CharacteristicField {
        uuid: Uuid::from_u128(0x6597ed8e_4bda_4c1e_af4b_551c4cf74769),
        field: F::number(0x8E, Latest, "Power", "W", 1.0, true),
        unavailable: Some(0x7FFF),
    },
    CharacteristicField {
        uuid: Uuid::from_u128(0x6597ed8d_4bda_4c1e_af4b_551c4cf74769),
        field: F::number(0x8D, Latest, "Voltage", "V", 100.0, true),
        unavailable: Some(0x7FFF),
    },
    CharacteristicField {
        uuid: Uuid::from_u128(0x6597ed8c_4bda_4c1e_af4b_551c4cf74769),
        field: F::number(0x8C, Latest, "Current", "A", 1000.0, true),
        unavailable: Some(0x7FFF_FFFF),
    },
    CharacteristicField {
        uuid: Uuid::from_u128(0x65970fff_4bda_4c1e_af4b_551c4cf74769),
        field: F::number(0xFF, Latest, "State Of Charge", "%", 100.0, false),
        unavailable: Some(0xFFFF),
    },
];

impl CharacteristicField {
    pub fn decode(&self, data: &[u8]) -> DecodedValue {
        let unavailable = self
            .unavailable
            .is_some_and(|sentinel| convert::read_le(data, false) == i128::from(sentinel));
        if unavailable {
            return DecodedValue::new(self.field.label, self.field.unit, NOT_AVAILABLE);
        }
        self.field.decode(data)
    }
}

pub fn find(uuid: Uuid) -> Option<&'static CharacteristicField> {
    SMARTSHUNT.iter().find(|characteristic| characteristic.uuid == uuid)
}

/// Decode the value of characteristic `uuid`. Unknown characteristics log a warning.
pub fn decode_characteristic(uuid: Uuid, data: &[u8]) -> Option<DecodedValue> {
    match find(uuid) {
        Some(characteristic) => Some(characteristic.decode(data)),
        None => {
            warn!("characteristic {uuid} not found in SmartShunt table");
            None
        }
    }
}

#[cfg(test)]
fn uuid(text: &str) -> Uuid {
    Uuid::parse_str(text).unwrap()
}

#[test]
fn test_decode_characteristics() {
    let voltage = uuid("6597ed8d-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(
        decode_characteristic(voltage, &hex::decode("2f05").unwrap()),
        Some(DecodedValue::new("Voltage", "V", "13.27"))
    );

    let current = uuid("6597ed8c-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(
        decode_characteristic(current, &hex::decode("46fcffff").unwrap()),
        Some(DecodedValue::new("Current", "A", "-0.954"))
    );

    let used = uuid("6597eeff-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(
        decode_characteristic(used, &(-1234i32).to_le_bytes()),
        Some(DecodedValue::new("Used Energy", "Ah", "-123.4"))
    );

    let soc = uuid("65970fff-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(
        decode_characteristic(soc, &9990u16.to_le_bytes()),
        Some(DecodedValue::new("State Of Charge", "%", "99.9"))
    );
}

#[test]
fn test_unavailable_values() {
    let power = uuid("6597ed8e-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(
        decode_characteristic(power, &[0xff, 0x7f]),
        Some(DecodedValue::new("Power", "W", "not available"))
    );
    assert_eq!(
        decode_characteristic(power, &[0xfe, 0x7f]).map(|value| value.value),
        Some("32766.0".to_owned())
    );

    let soc = uuid("65970fff-4bda-4c1e-af4b-551c4cf74769");
    assert_eq!(decode_characteristic(soc, &[0xff, 0xff]).unwrap().value, "not available");
}

#[test]
fn test_unknown_characteristic() {
    assert_eq!(decode_characteristic(KEEP_ALIVE_ID, &KEEP_ALIVE_FOREVER), None);
    assert!(find(SERVICE_ID).is_none());
    assert_eq!(SMARTSHUNT.len(), 5);
}

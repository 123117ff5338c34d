//! Turn raw field bytes into display strings.
//!
//! The binary converters take the little-endian bytes of a BLE record. The text helpers
//! at the bottom take the already-textual values of a VE.Direct block.

use crate::field::{ConverterKind, FieldDescriptor};

/// Beyond this magnitude, and below `EXPONENT_BELOW`, numbers print in exponent form
const EXPONENT_FROM: f64 = 1e16;
const EXPONENT_BELOW: f64 = 1e-4;

/// Raw value of a firmware version field when the device has no firmware image
const NO_VERSION: [u8; 3] = [0xff, 0xff, 0xff];

/// Alarm and warning reasons. The same bits are used for both, a warning is just a
/// warning while an alarm is the reason the device shut down.
pub const ALARM_REASONS: &[(u16, &str)] = &[
    (1, "Low Voltage"),
    (2, "High Voltage"),
    (4, "Low SOC"),
    (8, "Low Starter Voltage"),
    (16, "High Starter Voltage"),
    (32, "Low Temperature"),
    (64, "High Temperature"),
    (128, "Mid Voltage"),
    (256, "Overload"),
    (512, "DC-ripple"),
    (1024, "Low V AC out"),
    (2048, "High V AC out"),
    (4096, "Short Circuit"),
    (8192, "BMS Lockout"),
];

/// Apply the converter of `field` to `raw`. Never fails; data that doesn't fit the
/// converter still produces some text.
pub fn convert(field: &FieldDescriptor, raw: &[u8]) -> String {
    match field.converter {
        ConverterKind::Number => {
            let value = read_le(raw, field.signed);
            format_float(value as f64 / field.scale)
        }
        ConverterKind::Int => {
            let value = read_le(raw, field.signed);
            ((value as f64 / field.scale).trunc() as i128).to_string()
        }
        ConverterKind::Flags(labels) => {
            let value = read_le(raw, false);
            format_flags(u64::try_from(value).unwrap_or(u64::MAX), labels)
        }
        ConverterKind::Str => String::from_utf8_lossy(raw).into_owned(),
        ConverterKind::Firmware => format_version(raw, "NO FIRMWARE"),
        ConverterKind::UdfVersion => format_version(raw, "NO UDF"),
        ConverterKind::Identify => {
            if read_le(raw, false) == 0 {
                "normal operation (default)".to_owned()
            } else {
                "identification mode (blink/beep)".to_owned()
            }
        }
        ConverterKind::Raw => format!("0x{}", hex::encode(raw)),
    }
}

/// Read up to 16 little-endian bytes as an integer. An empty slice reads as 0.
pub fn read_le(raw: &[u8], signed: bool) -> i128 {
    let raw = &raw[..raw.len().min(16)];
    let negative = signed && raw.last().is_some_and(|byte| byte & 0x80 != 0);
    let mut bytes = [if negative { 0xff } else { 0x00 }; 16];
    bytes[..raw.len()].copy_from_slice(raw);
    i128::from_le_bytes(bytes)
}

/// Shortest text that reads back as `value`. Whole numbers keep one decimal, so
/// `-13` prints as `-13.0`. Magnitudes from `1e16` up and below `1e-4` use exponent
/// form with a signed two digit exponent (`1e+16`, `2.5e-05`).
pub fn format_float(value: f64) -> String {
    let magnitude = value.abs();
    if value.is_finite() && value != 0.0 && !(EXPONENT_BELOW..EXPONENT_FROM).contains(&magnitude) {
        let text = format!("{value:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) => match exponent.strip_prefix('-') {
                Some(digits) => format!("{mantissa}e-{digits:0>2}"),
                None => format!("{mantissa}e+{exponent:0>2}"),
            },
            None => text,
        };
    }

    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// `"{value}: {label}|{label}..."` with the labels of all set bits, highest bit first.
/// Set bits without a label, including any above the 14 alarm bits, print as hex.
pub fn format_flags(value: u64, labels: &[(u16, &str)]) -> String {
    let mut matched = Vec::new();
    for bit in (0..u64::BITS).rev() {
        let flag = 1u64 << bit;
        if value & flag == 0 {
            continue;
        }
        match labels.iter().find(|(mask, _)| u64::from(*mask) == flag) {
            Some((_, label)) => matched.push((*label).to_owned()),
            None => matched.push(format!("0x{flag:x}")),
        }
    }

    if matched.is_empty() {
        format!("{value}: None")
    } else {
        format!("{value}: {}", matched.join("|"))
    }
}

/// Three version bytes, least significant first
fn format_version(raw: &[u8], missing: &str) -> String {
    let mut bytes = [0u8; 3];
    let len = raw.len().min(3);
    bytes[..len].copy_from_slice(&raw[..len]);

    if bytes == NO_VERSION {
        return missing.to_owned();
    }

    let [minor, major, high] = bytes;
    if high != 0 {
        format!("v{high}{major:02}.{minor:02}")
    } else {
        format!("v{major}.{minor:02}")
    }
}

/// VE.Direct integer text multiplied by `factor`. Whole factors give whole numbers, the
/// rest two decimals.
pub fn format_scaled_text(text: &str, factor: f64) -> Option<String> {
    let value: i64 = text.trim().parse().ok()?;
    if factor.fract() == 0.0 {
        Some((value * factor as i64).to_string())
    } else {
        Some(format!("{:.2}", value as f64 * factor))
    }
}

/// `"{value}: {label}"`. Accepts decimal or `0x` hex text.
pub fn format_mapped(text: &str, table: &[(u32, &str)]) -> String {
    let key = parse_number(text);
    let label = key
        .and_then(|key| table.iter().find(|(k, _)| *k == key))
        .map(|(_, label)| *label)
        .unwrap_or("unknown");
    format!("{text}: {label}")
}

/// VE.Direct firmware text. `"0407"` is `4.07`, `"156"` is `15.6`.
pub fn format_firmware_text(text: &str) -> String {
    let digit = |i: usize| text.get(i..i + 1).unwrap_or("");
    let rest = text.get(2..).unwrap_or("");
    if text.starts_with('0') {
        format!("{}.{rest}", digit(1))
    } else {
        format!("{}{}.{rest}", digit(0), digit(1))
    }
}

/// VE.Direct production date text, `"..YYWW"`
pub fn format_production_date(text: &str) -> String {
    let year = text.get(2..4).unwrap_or("");
    let week = text.get(4..6).unwrap_or("");
    format!("year: 20{year}, week: {week}")
}

/// Decimal or `0x` prefixed hex
pub fn parse_number(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
fn field(scale: f64, signed: bool, converter: ConverterKind) -> FieldDescriptor {
    FieldDescriptor::new(0x00, crate::field::Group::Latest, "test", "", scale, signed, converter)
}

#[test]
fn test_number_scaling() {
    let current = field(1000.0, true, ConverterKind::Number);
    assert_eq!(convert(&current, &hex::decode("46fcffff").unwrap()), "-0.954");

    let voltage = field(100.0, false, ConverterKind::Number);
    assert_eq!(convert(&voltage, &hex::decode("2f05").unwrap()), "13.27");

    let power = field(1.0, true, ConverterKind::Number);
    assert_eq!(convert(&power, &hex::decode("f3ff").unwrap()), "-13.0");
}

#[test]
fn test_number_signedness() {
    let unsigned = field(1.0, false, ConverterKind::Number);
    assert_eq!(convert(&unsigned, &[0xff, 0xff]), "65535.0");

    let signed = field(1.0, true, ConverterKind::Number);
    assert_eq!(convert(&signed, &[0xff, 0xff]), "-1.0");
    assert_eq!(convert(&signed, &[]), "0.0");
}

#[test]
fn test_int_truncates_toward_zero() {
    let int = field(10.0, true, ConverterKind::Int);
    assert_eq!(convert(&int, &(-129i16).to_le_bytes()), "-12");
    assert_eq!(convert(&int, &129i16.to_le_bytes()), "12");

    let seconds = field(1.0, true, ConverterKind::Int);
    assert_eq!(convert(&seconds, &hex::decode("c5320000").unwrap()), "12997");
}

#[test]
fn test_flags() {
    let labels: &[(u16, &str)] = &[(1, "Low Voltage"), (4, "Low SOC")];
    assert_eq!(format_flags(0, labels), "0: None");
    assert_eq!(format_flags(5, labels), "5: Low SOC|Low Voltage");
    assert_eq!(format_flags(2, labels), "2: 0x2");
    assert_eq!(format_flags(8192 + 1, ALARM_REASONS), "8193: BMS Lockout|Low Voltage");
}

#[test]
fn test_flags_above_alarm_bits() {
    assert_eq!(format_flags(16384, ALARM_REASONS), "16384: 0x4000");
    assert_eq!(format_flags(16384 + 2, ALARM_REASONS), "16386: 0x4000|High Voltage");
}

#[test]
fn test_float_exponent_form() {
    assert_eq!(format_float(1e16), "1e+16");
    assert_eq!(format_float(-1.5e16), "-1.5e+16");
    assert_eq!(format_float(1.5e300), "1.5e+300");
    assert_eq!(format_float(123456789012345.0), "123456789012345.0");
    assert_eq!(format_float(0.0001), "0.0001");
    assert_eq!(format_float(0.00001), "1e-05");
    assert_eq!(format_float(0.0), "0.0");

    let wide = field(1.0, false, ConverterKind::Number);
    assert_eq!(convert(&wide, &[0x00, 0x00, 0xc1, 0x6f, 0xf2, 0x86, 0x23, 0x00]), "1e+16");
}

#[test]
fn test_flags_from_bytes() {
    let alarm = field(1.0, false, ConverterKind::Flags(ALARM_REASONS));
    assert_eq!(convert(&alarm, &[0x06, 0x00]), "6: Low SOC|High Voltage");
}

#[test]
fn test_firmware() {
    let firmware = field(1.0, false, ConverterKind::Firmware);
    assert_eq!(convert(&firmware, &[0xff, 0xff, 0xff]), "NO FIRMWARE");
    assert_eq!(convert(&firmware, &[0x07, 0x04, 0x00]), "v4.07");
    assert_eq!(convert(&firmware, &[16, 4, 1]), "v104.16");
    assert_eq!(convert(&firmware, &[5, 12, 0]), "v12.05");

    let udf = field(1.0, false, ConverterKind::UdfVersion);
    assert_eq!(convert(&udf, &[0xff, 0xff, 0xff]), "NO UDF");
}

#[test]
fn test_identify_string_raw() {
    let identify = field(1.0, false, ConverterKind::Identify);
    assert_eq!(convert(&identify, &[0x00]), "normal operation (default)");
    assert_eq!(convert(&identify, &[0x01]), "identification mode (blink/beep)");

    let serial = field(1.0, false, ConverterKind::Str);
    assert_eq!(convert(&serial, b"HQ2027LDKCU"), "HQ2027LDKCU");

    let raw = field(1.0, false, ConverterKind::Raw);
    assert_eq!(convert(&raw, &[0xa3, 0x89]), "0xa389");
}

#[test]
fn test_text_helpers() {
    assert_eq!(format_scaled_text("13259", 0.001).as_deref(), Some("13.26"));
    assert_eq!(format_scaled_text("-103", 1.0).as_deref(), Some("-103"));
    assert_eq!(format_scaled_text("OFF", 1.0), None);

    assert_eq!(format_firmware_text("0407"), "4.07");
    assert_eq!(format_firmware_text("156"), "15.6");

    assert_eq!(format_production_date("HQ2027"), "year: 2020, week: 27");

    let table: &[(u32, &str)] = &[(3, "Bulk"), (0xA389, "SmartShunt 500A/50mV")];
    assert_eq!(format_mapped("3", table), "3: Bulk");
    assert_eq!(format_mapped("0xA389", table), "0xA389: SmartShunt 500A/50mV");
    assert_eq!(format_mapped("7", table), "7: unknown");
}

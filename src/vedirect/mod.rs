//! VE.Direct text protocol, as spoken on the serial port of most Victron devices.
//!
//! Once a second the device sends a block of `\r\n<label>\t<value>` fields. The last
//! field of a block is `Checksum`, whose single value byte makes the sum of all bytes of
//! the block zero modulo 256. Hex protocol frames (`:` up to `\n`) may be interleaved
//! between blocks and are skipped.
//!
//! Unlike the BLE stream there is no framing ambiguity, so this is a plain byte state
//! machine.

mod tables;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::convert;
use crate::field::{DecodedValue, Group};
use crate::reassembler::Sink;

const RECEIVE_BUFFER_SIZE: usize = 1024;

const CHECKSUM_LABEL: &[u8] = b"Checksum";

/// Device families with a known VE.Direct field table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VeDirectModel {
    Smartshunt,
    Smartsolar,
    Phoenix,
}

impl VeDirectModel {
    pub fn fields(self) -> &'static [TextField] {
        match self {
            Self::Smartshunt => tables::SMARTSHUNT,
            Self::Smartsolar => tables::SMARTSOLAR,
            Self::Phoenix => tables::PHOENIX,
        }
    }

    pub fn field(self, key: &str) -> Option<&'static TextField> {
        self.fields().iter().find(|field| field.key == key)
    }
}

/// How the text value of a field is rendered
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextConverter {
    /// Integer text multiplied by the factor
    Scaled(f64),
    Str,
    /// Alarm/warning reason bits
    Flags,
    /// Number (decimal or `0x` hex) looked up in the table
    Map(&'static [(u32, &'static str)]),
    /// `"0407"` style version
    Firmware,
    /// Serial-number style production date
    ProductionDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextField {
    /// Label as sent by the device
    pub key: &'static str,
    pub group: Group,
    pub label: &'static str,
    pub unit: &'static str,
    pub converter: TextConverter,
}

impl TextField {
    pub const fn new(
        key: &'static str,
        group: Group,
        label: &'static str,
        unit: &'static str,
        converter: TextConverter,
    ) -> Self {
        Self { key, group, label, unit, converter }
    }

    /// Render `text`. Values that don't parse as the converter expects are passed
    /// through unchanged.
    pub fn decode(&self, text: &str) -> DecodedValue {
        let rendered = match self.converter {
            TextConverter::Scaled(factor) => convert::format_scaled_text(text, factor),
            TextConverter::Str => Some(text.to_owned()),
            TextConverter::Flags => convert::parse_number(text)
                .map(|value| convert::format_flags(value.into(), convert::ALARM_REASONS)),
            TextConverter::Map(table) => Some(convert::format_mapped(text, table)),
            TextConverter::Firmware => Some(convert::format_firmware_text(text)),
            TextConverter::ProductionDate => Some(convert::format_production_date(text)),
        };

        let value = rendered.unwrap_or_else(|| {
            debug!("{}: can't convert {text:?} with {:?}", self.key, self.converter);
            text.to_owned()
        });
        DecodedValue::new(self.label, self.unit, value)
    }
}

/// The fields of one checksum-verified block, in the order they were sent. The checksum
/// field itself is not included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    fields: Vec<(String, String)>,
}

impl Block {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitHeader,
    Key,
    Value,
    Checksum,
    Hex,
}

/// Splits a VE.Direct byte stream into [`Block`]s. Bytes may arrive in any chunking.
#[derive(Debug)]
pub struct BlockReader {
    state: State,
    key: Vec<u8>,
    value: Vec<u8>,
    fields: Vec<(String, String)>,
    checksum: u8,
}

impl Default for BlockReader {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockReader {
    /// Labels and values are at most 9 and 33 characters. Anything much longer means we
    /// are reading garbage.
    pub const MAX_FIELD_LEN: usize = 64;

    pub fn new() -> Self {
        Self {
            state: State::WaitHeader,
            key: Vec::new(),
            value: Vec::new(),
            fields: Vec::new(),
            checksum: 0,
        }
    }

    /// Consume `bytes`, returning every block completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Block> {
        bytes.iter().filter_map(|byte| self.push(*byte)).collect()
    }

    fn push(&mut self, byte: u8) -> Option<Block> {
        if byte == b':' && !matches!(self.state, State::Checksum | State::Hex) {
            trace!("hex frame, dropping {} pending fields", self.fields.len());
            self.reset();
            self.state = State::Hex;
            return None;
        }

        match self.state {
            State::WaitHeader => {
                self.checksum = self.checksum.wrapping_add(byte);
                if byte == b'\n' {
                    self.state = State::Key;
                }
            }
            State::Key => {
                self.checksum = self.checksum.wrapping_add(byte);
                if byte == b'\t' {
                    self.state = if self.key == CHECKSUM_LABEL {
                        State::Checksum
                    } else {
                        State::Value
                    };
                } else {
                    self.key.push(byte);
                    self.check_length();
                }
            }
            State::Value => {
                self.checksum = self.checksum.wrapping_add(byte);
                if byte == b'\r' {
                    let key = String::from_utf8_lossy(&self.key).into_owned();
                    let value = String::from_utf8_lossy(&self.value).into_owned();
                    self.fields.push((key, value));
                    self.key.clear();
                    self.value.clear();
                    self.state = State::WaitHeader;
                } else {
                    self.value.push(byte);
                    self.check_length();
                }
            }
            State::Checksum => {
                let valid = self.checksum.wrapping_add(byte) == 0;
                let fields = std::mem::take(&mut self.fields);
                self.reset();
                if !valid {
                    warn!("dropping VE.Direct block with {} fields: checksum mismatch", fields.len());
                    return None;
                }
                if !fields.is_empty() {
                    return Some(Block { fields });
                }
            }
            State::Hex => {
                if byte == b'\n' {
                    self.state = State::WaitHeader;
                }
            }
        }
        None
    }

    fn check_length(&mut self) {
        if self.key.len() > Self::MAX_FIELD_LEN || self.value.len() > Self::MAX_FIELD_LEN {
            warn!("VE.Direct field too long, resynchronizing");
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.state = State::WaitHeader;
        self.key.clear();
        self.value.clear();
        self.fields.clear();
        self.checksum = 0;
    }
}

/// Decode every field of `block` known to `model`. Unknown labels are skipped.
pub fn decode_block(model: VeDirectModel, block: &Block) -> Vec<DecodedValue> {
    block
        .iter()
        .filter_map(|(key, value)| match model.field(key) {
            Some(field) => Some(field.decode(value)),
            None => {
                warn!("{key} not found in {model:?} field table");
                None
            }
        })
        .collect()
}

/// Read `reader` until EOF, passing every decoded value to `sink`.
///
/// Returns the number of values emitted.
pub async fn read_blocks<R, S>(
    mut reader: R,
    model: VeDirectModel,
    device_id: &str,
    sink: &mut S,
) -> anyhow::Result<usize>
where
    R: AsyncRead + Unpin,
    S: Sink + ?Sized,
{
    let mut block_reader = BlockReader::new();
    let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
    let mut emitted = 0;

    loop {
        let num_bytes_read = reader.read(&mut buffer).await?;
        if num_bytes_read == 0 {
            debug!("{device_id}: end of VE.Direct stream");
            return Ok(emitted);
        }

        for block in block_reader.feed(&buffer[..num_bytes_read]) {
            for value in decode_block(model, &block) {
                debug!("{device_id}: collected {} -> {}{}", value.label, value.value, value.unit);
                sink.emit(device_id, value);
                emitted += 1;
            }
        }
    }
}

#[cfg(test)]
fn frame(fields: &[(&str, &str)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (key, value) in fields {
        bytes.extend_from_slice(format!("\r\n{key}\t{value}").as_bytes());
    }
    bytes.extend_from_slice(b"\r\nChecksum\t");
    let sum = bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    bytes.push(0u8.wrapping_sub(sum));
    bytes
}

#[cfg(test)]
const SHUNT_BLOCK: &[(&str, &str)] = &[
    ("PID", "0xA389"),
    ("V", "13259"),
    ("I", "-7742"),
    ("P", "-103"),
    ("SOC", "990"),
    ("Alarm", "OFF"),
    ("AR", "0"),
    ("FW", "0407"),
];

#[test]
fn test_read_block() {
    let mut reader = BlockReader::new();
    let blocks = reader.feed(&frame(SHUNT_BLOCK));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].len(), SHUNT_BLOCK.len());
    assert_eq!(blocks[0].get("V"), Some("13259"));
    assert_eq!(blocks[0].get("Checksum"), None);
}

#[test]
fn test_read_block_byte_by_byte() {
    let mut stream = frame(SHUNT_BLOCK);
    stream.extend(frame(&[("V", "13260")]));

    let mut reader = BlockReader::new();
    let mut blocks = Vec::new();
    for byte in &stream {
        blocks.extend(reader.feed(std::slice::from_ref(byte)));
    }
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[1].get("V"), Some("13260"));
}

#[test]
fn test_bad_checksum_is_dropped() {
    let mut corrupted = frame(SHUNT_BLOCK);
    corrupted[5] ^= 0x01;
    let mut stream = corrupted;
    stream.extend(frame(&[("V", "13260")]));

    let blocks = BlockReader::new().feed(&stream);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].get("V"), Some("13260"));
}

#[test]
fn test_hex_frames_are_skipped() {
    let mut stream = frame(SHUNT_BLOCK);
    stream.extend_from_slice(b":A0102000543\n");
    stream.extend(frame(&[("V", "13260")]));

    let blocks = BlockReader::new().feed(&stream);
    assert_eq!(blocks.len(), 2);
}

#[test]
fn test_overlong_field_resynchronizes() {
    let mut stream = b"\r\nV\t".to_vec();
    stream.extend(std::iter::repeat(b'1').take(BlockReader::MAX_FIELD_LEN + 10));
    stream.extend(frame(SHUNT_BLOCK));
    stream.extend(frame(&[("V", "13260")]));

    let blocks = BlockReader::new().feed(&stream);
    assert_eq!(blocks.last().and_then(|block| block.get("V")), Some("13260"));
}

#[test]
fn test_decode_smartshunt_block() {
    let block = BlockReader::new().feed(&frame(SHUNT_BLOCK)).remove(0);
    let values = decode_block(VeDirectModel::Smartshunt, &block);
    assert_eq!(
        values,
        vec![
            DecodedValue::new("Product ID", "", "0xA389: SmartShunt 500A/50mV"),
            DecodedValue::new("Voltage", "V", "13.26"),
            DecodedValue::new("Current", "A", "-7.74"),
            DecodedValue::new("Power", "W", "-103"),
            DecodedValue::new("State Of Charge", "%", "99.00"),
            DecodedValue::new("Alarm", "", "OFF"),
            DecodedValue::new("Alarm Reason", "", "0: None"),
            DecodedValue::new("Firmware Version", "", "4.07"),
        ]
    );
}

#[test]
fn test_decode_smartsolar_block() {
    let fields = [
        ("CS", "3"),
        ("OR", "0x00000000"),
        ("ERR", "0"),
        ("PROD", "HQ2027"),
        ("XYZ", "1"),
    ];
    let block = BlockReader::new().feed(&frame(&fields)).remove(0);
    let values = decode_block(VeDirectModel::Smartsolar, &block);
    assert_eq!(
        values,
        vec![
            DecodedValue::new("Status", "", "3: Bulk"),
            DecodedValue::new("Off Reason", "", "0x00000000: None"),
            DecodedValue::new("Error Code", "", "0: No error"),
            DecodedValue::new("Production Date", "", "year: 2020, week: 27"),
        ]
    );
}

#[test]
fn test_decode_phoenix_flags() {
    let field = VeDirectModel::Phoenix.field("WARN").unwrap();
    assert_eq!(field.decode("5").value, "5: Low SOC|Low Voltage");
    assert_eq!(field.decode("garbage").value, "garbage");

    let field = VeDirectModel::Phoenix.field("AC_OUT_V").unwrap();
    assert_eq!(field.decode("23004").value, "230.04");
}

#[tokio::test]
async fn test_read_blocks() {
    let mut stream = b"\r\nV\t132".to_vec();
    stream.extend(frame(SHUNT_BLOCK));
    stream.extend(frame(&[("V", "13260")]));

    let mut values = Vec::new();
    let emitted = read_blocks(stream.as_slice(), VeDirectModel::Smartshunt, "serial", &mut values)
        .await
        .unwrap();
    assert_eq!(emitted, values.len());
    assert_eq!(values.last(), Some(&DecodedValue::new("Voltage", "V", "13.26")));
}

//! Turn arbitrarily chunked notification payloads into decoded values.
//!
//! BLE stacks split and merge notifications as they please, so record boundaries don't
//! line up with chunk boundaries. The reassembler keeps whatever can't be decoded yet
//! and picks up where it left off on the next chunk.

use tracing::{debug, trace};

use crate::error::{DecodeError, RegistryError};
use crate::field::DecodedValue;
use crate::message::record;
use crate::message::signature::{self, SIGNATURE_LEN};
use crate::registry::Registry;

/// Receives everything a reassembler produces
pub trait Sink {
    /// A decoded value, in stream order
    fn emit(&mut self, device_id: &str, value: DecodedValue);

    /// Data that was skipped or couldn't be decoded. Purely informational.
    fn report(&mut self, device_id: &str, error: &DecodeError, context: &[u8]) {
        debug!("UNRECOGNIZED DATA: {device_id}: {error}: {}", hex::encode(context));
    }
}

impl Sink for Vec<DecodedValue> {
    fn emit(&mut self, _device_id: &str, value: DecodedValue) {
        self.push(value);
    }
}

/// Reassembly state of one device connection. Drop it (or [`clear`](Self::clear) it)
/// when the connection goes away.
#[derive(Debug)]
pub struct Reassembler {
    device_id: String,
    registry: &'static Registry,
    buffer: Vec<u8>,
}

impl Reassembler {
    /// Once this many bytes are buffered without a signature, the bytes that can't start
    /// a record any more are dropped.
    pub const MAX_PENDING: usize = 4096;

    /// Create a reassembler decoding with the tables of `registry`. Fails if the tables
    /// are inconsistent.
    pub fn new(device_id: impl Into<String>, registry: &'static Registry) -> Result<Self, RegistryError> {
        registry.validate()?;
        Ok(Self {
            device_id: device_id.into(),
            registry,
            buffer: Vec::new(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn registry(&self) -> &'static Registry {
        self.registry
    }

    /// Bytes received but not decoded yet
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append `chunk` and decode as many records as possible.
    ///
    /// Returns the number of values passed to `sink.emit`.
    pub fn feed<S: Sink + ?Sized>(&mut self, chunk: &[u8], sink: &mut S) -> usize {
        self.buffer.extend_from_slice(chunk);
        let mut emitted = 0;

        while !self.buffer.is_empty() {
            let Some(start) = signature::find_start(&self.buffer) else {
                self.drop_dead_prefix(sink);
                break;
            };

            if start > 0 {
                let error = DecodeError::UnrecognizedSpan { len: start };
                sink.report(&self.device_id, &error, &self.buffer[..start]);
                self.buffer.drain(..start);
            }

            match record::decode_one(self.registry, &self.buffer) {
                Ok((values, consumed)) => {
                    for value in values {
                        debug!("{}: collected {} -> {}{}", self.device_id, value.label, value.value, value.unit);
                        sink.emit(&self.device_id, value);
                        emitted += 1;
                    }
                    self.buffer.drain(..consumed.min(self.buffer.len()));
                }
                Err(error) if error.is_incomplete() => {
                    trace!("{}: {error}, waiting for more data", self.device_id);
                    break;
                }
                Err(error) => {
                    // without a known record length, skip just the matched start byte
                    let skip = error.skip().unwrap_or(1).clamp(1, self.buffer.len());
                    sink.report(&self.device_id, &error, &self.buffer[..skip]);
                    self.buffer.drain(..skip);
                }
            }
        }

        emitted
    }

    /// Without a signature, only the last `SIGNATURE_LEN - 1` bytes can still become the
    /// start of a record.
    fn drop_dead_prefix<S: Sink + ?Sized>(&mut self, sink: &mut S) {
        if self.buffer.len() <= Self::MAX_PENDING {
            return;
        }
        let dead = self.buffer.len() - (SIGNATURE_LEN - 1);
        let error = DecodeError::UnrecognizedSpan { len: dead };
        sink.report(&self.device_id, &error, &self.buffer[..dead]);
        self.buffer.drain(..dead);
    }
}

#[cfg(test)]
use crate::registry::DeviceModel;

#[cfg(test)]
#[derive(Debug, Default)]
struct Recorder {
    values: Vec<DecodedValue>,
    reports: Vec<(DecodeError, Vec<u8>)>,
}

#[cfg(test)]
impl Sink for Recorder {
    fn emit(&mut self, device_id: &str, value: DecodedValue) {
        assert_eq!(device_id, "shunt");
        self.values.push(value);
    }

    fn report(&mut self, _device_id: &str, error: &DecodeError, context: &[u8]) {
        self.reports.push((error.clone(), context.to_vec()));
    }
}

#[cfg(test)]
fn shunt() -> Reassembler {
    Reassembler::new("shunt", Registry::for_model(DeviceModel::Smartshunt)).unwrap()
}

/// Current, power, starter and voltage records back to back
#[cfg(test)]
const LATEST_STREAM: &str = "080319ed8c4446fcffff080319ed8e42f3ff080319ed7d42ffff080319ed8d422f05";

#[cfg(test)]
fn latest_values() -> Vec<DecodedValue> {
    vec![
        DecodedValue::new("Current", "A", "-0.954"),
        DecodedValue::new("Power", "W", "-13.0"),
        DecodedValue::new("Starter", "V", "-0.01"),
        DecodedValue::new("Voltage", "V", "13.27"),
    ]
}

#[test]
fn test_feed_bulk() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    let emitted = reassembler.feed(&hex::decode(LATEST_STREAM).unwrap(), &mut sink);
    assert_eq!(emitted, 4);
    assert_eq!(sink.values, latest_values());
    assert!(sink.reports.is_empty());
    assert!(reassembler.pending().is_empty());
}

#[test]
fn test_feed_keeps_partial_record() {
    let mut reassembler = shunt();
    let mut values = Vec::new();
    let fixture = hex::decode("080319030844c5320000080319ed8f42f7ff0803").unwrap();
    reassembler.feed(&fixture, &mut values);
    assert_eq!(
        values,
        vec![
            DecodedValue::new("Time Since Last Full", "sec", "12997"),
            DecodedValue::new("SmartSolar Battery Current", "A", "-0.9"),
        ]
    );
    assert_eq!(reassembler.pending(), &[0x08, 0x03]);

    reassembler.feed(&hex::decode("19ed8d422f05").unwrap(), &mut values);
    assert_eq!(values[2], DecodedValue::new("Voltage", "V", "13.27"));
    assert!(reassembler.pending().is_empty());
}

#[test]
fn test_fragmentation_does_not_change_output() {
    let mut stream = hex::decode(LATEST_STREAM).unwrap();
    stream.extend(hex::decode("080319ed").unwrap());
    stream.extend(crate::message::history::history_payload(0x52));
    stream.extend(hex::decode("0903190fff64").unwrap());

    let mut whole = Recorder::default();
    shunt().feed(&stream, &mut whole);
    assert_eq!(whole.values.len(), 4 + 5 + 1);

    for split in 0..=stream.len() {
        let mut reassembler = shunt();
        let mut sink = Recorder::default();
        reassembler.feed(&stream[..split], &mut sink);
        reassembler.feed(&stream[split..], &mut sink);
        assert_eq!(sink.values, whole.values, "split at {split}");
        assert!(reassembler.pending().is_empty());
    }

    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    for byte in &stream {
        reassembler.feed(std::slice::from_ref(byte), &mut sink);
    }
    assert_eq!(sink.values, whole.values);
}

#[test]
fn test_unknown_fixed_len_command_skips_record() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    reassembler.feed(&hex::decode("09031900ee64080319ed8d422f05").unwrap(), &mut sink);
    assert_eq!(sink.values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
    assert_eq!(
        sink.reports,
        vec![(
            DecodeError::UnknownCommand { category: 0x00190309, command: 0xee, consumed: 6 },
            hex::decode("09031900ee64").unwrap(),
        )]
    );
    assert!(reassembler.pending().is_empty());
}

#[test]
fn test_garbage_before_record() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    reassembler.feed(&hex::decode("deadbeef080319ed8d422f05").unwrap(), &mut sink);
    assert_eq!(sink.values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
    assert_eq!(
        sink.reports,
        vec![(DecodeError::UnrecognizedSpan { len: 4 }, hex::decode("deadbeef").unwrap())]
    );
    assert!(reassembler.pending().is_empty());
}

#[test]
fn test_unknown_command_does_not_poison_stream() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    reassembler.feed(&hex::decode("080319ed4242aaaa080319ed8d422f05").unwrap(), &mut sink);
    assert_eq!(sink.values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
    assert_eq!(sink.reports.len(), 1);
    assert_eq!(
        sink.reports[0].0,
        DecodeError::UnknownCommand { category: 0xED190308, command: 0x42, consumed: 8 }
    );
    assert_eq!(sink.reports[0].1, hex::decode("080319ed4242aaaa").unwrap());
}

#[test]
fn test_unknown_kind_resynchronizes() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    reassembler.feed(&hex::decode("050319ed8d422f05").unwrap(), &mut sink);
    assert!(sink.values.is_empty());
    assert_eq!(reassembler.pending().len(), 7);

    reassembler.feed(&hex::decode("080319ed8d422f05").unwrap(), &mut sink);
    assert_eq!(sink.values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
    let errors: Vec<_> = sink.reports.iter().map(|(error, _)| error.clone()).collect();
    assert_eq!(
        errors,
        vec![DecodeError::UnknownValueKind(0x05), DecodeError::UnrecognizedSpan { len: 7 }]
    );
    assert!(reassembler.pending().is_empty());
}

#[test]
fn test_every_byte_is_accounted_for() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    let input = hex::decode("0102030405080319ed8c4446fcffffaabb080319ed8e42f3ff").unwrap();
    reassembler.feed(&input, &mut sink);
    assert_eq!(sink.values.len(), 2);

    let skipped: usize = sink.reports.iter().map(|(_, context)| context.len()).sum();
    assert_eq!(skipped + 10 + 8, input.len());
}

#[test]
fn test_pending_is_bounded() {
    let mut reassembler = shunt();
    let mut sink = Recorder::default();
    reassembler.feed(&vec![0xaa; Reassembler::MAX_PENDING], &mut sink);
    assert_eq!(reassembler.pending().len(), Reassembler::MAX_PENDING);
    assert!(sink.reports.is_empty());

    reassembler.feed(&[0xaa, 0x08, 0x03], &mut sink);
    assert_eq!(reassembler.pending(), &[0x08, 0x03]);
    assert_eq!(
        sink.reports[0].0,
        DecodeError::UnrecognizedSpan { len: Reassembler::MAX_PENDING + 1 }
    );

    reassembler.feed(&hex::decode("19ed8d422f05").unwrap(), &mut sink);
    assert_eq!(sink.values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
}

#[test]
fn test_clear() {
    let mut reassembler = shunt();
    let mut values = Vec::new();
    reassembler.feed(&hex::decode("080319ed8c44").unwrap(), &mut values);
    assert_eq!(reassembler.pending().len(), 6);
    reassembler.clear();
    assert!(reassembler.pending().is_empty());
}

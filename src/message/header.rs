use crate::error::DecodeError;

/// How the payload after the header is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Command byte and a single value byte
    FixedLen,
    /// Command byte, a length/type byte and up to 15 data bytes
    VarLen,
}

impl ValueKind {
    const FIXED_LEN_TAG: u8 = 0x09;
    const VAR_LEN_TAG: u8 = 0x08;

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::FIXED_LEN_TAG => Some(Self::FixedLen),
            Self::VAR_LEN_TAG => Some(Self::VarLen),
            _ => None,
        }
    }
}

/// The 4 bytes in front of every record.
///
/// The category id is the little-endian read of all 4 bytes, so the kind tag in byte 0
/// is also the lowest byte of the category id. Category tables are keyed on that full
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: ValueKind,
    pub category_id: u32,
}

impl Header {
    pub const LEN: usize = 4;

    pub fn decode(bytes: [u8; 4]) -> Result<Self, DecodeError> {
        let kind = ValueKind::from_byte(bytes[0]).ok_or(DecodeError::UnknownValueKind(bytes[0]))?;
        Ok(Self {
            kind,
            category_id: u32::from_le_bytes(bytes),
        })
    }
}

#[test]
fn test_decode_header() {
    let header = Header::decode([0x08, 0x03, 0x19, 0xed]).unwrap();
    assert_eq!(header.kind, ValueKind::VarLen);
    assert_eq!(header.category_id, 0xED190308);

    let header = Header::decode([0x09, 0x03, 0x19, 0x0f]).unwrap();
    assert_eq!(header.kind, ValueKind::FixedLen);
    assert_eq!(header.category_id, 0x0F190309);
}

#[test]
fn test_unknown_kind() {
    assert_eq!(
        Header::decode([0x05, 0x03, 0x19, 0xed]),
        Err(DecodeError::UnknownValueKind(0x05))
    );
}

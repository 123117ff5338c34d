/// Why a record could not be decoded.
///
/// None of these stop a device session. The reassembler either waits for more
/// bytes (`NeedMoreData`, `Truncated`) or drops the bytes reported by
/// [`DecodeError::skip`] and keeps scanning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("need more data: have {available} bytes, need at least {required}")]
    NeedMoreData { available: usize, required: usize },

    #[error("unrecognized span of {len} bytes before the next record")]
    UnrecognizedSpan { len: usize },

    #[error("unknown value kind 0x{0:02x}")]
    UnknownValueKind(u8),

    #[error("unknown command 0x{command:02x} in category 0x{category:08x}")]
    UnknownCommand {
        category: u32,
        command: u8,
        /// Length of the whole record including its header
        consumed: usize,
    },

    #[error("history record declares {declared} bytes but only {available} are buffered")]
    Truncated { declared: usize, available: usize },
}

impl DecodeError {
    /// The number of bytes a caller can drop to get past the offending data, if the
    /// decoder knows it.
    pub fn skip(&self) -> Option<usize> {
        match self {
            DecodeError::UnknownCommand { consumed, .. } => Some(*consumed),
            DecodeError::UnrecognizedSpan { len } => Some(*len),
            _ => None,
        }
    }

    /// True when waiting for more bytes may let the same record decode.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            DecodeError::NeedMoreData { .. } | DecodeError::Truncated { .. }
        )
    }
}

/// A field table that breaks the one-descriptor-per-key rule. This is a mistake in the
/// compiled-in tables, found when a reassembler is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("category 0x{0:08x} is registered twice")]
    DuplicateCategory(u32),

    #[error("command 0x{command:02x} appears twice in category 0x{category:08x}")]
    DuplicateCommand { category: u32, command: u8 },
}

#[test]
fn test_skip_lengths() {
    let unknown = DecodeError::UnknownCommand {
        category: 0xED190308,
        command: 0x42,
        consumed: 8,
    };
    assert_eq!(unknown.skip(), Some(8));
    assert_eq!(DecodeError::UnknownValueKind(0x05).skip(), None);
    assert!(DecodeError::Truncated { declared: 40, available: 12 }.is_incomplete());
    assert!(!unknown.is_incomplete());
}

#[test]
fn test_display() {
    let err = DecodeError::UnknownCommand {
        category: 0xED190308,
        command: 0x42,
        consumed: 8,
    };
    assert_eq!(err.to_string(), "unknown command 0x42 in category 0xed190308");
}

/// Byte constraints that mark the start of a record, as (offset, accepted values).
///
/// Byte 0 (the kind tag) is not part of the signature. A match with an unknown tag is
/// found here and rejected by the header decoder.
pub const SIGNATURE: &[(usize, &[u8])] = &[(1, &[0x03, 0x00]), (2, &[0x19])];

/// Bytes needed before the signature can be checked at an offset
pub const SIGNATURE_LEN: usize = 3;

/// Whether `window` starts with a record signature. A window too short to check every
/// constraint does not match.
pub fn matches(window: &[u8]) -> bool {
    SIGNATURE.iter().all(|(offset, accepted)| {
        window
            .get(*offset)
            .is_some_and(|byte| accepted.contains(byte))
    })
}

/// The first offset in `buffer` at which a record could start.
///
/// `None` means no complete signature is present yet, which is not an error: the tail of
/// the buffer may still grow into one.
pub fn find_start(buffer: &[u8]) -> Option<usize> {
    (0..buffer.len()).find(|&offset| matches(&buffer[offset..]))
}

#[test]
fn test_find_start() {
    let fixture = hex::decode("080319030844c5320000080319ed8f42f7ff0803").unwrap();
    let pos = find_start(&fixture).unwrap();
    assert_eq!(pos, 0);

    let fixture = &fixture[pos + 1..];
    let pos = find_start(fixture).unwrap();
    assert_eq!(pos, 9);

    let fixture = &fixture[pos + 1..];
    assert_eq!(find_start(fixture), None);
}

#[test]
fn test_short_tail_does_not_match() {
    assert_eq!(find_start(&[]), None);
    assert_eq!(find_start(&[0x08]), None);
    assert_eq!(find_start(&[0x08, 0x03]), None);
    assert_eq!(find_start(&[0x08, 0x03, 0x19]), Some(0));
    assert_eq!(find_start(&[0x08, 0x00, 0x19]), Some(0));
    assert_eq!(find_start(&[0x08, 0x01, 0x19]), None);
}

#[test]
fn test_finds_first_of_several() {
    let fixture = hex::decode("ffff0803190803190803").unwrap();
    assert_eq!(find_start(&fixture), Some(2));
}

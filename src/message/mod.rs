//! The Victron BLE record format.
//!
//! Records arrive back to back in notification payloads without any outer framing. A
//! record is found by its [signature], starts with a 4 byte [header] and is decoded by
//! [record::decode_one].

pub mod header;
pub mod history;
pub mod record;
pub mod signature;

pub use header::{Header, ValueKind};
pub use record::decode_one;
pub use signature::find_start;

//! Decode telemetry from Victron battery monitors, solar chargers and DC-DC converters.
//!
//! Tested with a SmartShunt 500A/50mV and a SmartSolar MPPT 100|30.
//!
//! Over Bluetooth Low Energy the devices stream binary records through GATT
//! notifications. Notification boundaries have nothing to do with record boundaries, so
//! a [`Reassembler`] buffers the bytes per device and cuts records out of them as they
//! complete. Each record's category and command select a field from a per-model
//! [`Registry`], which turns the raw bytes into a named, unit-tagged [`DecodedValue`].
//!
//! Over the VE.Direct serial port the same devices send checksummed text blocks, see
//! [`vedirect`].
//!
//! The SmartShunt also publishes its live values as individual GATT characteristics, see
//! [`shunt_characteristics`].
//!
//! # Example
//!
//! ```rust
//! use victread::{DecodedValue, DeviceModel, Reassembler, Registry};
//!
//! let registry = Registry::for_model(DeviceModel::Smartshunt);
//! let mut reassembler = Reassembler::new("shunt", registry).unwrap();
//! let mut values = Vec::new();
//! reassembler.feed(&[0x08, 0x03, 0x19, 0xed, 0x8d], &mut values);
//! reassembler.feed(&[0x42, 0x2f, 0x05], &mut values);
//! assert_eq!(values, vec![DecodedValue::new("Voltage", "V", "13.27")]);
//! ```
//!
//! Reading from a device:
//!
//! ```rust,no_run
//! # use std::time::Duration;
//! #
//! # #[tokio::main]
//! # pub async fn main(){
//!     let mut client = victread::VictronClient::new("SmartShunt HQ2027ABCDE", victread::DeviceModel::Smartshunt)
//!         .await
//!         .unwrap();
//!     let mut values = Vec::new();
//!     client.read_for(Duration::from_secs(10), &mut values).await.unwrap();
//!     for value in values {
//!         println!("{value}");
//!     }
//! # }
//! ```

pub mod convert;
mod error;
mod field;
pub mod message;
mod reassembler;
pub mod registry;
pub mod shunt_characteristics;
pub mod vedirect;
mod victron_client;

pub use error::{DecodeError, RegistryError};
pub use field::{ConverterKind, DecodedValue, FieldDescriptor, Group};
pub use reassembler::{Reassembler, Sink};
pub use registry::{DeviceModel, Registry};
pub use victron_client::VictronClient;

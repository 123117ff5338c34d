//! Field tables as reverse engineered from BLE captures. Product info registers match
//! the VE.Can register documentation.

use crate::field::ConverterKind::{Firmware, Identify, Int, Raw, Str, UdfVersion};
use crate::field::FieldDescriptor as F;
use crate::field::Group::{History, Latest, Product, Settings};

pub(super) const PRODUCT_INFO: &[F] = &[
    F::new(0x00, Product, "ID", "", 1.0, true, Raw),
    F::new(0x01, Product, "Revision", "", 1.0, true, Raw),
    F::new(0x02, Product, "Firmware Version", "", 1.0, true, Firmware),
    F::new(0x03, Product, "Minimum Firmware Version", "", 1.0, true, Raw),
    F::new(0x04, Product, "GroupID", "", 1.0, true, Raw),
    F::new(0x05, Product, "Hardware Revision", "", 1.0, true, Raw),
    F::new(0x0A, Product, "Serial", "", 1.0, true, Str),
    F::new(0x0B, Product, "Model Name", "", 1.0, true, Raw),
    F::new(0x0C, Product, "Installation description 1", "", 1.0, true, Raw),
    F::new(0x0D, Product, "Installation description 2", "", 1.0, true, Raw),
    F::new(0x0E, Product, "Identify", "", 1.0, true, Identify),
    F::new(0x10, Product, "Udf version", "", 1.0, true, UdfVersion),
    F::new(0x20, Product, "Uptime", "", 1.0, true, Raw),
    // capabilities bitfield, not decoded yet
    F::new(0x40, Product, "Capabilities", "", 1.0, true, Raw),
];

pub(super) const HISTORY_VALUES: &[F] = &[
    F::number(0x00, History, "Deepest Discharge", "Ah", 10.0, true),
    F::number(0x01, History, "Last Discharge", "Ah", 10.0, true),
    F::number(0x02, History, "Average Discharge", "Ah", 10.0, true),
    F::number(0x03, History, "Total Charge Cycles", "", 1.0, false),
    F::number(0x04, History, "Full Discharges", "", 1.0, false),
    F::number(0x05, History, "Cumulative Ah Drawn", "Ah", 10.0, true),
    F::number(0x06, History, "Min Battery Voltage", "V", 100.0, false),
    F::number(0x07, History, "Max Battery Voltage", "V", 100.0, false),
    F::new(0x08, History, "Time Since Last Full", "sec", 1.0, true, Int),
    F::number(0x09, History, "Synchronizations", "", 1.0, false),
    F::number(0x0A, History, "Number of Low Voltage Alarms", "", 1.0, false),
    F::number(0x0B, History, "Number of High Voltage Alarms", "", 1.0, false),
    F::number(0x0E, History, "Minimum Starter Voltage", "V", 100.0, false),
    F::number(0x0F, History, "Maximum Starter Voltage", "V", 100.0, false),
    F::number(0x10, History, "Discharged Energy", "Ah", 100.0, false),
    F::number(0x11, History, "Charged Energy", "Ah", 100.0, false),
];

pub(super) const SETTINGS_VALUES: &[F] = &[
    F::number(0x00, Settings, "Capacity", "Ah", 1.0, false),
    F::number(0x01, Settings, "Charged Voltage", "V", 1.0, false),
    F::number(0x02, Settings, "Tail Current", "A", 1.0, false),
    F::number(0x03, Settings, "Charged Detection Time", "sec", 1.0, false),
    F::number(0x04, Settings, "Charge Efficiency Factor", "", 1.0, false),
    F::number(0x05, Settings, "Peukert Coefficient", "", 1.0, false),
    F::number(0x06, Settings, "Current Threshold", "%", 1.0, false),
    F::number(0x07, Settings, "Time-to-go avg. per.", "sec", 1.0, false),
    F::number(0x08, Settings, "Discharge Floor", "%", 1.0, false),
    F::number(0x09, Settings, "Relay Low Soc Clear", "%", 1.0, false),
    F::number(0x34, Settings, "User Current Zero (read only)", "", 1.0, false),
];

pub(super) const LATEST_VALUES: &[F] = &[
    F::number(0x7D, Latest, "Starter", "V", 100.0, true),
    F::number(0x8C, Latest, "Current", "A", 1000.0, true),
    F::number(0x8D, Latest, "Voltage", "V", 100.0, false),
    F::number(0x8E, Latest, "Power", "W", 1.0, true),
    F::number(0x8F, Latest, "SmartSolar Battery Current", "A", 10.0, true),
    F::number(0xBB, Latest, "SmartSolar Solar Voltage", "V", 100.0, true),
    F::number(0xBC, Latest, "SmartSolar Power", "W", 100.0, true),
    F::number(0xBD, Latest, "SmartSolar Solar Current", "A", 10.0, true),
    F::number(0xEF, Latest, "SmartSolar Setting Battery Voltage", "V", 1.0, true),
    F::number(0xF0, Latest, "SmartSolar Setting Charge Current", "A", 1.0, true),
    F::number(0xF6, Latest, "SmartSolar Setting Float Voltage", "V", 100.0, true),
];

pub(super) const MIXED_SETTINGS: &[F] = &[
    F::new(0xFE, Latest, "Time to go", "min", 1.0, false, Int),
    F::number(0xFF, Latest, "Charge Status", "%", 100.0, false),
];

pub(super) const ORION_VALUES: &[F] = &[
    F::number(0xBB, Latest, "Input Voltage", "V", 100.0, true),
    F::number(0xE9, Settings, "Delayed start voltage delay", "sec", 10.0, true),
];

pub(super) const ORION_SETTINGS: &[F] = &[
    F::number(0x36, Settings, "Shutdown Voltage", "V", 100.0, true),
    F::number(0x37, Settings, "Start Voltage", "V", 100.0, true),
    F::number(0x38, Settings, "Delayed Start Voltage", "V", 100.0, true),
    F::number(0x39, Settings, "Orion Start Delay", "sec", 1.0, true),
];

/// Single byte values pushed with the fixed length kind
pub(super) const FIXED_VALUES: &[F] = &[
    F::number(0x7D, Latest, "Starter", "V", 100.0, true),
    F::number(0x8C, Latest, "Current", "A", 1000.0, true),
    F::number(0x8D, Latest, "Voltage", "V", 100.0, false),
    F::number(0x8E, Latest, "Power", "W", 1.0, true),
    F::number(0x8F, Latest, "Capacity", "%", 100.0, false),
];

use crate::field::Group::{History, Latest, Meta};

use super::{TextConverter as C, TextField as T};

/// `CS`: state of operation
const CHARGE_STATES: &[(u32, &str)] = &[
    (0, "Off"),
    (1, "Low power"),
    (2, "Fault"),
    (3, "Bulk"),
    (4, "Absorption"),
    (5, "Float"),
    (6, "Storage"),
    (7, "Equalize (manual)"),
    (9, "Inverting"),
    (11, "Power supply"),
    (245, "Starting-up"),
    (246, "Repeated absorption"),
    (247, "Auto equalize / Recondition"),
    (248, "BatterySafe"),
    (252, "External Control"),
];

/// `MPPT`: tracker operation mode
const TRACKER_MODES: &[(u32, &str)] = &[
    (0, "Off"),
    (1, "Voltage or current limited"),
    (2, "MPP Tracker active"),
];

/// `ERR`: charger error code
const ERRORS: &[(u32, &str)] = &[
    (0, "No error"),
    (2, "Battery voltage too high"),
    (17, "Charger temperature too high"),
    (18, "Charger over current"),
    (19, "Charger current reversed"),
    (20, "Bulk time limit exceeded"),
    (21, "Current sensor issue"),
    (26, "Terminals overheated"),
    (28, "Converter issue"),
    (33, "Input voltage too high (solar panel)"),
    (34, "Input current too high (solar panel)"),
    (38, "Input shutdown (excessive battery voltage)"),
    (39, "Input shutdown (current flow during off mode)"),
    (65, "Lost communication with one of devices"),
    (66, "Synchronised charging device configuration issue"),
    (67, "BMS connection lost"),
    (68, "Network misconfigured"),
    (116, "Factory calibration data lost"),
    (117, "Invalid/incompatible firmware"),
    (119, "User settings invalid"),
];

/// `OR`: off reason
const OFF_REASONS: &[(u32, &str)] = &[
    (0x0000_0000, "None"),
    (0x0000_0001, "No input power"),
    (0x0000_0002, "Switched off (power switch)"),
    (0x0000_0004, "Switched off (device mode register)"),
    (0x0000_0008, "Remote input"),
    (0x0000_0010, "Protection active"),
    (0x0000_0020, "Paygo"),
    (0x0000_0040, "BMS"),
    (0x0000_0080, "Engine shutdown detection"),
    (0x0000_0100, "Analysing input voltage"),
];

/// `MODE`: inverter device mode
const DEVICE_MODES: &[(u32, &str)] = &[(2, "Inverter"), (4, "Off"), (5, "Eco")];

/// `PID`: product id
const PRODUCTS: &[(u32, &str)] = &[
    (0x0203, "BMV-700"),
    (0x0204, "BMV-702"),
    (0x0205, "BMV-700H"),
    (0xA053, "SmartSolar MPPT 75|15"),
    (0xA054, "SmartSolar MPPT 75|10"),
    (0xA056, "SmartSolar MPPT 100|30"),
    (0xA389, "SmartShunt 500A/50mV"),
    (0xA38A, "SmartShunt 1000A/50mV"),
    (0xA38B, "SmartShunt 2000A/50mV"),
];

pub(super) const SMARTSHUNT: &[T] = &[
    T::new("H1", History, "Deepest Discharge", "Ah", C::Scaled(0.001)),
    T::new("H2", History, "Last Discharge", "Ah", C::Scaled(0.001)),
    T::new("H3", History, "Average Discharge", "Ah", C::Scaled(0.001)),
    T::new("H4", History, "Charge Cycles", "", C::Scaled(1.0)),
    T::new("H5", History, "Full Discharges", "", C::Scaled(1.0)),
    T::new("H6", History, "Cumulative Ah Drawn", "Ah", C::Scaled(0.001)),
    T::new("H7", History, "Battery Voltage min", "V", C::Scaled(0.001)),
    T::new("H8", History, "Battery Voltage max", "V", C::Scaled(0.001)),
    T::new("H9", History, "Time Since Last Full", "s", C::Scaled(1.0)),
    T::new("H10", History, "Synchronisations", "", C::Scaled(1.0)),
    T::new("H11", History, "Alarm Voltage low", "", C::Scaled(1.0)),
    T::new("H12", History, "Alarm Voltage high", "", C::Scaled(1.0)),
    T::new("H15", History, "Starter Battery Voltage min", "V", C::Scaled(0.001)),
    T::new("H16", History, "Starter Battery Voltage max", "V", C::Scaled(0.001)),
    T::new("H17", History, "Total Discharged Energy", "kWh", C::Scaled(0.01)),
    T::new("H18", History, "Total Charged Energy", "kWh", C::Scaled(0.01)),
    T::new("PID", Meta, "Product ID", "", C::Map(PRODUCTS)),
    T::new("SER#", Meta, "Serial", "", C::Str),
    T::new("V", Latest, "Voltage", "V", C::Scaled(0.001)),
    T::new("VS", Latest, "Starter Battery Voltage", "V", C::Scaled(0.001)),
    T::new("I", Latest, "Current", "A", C::Scaled(0.001)),
    T::new("P", Latest, "Power", "W", C::Scaled(1.0)),
    T::new("T", Latest, "Battery Temperature", "°C", C::Scaled(1.0)),
    T::new("CE", Latest, "Used Energy", "Ah", C::Scaled(0.001)),
    T::new("SOC", Latest, "State Of Charge", "%", C::Scaled(0.1)),
    T::new("TTG", Latest, "Time To Go", "Min", C::Scaled(1.0)),
    T::new("Alarm", Latest, "Alarm", "", C::Str),
    T::new("AR", Latest, "Alarm Reason", "", C::Flags),
    T::new("BMV", Meta, "BMV", "", C::Str),
    T::new("FW", Meta, "Firmware Version", "", C::Firmware),
    T::new("MON", Meta, "Monitor Mode", "", C::Str),
];

pub(super) const SMARTSOLAR: &[T] = &[
    T::new("V", Latest, "Voltage", "V", C::Scaled(0.001)),
    T::new("I", Latest, "Current", "A", C::Scaled(0.001)),
    T::new("IL", Latest, "Load Current", "A", C::Scaled(0.001)),
    T::new("VPV", Latest, "Voltage Panel", "V", C::Scaled(0.001)),
    T::new("PPV", Latest, "Power", "W", C::Scaled(1.0)),
    T::new("CS", Latest, "Status", "", C::Map(CHARGE_STATES)),
    T::new("MPPT", Latest, "MPPT Tracker Operation Mode", "", C::Map(TRACKER_MODES)),
    T::new("OR", Latest, "Off Reason", "", C::Map(OFF_REASONS)),
    T::new("ERR", Latest, "Error Code", "", C::Map(ERRORS)),
    T::new("LOAD", Latest, "Virtual Load Output", "", C::Str),
    T::new("H19", History, "Energy All Time", "kWh", C::Scaled(0.01)),
    T::new("H20", History, "Energy Today", "kWh", C::Scaled(0.01)),
    T::new("H21", History, "Max Power Today", "W", C::Scaled(1.0)),
    T::new("H22", History, "Energy Yesterday", "kWh", C::Scaled(0.01)),
    T::new("H23", History, "Max Power Yesterday", "W", C::Scaled(1.0)),
    T::new("HSDS", Meta, "Day sequence Number (0..364)", "", C::Scaled(1.0)),
    T::new("PID", Meta, "Product ID", "", C::Map(PRODUCTS)),
    T::new("FW", Meta, "Firmware Version", "", C::Firmware),
    T::new("SER#", Meta, "Serial", "", C::Str),
    T::new("PROD", Meta, "Production Date", "", C::ProductionDate),
];

pub(super) const PHOENIX: &[T] = &[
    T::new("AC_OUT_I", Latest, "AC Current", "A", C::Scaled(0.1)),
    T::new("AC_OUT_V", Latest, "AC Voltage", "V", C::Scaled(0.01)),
    T::new("V", Latest, "Voltage", "V", C::Scaled(0.001)),
    T::new("AR", Latest, "Alarm Reason", "", C::Flags),
    T::new("WARN", Latest, "Warning", "", C::Flags),
    T::new("PID", Meta, "Product ID", "", C::Map(PRODUCTS)),
    T::new("FW", Meta, "Firmware", "", C::Firmware),
    T::new("SER#", Meta, "Serial", "", C::Str),
    T::new("MODE", Latest, "Mode", "", C::Map(DEVICE_MODES)),
    T::new("CS", Latest, "Status", "", C::Map(CHARGE_STATES)),
    T::new("PROD", Meta, "Production Date", "", C::ProductionDate),
];

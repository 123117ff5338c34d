use std::fmt;

/// Which part of the device a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Latest,
    History,
    Settings,
    Meta,
    Product,
}

/// Selects the function that turns the raw bytes of a field into text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConverterKind {
    /// Little-endian integer divided by the scale, printed in full
    Number,
    /// Little-endian integer divided by the scale, truncated toward zero
    Int,
    /// Alarm/warning reasons. The table maps single-bit values to labels.
    Flags(&'static [(u16, &'static str)]),
    /// ASCII text
    Str,
    Firmware,
    UdfVersion,
    Identify,
    /// Not understood yet. Printed as hex.
    Raw,
}

/// Describes one field of one category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub command: u8,
    pub group: Group,
    pub label: &'static str,
    pub unit: &'static str,
    /// Divisor applied to the raw integer. `1.0` means no scaling.
    pub scale: f64,
    pub signed: bool,
    pub converter: ConverterKind,
}

impl FieldDescriptor {
    pub const fn new(
        command: u8,
        group: Group,
        label: &'static str,
        unit: &'static str,
        scale: f64,
        signed: bool,
        converter: ConverterKind,
    ) -> Self {
        Self { command, group, label, unit, scale, signed, converter }
    }

    /// Shorthand for the common scaled number field
    pub const fn number(
        command: u8,
        group: Group,
        label: &'static str,
        unit: &'static str,
        scale: f64,
        signed: bool,
    ) -> Self {
        Self::new(command, group, label, unit, scale, signed, ConverterKind::Number)
    }

    /// Apply this field's converter to `raw`.
    pub fn decode(&self, raw: &[u8]) -> DecodedValue {
        DecodedValue {
            label: self.label.to_owned(),
            unit: self.unit.to_owned(),
            value: crate::convert::convert(self, raw),
        }
    }
}

/// A named, formatted measurement ready to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedValue {
    pub label: String,
    pub unit: String,
    pub value: String,
}

impl DecodedValue {
    pub fn new(label: impl Into<String>, unit: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), unit: unit.into(), value: value.into() }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}{}", self.label, self.value, self.unit)
    }
}

#[test]
fn test_display_value() {
    let value = DecodedValue::new("Current", "A", "-0.954");
    assert_eq!(value.to_string(), "Current: -0.954A");
}

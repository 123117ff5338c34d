//! Compiled-in field tables, one registry per device model.
//!
//! A record's category id selects a table, the command byte selects the field within
//! it. Variable and fixed length records are looked up in separate registries because
//! the same category can mean different things for the two kinds.

mod tables;

use std::collections::HashSet;

use crate::error::RegistryError;
use crate::field::FieldDescriptor;
use crate::message::header::ValueKind;
use tables::*;

/// The devices a registry exists for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    Smartshunt,
    Smartsolar,
    Orion,
}

/// The fields of one category
#[derive(Debug, PartialEq)]
pub struct CategoryTable {
    pub id: u32,
    pub label: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl CategoryTable {
    pub fn field(&self, command: u8) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.command == command)
    }
}

#[derive(Debug, PartialEq)]
pub struct Registry {
    pub model: DeviceModel,
    pub var_len: &'static [CategoryTable],
    pub fixed_len: &'static [CategoryTable],
}

impl Registry {
    pub fn for_model(model: DeviceModel) -> &'static Registry {
        match model {
            DeviceModel::Smartshunt => &SMARTSHUNT,
            DeviceModel::Smartsolar => &SMARTSOLAR,
            DeviceModel::Orion => &ORION,
        }
    }

    pub fn category(&self, kind: ValueKind, id: u32) -> Option<&'static CategoryTable> {
        let tables = match kind {
            ValueKind::VarLen => self.var_len,
            ValueKind::FixedLen => self.fixed_len,
        };
        tables.iter().find(|table| table.id == id)
    }

    pub fn category_label(&self, kind: ValueKind, id: u32) -> Option<&'static str> {
        self.category(kind, id).map(|table| table.label)
    }

    /// Check that every category and every command within a category appears once.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for tables in [self.var_len, self.fixed_len] {
            let mut categories = HashSet::new();
            for table in tables {
                if !categories.insert(table.id) {
                    return Err(RegistryError::DuplicateCategory(table.id));
                }
                let mut commands = HashSet::new();
                for field in table.fields {
                    if !commands.insert(field.command) {
                        return Err(RegistryError::DuplicateCommand {
                            category: table.id,
                            command: field.command,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

const PRODUCT_INFO_TABLE: CategoryTable = CategoryTable {
    id: 0x01190308,
    label: "product info",
    fields: PRODUCT_INFO,
};

const MIXED_SETTINGS_TABLE: CategoryTable = CategoryTable {
    id: 0x0F190308,
    label: "mixed settings",
    fields: MIXED_SETTINGS,
};

const FIXED_MIXED_SETTINGS_TABLE: CategoryTable = CategoryTable {
    id: 0x0F190309,
    label: "mixed settings",
    fields: MIXED_SETTINGS,
};

const HISTORY_TABLE: CategoryTable = CategoryTable {
    id: 0x03190308,
    label: "history values",
    fields: HISTORY_VALUES,
};

const SETTINGS_TABLE: CategoryTable = CategoryTable {
    id: 0x10190308,
    label: "settings values",
    fields: SETTINGS_VALUES,
};

const LATEST_TABLE: CategoryTable = CategoryTable {
    id: 0xED190308,
    label: "latest values",
    fields: LATEST_VALUES,
};

static SMARTSHUNT: Registry = Registry {
    model: DeviceModel::Smartshunt,
    var_len: &[
        PRODUCT_INFO_TABLE,
        HISTORY_TABLE,
        SETTINGS_TABLE,
        LATEST_TABLE,
        MIXED_SETTINGS_TABLE,
        CategoryTable { id: 0xEC190008, label: "streaming values", fields: LATEST_VALUES },
    ],
    fixed_len: &[
        CategoryTable { id: 0xED190309, label: "latest values", fields: FIXED_VALUES },
        FIXED_MIXED_SETTINGS_TABLE,
    ],
};

static SMARTSOLAR: Registry = Registry {
    model: DeviceModel::Smartsolar,
    var_len: &[
        PRODUCT_INFO_TABLE,
        HISTORY_TABLE,
        SETTINGS_TABLE,
        LATEST_TABLE,
        MIXED_SETTINGS_TABLE,
    ],
    fixed_len: &[FIXED_MIXED_SETTINGS_TABLE],
};

static ORION: Registry = Registry {
    model: DeviceModel::Orion,
    var_len: &[
        PRODUCT_INFO_TABLE,
        MIXED_SETTINGS_TABLE,
        CategoryTable { id: 0x01190008, label: "orion values (unconfirmed)", fields: ORION_VALUES },
        CategoryTable { id: 0xED190008, label: "orion values", fields: ORION_VALUES },
        CategoryTable { id: 0xEE190008, label: "orion settings", fields: ORION_SETTINGS },
    ],
    fixed_len: &[FIXED_MIXED_SETTINGS_TABLE],
};

#[test]
fn test_builtin_registries_are_valid() {
    for model in [DeviceModel::Smartshunt, DeviceModel::Smartsolar, DeviceModel::Orion] {
        let registry = Registry::for_model(model);
        assert_eq!(registry.model, model);
        assert_eq!(registry.validate(), Ok(()));
    }
}

#[test]
fn test_lookup_by_kind() {
    let registry = Registry::for_model(DeviceModel::Smartshunt);

    let current = registry
        .category(ValueKind::VarLen, 0xED190308)
        .and_then(|table| table.field(0x8C))
        .unwrap();
    assert_eq!(current.label, "Current");
    assert_eq!(current.scale, 1000.0);

    assert!(registry.category(ValueKind::FixedLen, 0xED190308).is_none());
    assert_eq!(registry.category_label(ValueKind::FixedLen, 0xED190309), Some("latest values"));
    assert!(registry.category(ValueKind::VarLen, 0xED190008).is_none());

    let orion = Registry::for_model(DeviceModel::Orion);
    assert_eq!(orion.category_label(ValueKind::VarLen, 0xEE190008), Some("orion settings"));
}

#[test]
fn test_duplicates_are_rejected() {
    static DUPLICATE_CATEGORY: Registry = Registry {
        model: DeviceModel::Smartshunt,
        var_len: &[MIXED_SETTINGS_TABLE, MIXED_SETTINGS_TABLE],
        fixed_len: &[],
    };
    assert_eq!(
        DUPLICATE_CATEGORY.validate(),
        Err(RegistryError::DuplicateCategory(0x0F190308))
    );

    const TWICE: &[FieldDescriptor] = &[
        FieldDescriptor::number(0x01, crate::field::Group::Latest, "a", "", 1.0, false),
        FieldDescriptor::number(0x01, crate::field::Group::Latest, "b", "", 1.0, false),
    ];
    static DUPLICATE_COMMAND: Registry = Registry {
        model: DeviceModel::Smartshunt,
        var_len: &[],
        fixed_len: &[CategoryTable { id: 0x0F190309, label: "dup", fields: TWICE }],
    };
    assert_eq!(
        DUPLICATE_COMMAND.validate(),
        Err(RegistryError::DuplicateCommand { category: 0x0F190309, command: 0x01 })
    );
}

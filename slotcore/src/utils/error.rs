use strum::EnumIs;
use thiserror::Error;

use crate::registry::TypeRef;

#[derive(Debug, Error, EnumIs)]
pub enum SlotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParse {
        source: toml::de::Error,
        file: String,
    },

    #[error("Type {0} is not registered")]
    UnknownType(TypeRef),

    #[error("Type '{type_name}' lists ancestor '{ancestor}' more than once")]
    DuplicateAncestor { type_name: String, ancestor: String },

    #[error("Type '{type_name}' declares '{slot}' in its fixed layout, which is not an identifier")]
    InvalidSlotName { type_name: String, slot: String },

    #[error("'{slot}' in the fixed layout of '{type_name}' conflicts with a class attribute")]
    SlotConflictsWithClassAttribute { type_name: String, slot: String },

    #[error(
        "Type '{type_name}' requests a dynamic store, but ancestor '{ancestor}' already provides one"
    )]
    DuplicateDynamicStore { type_name: String, ancestor: String },

    #[error(
        "Ancestors of '{type_name}' have conflicting instance layouts ('{first}' and '{second}' both add fixed attributes)"
    )]
    LayoutConflict {
        type_name: String,
        first: String,
        second: String,
    },
}

pub type SlotResult<T> = Result<T, SlotError>;

/// Failures of attribute access on an [`crate::instance::Instance`].
#[derive(Debug, Clone, PartialEq, Eq, Error, EnumIs)]
pub enum AttributeError {
    /// The name is outside the fixed layout and the instance has no dynamic
    /// store to fall back to.
    #[error("'{type_name}' object has no attribute '{name}' and cannot be given one")]
    NotAssignable { type_name: String, name: String },

    /// The name is valid for the instance but currently holds no value.
    #[error("'{type_name}' object has no attribute '{name}'")]
    Unset { type_name: String, name: String },
}

//! This module contains errors pertaining to the decomposition of final
//! storage and its resolution against the declared storage layout.

use thiserror::Error;

use crate::{contract::abi::AbiType, utility::U256W, vm::value::Word};

/// Errors that occur when partitioning a storage tree or resolving its slots
/// through the [`crate::layout::LayoutResolver`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Write to symbolic storage key {key:?} cannot be separated from other writes")]
    SymbolicKey { key: Box<Word> },

    #[error("No storage variable is declared at slot {slot}")]
    UnknownSlot { slot: U256W },

    #[error("Slot {slot} holds packed variables {names:?}")]
    PackedSlot { slot: U256W, names: Vec<String> },

    #[error("Slot {slot} holds the mapping {name}")]
    MappingSlot { slot: U256W, name: String },

    #[error("Storage variable {name} has unsupported type {typ}")]
    UnsupportedSlotType { name: String, typ: AbiType },

    #[error("Storage variables {first} and {second} are declared at the same position")]
    OverlappingVariables { first: String, second: String },
}

/// The result type for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

//! This module contains errors pertaining to the translation of symbolic terms
//! into specification expressions.

use thiserror::Error;

use crate::{
    contract::abi::AbiType,
    error::storage,
    vm::value::{Prop, Word},
};

/// Errors that occur during translation in the
/// [`crate::translate::Translator`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Unsupported term {term:?}")]
    UnsupportedWord { term: Box<Word> },

    #[error("Unsupported storage read {term:?}")]
    UnsupportedStorageRead { term: Box<Word> },

    #[error("Unsigned operation {term:?} reads a signed value")]
    SignedOperand { term: Box<Word> },

    #[error("Unsigned comparison {prop:?} reads a signed value")]
    SignedComparison { prop: Box<Prop> },

    #[error("Comparison between non-word terms {prop:?}")]
    NonWordComparison { prop: Box<Prop> },

    #[error("Unknown calldata variable {name}")]
    UnknownVariable { name: String },

    #[error("Calldata variable {name} has unsupported type {typ}")]
    UnsupportedVariableType { name: String, typ: AbiType },

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

/// The result type for translation.
pub type Result<T> = std::result::Result<T, Error>;

//! This module contains errors pertaining to the assembly of a specification
//! from translated branches.

use thiserror::Error;

use crate::{
    contract::abi::AbiType,
    vm::{buffer::Buf, program::Address},
};

/// Errors that occur while assembling entry points in the
/// [`crate::assembler::Assembler`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Storage of {address} is written, but only the entrypoint contract may be written")]
    ForeignStorageWrite { address: Address },

    #[error("Creation code has {count} successful branches, but exactly one is supported")]
    CreationBranchCount { count: usize },

    #[error("Unsupported dynamically sized return of type {typ}")]
    DynamicReturn { typ: AbiType },

    #[error("Unsupported tuple return of type {typ}")]
    TupleReturn { typ: AbiType },

    #[error("Unsupported function pointer return")]
    FunctionReturn,

    #[error("Unsupported multi-word array return of type {typ}")]
    ArrayReturn { typ: AbiType },

    #[error("Unsupported return of {count} values")]
    MultipleReturns { count: usize },

    #[error("Cannot read a return word from {buffer:?}")]
    UnsupportedReturnBuffer { buffer: Box<Buf> },
}

/// The result type for assembly.
pub type Result<T> = std::result::Result<T, Error>;

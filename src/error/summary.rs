//! This module contains errors pertaining to the symbolic exploration of a
//! contract's entry points.

use thiserror::Error;

use crate::contract::abi::AbiType;

/// Errors that occur while summarising the bytecode of a contract in the
/// [`crate::summarizer::Summarizer`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Exploration was incomplete on {} branches: {branches:?}", .branches.len())]
    PartialExploration { branches: Vec<String> },

    #[error("Argument {name} has dynamically sized type {typ}")]
    DynamicArgument { name: String, typ: AbiType },

    #[error("Argument {name} has unsupported type {typ}")]
    UnsupportedArgument { name: String, typ: AbiType },

    #[error("Symbolic execution failed: {message}")]
    Engine { message: String },
}

impl Error {
    /// Constructs an engine failure with the provided `message`.
    pub fn engine(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Engine { message }
    }
}

/// The result type for exploration.
pub type Result<T> = std::result::Result<T, Error>;

//! This module contains the primary error type for the decompiler's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod assembly;
pub mod container;
pub mod storage;
pub mod summary;
pub mod translation;
pub mod verification;

use thiserror::Error;

use crate::contract::EntryPoint;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// should return this result type. Subsystems should return the more-specific
/// child error types as appropriate.
///
/// Note that _all_ of the library is public in order to facilitate use-cases
/// beyond the ones designed for.
pub type Result<T> = std::result::Result<T, Errors>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// Errors that come from exploring the bytecode.
    #[error(transparent)]
    Summary(#[from] summary::Error),

    /// Errors from partitioning storage or resolving its layout.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// Errors from translating symbolic terms.
    #[error(transparent)]
    Translation(#[from] translation::Error),

    /// Errors from assembling entry points into a specification.
    #[error(transparent)]
    Assembly(#[from] assembly::Error),

    /// Errors from checking the specification against the bytecode.
    #[error(transparent)]
    Verification(#[from] verification::Error),

    /// An unknown error, represented as a string.
    #[error("Unknown Error: {_0:?}")]
    Other(String),
}

impl Error {
    /// Constructs an unknown error with the provided `message`.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Make it possible to attach locations to these errors.
impl container::Locatable for Error {
    type Located = LocatedError;

    fn locate(self, entry: EntryPoint) -> Self::Located {
        container::Located {
            location: entry,
            payload:  self,
        }
    }
}

/// A library error with an associated entry point.
pub type LocatedError = container::Located<Error>;

/// A container of errors that may occur in the decompiler.
pub type Errors = container::Errors<LocatedError>;

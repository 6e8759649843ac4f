//! This module contains errors pertaining to the round-trip verification of a
//! specification against the bytecode it was recovered from.

use itertools::Itertools;
use num::BigInt;
use thiserror::Error;

use crate::{contract::abi::Selector, verify::Counterexample};

/// Errors that occur during compilation or checking in the
/// [`crate::verify::RoundTripVerifier`].
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Specification disagrees with the bytecode: {counterexample}")]
    Counterexample { counterexample: Box<Counterexample> },

    #[error(
        "Runtime code dispatches selectors that no behaviour covers: {}",
        .selectors.iter().join(", ")
    )]
    MissingSelectors { selectors: Vec<Selector> },

    #[error("Cannot compile specification: {reason}")]
    Uncompilable { reason: String },

    #[error("Literal {value} does not fit in a word")]
    LiteralOutOfRange { value: BigInt },

    #[error("Cannot evaluate: {reason}")]
    Unevaluable { reason: String },

    #[error("Solver failed: {message}")]
    Solver { message: String },
}

impl Error {
    /// Constructs a compilation failure with the provided `reason`.
    pub fn uncompilable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Uncompilable { reason }
    }

    /// Constructs an evaluation failure with the provided `reason`.
    pub fn unevaluable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Unevaluable { reason }
    }
}

/// The result type for verification.
pub type Result<T> = std::result::Result<T, Error>;

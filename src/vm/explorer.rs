//! This module contains the interface to the symbolic-execution engine that
//! explores the bytecode of a contract.

use std::{fmt::Debug, sync::Arc};

use crate::{
    contract::abi::{Argument, Selector},
    error::summary::Result,
    vm::program::{Program, TerminalState},
};

/// A dynamically dispatched [`Explorer`] instance.
pub type DynExplorer = Arc<dyn Explorer>;

/// The symbolic inputs with which an entry point is explored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Calldata {
    /// Creation code, where the constructor `arguments` are appended to the
    /// code as fully symbolic values.
    Creation { arguments: Vec<Argument> },

    /// The method dispatched through `selector`, with fully symbolic
    /// `arguments` following it.
    Method {
        selector:  Selector,
        arguments: Vec<Argument>,
    },

    /// Runtime code with entirely unconstrained call data, including the
    /// selector.
    Unconstrained,
}

impl Calldata {
    /// Checks if the call data is for exploring creation code.
    #[must_use]
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }
}

/// The interface to a symbolic-execution engine.
///
/// The engine is treated as an external collaborator. Exploration may be
/// arbitrarily expensive and is the only operation in the pipeline, besides
/// solving, that is allowed to block. Implementations must be deterministic
/// for a fixed query.
pub trait Explorer
where
    Self: Debug + Send + Sync,
{
    /// Explores `bytecode` with the symbolic `calldata`, returning the
    /// simplified program.
    ///
    /// Incomplete exploration is reported through [`TerminalState::Partial`]
    /// states in the program and not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the engine fails outright.
    fn explore(&self, bytecode: &[u8], calldata: &Calldata) -> Result<Program>;

    /// Flattens `program` into its ordered terminal states.
    fn flatten(&self, program: Program) -> Vec<TerminalState> {
        program.flatten()
    }
}

//! This module contains the symbolic domain in which the bytecode of a
//! contract is described.
//!
//! The symbolic-execution engine itself is an external collaborator behind
//! the [`explorer::Explorer`] trait. Everything here is the language of its
//! output: [`value::Word`] terms, [`storage::Storage`] trees and
//! [`buffer::Buf`] buffers, gathered into the [`program::TerminalState`]s of
//! a [`program::Program`]. The [`eval`] module gives those terms their
//! concrete meaning.

pub mod buffer;
pub mod eval;
pub mod explorer;
pub mod program;
pub mod storage;
pub mod value;

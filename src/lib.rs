//! This library implements a decompiler from [EVM](https://ethereum.org/en/developers/docs/evm/)
//! bytecode to behavioural specifications. Given a compiled contract, its ABI
//! and its storage layout, it produces a description of what every entry point
//! does in terms of typed calldata, environment values and named storage
//! variables, and then checks that description against the bytecode.
//!
//! It is a _conservative_ analysis. Wherever a path cannot be explored
//! completely, or a term cannot be expressed faithfully, the entry point in
//! question is rejected instead of being approximated.
//!
//! # How it Works
//!
//! From a very high level, the decompilation process is performed as follows:
//!
//! 1. The creation code and every method of the runtime code are explored by
//!    an external symbolic-execution engine behind the
//!    [`vm::explorer::Explorer`] trait. The [`summarizer::Summarizer`] keeps
//!    the successful [`vm::program::Branch`]es of each entry point.
//! 2. The [`assembler::Assembler`] partitions the storage of every branch into
//!    its final writes, resolves slots to named variables with the
//!    [`layout::LayoutResolver`], and translates the path conditions, writes
//!    and return values into [`spec::expression`] terms. Overflow checks
//!    emitted by the compiler are recognised by the idioms in
//!    [`translate::idiom`].
//! 3. The [`enricher::Enricher`] adds the range facts that the EVM guarantees
//!    implicitly as explicit preconditions.
//! 4. The [`verify::RoundTripVerifier`] compiles the specification back into
//!    branches and asks a [`verify::Solver`] whether they agree with the
//!    bytecode, and whether every selector the dispatcher accepts is covered.
//!
//! # Basic Usage
//!
//! For the most basic usage of the library, it is sufficient to construct a
//! `Decompiler` and call the `.decompile` method.
//!
//! ```
//! use std::sync::Arc;
//!
//! use evm_spec_decompiler as esd;
//! use evm_spec_decompiler::{
//!     contract::{
//!         abi::{AbiType, Argument, Interface, Method},
//!         Contract,
//!     },
//!     decompiler::Config,
//!     error::summary,
//!     layout::{StorageLayout, StorageVariable},
//!     observer::NullObserver,
//!     verify::{self, sampling::SamplingSolver},
//!     vm::{
//!         buffer::Buf,
//!         explorer::{Calldata, Explorer},
//!         program::{Branch, Program, TerminalState},
//!         storage::Storage,
//!         value::Word,
//!     },
//! };
//!
//! /// An engine that already knows what the bytecode does.
//! #[derive(Debug)]
//! struct Engine;
//!
//! impl Explorer for Engine {
//!     fn explore(&self, _: &[u8], calldata: &Calldata) -> summary::Result<Program> {
//!         let branch = match calldata {
//!             Calldata::Creation { .. } => Branch::new(
//!                 vec![],
//!                 Buf::Concrete { bytes: vec![0xfe] },
//!                 Storage::empty(),
//!             ),
//!             Calldata::Method { .. } => Branch::new(
//!                 vec![],
//!                 Buf::empty(),
//!                 Storage::Abstract.write(Word::lit(0u8), Word::var("v")),
//!             ),
//!             Calldata::Unconstrained => return Err(summary::Error::engine("unused")),
//!         };
//!         Ok(Program::End(TerminalState::Success(branch)))
//!     }
//! }
//!
//! let uint256 = AbiType::UInt { size: 256 };
//! let set = Method::new(
//!     Interface::new("set", vec![Argument::new("v", uint256.clone())]),
//!     vec![],
//! );
//! let layout = StorageLayout::new(vec![StorageVariable::value("x", 0usize, uint256)]);
//! let contract = Contract::new("Store", vec![], vec![0xfe])
//!     .with_method(set)
//!     .with_layout(layout);
//!
//! let config = Config::default()
//!     .with_verification(verify::Config::default().with_check_exhaustiveness(false));
//! let specification = esd::new(
//!     contract,
//!     Arc::new(Engine),
//!     SamplingSolver::default().in_arc(),
//!     config,
//!     NullObserver.in_arc(),
//! )
//! .decompile()
//! .unwrap();
//!
//! assert_eq!(specification.behaviours.len(), 1);
//! assert_eq!(specification.constructor.initial_storage.len(), 1);
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod assembler;
pub mod constant;
pub mod contract;
pub mod decompiler;
pub mod enricher;
pub mod error;
pub mod layout;
pub mod observer;
pub mod spec;
pub mod summarizer;
pub mod translate;
pub mod utility;
pub mod verify;
pub mod vm;

// Re-exports to provide the library interface.
pub use decompiler::new;
pub use spec::Specification;

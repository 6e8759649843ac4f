//! This module contains common utilities for simplifying the writing of
//! integration tests for this library.

#![cfg(test)]

use std::{collections::BTreeMap, sync::Arc};

use evm_spec_decompiler as esd;
use evm_spec_decompiler::{
    contract::{
        abi::{AbiType, Method, Selector},
        Contract,
    },
    decompiler::{Config, InitialDecompiler},
    error::summary,
    observer::DynObserver,
    verify::sampling::SamplingSolver,
    vm::{
        buffer::Buf,
        explorer::{Calldata, Explorer},
        program::{Branch, Program, TerminalState},
        storage::Storage,
        value::{Prop, Word},
    },
};

/// An engine that answers every query from a fixed script.
///
/// Creation queries get the creation program, method queries get the program
/// registered for their selector, and unconstrained runtime queries get a
/// dispatcher that compares the selector against every registered method in
/// turn and reverts when none matches.
#[derive(Clone, Debug)]
pub struct ScriptedExplorer {
    creation: Program,
    methods:  BTreeMap<Selector, Program>,
}

impl ScriptedExplorer {
    /// Constructs an engine whose creation code follows `creation`.
    #[must_use]
    pub fn new(creation: Program) -> Self {
        let methods = BTreeMap::new();
        Self { creation, methods }
    }

    /// Constructs an engine whose creation code writes nothing and returns
    /// `runtime_code`.
    #[must_use]
    pub fn deploying(runtime_code: &[u8]) -> Self {
        Self::new(success(Branch::new(
            vec![],
            Buf::Concrete {
                bytes: runtime_code.to_vec(),
            },
            Storage::empty(),
        )))
    }

    /// Registers `program` as the behaviour of `method`.
    #[must_use]
    pub fn with_method(mut self, method: &Method, program: Program) -> Self {
        self.methods.insert(method.selector(), program);
        self
    }

    /// Gets the program for the runtime code as a whole.
    #[must_use]
    pub fn dispatcher(&self) -> Program {
        let fallback = Program::End(TerminalState::Failure {
            conditions: vec![],
            reason:     "no matching selector".into(),
        });
        self.methods.iter().rev().fold(fallback, |otherwise, (selector, program)| {
            Program::Ite {
                condition: Word::equals(Word::Selector, Word::lit(selector.as_word())),
                then:      Box::new(program.clone()),
                otherwise: Box::new(otherwise),
            }
        })
    }

    /// Puts the engine behind a shared pointer.
    #[must_use]
    pub fn in_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Explorer for ScriptedExplorer {
    fn explore(&self, _: &[u8], calldata: &Calldata) -> summary::Result<Program> {
        match calldata {
            Calldata::Creation { .. } => Ok(self.creation.clone()),
            Calldata::Method { selector, .. } => self
                .methods
                .get(selector)
                .cloned()
                .ok_or_else(|| summary::Error::engine(format!("no script for {selector}"))),
            Calldata::Unconstrained => Ok(self.dispatcher()),
        }
    }
}

/// Constructs a new decompiler for `contract`, exploring with `explorer` and
/// verifying with the default sampling solver.
///
/// It uses the default configurations for the decompiler.
#[allow(unused)] // It is actually
pub fn new_decompiler(
    contract: Contract,
    explorer: ScriptedExplorer,
    observer: DynObserver,
) -> InitialDecompiler {
    esd::new(
        contract,
        explorer.in_arc(),
        SamplingSolver::default().in_arc(),
        Config::default(),
        observer,
    )
}

/// Wraps `branch` into a program that always succeeds with it.
#[must_use]
pub fn success(branch: Branch) -> Program {
    Program::End(TerminalState::Success(branch))
}

/// Constructs a program that reverts for `reason` when `condition` is
/// non-zero, and otherwise continues as `then`.
#[allow(unused)] // It is actually
#[must_use]
pub fn revert_if(condition: Word, reason: &str, then: Program) -> Program {
    Program::Ite {
        condition,
        then: Box::new(Program::End(TerminalState::Failure {
            conditions: Vec::<Prop>::new(),
            reason:     reason.into(),
        })),
        otherwise: Box::new(then),
    }
}

/// Reads the word at `slot` from the storage that the method was called
/// with.
#[allow(unused)] // It is actually
#[must_use]
pub fn sload(slot: u8) -> Word {
    Word::sload(Word::lit(slot), Storage::Abstract)
}

#[allow(unused)] // It is actually
#[must_use]
pub fn uint256() -> AbiType {
    AbiType::UInt { size: 256 }
}

//! This module contains the state tracking functionality for the decompiler.

use std::fmt::Debug;

use crate::{
    decompiler::Config,
    observer::DynObserver,
    spec::Specification,
    summarizer::ContractSummary,
    verify::{DynSolver, VerificationReport},
    vm::explorer::DynExplorer,
};

/// A marker trait that says that the type implementing it is a decompiler
/// state.
///
/// Decompiler states can be transitioned between as part of the
/// [`crate::decompiler::Decompiler`] state machine, and are intended to
/// enforce that correct state transitions take place.
pub trait State
where
    Self: Debug + Sized,
{
}

/// The collaborators that every state before verification carries along.
#[derive(Clone, Debug)]
pub struct Services {
    /// The symbolic-execution engine that explores the bytecode.
    pub explorer: DynExplorer,

    /// The solver that decides verification queries.
    pub solver: DynSolver,

    /// The decompiler configuration.
    pub config: Config,

    /// The observer that is told about the progress of the decompiler.
    pub observer: DynObserver,
}

/// The initial state for the decompiler.
#[derive(Debug)]
pub struct HasContract {
    pub services: Services,
}
impl State for HasContract {}

/// The decompiler has explored every entry point of the contract.
#[derive(Debug)]
pub struct Summarized {
    /// The successful paths through every entry point.
    pub summary: ContractSummary,

    pub services: Services,
}
impl State for Summarized {}

/// The decompiler has assembled a specification from the summary.
#[derive(Debug)]
pub struct Assembled {
    pub summary: ContractSummary,

    /// The specification as assembled, before enrichment.
    pub specification: Specification,

    pub services: Services,
}
impl State for Assembled {}

/// The decompiler has made the range facts of the specification explicit.
#[derive(Debug)]
pub struct Enriched {
    pub summary: ContractSummary,

    /// The enriched specification.
    pub specification: Specification,

    pub services: Services,
}
impl State for Enriched {}

/// The decompiler has checked the specification against the bytecode.
#[derive(Debug)]
pub struct Verified {
    /// The verified specification.
    pub specification: Specification,

    /// What verification established.
    pub report: VerificationReport,
}
impl State for Verified {}

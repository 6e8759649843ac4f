//! This module contains the definition of the decompiler itself.

pub mod state;

use crate::{
    assembler::{Assembler, Assembly},
    contract::Contract,
    decompiler::state::{Services, State},
    enricher::Enricher,
    error,
    observer::DynObserver,
    spec::Specification,
    summarizer::{ContractSummary, Summarizer},
    translate,
    verify,
    verify::{DynSolver, RoundTripVerifier, VerificationReport},
    vm::explorer::DynExplorer,
};

/// Creates a new decompiler wrapping the provided `contract`, that explores
/// its bytecode with `explorer` and checks its output with `solver`.
#[must_use]
pub fn new(
    contract: Contract,
    explorer: DynExplorer,
    solver: DynSolver,
    config: Config,
    observer: DynObserver,
) -> Decompiler<state::HasContract> {
    let services = Services {
        explorer,
        solver,
        config,
        observer,
    };
    let state = state::HasContract { services };
    Decompiler { contract, state }
}

/// The configuration for the decompiler as a whole.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// The configuration for translating explored terms.
    pub translation: translate::Config,

    /// The configuration for verifying the resulting specification.
    pub verification: verify::Config,
}

impl Config {
    /// Sets the translation configuration.
    #[must_use]
    pub fn with_translation(mut self, value: translate::Config) -> Self {
        self.translation = value;
        self
    }

    /// Sets the verification configuration.
    #[must_use]
    pub fn with_verification(mut self, value: verify::Config) -> Self {
        self.verification = value;
        self
    }
}

/// The core of the analysis, the `Decompiler` is responsible for ingesting a
/// compiled contract and outputting a verified behavioural specification of
/// it.
///
/// # Enforcing Valid State Transitions
///
/// Each stage is only callable on a decompiler whose state type carries the
/// outputs that stage consumes, so the stages can only run in the order
/// summarize, assemble, enrich and verify. [`Decompiler::decompile`] runs all
/// of them, and [`Self::state`] exposes whatever the latest stage produced.
#[derive(Debug)]
pub struct Decompiler<S: State> {
    /// The contract that is being decompiled.
    contract: Contract,

    /// The internal state of the decompiler.
    state: S,
}

/// The safe operations available in all states.
///
/// # Modifying the Decompiler
///
/// Modifying the decompiler outside of the standard transitions requires one
/// of the following functions:
///
/// - [`Decompiler::contract_mut`]
/// - [`Decompiler::state_mut`]
/// - [`Decompiler::set_contract`]
/// - [`Decompiler::set_state`]
/// - [`Decompiler::transform_state`]
///
/// Each is unsafe, as the state may then no longer describe the contract.
impl<S: State> Decompiler<S> {
    /// Gets a reference to the contract being decompiled.
    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Gets an immutable reference to the current state of the decompiler.
    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Unsafe operations available in all states.
///
/// These bypass the stage ordering, and are intended for tests and tooling
/// that need to inject or tamper with intermediate results.
impl<S: State> Decompiler<S> {
    /// Gets a mutable reference to the contract being decompiled.
    ///
    /// # Safety
    ///
    /// Mutating the contract after summarization leaves the summary describing
    /// a different contract from the one that is verified against.
    pub unsafe fn contract_mut(&mut self) -> &mut Contract {
        &mut self.contract
    }

    /// Gets a mutable reference to the current state of the decompiler.
    ///
    /// # Safety
    ///
    /// Values in the state are derived from the contract and from each other.
    /// A mutation that breaks that relationship makes later stages report on
    /// something other than the contract.
    pub unsafe fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Sets the decompiler's contract instance to `contract`.
    ///
    /// # Safety
    ///
    /// The state keeps describing the previous contract.
    pub unsafe fn set_contract(&mut self, contract: Contract) {
        self.contract = contract;
    }

    /// Moves the decompiler into `new_state` without running a stage.
    ///
    /// # Safety
    ///
    /// `new_state` must hold what the stages up to `NS` would have produced
    /// for this contract.
    pub unsafe fn set_state<NS: State>(self, new_state: NS) -> Decompiler<NS> {
        Decompiler {
            contract: self.contract,
            state:    new_state,
        }
    }

    /// Moves the decompiler into the state that `transform` builds from the
    /// current one.
    ///
    /// # Safety
    ///
    /// As for [`Self::set_state`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the provided `transform` returns [`Err`].
    pub unsafe fn transform_state<NS: State>(
        self,
        transform: impl FnOnce(S) -> error::Result<NS>,
    ) -> error::Result<Decompiler<NS>> {
        let state = transform(self.state)?;
        let contract = self.contract;

        Ok(Decompiler { contract, state })
    }
}

/// The decompiler as returned by [`new`].
pub type InitialDecompiler = Decompiler<state::HasContract>;

/// Operations available on a newly-created decompiler.
impl Decompiler<state::HasContract> {
    /// Executes the decompilation process from beginning to end, performing
    /// all the intermediate steps automatically and returning the verified
    /// specification.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any step in the process fails.
    pub fn decompile(self) -> error::Result<Specification> {
        let decompiler = self.summarize();
        let decompiler = decompiler.assemble()?;
        let decompiler = decompiler.enrich();
        let decompiler = decompiler.verify()?;

        Ok(decompiler.state.specification)
    }

    /// Explores every entry point of the contract, keeping the successful
    /// paths through each.
    ///
    /// An entry point that cannot be summarised keeps its error in the
    /// summary, and is reported by the [`Decompiler::assemble`] step.
    #[allow(clippy::missing_panics_doc)] // Explicit closure can never return Err
    #[must_use]
    pub fn summarize(self) -> Decompiler<state::Summarized> {
        let summarizer = Summarizer::new(
            self.state.services.explorer.clone(),
            self.state.services.observer.clone(),
        );
        let summary = summarizer.summarize(&self.contract);
        unsafe {
            self.transform_state(|old_state| {
                let services = old_state.services;
                Ok(state::Summarized { summary, services })
            })
            .expect("Explicit closure cannot return Err")
        }
    }
}

/// Operations available on a decompiler that has summarized the contract.
impl Decompiler<state::Summarized> {
    /// Gets the summary of the contract's entry points.
    #[must_use]
    pub fn summary(&self) -> &ContractSummary {
        &self.state.summary
    }

    /// Assembles the summary without committing to the result, so that the
    /// behaviours of the supported entry points can be inspected even when
    /// others fail.
    #[must_use]
    pub fn assembly(&self) -> Assembly {
        self.assembler().assemble(&self.state.summary)
    }

    /// Assembles a specification for the whole contract from its summary.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] containing a located error for every entry point that
    /// could not be summarised or translated.
    pub fn assemble(self) -> error::Result<Decompiler<state::Assembled>> {
        let specification = self.assembly().into_specification()?;
        unsafe {
            self.transform_state(|old_state| {
                let summary = old_state.summary;
                let services = old_state.services;
                Ok(state::Assembled {
                    summary,
                    specification,
                    services,
                })
            })
        }
    }

    fn assembler(&self) -> Assembler {
        let services = &self.state.services;
        Assembler::new(services.config.translation.clone(), services.observer.clone())
    }
}

/// Operations available on a decompiler that has assembled a specification.
impl Decompiler<state::Assembled> {
    /// Gets the specification as assembled.
    #[must_use]
    pub fn specification(&self) -> &Specification {
        &self.state.specification
    }

    /// Makes the range facts implied by the types of the specification's
    /// inputs and storage explicit.
    #[allow(clippy::missing_panics_doc)] // Explicit closure can never return Err
    #[must_use]
    pub fn enrich(self) -> Decompiler<state::Enriched> {
        unsafe {
            self.transform_state(|old_state| {
                let summary = old_state.summary;
                let services = old_state.services;
                let enricher = Enricher::new(services.observer.clone());
                let specification = enricher.enrich(old_state.specification);
                Ok(state::Enriched {
                    summary,
                    specification,
                    services,
                })
            })
            .expect("Explicit closure cannot return Err")
        }
    }
}

/// Operations available on a decompiler with an enriched specification.
impl Decompiler<state::Enriched> {
    /// Gets the enriched specification.
    #[must_use]
    pub fn specification(&self) -> &Specification {
        &self.state.specification
    }

    /// Checks the enriched specification against the bytecode it was derived
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] containing a located error for every entry point whose
    /// behaviour the specification does not capture, or that could not be
    /// checked.
    pub fn verify(self) -> error::Result<Decompiler<state::Verified>> {
        let services = &self.state.services;
        let summarizer = Summarizer::new(services.explorer.clone(), services.observer.clone());
        let verifier = RoundTripVerifier::new(
            services.solver.clone(),
            summarizer,
            services.config.verification,
            services.observer.clone(),
        );
        let report =
            verifier.verify(&self.contract, &self.state.summary, &self.state.specification)?;
        unsafe {
            self.transform_state(|old_state| {
                let specification = old_state.specification;
                Ok(state::Verified {
                    specification,
                    report,
                })
            })
        }
    }
}

/// Operations available on a decompiler that has verified its specification.
impl Decompiler<state::Verified> {
    /// Gets the verified specification.
    #[must_use]
    pub fn specification(&self) -> &Specification {
        &self.state.specification
    }

    /// Gets what verification established about the specification.
    #[must_use]
    pub fn report(&self) -> &VerificationReport {
        &self.state.report
    }
}

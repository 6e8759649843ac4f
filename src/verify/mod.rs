//! This module contains the round-trip verifier, which checks a recovered
//! specification against the bytecode it was recovered from.
//!
//! The specification is compiled back into the symbolic domain by
//! [`compile`], producing one branch per behaviour. A [`Solver`] then decides
//! whether those branches and the branches found by exploring the bytecode
//! agree on every input that inhabits the declared types. Finally, the
//! runtime code is explored as a whole to check that no selector dispatches
//! to a successful path that no behaviour covers.

pub mod compile;
pub mod sampling;

use std::{
    collections::BTreeMap,
    fmt::{Debug, Display, Formatter},
    sync::Arc,
};

use derivative::Derivative;
use ethnum::U256;
use itertools::Itertools;

use crate::{
    constant::DEFAULT_CHECK_EXHAUSTIVENESS,
    contract::{
        abi::{Interface, Selector},
        Contract,
        EntryPoint,
    },
    error,
    error::verification::{Error, Result},
    layout::LayoutResolver,
    observer::{DynObserver, Event},
    spec::{
        expression::{BoolExp, IntExp},
        Specification,
    },
    summarizer::{ContractSummary, MethodSummary, Summarizer},
    verify::compile::Compiler,
    vm::{
        eval::Assignment,
        program::{Branch, TerminalState},
        storage::Storage,
        value::{EnvValue, Prop, Word},
    },
};

/// A dynamically dispatched [`Solver`] instance.
pub type DynSolver = Arc<dyn Solver>;

/// What an execution observably produces when it succeeds.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Outcome {
    /// The bytes returned.
    pub returned: Vec<u8>,

    /// The final contents of the entrypoint's storage, over every slot that
    /// either side mentions.
    pub storage: BTreeMap<U256, U256>,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let storage = self
            .storage
            .iter()
            .map(|(slot, value)| format!("storage[{slot}] = {value}"))
            .join(", ");
        write!(
            f,
            "succeeds returning 0x{} with {{{storage}}}",
            hex::encode(&self.returned)
        )
    }
}

/// An assignment under which the specification and the bytecode disagree.
///
/// An outcome of [`None`] means that no branch succeeds.
#[derive(Clone, Debug, Derivative)]
#[derivative(Eq, Hash, PartialEq)]
pub struct Counterexample {
    pub assignment: Assignment,

    /// The outcome according to the specification.
    pub expected: Option<Outcome>,

    /// The outcome according to the bytecode.
    pub actual: Option<Outcome>,

    /// The index of the sample that found the counterexample, if it was found
    /// by sampling.
    #[derivative(PartialEq = "ignore", Hash = "ignore")]
    pub sample: usize,
}

impl Display for Counterexample {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let describe = |outcome: &Option<Outcome>| match outcome {
            Some(outcome) => outcome.to_string(),
            None => "fails".to_string(),
        };
        write!(
            f,
            "under {} the specification {} but the bytecode {}",
            self.assignment,
            describe(&self.expected),
            describe(&self.actual)
        )
    }
}

/// The answer to an equivalence query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Equivalence {
    Equivalent,
    Counterexample(Counterexample),
}

impl Equivalence {
    #[must_use]
    pub fn is_equivalent(&self) -> bool {
        matches!(self, Self::Equivalent)
    }
}

/// The answer to an exhaustiveness query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Coverage {
    Covered,

    /// The selectors that reach a successful path without being covered, in
    /// ascending order.
    Missing(Vec<Selector>),
}

impl Coverage {
    /// Gets the selectors that are not covered.
    #[must_use]
    pub fn missing(&self) -> &[Selector] {
        match self {
            Self::Covered => &[],
            Self::Missing(selectors) => selectors,
        }
    }
}

/// The interface to a decision procedure over the symbolic domain.
///
/// Solving may block, and is the only operation in the pipeline besides
/// exploration that is allowed to. Implementations must be deterministic.
pub trait Solver
where
    Self: Debug + Send + Sync,
{
    /// Checks whether the `specification` branches and the `bytecode` branches
    /// produce the same outcome under every assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the solver fails to decide the query.
    fn check_equivalence(&self, specification: &[Branch], bytecode: &[Branch])
        -> Result<Equivalence>;

    /// Checks whether every selector under which a state of `runtime` is
    /// reachable, without reverting, is among `selectors`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the solver fails to decide the query.
    fn check_exhaustiveness(
        &self,
        selectors: &[Selector],
        runtime: &[TerminalState],
    ) -> Result<Coverage>;
}

/// The configuration for the verifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// Whether the runtime code is checked for selectors that no behaviour
    /// covers.
    ///
    /// Defaults to [`DEFAULT_CHECK_EXHAUSTIVENESS`].
    pub check_exhaustiveness: bool,
}

impl Config {
    /// Sets the `check_exhaustiveness` config parameter to `value`.
    #[must_use]
    pub fn with_check_exhaustiveness(mut self, value: bool) -> Self {
        self.check_exhaustiveness = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        let check_exhaustiveness = DEFAULT_CHECK_EXHAUSTIVENESS;
        Self {
            check_exhaustiveness,
        }
    }
}

/// What a successful verification established.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationReport {
    /// The entry points whose equivalence was checked, in order.
    pub checked: Vec<EntryPoint>,

    /// The outcome of the exhaustiveness check, if it was performed.
    pub coverage: Option<Coverage>,
}

/// Checks specifications against the bytecode of their contracts.
#[derive(Clone, Debug)]
pub struct RoundTripVerifier {
    solver:     DynSolver,
    summarizer: Summarizer,
    config:     Config,
    observer:   DynObserver,
}

impl RoundTripVerifier {
    /// Constructs a verifier that decides queries with `solver`, explores the
    /// runtime code with `summarizer`, and reports its progress to
    /// `observer`.
    #[must_use]
    pub fn new(
        solver: DynSolver,
        summarizer: Summarizer,
        config: Config,
        observer: DynObserver,
    ) -> Self {
        Self {
            solver,
            summarizer,
            config,
            observer,
        }
    }

    /// Verifies `specification` against `contract`, whose summary is
    /// `summary`.
    ///
    /// Both sides of every check assume that the calldata, the address-typed
    /// parts of the environment and, for methods, the pre-state of every
    /// resolvable storage item inhabit their declared types.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] containing a located error for every entry point at
    /// which the specification disagrees with the bytecode or could not be
    /// checked, and for any selector that no behaviour covers.
    pub fn verify(
        &self,
        contract: &Contract,
        summary: &ContractSummary,
        specification: &Specification,
    ) -> error::Result<VerificationReport> {
        let resolver = match LayoutResolver::new(summary.name.clone(), &summary.layout) {
            Ok(resolver) => resolver,
            Err(e) => {
                let mut errors = error::Errors::new();
                for entry in contract.entry_points() {
                    errors.add_located(entry, e.clone().into());
                }
                return Err(errors);
            }
        };

        let mut errors = error::Errors::new();
        let mut checked = Vec::new();

        match &summary.creation {
            Ok(creation) => {
                let result = self.verify_constructor(&resolver, contract, creation, specification);
                self.record(EntryPoint::Constructor, result, &mut checked, &mut errors);
            }
            Err(e) => errors.add_located(e.location.clone(), e.payload.clone()),
        }

        for (entry, method) in &summary.runtime {
            match method {
                Ok(method) => {
                    let result = self.verify_method(&resolver, method, specification);
                    self.record(entry.clone(), result, &mut checked, &mut errors);
                }
                Err(e) => errors.add_located(e.location.clone(), e.payload.clone()),
            }
        }

        let coverage = if self.config.check_exhaustiveness {
            match self.verify_exhaustiveness(contract, specification) {
                Ok(coverage) => Some(coverage),
                Err(e) => {
                    errors.add_located(EntryPoint::Runtime, e);
                    None
                }
            }
        } else {
            None
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(VerificationReport { checked, coverage })
    }

    /// Checks the constructor of `specification` against the successful
    /// `creation` paths of `contract`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the constructor cannot be compiled, if the solver
    /// fails, or if it finds a counterexample.
    pub fn verify_constructor(
        &self,
        resolver: &LayoutResolver,
        contract: &Contract,
        creation: &[Branch],
        specification: &Specification,
    ) -> Result<()> {
        let compiled =
            compile::constructor(resolver, &specification.constructor, &contract.runtime_code)?;
        let compiler = Compiler::new(resolver, Storage::empty());
        let assumptions = assumptions(&compiler, &contract.constructor, &[])?;

        self.check(&assumptions, &[compiled], creation)
    }

    /// Checks the behaviours of `specification` for the method described by
    /// `summary` against its explored branches.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any behaviour cannot be compiled, if the solver
    /// fails, or if it finds a counterexample.
    pub fn verify_method(
        &self,
        resolver: &LayoutResolver,
        summary: &MethodSummary,
        specification: &Specification,
    ) -> Result<()> {
        let method = &summary.method;
        let compiled = specification
            .behaviours_of(&method.signature())
            .into_iter()
            .map(|behaviour| compile::behaviour(resolver, behaviour))
            .collect::<Result<Vec<_>>>()?;

        let compiler = Compiler::new(resolver, Storage::Abstract);
        let storage = resolver
            .resolvable()
            .into_iter()
            .map(|(_, item)| BoolExp::in_range(item.typ.clone(), IntExp::pre(item)))
            .collect_vec();
        let mut assumptions = assumptions(&compiler, &method.interface, &storage)?;
        assumptions.push(Prop::eq_words(
            Word::Selector,
            Word::lit(method.selector().as_word()),
        ));

        self.check(&assumptions, &compiled, &summary.branches)
    }

    /// Explores the runtime code of `contract` as a whole and checks that
    /// every selector it dispatches to a successful path is that of some
    /// behaviour in `specification`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if exploration or the solver fails, or if some
    /// selector is not covered.
    pub fn verify_exhaustiveness(
        &self,
        contract: &Contract,
        specification: &Specification,
    ) -> std::result::Result<Coverage, error::Error> {
        let runtime = self.summarizer.explore_runtime(contract)?;
        let selectors = specification
            .behaviours
            .iter()
            .map(|b| b.interface.selector())
            .unique()
            .collect_vec();

        let coverage = self.solver.check_exhaustiveness(&selectors, &runtime)?;
        self.observer.observe(&Event::ExhaustivenessChecked {
            missing: coverage.missing().len(),
        });

        match coverage {
            Coverage::Missing(selectors) => Err(Error::MissingSelectors { selectors }.into()),
            Coverage::Covered => Ok(Coverage::Covered),
        }
    }

    fn check(
        &self,
        assumptions: &[Prop],
        specification: &[Branch],
        bytecode: &[Branch],
    ) -> Result<()> {
        let specification = assume(assumptions, specification);
        let bytecode = assume(assumptions, bytecode);

        match self.solver.check_equivalence(&specification, &bytecode)? {
            Equivalence::Equivalent => Ok(()),
            Equivalence::Counterexample(counterexample) => Err(Error::Counterexample {
                counterexample: Box::new(counterexample),
            }),
        }
    }

    fn record(
        &self,
        entry: EntryPoint,
        result: Result<()>,
        checked: &mut Vec<EntryPoint>,
        errors: &mut error::Errors,
    ) {
        if !matches!(result, Err(Error::Uncompilable { .. } | Error::LiteralOutOfRange { .. })) {
            self.observer.observe(&Event::EquivalenceChecked {
                entry:      entry.clone(),
                equivalent: result.is_ok(),
            });
        }
        match result {
            Ok(()) => checked.push(entry),
            Err(e) => errors.add_located(entry, e.into()),
        }
    }
}

/// Compiles the facts that every argument of `interface` and every
/// address-typed environment value inhabits its type, followed by the
/// `storage` facts.
fn assumptions(
    compiler: &Compiler,
    interface: &Interface,
    storage: &[BoolExp],
) -> Result<Vec<Prop>> {
    let arguments = interface.arguments.iter().filter_map(|a| {
        a.typ
            .integer_range()
            .map(|_| BoolExp::in_range(a.typ.clone(), IntExp::var(&a.name, a.typ.clone())))
    });
    let environment = EnvValue::ALL
        .into_iter()
        .map(|value| BoolExp::in_range(value.typ(), IntExp::env(value)));

    let facts = arguments
        .chain(environment)
        .chain(storage.iter().cloned())
        .collect_vec();
    compiler.conditions(&facts)
}

/// Prefixes the conditions of every one of `branches` with `assumptions`.
fn assume(assumptions: &[Prop], branches: &[Branch]) -> Vec<Branch> {
    branches
        .iter()
        .map(|branch| {
            let mut branch = branch.clone();
            branch.conditions.splice(0..0, assumptions.iter().cloned());
            branch
        })
        .collect()
}

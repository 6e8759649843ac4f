//! This module contains the summariser, which drives symbolic execution over
//! every entry point of a contract and collects the successful paths through
//! each of them.

use crate::{
    contract::{
        abi::{Argument, Interface, Method},
        Contract,
        EntryPoint,
    },
    error,
    error::{
        container::Locatable,
        summary::{Error, Result},
        LocatedError,
    },
    layout::StorageLayout,
    observer::{DynObserver, Event},
    vm::{
        explorer::{Calldata, DynExplorer},
        program::{Branch, TerminalState},
    },
};

/// The successful paths through one method.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodSummary {
    pub method:   Method,
    pub branches: Vec<Branch>,
}

/// The outcome of summarising every entry point of a contract.
///
/// Each entry point is summarised independently, so a failure at one of them
/// leaves the others available to later stages.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractSummary {
    /// The name of the contract.
    pub name: String,

    /// The storage layout of the contract.
    pub layout: StorageLayout,

    /// The interface of the constructor.
    pub constructor: Interface,

    /// The successful paths through the creation code.
    pub creation: std::result::Result<Vec<Branch>, LocatedError>,

    /// The summary of each method, in declaration order.
    pub runtime: Vec<(EntryPoint, std::result::Result<MethodSummary, LocatedError>)>,
}

impl ContractSummary {
    /// Gets the summary of the method with the provided `signature`, if it
    /// was summarised successfully.
    #[must_use]
    pub fn method(&self, signature: &str) -> Option<&MethodSummary> {
        self.runtime
            .iter()
            .filter_map(|(_, result)| result.as_ref().ok())
            .find(|m| m.method.signature() == signature)
    }

    /// Gets the errors from every entry point that failed to summarise.
    #[must_use]
    pub fn errors(&self) -> error::Errors {
        let mut errors = error::Errors::new();
        let failures = std::iter::once(self.creation.as_ref().err())
            .chain(self.runtime.iter().map(|(_, r)| r.as_ref().err()))
            .flatten()
            .cloned()
            .collect::<Vec<_>>();
        errors.add_many_located(failures);
        errors
    }
}

/// Summarises contracts by exploring their entry points with the provided
/// explorer.
///
/// Reverting paths are discarded, as specifications only describe successful
/// calls. Any path that was not fully explored causes its entry point to be
/// rejected.
#[derive(Clone, Debug)]
pub struct Summarizer {
    explorer: DynExplorer,
    observer: DynObserver,
}

impl Summarizer {
    /// Constructs a summariser that explores with `explorer` and reports its
    /// progress to `observer`.
    #[must_use]
    pub fn new(explorer: DynExplorer, observer: DynObserver) -> Self {
        Self { explorer, observer }
    }

    /// Summarises every entry point of `contract`, keeping the outcome for
    /// each of them.
    #[must_use]
    pub fn summarize(&self, contract: &Contract) -> ContractSummary {
        let creation = self
            .summarize_creation(contract)
            .map_err(error::Error::from)
            .locate(EntryPoint::Constructor);

        let runtime = contract
            .methods
            .iter()
            .map(|method| {
                let entry = EntryPoint::method(method);
                let result = self
                    .summarize_method(contract, method)
                    .map_err(error::Error::from)
                    .locate(entry.clone());
                (entry, result)
            })
            .collect();

        ContractSummary {
            name: contract.name.clone(),
            layout: contract.layout.clone(),
            constructor: contract.constructor.clone(),
            creation,
            runtime,
        }
    }

    /// Summarises the creation code of `contract`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the constructor takes unsupported arguments, if
    /// exploration fails, or if any path is not fully explored.
    pub fn summarize_creation(&self, contract: &Contract) -> Result<Vec<Branch>> {
        check_arguments(&contract.constructor.arguments)?;
        let calldata = Calldata::Creation {
            arguments: contract.constructor.arguments.clone(),
        };

        let states = self.explore(EntryPoint::Constructor, &contract.creation_code, &calldata)?;
        successes(states)
    }

    /// Summarises `method` in the runtime code of `contract`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the method takes unsupported arguments, if
    /// exploration fails, or if any path is not fully explored.
    pub fn summarize_method(&self, contract: &Contract, method: &Method) -> Result<MethodSummary> {
        check_arguments(&method.interface.arguments)?;
        let calldata = Calldata::Method {
            selector:  method.selector(),
            arguments: method.interface.arguments.clone(),
        };

        let states = self.explore(
            EntryPoint::method(method),
            &contract.runtime_code,
            &calldata,
        )?;
        let branches = successes(states)?;

        Ok(MethodSummary {
            method: method.clone(),
            branches,
        })
    }

    /// Explores the runtime code of `contract` with entirely unconstrained
    /// call data, returning every terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if exploration fails.
    pub fn explore_runtime(&self, contract: &Contract) -> Result<Vec<TerminalState>> {
        self.explore(
            EntryPoint::Runtime,
            &contract.runtime_code,
            &Calldata::Unconstrained,
        )
    }

    fn explore(
        &self,
        entry: EntryPoint,
        bytecode: &[u8],
        calldata: &Calldata,
    ) -> Result<Vec<TerminalState>> {
        self.observer.observe(&Event::ExplorationStarted {
            entry: entry.clone(),
        });

        let program = self.explorer.explore(bytecode, calldata)?;
        let states = self.explorer.flatten(program);

        let partial = states.iter().filter(|s| s.is_partial()).count();
        self.observer.observe(&Event::ExplorationFinished {
            entry,
            states: states.len(),
            partial,
        });

        Ok(states)
    }
}

/// Checks that every argument can be represented as a single symbolic word.
fn check_arguments(arguments: &[Argument]) -> Result<()> {
    for argument in arguments {
        let name = argument.name.clone();
        let typ = argument.typ.clone();
        if typ.is_dynamic() {
            return Err(Error::DynamicArgument { name, typ });
        }
        if typ.is_tuple() || typ.is_function() {
            return Err(Error::UnsupportedArgument { name, typ });
        }
    }

    Ok(())
}

/// Keeps the successful paths among `states` in order, failing if any path was
/// not fully explored.
fn successes(states: Vec<TerminalState>) -> Result<Vec<Branch>> {
    let partial: Vec<String> = states
        .iter()
        .filter(|s| s.is_partial())
        .map(TerminalState::describe)
        .collect();
    if !partial.is_empty() {
        return Err(Error::PartialExploration { branches: partial });
    }

    let branches = states
        .into_iter()
        .filter_map(|s| match s {
            TerminalState::Success(branch) => Some(branch),
            _ => None,
        })
        .collect();

    Ok(branches)
}

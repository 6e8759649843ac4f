//! This module contains the assembler, which turns the summary of a contract
//! into its structured specification.
//!
//! Each entry point is assembled independently of the others. The resulting
//! [`Assembly`] keeps the outcome for every entry point, so that the
//! behaviours of well-supported methods can be inspected even when other
//! entry points of the same contract are rejected.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    contract::{
        abi::{AbiType, Interface, Method},
        EntryPoint,
    },
    error,
    error::{assembly, container::Locatable, LocatedError},
    layout::{LayoutResolver, StorageLayout},
    observer::{DynObserver, Event},
    spec::{
        expression::{BoolExp, IntExp},
        Behaviour,
        Constructor,
        Specification,
        StorageDeclaration,
        StorageUpdate,
    },
    summarizer::{ContractSummary, MethodSummary},
    translate,
    translate::{canonical::canonicalize, Translator},
    vm::{
        buffer::read_word,
        program::{Address, Branch},
        storage::partition,
        value::Prop,
    },
};

/// The outcome of assembling every entry point of a contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assembly {
    /// The name of the contract.
    pub contract: String,

    /// The declared storage of the contract.
    pub storage: BTreeMap<String, BTreeMap<String, StorageDeclaration>>,

    /// The assembled constructor.
    pub constructor: Result<Constructor, LocatedError>,

    /// The behaviours assembled for each method, in declaration order.
    pub behaviours: Vec<(EntryPoint, Result<Vec<Behaviour>, LocatedError>)>,
}

impl Assembly {
    /// Gets the behaviours assembled for the method with the provided
    /// `signature`, if it was assembled successfully.
    #[must_use]
    pub fn behaviours_of(&self, signature: &str) -> Option<&[Behaviour]> {
        self.behaviours.iter().find_map(|(entry, result)| match (entry, result) {
            (EntryPoint::Method { signature: s }, Ok(behaviours)) if s == signature => {
                Some(behaviours.as_slice())
            }
            _ => None,
        })
    }

    /// Gets the errors from every entry point that failed to assemble.
    #[must_use]
    pub fn errors(&self) -> error::Errors {
        let mut errors = error::Errors::new();
        let failures = std::iter::once(self.constructor.as_ref().err())
            .chain(self.behaviours.iter().map(|(_, r)| r.as_ref().err()))
            .flatten()
            .cloned()
            .collect_vec();
        errors.add_many_located(failures);
        errors
    }

    /// Combines the assembled entry points into a specification.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] containing the errors of every entry point that failed
    /// to assemble, if any did.
    pub fn into_specification(self) -> error::Result<Specification> {
        let errors = self.errors();
        if !errors.is_empty() {
            return Err(errors);
        }

        let constructor = self.constructor.map_err(|e| error::Errors::from(vec![e]))?;
        let behaviours = self
            .behaviours
            .into_iter()
            .map(|(_, r)| r.map_err(|e| error::Errors::from(vec![e])))
            .collect::<error::Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        Ok(Specification {
            contract: self.contract,
            storage: self.storage,
            constructor,
            behaviours,
        })
    }
}

/// Assembles the summaries of contracts into specifications.
#[derive(Clone, Debug)]
pub struct Assembler {
    config:   translate::Config,
    observer: DynObserver,
}

impl Assembler {
    /// Constructs an assembler that translates according to `config` and
    /// reports its progress to `observer`.
    #[must_use]
    pub fn new(config: translate::Config, observer: DynObserver) -> Self {
        Self { config, observer }
    }

    /// Assembles every entry point of the contract described by `summary`.
    ///
    /// # Panics
    ///
    /// Panics if a successful branch carries no storage for the entrypoint
    /// contract, which the explorer guarantees never happens.
    #[must_use]
    pub fn assemble(&self, summary: &ContractSummary) -> Assembly {
        let resolver = LayoutResolver::new(summary.name.clone(), &summary.layout)
            .map_err(error::Error::from);

        // Entries that failed to summarise keep their summary error
        let constructor = match &summary.creation {
            Ok(_) => resolver
                .clone()
                .and_then(|resolver| self.assemble_constructor(&resolver, summary))
                .locate(EntryPoint::Constructor),
            Err(e) => Err(e.clone()),
        };
        self.report(&EntryPoint::Constructor, constructor.as_ref().map(|_| 1));

        let behaviours = summary
            .runtime
            .iter()
            .map(|(entry, method)| {
                let result = match method {
                    Ok(method) => resolver
                        .clone()
                        .and_then(|resolver| {
                            self.assemble_method(&resolver, &summary.name, method)
                        })
                        .locate(entry.clone()),
                    Err(e) => Err(e.clone()),
                };
                self.report(entry, result.as_ref().map(Vec::len));
                (entry.clone(), result)
            })
            .collect();

        Assembly {
            contract: summary.name.clone(),
            storage: declarations(&summary.name, &summary.layout),
            constructor,
            behaviours,
        }
    }

    /// Assembles the constructor of the contract described by `summary`.
    ///
    /// Every variable of the layout that can be resolved receives an initial
    /// value, which is zero unless the creation code writes it.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the creation code failed to summarise, if it does
    /// not have exactly one successful branch, or if that branch cannot be
    /// translated.
    ///
    /// # Panics
    ///
    /// Panics if the branch carries no storage for the entrypoint contract.
    pub fn assemble_constructor(
        &self,
        resolver: &LayoutResolver,
        summary: &ContractSummary,
    ) -> Result<Constructor, error::Error> {
        let creation = summary.creation.as_ref().map_err(|e| e.payload.clone())?;
        let [branch] = creation.as_slice() else {
            return Err(assembly::Error::CreationBranchCount {
                count: creation.len(),
            }
            .into());
        };

        let translator = Translator::new(resolver, &summary.constructor, &self.config.idioms);
        let preconditions = preconditions(&translator, &branch.conditions)?;
        let mut written: BTreeMap<String, IntExp> = storage_updates(&translator, resolver, branch)?
            .into_iter()
            .map(|u| (u.item.name, u.value))
            .collect();

        let initial_storage = resolver
            .resolvable()
            .into_iter()
            .map(|(_, item)| {
                let value = written.remove(&item.name).unwrap_or_else(|| IntExp::lit(0));
                StorageUpdate::new(item, value)
            })
            .collect();

        Ok(Constructor {
            contract: summary.name.clone(),
            interface: summary.constructor.clone(),
            preconditions,
            initial_storage,
        })
    }

    /// Assembles one behaviour for every successful branch of the method
    /// described by `summary`, in branch order.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the method's return type is unsupported, or if any
    /// branch cannot be translated.
    ///
    /// # Panics
    ///
    /// Panics if a branch carries no storage for the entrypoint contract.
    pub fn assemble_method(
        &self,
        resolver: &LayoutResolver,
        contract: &str,
        summary: &MethodSummary,
    ) -> Result<Vec<Behaviour>, error::Error> {
        let method = &summary.method;
        let returns_word = check_outputs(method)?;
        let interface = &method.interface;
        let translator = Translator::new(resolver, interface, &self.config.idioms);

        summary
            .branches
            .iter()
            .enumerate()
            .map(|(ix, branch)| {
                let preconditions = preconditions(&translator, &branch.conditions)?;
                let storage_updates = storage_updates(&translator, resolver, branch)?;
                let returns = if returns_word {
                    let word = read_word(&branch.returned, 0).ok_or_else(|| {
                        assembly::Error::UnsupportedReturnBuffer {
                            buffer: Box::new(branch.returned.clone()),
                        }
                    })?;
                    Some(translator.word(&word)?)
                } else {
                    None
                };

                Ok::<_, error::Error>(Behaviour {
                    name: interface.name.clone(),
                    contract: contract.to_string(),
                    interface: Interface::clone(interface),
                    branch: ix,
                    preconditions,
                    storage_updates,
                    returns,
                })
            })
            .collect()
    }

    fn report<T>(&self, entry: &EntryPoint, result: Result<usize, &T>)
    where
        T: std::fmt::Display,
    {
        let entry = entry.clone();
        let event = match result {
            Ok(behaviours) => Event::EntryAssembled { entry, behaviours },
            Err(e) => Event::EntryRejected {
                entry,
                reason: e.to_string(),
            },
        };
        self.observer.observe(&event);
    }
}

/// Builds the storage declarations of `contract` from its `layout`.
fn declarations(
    contract: &str,
    layout: &StorageLayout,
) -> BTreeMap<String, BTreeMap<String, StorageDeclaration>> {
    let variables = layout
        .variables()
        .iter()
        .map(|v| {
            let declaration = StorageDeclaration {
                typ:  v.typ.clone(),
                slot: v.slot,
            };
            (v.name.clone(), declaration)
        })
        .collect();

    BTreeMap::from([(contract.to_string(), variables)])
}

/// Checks whether `method` returns a single word, failing if its outputs are
/// unsupported.
fn check_outputs(method: &Method) -> Result<bool, assembly::Error> {
    match method.outputs.as_slice() {
        [] => Ok(false),
        [typ] if typ.is_dynamic() => Err(assembly::Error::DynamicReturn { typ: typ.clone() }),
        [typ] if typ.is_tuple() => Err(assembly::Error::TupleReturn { typ: typ.clone() }),
        [AbiType::Function] => Err(assembly::Error::FunctionReturn),
        [typ @ AbiType::Array { .. }] => Err(assembly::Error::ArrayReturn { typ: typ.clone() }),
        [_] => Ok(true),
        outputs => Err(assembly::Error::MultipleReturns {
            count: outputs.len(),
        }),
    }
}

/// Translates the path `conditions` into canonical preconditions, split into
/// their conjuncts with duplicates removed.
fn preconditions(
    translator: &Translator<'_>,
    conditions: &[Prop],
) -> Result<Vec<BoolExp>, error::Error> {
    let translated = conditions
        .iter()
        .map(|c| translator.prop(c).map(canonicalize))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(translated.into_iter().flat_map(BoolExp::conjuncts).unique().collect())
}

/// Translates the final storage of the entrypoint contract on `branch` into
/// updates ordered by slot.
///
/// # Panics
///
/// Panics if the branch carries no storage for the entrypoint contract.
fn storage_updates(
    translator: &Translator<'_>,
    resolver: &LayoutResolver,
    branch: &Branch,
) -> Result<Vec<StorageUpdate>, error::Error> {
    for (address, storage) in &branch.storage {
        if *address != Address::Entrypoint && storage.has_writes() {
            return Err(assembly::Error::ForeignStorageWrite {
                address: address.clone(),
            }
            .into());
        }
    }

    let Some(storage) = branch.entrypoint_storage() else {
        panic!("Successful branch has no storage for the entrypoint contract")
    };

    partition(storage)?
        .into_iter()
        .map(|(slot, value)| {
            let item = resolver.resolve(slot)?;
            let value = translator.word(&value)?;
            Ok::<_, error::Error>(StorageUpdate::new(item, value))
        })
        .collect()
}

//! This module contains the enricher, which makes the implicit numeric range
//! facts of a specification explicit.
//!
//! Every value that the EVM hands to a contract inhabits its declared type,
//! but nothing in the bytecode states this. The enricher adds these facts as
//! preconditions, so that the specification can be reasoned about over the
//! unbounded integers.

use itertools::Itertools;

use crate::{
    contract::{abi::Interface, EntryPoint},
    observer::{DynObserver, Event, NullObserver},
    spec::{
        expression::{BoolExp, IntExp, StorageItem},
        Specification,
    },
    vm::value::EnvValue,
};

/// Adds range facts to the preconditions of specifications.
///
/// For each entry point the following facts are appended, in this order:
///
/// - `inRange(t, x)` for every calldata argument `x` whose type `t` has an
///   integer range, in argument order.
/// - `inRange(t, e)` for every environment value `e` the entry point reads,
///   with `t` the fixed type of that value.
/// - `inRange(t, pre(s))` and `inRange(t, post(s))` for every storage item
///   `s` the entry point reads.
///
/// Facts that are already present are skipped, so enriching twice is the same
/// as enriching once. Nothing is ever removed.
#[derive(Clone, Debug)]
pub struct Enricher {
    observer: DynObserver,
}

impl Enricher {
    /// Constructs an enricher that reports its progress to `observer`.
    #[must_use]
    pub fn new(observer: DynObserver) -> Self {
        Self { observer }
    }

    /// Enriches `specification`, returning the result.
    #[must_use]
    pub fn enrich(&self, mut specification: Specification) -> Specification {
        self.enrich_in_place(&mut specification);
        specification
    }

    /// Enriches `specification` in place.
    pub fn enrich_in_place(&self, specification: &mut Specification) {
        let constructor = &mut specification.constructor;
        let mut reads = Vec::new();
        constructor.visit_reads(&mut |e| reads.push(e.clone()));
        let added = extend(&mut constructor.preconditions, &constructor.interface, &reads);
        self.report(EntryPoint::Constructor, added);

        for behaviour in &mut specification.behaviours {
            let mut reads = Vec::new();
            behaviour.visit_reads(&mut |e| reads.push(e.clone()));
            let added = extend(&mut behaviour.preconditions, &behaviour.interface, &reads);
            self.report(behaviour.entry_point(), added);
        }
    }

    fn report(&self, entry: EntryPoint, added: usize) {
        self.observer.observe(&Event::PreconditionsEnriched { entry, added });
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(NullObserver.in_arc())
    }
}

/// Enriches `specification` without reporting progress.
#[must_use]
pub fn enrich(specification: Specification) -> Specification {
    Enricher::default().enrich(specification)
}

/// Enriches `specification` in place without reporting progress.
pub fn enrich_in_place(specification: &mut Specification) {
    Enricher::default().enrich_in_place(specification);
}

/// Appends the range facts for an entry with `interface` that reads the
/// integer expressions in `reads` to `preconditions`, returning the number of
/// facts added.
fn extend(preconditions: &mut Vec<BoolExp>, interface: &Interface, reads: &[IntExp]) -> usize {
    let arguments = interface.arguments.iter().filter_map(|a| {
        a.typ
            .integer_range()
            .map(|_| BoolExp::in_range(a.typ.clone(), IntExp::var(&a.name, a.typ.clone())))
    });

    let environment = reads
        .iter()
        .filter_map(|e| match e {
            IntExp::Env { value } => Some(*value),
            _ => None,
        })
        .unique()
        .map(|value: EnvValue| BoolExp::in_range(value.typ(), IntExp::env(value)));

    let storage = reads
        .iter()
        .filter_map(|e| match e {
            IntExp::Entry { item, .. } => Some(item.clone()),
            _ => None,
        })
        .unique()
        .filter(|item: &StorageItem| item.typ.integer_range().is_some())
        .flat_map(|item| {
            [
                BoolExp::in_range(item.typ.clone(), IntExp::pre(item.clone())),
                BoolExp::in_range(item.typ.clone(), IntExp::post(item)),
            ]
        });

    let facts = arguments.chain(environment).chain(storage).collect_vec();

    let mut added = 0;
    for fact in facts {
        if !preconditions.contains(&fact) {
            preconditions.push(fact);
            added += 1;
        }
    }

    added
}

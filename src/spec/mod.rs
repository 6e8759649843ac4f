//! This module contains the structured specification recovered from the
//! bytecode of a contract.
//!
//! A [`Specification`] describes the storage a contract declares, what its
//! constructor establishes, and one [`Behaviour`] for every successful path
//! through every method. All expressions within it are written in the
//! language of [`expression`].

pub mod eval;
pub mod expression;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    contract::{abi::Interface, EntryPoint},
    layout::SlotType,
    spec::expression::{BoolExp, IntExp, StorageItem},
    utility::U256Wrapper,
};

/// The declaration of a single storage variable.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StorageDeclaration {
    #[serde(rename = "type")]
    pub typ:  SlotType,
    pub slot: U256Wrapper,
}

/// The assignment of a new `value` to a storage `item`.
///
/// The value is always expressed in terms of the pre-state.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StorageUpdate {
    pub item:  StorageItem,
    pub value: IntExp,
}

impl StorageUpdate {
    #[must_use]
    pub fn new(item: StorageItem, value: IntExp) -> Self {
        Self { item, value }
    }
}

/// What the creation code of a contract does.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Constructor {
    pub contract:        String,
    pub interface:       Interface,
    pub preconditions:   Vec<BoolExp>,
    pub initial_storage: Vec<StorageUpdate>,
}

/// One successful path through one method of a contract.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Behaviour {
    /// The name of the method.
    pub name: String,

    pub contract: String,

    pub interface: Interface,

    /// The index of the path among the successful paths of the method.
    pub branch: usize,

    /// The conditions under which the path is taken.
    pub preconditions: Vec<BoolExp>,

    /// The storage written on the path, ordered by slot.
    pub storage_updates: Vec<StorageUpdate>,

    /// The value returned on the path, if the method returns one.
    pub returns: Option<IntExp>,
}

impl Behaviour {
    /// Gets the entry point that the behaviour describes.
    #[must_use]
    pub fn entry_point(&self) -> EntryPoint {
        let signature = self.interface.signature();
        EntryPoint::Method { signature }
    }

    /// Calls `f` on every integer expression that the behaviour reads, which
    /// excludes the targets of its storage updates.
    pub fn visit_reads(&self, f: &mut dyn FnMut(&IntExp)) {
        self.preconditions.iter().for_each(|p| p.visit(f));
        self.storage_updates.iter().for_each(|u| u.value.visit(f));
        if let Some(returns) = &self.returns {
            returns.visit(f);
        }
    }
}

impl Constructor {
    /// Calls `f` on every integer expression that the constructor reads.
    pub fn visit_reads(&self, f: &mut dyn FnMut(&IntExp)) {
        self.preconditions.iter().for_each(|p| p.visit(f));
        self.initial_storage.iter().for_each(|u| u.value.visit(f));
    }
}

/// The specification of a contract.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Specification {
    /// The name of the contract.
    pub contract: String,

    /// The storage declared by each contract, by variable name.
    pub storage: BTreeMap<String, BTreeMap<String, StorageDeclaration>>,

    pub constructor: Constructor,

    /// Every behaviour of every method, grouped by method in declaration
    /// order.
    pub behaviours: Vec<Behaviour>,
}

impl Specification {
    /// Gets the behaviours of the method with the provided `signature`.
    #[must_use]
    pub fn behaviours_of(&self, signature: &str) -> Vec<&Behaviour> {
        self.behaviours
            .iter()
            .filter(|b| b.interface.signature() == signature)
            .collect()
    }

    /// Serialises the specification to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if serialisation fails.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

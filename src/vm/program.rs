//! This module contains the symbolic programs produced by exploration, and
//! the terminal states that they flatten into.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use ethnum::U256;

use crate::vm::{
    buffer::Buf,
    storage::Storage,
    value::{Prop, Word},
};

/// The address of a contract whose storage is observed during execution.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Address {
    /// The contract whose code is being executed.
    Entrypoint,

    /// Another contract at an address that is not known concretely.
    Symbolic { name: String },

    /// Another contract at the concrete address `value`.
    Concrete { value: U256 },
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entrypoint => write!(f, "the entrypoint contract"),
            Self::Symbolic { name } => write!(f, "symbolic address {name}"),
            Self::Concrete { value } => write!(f, "address 0x{}", hex::encode(value.to_be_bytes())),
        }
    }
}

/// A successfully explored path through the program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Branch {
    /// The conditions under which the path is taken, in order.
    pub conditions: Vec<Prop>,

    /// The bytes returned at the end of the path.
    pub returned: Buf,

    /// The final storage of each contract observed on the path.
    pub storage: BTreeMap<Address, Storage>,
}

impl Branch {
    /// Constructs a branch taken under `conditions` that returns `returned`
    /// and leaves the entrypoint contract's storage as `storage`.
    #[must_use]
    pub fn new(conditions: impl Into<Vec<Prop>>, returned: Buf, storage: Storage) -> Self {
        let conditions = conditions.into();
        let storage = BTreeMap::from([(Address::Entrypoint, storage)]);
        Self {
            conditions,
            returned,
            storage,
        }
    }

    /// Gets the final storage of the entrypoint contract, if it was observed.
    #[must_use]
    pub fn entrypoint_storage(&self) -> Option<&Storage> {
        self.storage.get(&Address::Entrypoint)
    }
}

/// The final state at the end of one explored path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TerminalState {
    /// The path ran to completion.
    Success(Branch),

    /// The path reverted, under `conditions`.
    Failure { conditions: Vec<Prop>, reason: String },

    /// The path was not fully explored, under `conditions`. This covers
    /// timeouts, loop bounds and unresolved external calls.
    Partial { conditions: Vec<Prop>, reason: String },
}

impl TerminalState {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }

    /// Gets the conditions under which the state is reached.
    #[must_use]
    pub fn conditions(&self) -> &[Prop] {
        match self {
            Self::Success(branch) => &branch.conditions,
            Self::Failure { conditions, .. } | Self::Partial { conditions, .. } => conditions,
        }
    }

    /// Prefixes the path conditions of the state with `prefix`.
    #[must_use]
    pub fn under(mut self, prefix: &[Prop]) -> Self {
        let conditions = match &mut self {
            Self::Success(branch) => &mut branch.conditions,
            Self::Failure { conditions, .. } | Self::Partial { conditions, .. } => conditions,
        };
        conditions.splice(0..0, prefix.iter().cloned());
        self
    }

    /// Produces a short human-readable description of the state.
    #[must_use]
    pub fn describe(&self) -> String {
        let count = self.conditions().len();
        match self {
            Self::Success(_) => format!("success under {count} conditions"),
            Self::Failure { reason, .. } => format!("revert ({reason}) under {count} conditions"),
            Self::Partial { reason, .. } => format!("partial ({reason}) under {count} conditions"),
        }
    }
}

/// A symbolic program, as a tree of branches on word conditions ending in
/// terminal states.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Program {
    End(TerminalState),

    Ite {
        condition: Word,
        then:      Box<Program>,
        otherwise: Box<Program>,
    },
}

impl Program {
    /// Flattens the program into its terminal states, in order, each carrying
    /// the conditions of the branches taken to reach it.
    ///
    /// The `then` side of a branch on `c` is taken under `c != 0` and the
    /// `otherwise` side under `c == 0`. Outer conditions precede the
    /// conditions already present on the terminal state.
    #[must_use]
    pub fn flatten(self) -> Vec<TerminalState> {
        let mut states = Vec::new();
        flatten_into(self, &mut Vec::new(), &mut states);
        states
    }
}

fn flatten_into(program: Program, path: &mut Vec<Prop>, states: &mut Vec<TerminalState>) {
    match program {
        Program::End(state) => states.push(state.under(path)),
        Program::Ite {
            condition,
            then,
            otherwise,
        } => {
            let is_zero = Prop::eq_words(condition, Word::lit(0u8));

            path.push(Prop::negate(is_zero.clone()));
            flatten_into(*then, path, states);
            path.pop();

            path.push(is_zero);
            flatten_into(*otherwise, path, states);
            path.pop();
        }
    }
}

#[cfg(test)]
mod test {
    use crate::vm::{
        buffer::Buf,
        program::{Branch, Program, TerminalState},
        storage::Storage,
        value::{Prop, Word},
    };

    #[test]
    fn flattening_prefixes_branch_conditions() {
        let inner = Prop::lt(Word::var("a"), Word::lit(10u8));
        let program = Program::Ite {
            condition: Word::var("c"),
            then:      Box::new(Program::End(TerminalState::Success(Branch::new(
                vec![inner.clone()],
                Buf::empty(),
                Storage::Abstract,
            )))),
            otherwise: Box::new(Program::End(TerminalState::Failure {
                conditions: vec![],
                reason:     "revert".into(),
            })),
        };

        let states = program.flatten();
        assert_eq!(states.len(), 2);
        let is_zero = Prop::eq_words(Word::var("c"), Word::lit(0u8));
        assert_eq!(
            states[0].conditions(),
            &[Prop::negate(is_zero.clone()), inner]
        );
        assert!(states[0].is_success());
        assert_eq!(states[1].conditions(), &[is_zero]);
        assert!(!states[1].is_success());
        assert!(!states[1].is_partial());
    }

    #[test]
    fn describes_partial_states() {
        let state = TerminalState::Partial {
            conditions: vec![Prop::Bool(true)],
            reason:     "loop bound".into(),
        };
        assert!(state.is_partial());
        assert_eq!(state.describe(), "partial (loop bound) under 1 conditions");
    }
}

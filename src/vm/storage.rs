//! This module contains the representation of symbolic storage, and the
//! partitioning of a storage tree into its distinct final writes.

use std::collections::BTreeMap;

use ethnum::U256;

use crate::{
    error::storage::{Error, Result},
    vm::value::Word,
};

/// A symbolic storage tree for a single contract.
///
/// A tree is a base store overlaid by a chain of writes, with the most recent
/// write at the root.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Storage {
    /// The unknown storage that the contract had before execution began.
    Abstract,

    /// Fully concrete storage, where slots that are not mentioned hold zero.
    Concrete { slots: BTreeMap<U256, U256> },

    /// The write of `value` to `key`, performed after all writes in `prior`.
    Write {
        key:   Word,
        value: Word,
        prior: Box<Storage>,
    },
}

impl Storage {
    /// Constructs empty concrete storage.
    #[must_use]
    pub fn empty() -> Self {
        Self::Concrete {
            slots: BTreeMap::new(),
        }
    }

    /// Writes `value` to `key` on top of `self`.
    #[must_use]
    pub fn write(self, key: Word, value: Word) -> Self {
        Self::Write {
            key,
            value,
            prior: Box::new(self),
        }
    }

    /// Checks if the tree contains any writes, including non-empty concrete
    /// contents.
    #[must_use]
    pub fn has_writes(&self) -> bool {
        match self {
            Self::Abstract => false,
            Self::Concrete { slots } => !slots.is_empty(),
            Self::Write { .. } => true,
        }
    }
}

/// Partitions a storage tree into a mapping from each concrete slot that was
/// written to its final value.
///
/// The tree is folded from the root toward the base, and a slot that has
/// already been seen is never overwritten by an older write. A concrete base
/// is merged under the same rule, while an abstract base ends the fold, so
/// slots that are absent from the result are unchanged from the pre-state.
///
/// # Errors
///
/// Returns [`Err`] if any write in the chain has a symbolic key, as they
/// cannot be proven distinct from the other writes.
pub fn partition(storage: &Storage) -> Result<BTreeMap<U256, Word>> {
    let mut writes = BTreeMap::new();
    let mut current = storage;

    loop {
        match current {
            Storage::Abstract => break,
            Storage::Concrete { slots } => {
                for (slot, value) in slots {
                    writes.entry(*slot).or_insert_with(|| Word::lit(*value));
                }
                break;
            }
            Storage::Write { key, value, prior } => {
                let Some(slot) = key.as_lit() else {
                    return Err(Error::SymbolicKey {
                        key: Box::new(key.clone()),
                    });
                };
                writes.entry(slot).or_insert_with(|| value.clone());
                current = prior;
            }
        }
    }

    Ok(writes)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use ethnum::U256;

    use crate::{
        error::storage::Error,
        vm::{
            storage::{partition, Storage},
            value::Word,
        },
    };

    #[test]
    fn most_recent_write_wins() -> anyhow::Result<()> {
        let storage = Storage::Abstract
            .write(Word::lit(1u8), Word::var("a"))
            .write(Word::lit(1u8), Word::var("b"))
            .write(Word::lit(2u8), Word::var("c"));

        let writes = partition(&storage)?;
        let expected = BTreeMap::from([
            (U256::ONE, Word::var("b")),
            (U256::from(2u8), Word::var("c")),
        ]);
        assert_eq!(writes, expected);

        Ok(())
    }

    #[test]
    fn merges_concrete_bases_without_overwriting() -> anyhow::Result<()> {
        let base = Storage::Concrete {
            slots: BTreeMap::from([(U256::ZERO, U256::from(7u8)), (U256::ONE, U256::from(8u8))]),
        };
        let storage = base.write(Word::lit(0u8), Word::var("v"));

        let writes = partition(&storage)?;
        assert_eq!(writes.get(&U256::ZERO), Some(&Word::var("v")));
        assert_eq!(writes.get(&U256::ONE), Some(&Word::lit(8u8)));

        Ok(())
    }

    #[test]
    fn abstract_bases_contribute_nothing() -> anyhow::Result<()> {
        assert!(partition(&Storage::Abstract)?.is_empty());
        assert!(!Storage::Abstract.has_writes());
        assert!(!Storage::empty().has_writes());

        Ok(())
    }

    #[test]
    fn rejects_symbolic_keys_anywhere_in_the_chain() {
        let storage = Storage::Abstract
            .write(Word::var("k"), Word::lit(1u8))
            .write(Word::lit(0u8), Word::lit(2u8));

        assert_eq!(
            partition(&storage),
            Err(Error::SymbolicKey {
                key: Box::new(Word::var("k")),
            })
        );
    }
}

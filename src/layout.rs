//! This module contains the definitions for the storage layout reported by the
//! compiler, and the resolver that maps concrete slots back onto the variables
//! declared in it.

use bimap::BiMap;
use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::{
    contract::abi::AbiType,
    error::storage::{Error, Result},
    spec::expression::StorageItem,
    utility::U256Wrapper,
};

/// The type of the data held at a declared storage position.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    /// A value of type `typ` stored directly in the slot.
    Value {
        #[serde(rename = "type")]
        typ: AbiType,
    },

    /// A (possibly nested) mapping from `keys` to `value`, whose entries live
    /// at hashed locations derived from the slot.
    Mapping { keys: Vec<AbiType>, value: AbiType },
}

/// A variable declared in the storage layout.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StorageVariable {
    /// The declared name of the variable.
    pub name: String,

    /// The concrete index of the storage slot that holds the variable.
    pub slot: U256Wrapper,

    /// The byte offset at which the variable starts within the storage slot.
    ///
    /// This will be 0 except in the case of packed encodings.
    pub offset: usize,

    #[serde(rename = "type")]
    pub typ: SlotType,
}

impl StorageVariable {
    /// Constructs a new storage variable called `name` of type `typ` at the
    /// provided `slot` and `offset`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        slot: impl Into<U256Wrapper>,
        offset: usize,
        typ: SlotType,
    ) -> Self {
        let name = name.into();
        let slot = slot.into();
        Self {
            name,
            slot,
            offset,
            typ,
        }
    }

    /// Constructs a new variable holding a value of type `typ` directly at
    /// offset zero in `slot`.
    #[must_use]
    pub fn value(name: impl Into<String>, slot: impl Into<U256Wrapper>, typ: AbiType) -> Self {
        Self::new(name, slot, 0, SlotType::Value { typ })
    }
}

/// The compiler-reported layout of the storage of a contract.
///
/// Variables are kept in the order in which they were declared.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StorageLayout {
    variables: Vec<StorageVariable>,
}

impl StorageLayout {
    /// Constructs a layout from the provided `variables` in declaration order.
    #[must_use]
    pub fn new(variables: impl Into<Vec<StorageVariable>>) -> Self {
        let variables = variables.into();
        Self { variables }
    }

    /// Adds `variable` to the end of the storage layout.
    pub fn add(&mut self, variable: StorageVariable) {
        self.variables.push(variable);
    }

    /// Gets the variables that make up this layout, in declaration order.
    #[must_use]
    pub fn variables(&self) -> &[StorageVariable] {
        &self.variables
    }

    /// Gets the variable called `name`, if it exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StorageVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Checks if the storage layout is empty (has no variables).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// The inversion of a [`StorageLayout`], resolving concrete slots to the named
/// and typed storage items of a contract.
///
/// Only variables that occupy a whole slot at offset zero with an elementary
/// value type can be resolved. Mappings and packed slots are rejected.
#[derive(Clone, Debug)]
pub struct LayoutResolver {
    /// The contract whose storage is being resolved.
    contract: String,

    /// The declared layout, in declaration order.
    layout: StorageLayout,

    /// The bidirectional mapping between variable names and their
    /// `(slot, offset)` positions.
    positions: BiMap<String, (U256Wrapper, usize)>,
}

impl LayoutResolver {
    /// Constructs a resolver for the storage of `contract` as declared by
    /// `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if two variables share a name or a position.
    pub fn new(contract: impl Into<String>, layout: &StorageLayout) -> Result<Self> {
        let contract = contract.into();
        let mut positions = BiMap::new();

        for variable in layout.variables() {
            let position = (variable.slot, variable.offset);
            if let Some(existing) = positions.get_by_right(&position) {
                return Err(Error::OverlappingVariables {
                    first:  String::clone(existing),
                    second: variable.name.clone(),
                });
            }
            if positions.contains_left(&variable.name) {
                return Err(Error::OverlappingVariables {
                    first:  variable.name.clone(),
                    second: variable.name.clone(),
                });
            }
            positions.insert(variable.name.clone(), position);
        }

        let layout = layout.clone();
        Ok(Self {
            contract,
            layout,
            positions,
        })
    }

    /// Gets the name of the contract whose storage is resolved.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Gets the layout being resolved.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Resolves the storage item held in `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no variable is declared at `slot`, if the slot is
    /// packed, if it holds a mapping, or if the variable's type is not an
    /// elementary value type.
    pub fn resolve(&self, slot: U256) -> Result<StorageItem> {
        let mut names: Vec<&String> = self
            .positions
            .iter()
            .filter(|(_, (s, _))| s.0 == slot)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        let slot = U256Wrapper(slot);
        let name = match names.as_slice() {
            [] => return Err(Error::UnknownSlot { slot }),
            [name] if self.positions.get_by_left(*name) == Some(&(slot, 0)) => *name,
            _ => {
                let names = names.iter().map(|n| String::clone(n)).collect();
                return Err(Error::PackedSlot { slot, names });
            }
        };

        let variable = self.layout.get(name).ok_or_else(|| Error::UnknownSlot { slot })?;
        match &variable.typ {
            SlotType::Mapping { .. } => Err(Error::MappingSlot {
                slot,
                name: name.clone(),
            }),
            SlotType::Value { typ } if typ.is_elementary() => Ok(StorageItem::new(
                self.contract.clone(),
                name.clone(),
                typ.clone(),
            )),
            SlotType::Value { typ } => Err(Error::UnsupportedSlotType {
                name: name.clone(),
                typ:  typ.clone(),
            }),
        }
    }

    /// Gets the slot holding the variable called `name`, if it is declared.
    #[must_use]
    pub fn slot_of(&self, name: &str) -> Option<U256> {
        self.positions.get_by_left(name).map(|(slot, _)| slot.0)
    }

    /// Gets every storage item that can be resolved, in declaration order.
    #[must_use]
    pub fn resolvable(&self) -> Vec<(U256, StorageItem)> {
        self.layout
            .variables()
            .iter()
            .filter_map(|v| self.resolve(v.slot.0).ok().map(|item| (v.slot.0, item)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::{
        contract::abi::AbiType,
        error::storage::Error,
        layout::{LayoutResolver, SlotType, StorageLayout, StorageVariable},
        utility::U256Wrapper,
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    fn layout() -> StorageLayout {
        StorageLayout::new(vec![
            StorageVariable::value("x", 0usize, uint256()),
            StorageVariable::value("owner", 1usize, AbiType::Address),
            StorageVariable::new("flag", 1usize, 20, SlotType::Value { typ: AbiType::Bool }),
            StorageVariable::new(
                "balances",
                2usize,
                0,
                SlotType::Mapping {
                    keys:  vec![AbiType::Address],
                    value: uint256(),
                },
            ),
            StorageVariable::value("name", 3usize, AbiType::String),
            StorageVariable::new("late", 4usize, 16, SlotType::Value { typ: uint256() }),
        ])
    }

    #[test]
    fn resolves_whole_slot_values() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &layout())?;
        let item = resolver.resolve(U256::ZERO)?;
        assert_eq!(item.contract, "C");
        assert_eq!(item.name, "x");
        assert_eq!(item.typ, uint256());
        assert_eq!(resolver.slot_of("owner"), Some(U256::ONE));

        Ok(())
    }

    #[test]
    fn rejects_unsupported_slots() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &layout())?;
        assert_eq!(
            resolver.resolve(U256::from(9u8)),
            Err(Error::UnknownSlot {
                slot: U256Wrapper::from(9usize),
            })
        );
        assert_eq!(
            resolver.resolve(U256::ONE),
            Err(Error::PackedSlot {
                slot:  U256Wrapper::from(1usize),
                names: vec!["flag".into(), "owner".into()],
            })
        );
        assert!(matches!(
            resolver.resolve(U256::from(2u8)),
            Err(Error::MappingSlot { .. })
        ));
        assert!(matches!(
            resolver.resolve(U256::from(3u8)),
            Err(Error::UnsupportedSlotType { .. })
        ));
        assert!(matches!(
            resolver.resolve(U256::from(4u8)),
            Err(Error::PackedSlot { .. })
        ));

        Ok(())
    }

    #[test]
    fn lists_resolvable_items_in_declaration_order() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &layout())?;
        let names: Vec<_> = resolver.resolvable().into_iter().map(|(_, i)| i.name).collect();
        assert_eq!(names, vec!["x".to_string()]);

        Ok(())
    }

    #[test]
    fn rejects_overlapping_declarations() {
        let layout = StorageLayout::new(vec![
            StorageVariable::value("a", 0usize, uint256()),
            StorageVariable::value("b", 0usize, uint256()),
        ]);
        assert_eq!(
            LayoutResolver::new("C", &layout).map(|_| ()),
            Err(Error::OverlappingVariables {
                first:  "a".into(),
                second: "b".into(),
            })
        );
    }
}

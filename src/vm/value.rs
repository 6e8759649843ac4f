//! This module contains the grammar of symbolic terms produced by the
//! symbolic-execution engine for the terminal states of a program.
//!
//! Terms come in three families. [`Word`]s are 256-bit machine values,
//! [`Prop`]s are propositions over them, and [`Term`] allows propositions to
//! compare whole buffers or storage trees.

use std::fmt::{Display, Formatter};

use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::{
    contract::abi::AbiType,
    vm::{buffer::Buf, storage::Storage},
};

/// A boxed [`Word`].
pub type BoxedWord = Box<Word>;

/// A symbolic 256-bit machine word.
///
/// Arithmetic wraps modulo `2^256`, and comparisons produce `0` or `1`, as
/// they do on the EVM.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Word {
    /// A concrete value.
    Lit { value: U256 },

    /// A symbolic calldata variable, named after the ABI argument it decodes.
    Var { name: String },

    /// A value read from the execution environment.
    Env { value: EnvValue },

    /// The selector prefix of the call data.
    Selector,

    Add { left: BoxedWord, right: BoxedWord },
    Sub { left: BoxedWord, right: BoxedWord },
    Mul { left: BoxedWord, right: BoxedWord },
    Div { dividend: BoxedWord, divisor: BoxedWord },
    Mod { dividend: BoxedWord, divisor: BoxedWord },
    Exp { base: BoxedWord, exponent: BoxedWord },

    /// Sign extension of `value` from the low `bytes + 1` bytes.
    SignExtend { bytes: BoxedWord, value: BoxedWord },

    Lt { left: BoxedWord, right: BoxedWord },
    Gt { left: BoxedWord, right: BoxedWord },
    LEq { left: BoxedWord, right: BoxedWord },
    GEq { left: BoxedWord, right: BoxedWord },
    Eq { left: BoxedWord, right: BoxedWord },
    IsZero { number: BoxedWord },

    And { left: BoxedWord, right: BoxedWord },
    Or { left: BoxedWord, right: BoxedWord },
    Xor { left: BoxedWord, right: BoxedWord },
    Not { value: BoxedWord },

    /// A word-valued conditional, selecting `then` when `condition` is
    /// non-zero.
    Ite {
        condition: BoxedWord,
        then:      BoxedWord,
        otherwise: BoxedWord,
    },

    /// A read of the slot `key` from the provided `storage` tree.
    SLoad { key: BoxedWord, storage: Box<Storage> },

    /// The keccak hash of the contents of `data`.
    Keccak { data: Box<Buf> },
}

impl Word {
    #[must_use]
    pub fn lit(value: impl Into<U256>) -> Self {
        let value = value.into();
        Self::Lit { value }
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Var { name }
    }

    #[must_use]
    pub fn env(value: EnvValue) -> Self {
        Self::Env { value }
    }

    /// The all-ones word, `2^256 - 1`.
    #[must_use]
    pub fn max() -> Self {
        Self::lit(U256::MAX)
    }

    #[must_use]
    pub fn plus(left: Word, right: Word) -> Self {
        Self::Add {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn minus(left: Word, right: Word) -> Self {
        Self::Sub {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn times(left: Word, right: Word) -> Self {
        Self::Mul {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn divide(dividend: Word, divisor: Word) -> Self {
        Self::Div {
            dividend: Box::new(dividend),
            divisor:  Box::new(divisor),
        }
    }

    #[must_use]
    pub fn less_than(left: Word, right: Word) -> Self {
        Self::Lt {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn equals(left: Word, right: Word) -> Self {
        Self::Eq {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn is_zero(number: Word) -> Self {
        Self::IsZero {
            number: Box::new(number),
        }
    }

    #[must_use]
    pub fn bit_and(left: Word, right: Word) -> Self {
        Self::And {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn bit_or(left: Word, right: Word) -> Self {
        Self::Or {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn bit_xor(left: Word, right: Word) -> Self {
        Self::Xor {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn ite(condition: Word, then: Word, otherwise: Word) -> Self {
        Self::Ite {
            condition: Box::new(condition),
            then:      Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    #[must_use]
    pub fn sload(key: Word, storage: Storage) -> Self {
        Self::SLoad {
            key:     Box::new(key),
            storage: Box::new(storage),
        }
    }

    /// Gets the concrete value of the word if it is a literal.
    #[must_use]
    pub fn as_lit(&self) -> Option<U256> {
        match self {
            Self::Lit { value } => Some(*value),
            _ => None,
        }
    }

    /// Checks if the word is the literal `value`.
    #[must_use]
    pub fn is_lit(&self, value: U256) -> bool {
        self.as_lit() == Some(value)
    }
}

impl From<U256> for Word {
    fn from(value: U256) -> Self {
        Self::Lit { value }
    }
}

/// A proposition over symbolic terms.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Prop {
    Bool(bool),

    /// Equality between two terms, which need not be words.
    Eq { left: Term, right: Term },

    Lt { left: Word, right: Word },
    Gt { left: Word, right: Word },
    LEq { left: Word, right: Word },
    GEq { left: Word, right: Word },

    Neg(Box<Prop>),
    And { left: Box<Prop>, right: Box<Prop> },
    Or { left: Box<Prop>, right: Box<Prop> },
    Impl { antecedent: Box<Prop>, consequent: Box<Prop> },
}

impl Prop {
    /// Constructs the proposition that the words `left` and `right` are equal.
    #[must_use]
    pub fn eq_words(left: Word, right: Word) -> Self {
        Self::Eq {
            left:  Term::Word(left),
            right: Term::Word(right),
        }
    }

    #[must_use]
    pub fn lt(left: Word, right: Word) -> Self {
        Self::Lt { left, right }
    }

    #[must_use]
    pub fn negate(prop: Prop) -> Self {
        Self::Neg(Box::new(prop))
    }

    #[must_use]
    pub fn conj(left: Prop, right: Prop) -> Self {
        Self::And {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn disj(left: Prop, right: Prop) -> Self {
        Self::Or {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn implies(antecedent: Prop, consequent: Prop) -> Self {
        Self::Impl {
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }
}

/// A term that may appear on either side of a [`Prop::Eq`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Term {
    Word(Word),
    Buf(Buf),
    Storage(Storage),
}

/// A value provided to the contract by the execution environment.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EnvValue {
    Caller,
    CallValue,
    Origin,
    This,
    Coinbase,
    Timestamp,
    BlockNumber,
    ChainId,
    GasLimit,
    PrevRandao,
    BaseFee,
    GasPrice,
}

impl EnvValue {
    /// Every environment value, in a fixed order.
    pub const ALL: [EnvValue; 12] = [
        Self::Caller,
        Self::CallValue,
        Self::Origin,
        Self::This,
        Self::Coinbase,
        Self::Timestamp,
        Self::BlockNumber,
        Self::ChainId,
        Self::GasLimit,
        Self::PrevRandao,
        Self::BaseFee,
        Self::GasPrice,
    ];

    /// Gets the ABI type of the environment value.
    #[must_use]
    pub fn typ(self) -> AbiType {
        match self {
            Self::Caller | Self::Origin | Self::This | Self::Coinbase => AbiType::Address,
            _ => AbiType::UInt { size: 256 },
        }
    }
}

impl Display for EnvValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Caller => "CALLER",
            Self::CallValue => "CALLVALUE",
            Self::Origin => "ORIGIN",
            Self::This => "THIS",
            Self::Coinbase => "COINBASE",
            Self::Timestamp => "TIMESTAMP",
            Self::BlockNumber => "NUMBER",
            Self::ChainId => "CHAINID",
            Self::GasLimit => "GASLIMIT",
            Self::PrevRandao => "PREVRANDAO",
            Self::BaseFee => "BASEFEE",
            Self::GasPrice => "GASPRICE",
        };
        write!(f, "{name}")
    }
}

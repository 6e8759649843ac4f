//! Concrete evaluation of symbolic terms under an assignment of their free
//! variables, following the EVM's word semantics.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use ethnum::U256;
use itertools::Itertools;
use sha3::{Digest, Keccak256};

use crate::{
    constant::{MAXIMUM_BUFFER_OFFSET_BYTES, WORD_SIZE_BYTES},
    contract::abi::Selector,
    error::verification::{Error, Result},
    utility::{low_bits_mask, word_to_offset},
    vm::{
        buffer::Buf,
        storage::Storage,
        value::{EnvValue, Prop, Term, Word},
    },
};

/// Concrete values for everything that a symbolic term may depend upon.
///
/// Anything not mentioned in the assignment is zero.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Assignment {
    /// The values of the calldata variables.
    pub variables: BTreeMap<String, U256>,

    /// The values of the environment.
    pub environment: BTreeMap<EnvValue, U256>,

    /// The selector prefix of the call data.
    pub selector: U256,

    /// The contents of the abstract pre-state storage of the entrypoint.
    pub storage: BTreeMap<U256, U256>,
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let variables = self.variables.iter().map(|(n, v)| format!("{n} = {v}"));
        let environment = self.environment.iter().map(|(e, v)| format!("{e} = {v}"));
        let storage = self.storage.iter().map(|(s, v)| format!("storage[{s}] = {v}"));
        let selector = std::iter::once(format!("selector = {}", Selector::from_word(self.selector)));

        write!(
            f,
            "{{{}}}",
            variables.chain(environment).chain(selector).chain(storage).join(", ")
        )
    }
}

/// Evaluates `word` under `assignment`.
///
/// # Errors
///
/// Returns [`Err`] if the word hashes a buffer that cannot be made concrete.
pub fn word(word: &Word, assignment: &Assignment) -> Result<U256> {
    let bool_word = |b: bool| if b { U256::ONE } else { U256::ZERO };
    let value = match word {
        Word::Lit { value } => *value,
        Word::Var { name } => assignment.variables.get(name).copied().unwrap_or_default(),
        Word::Env { value } => assignment.environment.get(value).copied().unwrap_or_default(),
        Word::Selector => assignment.selector,
        Word::Add { left, right } => {
            self::word(left, assignment)?.wrapping_add(self::word(right, assignment)?)
        }
        Word::Sub { left, right } => {
            self::word(left, assignment)?.wrapping_sub(self::word(right, assignment)?)
        }
        Word::Mul { left, right } => {
            self::word(left, assignment)?.wrapping_mul(self::word(right, assignment)?)
        }
        Word::Div { dividend, divisor } => self::word(dividend, assignment)?
            .checked_div(self::word(divisor, assignment)?)
            .unwrap_or_default(),
        Word::Mod { dividend, divisor } => self::word(dividend, assignment)?
            .checked_rem(self::word(divisor, assignment)?)
            .unwrap_or_default(),
        Word::Exp { base, exponent } => power(
            self::word(base, assignment)?,
            self::word(exponent, assignment)?,
        ),
        Word::SignExtend { bytes, value } => sign_extend(
            self::word(bytes, assignment)?,
            self::word(value, assignment)?,
        ),
        Word::Lt { left, right } => {
            bool_word(self::word(left, assignment)? < self::word(right, assignment)?)
        }
        Word::Gt { left, right } => {
            bool_word(self::word(left, assignment)? > self::word(right, assignment)?)
        }
        Word::LEq { left, right } => {
            bool_word(self::word(left, assignment)? <= self::word(right, assignment)?)
        }
        Word::GEq { left, right } => {
            bool_word(self::word(left, assignment)? >= self::word(right, assignment)?)
        }
        Word::Eq { left, right } => {
            bool_word(self::word(left, assignment)? == self::word(right, assignment)?)
        }
        Word::IsZero { number } => bool_word(self::word(number, assignment)? == U256::ZERO),
        Word::And { left, right } => self::word(left, assignment)? & self::word(right, assignment)?,
        Word::Or { left, right } => self::word(left, assignment)? | self::word(right, assignment)?,
        Word::Xor { left, right } => self::word(left, assignment)? ^ self::word(right, assignment)?,
        Word::Not { value } => !self::word(value, assignment)?,
        Word::Ite {
            condition,
            then,
            otherwise,
        } => {
            if self::word(condition, assignment)? == U256::ZERO {
                self::word(otherwise, assignment)?
            } else {
                self::word(then, assignment)?
            }
        }
        Word::SLoad { key, storage } => {
            let key = self::word(key, assignment)?;
            slot(storage, key, assignment)?
        }
        Word::Keccak { data } => {
            let bytes = buffer(data, assignment)?;
            let mut hasher = Keccak256::new();
            hasher.update(&bytes);
            let mut hash = [0u8; WORD_SIZE_BYTES];
            hash.copy_from_slice(&hasher.finalize());
            U256::from_be_bytes(hash)
        }
    };

    Ok(value)
}

/// Evaluates `prop` under `assignment`.
///
/// # Errors
///
/// Returns [`Err`] if any contained word cannot be evaluated, or if the
/// proposition compares storage trees or terms of different kinds.
pub fn prop(prop: &Prop, assignment: &Assignment) -> Result<bool> {
    let value = match prop {
        Prop::Bool(value) => *value,
        Prop::Eq { left, right } => match (left, right) {
            (Term::Word(l), Term::Word(r)) => word(l, assignment)? == word(r, assignment)?,
            (Term::Buf(l), Term::Buf(r)) => buffer(l, assignment)? == buffer(r, assignment)?,
            _ => return Err(Error::unevaluable(format!("comparison {prop:?}"))),
        },
        Prop::Lt { left, right } => word(left, assignment)? < word(right, assignment)?,
        Prop::Gt { left, right } => word(left, assignment)? > word(right, assignment)?,
        Prop::LEq { left, right } => word(left, assignment)? <= word(right, assignment)?,
        Prop::GEq { left, right } => word(left, assignment)? >= word(right, assignment)?,
        Prop::Neg(inner) => !self::prop(inner, assignment)?,
        Prop::And { left, right } => {
            self::prop(left, assignment)? && self::prop(right, assignment)?
        }
        Prop::Or { left, right } => self::prop(left, assignment)? || self::prop(right, assignment)?,
        Prop::Impl {
            antecedent,
            consequent,
        } => !self::prop(antecedent, assignment)? || self::prop(consequent, assignment)?,
    };

    Ok(value)
}

/// Evaluates every one of `conditions`, returning whether they all hold.
///
/// # Errors
///
/// Returns [`Err`] if any condition cannot be evaluated.
pub fn all(conditions: &[Prop], assignment: &Assignment) -> Result<bool> {
    for condition in conditions {
        if !prop(condition, assignment)? {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Reads the value of the slot `key` from `storage` under `assignment`.
///
/// # Errors
///
/// Returns [`Err`] if any key or value in the tree cannot be evaluated.
pub fn slot(storage: &Storage, key: U256, assignment: &Assignment) -> Result<U256> {
    let mut current = storage;
    loop {
        match current {
            Storage::Abstract => {
                return Ok(assignment.storage.get(&key).copied().unwrap_or_default())
            }
            Storage::Concrete { slots } => return Ok(slots.get(&key).copied().unwrap_or_default()),
            Storage::Write {
                key: written,
                value,
                prior,
            } => {
                if word(written, assignment)? == key {
                    return word(value, assignment);
                }
                current = prior;
            }
        }
    }
}

/// Evaluates `buf` into its concrete bytes under `assignment`.
///
/// # Errors
///
/// Returns [`Err`] if the buffer is abstract, or if a word is written at an
/// offset beyond [`MAXIMUM_BUFFER_OFFSET_BYTES`].
pub fn buffer(buf: &Buf, assignment: &Assignment) -> Result<Vec<u8>> {
    match buf {
        Buf::Concrete { bytes } => Ok(bytes.clone()),
        Buf::Abstract { name } => Err(Error::unevaluable(format!("abstract buffer {name}"))),
        Buf::WriteWord {
            offset,
            value,
            base,
        } => {
            let offset = word_to_offset(word(offset, assignment)?)
                .filter(|o| *o <= MAXIMUM_BUFFER_OFFSET_BYTES)
                .ok_or_else(|| Error::unevaluable("buffer write beyond the maximum offset"))?;
            let value = word(value, assignment)?;
            let mut bytes = buffer(base, assignment)?;
            if bytes.len() < offset + WORD_SIZE_BYTES {
                bytes.resize(offset + WORD_SIZE_BYTES, 0);
            }
            bytes[offset..offset + WORD_SIZE_BYTES].copy_from_slice(&value.to_be_bytes());
            Ok(bytes)
        }
    }
}

/// Computes `base ^ exponent` modulo `2^256` by repeated squaring.
fn power(mut base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::ONE;
    while exponent != U256::ZERO {
        if exponent & U256::ONE == U256::ONE {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1u32;
    }

    result
}

/// Extends the sign of the low `bytes + 1` bytes of `value` through the rest
/// of the word.
fn sign_extend(bytes: U256, value: U256) -> U256 {
    if bytes >= U256::from(31u8) {
        return value;
    }

    let bit = bytes.as_u32() * 8 + 7;
    let mask = low_bits_mask(bit as usize + 1);
    if (value >> bit) & U256::ONE == U256::ONE {
        value | !mask
    } else {
        value & mask
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use ethnum::U256;

    use crate::vm::{
        buffer::Buf,
        eval::{self, Assignment},
        storage::Storage,
        value::{EnvValue, Prop, Word},
    };

    fn assignment() -> Assignment {
        Assignment {
            variables:   BTreeMap::from([("a".into(), U256::from(7u8))]),
            environment: BTreeMap::from([(EnvValue::Caller, U256::from(0xcafeu16))]),
            selector:    U256::from(0x60fe_47b1_u32),
            storage:     BTreeMap::from([(U256::ZERO, U256::from(3u8))]),
        }
    }

    #[test]
    fn arithmetic_wraps() -> anyhow::Result<()> {
        let overflow = Word::plus(Word::max(), Word::lit(2u8));
        assert_eq!(eval::word(&overflow, &assignment())?, U256::ONE);
        let underflow = Word::minus(Word::lit(0u8), Word::lit(1u8));
        assert_eq!(eval::word(&underflow, &assignment())?, U256::MAX);

        Ok(())
    }

    #[test]
    fn division_by_zero_is_zero() -> anyhow::Result<()> {
        let division = Word::divide(Word::var("a"), Word::lit(0u8));
        assert_eq!(eval::word(&division, &assignment())?, U256::ZERO);
        let modulo = Word::Mod {
            dividend: Box::new(Word::var("a")),
            divisor:  Box::new(Word::lit(0u8)),
        };
        assert_eq!(eval::word(&modulo, &assignment())?, U256::ZERO);

        Ok(())
    }

    #[test]
    fn exponentiation_and_sign_extension() -> anyhow::Result<()> {
        let power = Word::Exp {
            base:     Box::new(Word::lit(2u8)),
            exponent: Box::new(Word::lit(255u8)),
        };
        assert_eq!(eval::word(&power, &assignment())?, U256::ONE << 255u32);

        let extended = Word::SignExtend {
            bytes: Box::new(Word::lit(0u8)),
            value: Box::new(Word::lit(0x80u8)),
        };
        assert_eq!(
            eval::word(&extended, &assignment())?,
            U256::MAX - U256::from(0x7fu8)
        );

        Ok(())
    }

    #[test]
    fn reads_through_storage_writes() -> anyhow::Result<()> {
        let storage = Storage::Abstract.write(Word::lit(1u8), Word::var("a"));
        let a = assignment();
        assert_eq!(eval::slot(&storage, U256::ONE, &a)?, U256::from(7u8));
        assert_eq!(eval::slot(&storage, U256::ZERO, &a)?, U256::from(3u8));
        assert_eq!(eval::slot(&Storage::empty(), U256::ZERO, &a)?, U256::ZERO);

        let read = Word::sload(Word::lit(0u8), Storage::Abstract);
        assert_eq!(eval::word(&read, &a)?, U256::from(3u8));

        Ok(())
    }

    #[test]
    fn evaluates_propositions_and_buffers() -> anyhow::Result<()> {
        let a = assignment();
        let selected = Prop::eq_words(Word::Selector, Word::lit(0x60fe_47b1_u32));
        assert!(eval::prop(&selected, &a)?);
        let implication = Prop::implies(Prop::Bool(false), Prop::Bool(false));
        assert!(eval::prop(&implication, &a)?);
        assert!(!eval::all(&[selected, Prop::Bool(false)], &a)?);

        let bytes = eval::buffer(&Buf::word(Word::env(EnvValue::Caller)), &a)?;
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[30..], [0xca, 0xfe]);
        assert!(eval::buffer(&Buf::Abstract { name: "b".into() }, &a).is_err());

        Ok(())
    }
}

//! This module contains the translator from the symbolic terms produced by
//! exploration into the specification's expression language.
//!
//! Translation is a total match over the grammar of [`Word`] and [`Prop`].
//! Every term is either mapped onto a well-sorted expression or rejected with
//! an error naming the offending term. Before any node is translated
//! structurally it is offered to each of the configured [`Idioms`], which
//! recognise compiler-generated patterns such as overflow checks and express
//! them at a higher level.
//!
//! Operations that read their operands as unsigned words only translate when
//! no operand is signed, as the specification reads signed values as two's
//! complement integers.

pub mod canonical;
pub mod idiom;

use crate::{
    contract::abi::Interface,
    error::translation::{Error, Result},
    layout::LayoutResolver,
    spec::expression::{BoolExp, IntExp},
    translate::idiom::Idioms,
    utility::word_to_integer,
    vm::{
        storage::Storage,
        value::{Prop, Term, Word},
    },
};

/// The configuration for translation.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// The idioms recognised during translation, in the order in which they
    /// are tried.
    pub idioms: Idioms,
}

impl Config {
    /// Sets the idioms recognised during translation.
    #[must_use]
    pub fn with_idioms(mut self, idioms: Idioms) -> Self {
        self.idioms = idioms;
        self
    }
}

/// A translator for the terms of one entry point of a contract.
#[derive(Clone, Copy, Debug)]
pub struct Translator<'a> {
    /// The resolver for the contract's storage.
    resolver: &'a LayoutResolver,

    /// The interface of the entry point whose terms are translated, which
    /// types its calldata variables.
    interface: &'a Interface,

    /// The idioms to try at each node.
    idioms: &'a Idioms,
}

impl<'a> Translator<'a> {
    /// Constructs a translator for terms of the entry point with `interface`,
    /// resolving storage through `resolver`.
    #[must_use]
    pub fn new(resolver: &'a LayoutResolver, interface: &'a Interface, idioms: &'a Idioms) -> Self {
        Self {
            resolver,
            interface,
            idioms,
        }
    }

    /// Gets the interface of the entry point being translated.
    #[must_use]
    pub fn interface(&self) -> &Interface {
        self.interface
    }

    /// Translates the machine `word` into an integer expression.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the word contains a term outside the supported
    /// subset, refers to an unknown variable, or reads storage that cannot be
    /// resolved.
    pub fn word(&self, word: &Word) -> Result<IntExp> {
        for idiom in self.idioms.iter() {
            if let Some(exp) = idiom.word(word, self)? {
                return Ok(exp);
            }
        }

        let signed = || Error::SignedOperand {
            term: Box::new(word.clone()),
        };
        let exp = match word {
            Word::Lit { value } => IntExp::lit(word_to_integer(*value)),
            Word::Var { name } => self.variable(name)?,
            Word::Env { value } => IntExp::env(*value),
            Word::Add { left, right } => IntExp::plus(self.word(left)?, self.word(right)?),
            Word::Sub { left, right } => IntExp::minus(self.word(left)?, self.word(right)?),
            Word::Mul { left, right } => IntExp::times(self.word(left)?, self.word(right)?),
            Word::Div { dividend, divisor } => {
                let (dividend, divisor) = self.unsigned(dividend, divisor, signed)?;
                IntExp::divide(dividend, divisor)
            }
            Word::Mod { dividend, divisor } => {
                let (dividend, divisor) = self.unsigned(dividend, divisor, signed)?;
                IntExp::modulo(dividend, divisor)
            }
            Word::Exp { base, exponent } => {
                let (base, exponent) = self.unsigned(base, exponent, signed)?;
                IntExp::power(base, exponent)
            }
            Word::Lt { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                IntExp::bool_word(BoolExp::lt(left, right))
            }
            Word::Gt { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                IntExp::bool_word(BoolExp::gt(left, right))
            }
            Word::LEq { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                IntExp::bool_word(BoolExp::leq(left, right))
            }
            Word::GEq { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                IntExp::bool_word(BoolExp::geq(left, right))
            }
            Word::Eq { left, right } => {
                let (left, right) = self.equatable(left, right, signed)?;
                IntExp::bool_word(BoolExp::int_eq(left, right))
            }
            Word::IsZero { number } => {
                IntExp::bool_word(BoolExp::int_eq(self.word(number)?, IntExp::lit(0)))
            }
            Word::Ite {
                condition,
                then,
                otherwise,
            } => IntExp::ite(
                self.word_as_bool(condition)?,
                self.word(then)?,
                self.word(otherwise)?,
            ),
            Word::SLoad { key, storage } => match (key.as_lit(), storage.as_ref()) {
                (Some(slot), Storage::Abstract) => IntExp::pre(self.resolver.resolve(slot)?),
                _ => {
                    return Err(Error::UnsupportedStorageRead {
                        term: Box::new(word.clone()),
                    })
                }
            },
            Word::Selector
            | Word::SignExtend { .. }
            | Word::And { .. }
            | Word::Or { .. }
            | Word::Xor { .. }
            | Word::Not { .. }
            | Word::Keccak { .. } => {
                return Err(Error::UnsupportedWord {
                    term: Box::new(word.clone()),
                })
            }
        };

        Ok(exp)
    }

    /// Translates the machine `word` as a truth value, holding exactly when
    /// the word is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the word cannot be translated.
    pub fn word_as_bool(&self, word: &Word) -> Result<BoolExp> {
        let exp = self.word(word)?;
        match exp.as_bool_word() {
            Some(condition) => Ok(condition.clone()),
            None => Ok(BoolExp::int_neq(exp, IntExp::lit(0))),
        }
    }

    /// Translates the proposition `prop` into a boolean expression.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the proposition compares terms that are not words,
    /// or contains a word that cannot be translated.
    pub fn prop(&self, prop: &Prop) -> Result<BoolExp> {
        for idiom in self.idioms.iter() {
            if let Some(exp) = idiom.prop(prop, self)? {
                return Ok(exp);
            }
        }

        let signed = || Error::SignedComparison {
            prop: Box::new(prop.clone()),
        };
        let exp = match prop {
            Prop::Bool(value) => BoolExp::Lit { value: *value },
            Prop::Eq {
                left: Term::Word(left),
                right: Term::Word(right),
            } => {
                let (left, right) = self.equatable(left, right, signed)?;
                BoolExp::int_eq(left, right)
            }
            Prop::Eq { .. } => {
                return Err(Error::NonWordComparison {
                    prop: Box::new(prop.clone()),
                })
            }
            Prop::Lt { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                BoolExp::lt(left, right)
            }
            Prop::Gt { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                BoolExp::gt(left, right)
            }
            Prop::LEq { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                BoolExp::leq(left, right)
            }
            Prop::GEq { left, right } => {
                let (left, right) = self.unsigned(left, right, signed)?;
                BoolExp::geq(left, right)
            }
            Prop::Neg(value) => BoolExp::negate(self.prop(value)?),
            Prop::And { left, right } => BoolExp::conj(self.prop(left)?, self.prop(right)?),
            Prop::Or { left, right } => BoolExp::disj(self.prop(left)?, self.prop(right)?),
            Prop::Impl {
                antecedent,
                consequent,
            } => BoolExp::implies(self.prop(antecedent)?, self.prop(consequent)?),
        };

        Ok(exp)
    }

    /// Translates the operands of an operation that reads both as unsigned
    /// words, failing with `error` if either is signed.
    fn unsigned(
        &self,
        left: &Word,
        right: &Word,
        error: impl FnOnce() -> Error,
    ) -> Result<(IntExp, IntExp)> {
        let (left, right) = (self.word(left)?, self.word(right)?);
        if left.mentions_signed() || right.mentions_signed() {
            return Err(error());
        }

        Ok((left, right))
    }

    /// Translates the operands of an equality, failing with `error` if a
    /// signed operand is compared with anything other than a signed value or
    /// a literal that signed values can take.
    fn equatable(
        &self,
        left: &Word,
        right: &Word,
        error: impl FnOnce() -> Error,
    ) -> Result<(IntExp, IntExp)> {
        let (left, right) = (self.word(left)?, self.word(right)?);
        if !IntExp::equatable(&left, &right) {
            return Err(error());
        }

        Ok((left, right))
    }

    fn variable(&self, name: &str) -> Result<IntExp> {
        let argument = self.interface.argument(name).ok_or_else(|| Error::UnknownVariable {
            name: name.to_string(),
        })?;
        if !argument.typ.is_elementary() {
            return Err(Error::UnsupportedVariableType {
                name: name.to_string(),
                typ:  argument.typ.clone(),
            });
        }

        Ok(IntExp::var(name, argument.typ.clone()))
    }
}

//! This module contains the definition of the `Idiom` trait that allows the
//! translator to recognise compiler-generated patterns and express them at a
//! higher level than their structure would suggest.

pub mod addition_overflow;
pub mod multiplication_overflow;

use std::{
    any::{Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

use downcast_rs::Downcast;

use crate::{
    error::translation::Result,
    spec::expression::{BoolExp, IntExp},
    translate::{
        idiom::{
            addition_overflow::AdditionOverflow,
            multiplication_overflow::MultiplicationOverflow,
        },
        Translator,
    },
    vm::value::{Prop, Word},
};

/// A trait representing the recognition of a single pattern during
/// translation.
///
/// An idiom that does not recognise its input returns [`None`], and the
/// translator falls through to the next idiom and eventually to structural
/// translation. Both methods default to recognising nothing.
pub trait Idiom
where
    Self: Any + Debug + Downcast + Send + Sync,
{
    /// Recognises the pattern in `word`, translating its constituents with
    /// `translator`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the pattern is recognised but its constituents
    /// cannot be translated.
    fn word(&self, _word: &Word, _translator: &Translator<'_>) -> Result<Option<IntExp>> {
        Ok(None)
    }

    /// Recognises the pattern in `prop`, translating its constituents with
    /// `translator`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the pattern is recognised but its constituents
    /// cannot be translated.
    fn prop(&self, _prop: &Prop, _translator: &Translator<'_>) -> Result<Option<BoolExp>> {
        Ok(None)
    }
}

/// A container for an ordered set of idioms that will be tried in order.
#[derive(Clone, Debug)]
pub struct Idioms {
    /// The ordered list of idioms.
    idioms: Vec<Arc<dyn Idiom>>,
}

impl Idioms {
    /// Constructs a container holding no idioms, so that translation is
    /// purely structural.
    #[must_use]
    pub fn none() -> Self {
        let idioms = Vec::new();
        Self { idioms }
    }

    /// Adds the `idiom` to the end of the ordering.
    ///
    /// If an idiom of the given type already exists in the ordering, it will
    /// not be added.
    pub fn add<I: Idiom>(&mut self, idiom: I) {
        let ids: Vec<TypeId> = self.idioms.iter().map(|i| i.as_ref().type_id()).collect();
        let idiom_id = idiom.type_id();

        if ids.contains(&idiom_id) {
            return;
        }

        self.idioms.push(Arc::new(idiom));
    }

    /// Removes the idiom of the given type, if it is present.
    pub fn remove<I: Idiom>(&mut self) {
        self.idioms.retain(|i| !i.as_ref().as_any().is::<I>());
    }

    /// Gets a reference to the idiom of the given type, if it exists in the
    /// container.
    #[must_use]
    pub fn get<I: Idiom>(&self) -> Option<&I> {
        self.idioms
            .iter()
            .find(|i| i.as_ref().as_any().is::<I>())
            .and_then(|i| i.as_ref().as_any().downcast_ref::<I>())
    }

    /// Iterates over the idioms in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Idiom>> {
        self.idioms.iter()
    }

    /// Gets the number of idioms in the container.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idioms.len()
    }

    /// Checks if the container holds no idioms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idioms.is_empty()
    }
}

impl Default for Idioms {
    fn default() -> Self {
        let mut idioms = Self::none();
        idioms.add(AdditionOverflow);
        idioms.add(MultiplicationOverflow);
        idioms
    }
}

/// Translates `word` for use as an operand of an overflow check, returning
/// [`None`] unless its translation is guaranteed to denote a non-negative
/// integer below `2^256`.
///
/// Only literals, environment values and unsigned variables or storage items
/// qualify. Compound terms do not, as their translation is not reduced modulo
/// the word size.
///
/// # Errors
///
/// Returns [`Err`] if `word` cannot be translated.
pub fn unsigned_operand(word: &Word, translator: &Translator<'_>) -> Result<Option<IntExp>> {
    let atomic = matches!(
        word,
        Word::Lit { .. } | Word::Var { .. } | Word::Env { .. } | Word::SLoad { .. }
    );
    if !atomic {
        return Ok(None);
    }

    let exp = translator.word(word)?;
    let unsigned = match &exp {
        IntExp::Lit { .. } | IntExp::Env { .. } => true,
        IntExp::Var { typ, .. } => typ.integer_range().is_some_and(|(low, _)| low >= 0.into()),
        IntExp::Entry { item, .. } => {
            item.typ.integer_range().is_some_and(|(low, _)| low >= 0.into())
        }
        _ => false,
    };

    Ok(unsigned.then_some(exp))
}

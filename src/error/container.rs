//! Containers that attach entry points to errors, so that the failure of one
//! entry point can be reported without hiding the others.

use std::fmt::Formatter;

use itertools::Itertools;
use thiserror::Error;

use crate::contract::EntryPoint;

/// An error that is localised to a particular entry point of the contract.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Located<E>
where
    E: Clone,
{
    /// The entry point whose processing produced the error.
    pub location: EntryPoint,

    /// The error data
    pub payload: E,
}

impl<E> std::fmt::Display for Located<E>
where
    E: std::fmt::Display + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.location, self.payload)
    }
}

/// A trait for types that can have an entry point location attached to them.
pub trait Locatable
where
    Self: Sized,
{
    /// The return type with the attached location.
    type Located;

    /// Attach the location described by `entry` to the error.
    fn locate(self, entry: EntryPoint) -> Self::Located;
}

impl<T, E> Locatable for Result<T, E>
where
    E: std::error::Error + Clone,
{
    type Located = Result<T, Located<E>>;

    fn locate(self, entry: EntryPoint) -> Self::Located {
        self.map_err(|payload| Located {
            location: entry,
            payload,
        })
    }
}

/// A collection of errors.
///
/// Errors carrying a [`Located`] entry point are held grouped by that entry
/// point, constructor first, and in the order of insertion within each group.
/// Other errors are held in the order of insertion.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub struct Errors<E> {
    payloads: Vec<E>,
}

impl<E> Errors<E> {
    /// Creates a new container for errors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            payloads: Vec::new(),
        }
    }

    /// Gets the errors contained within this error.
    #[must_use]
    pub fn payloads(&self) -> &[E] {
        &self.payloads
    }

    /// Iterates over the contained errors in order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.payloads.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

impl<E> Errors<Located<E>>
where
    E: std::error::Error + Clone,
{
    /// Adds an error `payload` at the specific `entry` point, after any
    /// errors already present at that entry point.
    pub fn add_located(&mut self, entry: EntryPoint, payload: E) {
        let index = self.payloads.partition_point(|e| e.location <= entry);
        let error = Located {
            location: entry,
            payload,
        };
        self.payloads.insert(index, error);
    }

    /// Adds every one of the located `errors`.
    pub fn add_many_located(&mut self, errors: impl Into<Vec<Located<E>>>) {
        for error in errors.into() {
            self.add_located(error.location, error.payload);
        }
    }

    /// Gets the errors that occurred at the provided `entry` point.
    #[must_use]
    pub fn at(&self, entry: &EntryPoint) -> Vec<&E> {
        self.payloads
            .iter()
            .filter(|e| &e.location == entry)
            .map(|e| &e.payload)
            .collect()
    }

    /// Gets the distinct entry points that have errors, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<&EntryPoint> {
        self.payloads.iter().map(|e| &e.location).dedup().collect()
    }
}

impl<E> Default for Errors<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> From<E> for Errors<E>
where
    E: std::error::Error,
{
    fn from(value: E) -> Self {
        Self {
            payloads: vec![value],
        }
    }
}

/// Takes the errors in `value` as they are, so they are only grouped if
/// `value` already was.
impl<E> From<Vec<E>> for Errors<E>
where
    E: std::error::Error,
{
    fn from(value: Vec<E>) -> Self {
        Self { payloads: value }
    }
}

impl<'a, E> IntoIterator for &'a Errors<E> {
    type IntoIter = std::slice::Iter<'a, E>;
    type Item = &'a E;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Prints a header with the number of errors, followed by one error per line.
impl<E> std::fmt::Display for Errors<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.payloads.len() {
            0 => write!(f, "Encountered no errors"),
            count => {
                writeln!(f, "Encountered {count} errors:")?;
                self.payloads.iter().try_for_each(|error| writeln!(f, "{error}"))
            }
        }
    }
}

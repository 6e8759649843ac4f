//! Evaluation of specification expressions over the unbounded integers.
//!
//! Unlike [`crate::vm::eval`], nothing here wraps. An addition of two large
//! words simply produces a larger integer, which is exactly what allows
//! overflow to be stated as a failed [`BoolExp::InRange`] fact.

use std::collections::BTreeMap;

use ethnum::U256;
use num::{BigInt, One, Signed, ToPrimitive, Zero};

use crate::{
    constant::WORD_SIZE_BITS,
    contract::abi::AbiType,
    error::verification::{Error, Result},
    layout::LayoutResolver,
    spec::{
        expression::{BoolExp, Equality, IntExp, Timing},
        StorageUpdate,
    },
    utility::{word_to_integer, word_to_signed_integer},
    vm::{eval::Assignment, value::EnvValue},
};

/// The largest exponent evaluated for a base other than `-1`, `0` or `1`.
const MAXIMUM_EXPONENT: u32 = 1024;

/// Values for everything a specification expression may refer to.
///
/// Calldata variables and environment values are held as raw words and are
/// interpreted according to their declared type when read. Storage items are
/// held by name as integers, already interpreted. An item without a post-state
/// value is unchanged from its pre-state, and an item without a pre-state
/// value is zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Valuation {
    pub variables:   BTreeMap<String, U256>,
    pub environment: BTreeMap<EnvValue, U256>,
    pub pre:         BTreeMap<String, BigInt>,
    pub post:        BTreeMap<String, BigInt>,
}

impl Valuation {
    /// Constructs a valuation with the calldata and environment of
    /// `assignment`, and no storage.
    #[must_use]
    pub fn new(assignment: &Assignment) -> Self {
        Self {
            variables: assignment.variables.clone(),
            environment: assignment.environment.clone(),
            ..Self::default()
        }
    }

    /// Constructs a valuation from `assignment` whose pre-state holds every
    /// item that `resolver` can resolve, read from the assignment's storage.
    #[must_use]
    pub fn with_storage(assignment: &Assignment, resolver: &LayoutResolver) -> Self {
        let mut valuation = Self::new(assignment);
        for (slot, item) in resolver.resolvable() {
            let raw = assignment.storage.get(&slot).copied().unwrap_or_default();
            valuation.pre.insert(item.name, interpret(raw, &item.typ));
        }
        valuation
    }

    /// Sets the pre-state value of the storage item called `name`.
    #[must_use]
    pub fn with_pre(mut self, name: impl Into<String>, value: impl Into<BigInt>) -> Self {
        self.pre.insert(name.into(), value.into());
        self
    }

    /// Computes the post-state produced by `updates`, each evaluated in the
    /// pre-state.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any update value cannot be evaluated.
    pub fn apply(&mut self, updates: &[StorageUpdate]) -> Result<()> {
        let values = updates
            .iter()
            .map(|u| Ok((u.item.name.clone(), self.int(&u.value)?)))
            .collect::<Result<Vec<_>>>()?;
        self.post.extend(values);
        Ok(())
    }

    /// Evaluates the integer expression `exp`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `exp` raises to an exponent too large to compute.
    pub fn int(&self, exp: &IntExp) -> Result<BigInt> {
        let value = match exp {
            IntExp::Lit { value } => value.clone(),
            IntExp::Var { name, typ } => {
                interpret(self.variables.get(name).copied().unwrap_or_default(), typ)
            }
            IntExp::Env { value } => {
                word_to_integer(self.environment.get(value).copied().unwrap_or_default())
            }
            IntExp::Entry { timing, item } => {
                let pre = self.pre.get(&item.name);
                let value = match timing {
                    Timing::Pre => pre,
                    Timing::Post => self.post.get(&item.name).or(pre),
                };
                value.cloned().unwrap_or_default()
            }
            IntExp::Add { left, right } => self.int(left)? + self.int(right)?,
            IntExp::Sub { left, right } => self.int(left)? - self.int(right)?,
            IntExp::Mul { left, right } => self.int(left)? * self.int(right)?,
            IntExp::Div { dividend, divisor } => {
                let divisor = self.int(divisor)?;
                if divisor.is_zero() {
                    BigInt::zero()
                } else {
                    self.int(dividend)? / divisor
                }
            }
            IntExp::Mod { dividend, divisor } => {
                let divisor = self.int(divisor)?;
                if divisor.is_zero() {
                    BigInt::zero()
                } else {
                    self.int(dividend)? % divisor
                }
            }
            IntExp::Exp { base, exponent } => power(self.int(base)?, &self.int(exponent)?)?,
            IntExp::Ite {
                condition,
                then,
                otherwise,
            } => {
                if self.bool(condition)? {
                    self.int(then)?
                } else {
                    self.int(otherwise)?
                }
            }
        };

        Ok(value)
    }

    /// Evaluates the boolean expression `exp`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any integer within `exp` cannot be evaluated, if it
    /// compares byte strings or contracts that are not syntactically equal, or
    /// if it states a range fact about a type without an integer range.
    pub fn bool(&self, exp: &BoolExp) -> Result<bool> {
        let value = match exp {
            BoolExp::Lit { value } => *value,
            BoolExp::And { left, right } => self.bool(left)? && self.bool(right)?,
            BoolExp::Or { left, right } => self.bool(left)? || self.bool(right)?,
            BoolExp::Impl {
                antecedent,
                consequent,
            } => !self.bool(antecedent)? || self.bool(consequent)?,
            BoolExp::Neg { value } => !self.bool(value)?,
            BoolExp::Lt { left, right } => self.int(left)? < self.int(right)?,
            BoolExp::LEq { left, right } => self.int(left)? <= self.int(right)?,
            BoolExp::Gt { left, right } => self.int(left)? > self.int(right)?,
            BoolExp::GEq { left, right } => self.int(left)? >= self.int(right)?,
            BoolExp::Eq { equality } => self.equality(equality)?,
            BoolExp::NEq { equality } => !self.equality(equality)?,
            BoolExp::InRange { typ, value } => {
                let (low, high) = typ
                    .integer_range()
                    .ok_or_else(|| Error::unevaluable(format!("no integer range for {typ}")))?;
                let value = self.int(value)?;
                low <= value && value < high
            }
        };

        Ok(value)
    }

    fn equality(&self, equality: &Equality) -> Result<bool> {
        match equality {
            Equality::Integer { left, right } => Ok(self.int(left)? == self.int(right)?),
            Equality::Boolean { left, right } => Ok(self.bool(left)? == self.bool(right)?),
            Equality::ByteString { left, right } if left == right => Ok(true),
            Equality::Contract { left, right } if left == right => Ok(true),
            _ => Err(Error::unevaluable(format!(
                "{:?} equality between distinct terms",
                equality.sort()
            ))),
        }
    }
}

/// Interprets the raw word `raw` as a value of type `typ`.
///
/// Signed integers are read as two's complement over the whole word, and
/// everything else as a non-negative integer. Nothing is truncated to the
/// declared width, so ill-typed raw values remain visible to range facts.
#[must_use]
pub fn interpret(raw: U256, typ: &AbiType) -> BigInt {
    match typ {
        AbiType::Int { .. } => word_to_signed_integer(raw, WORD_SIZE_BITS),
        _ => word_to_integer(raw),
    }
}

fn power(base: BigInt, exponent: &BigInt) -> Result<BigInt> {
    if exponent.is_negative() {
        return Err(Error::unevaluable(format!("negative exponent {exponent}")));
    }
    if base.is_zero() || base.is_one() {
        return Ok(if exponent.is_zero() { BigInt::one() } else { base });
    }
    if base == -BigInt::one() {
        let even = (exponent % 2u8).is_zero();
        return Ok(if even { BigInt::one() } else { base });
    }

    match exponent.to_u32() {
        Some(e) if e <= MAXIMUM_EXPONENT => Ok(base.pow(e)),
        _ => Err(Error::unevaluable(format!("exponent {exponent} is too large"))),
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;
    use num::BigInt;

    use crate::{
        contract::abi::AbiType,
        layout::{LayoutResolver, StorageLayout, StorageVariable},
        spec::{
            eval::Valuation,
            expression::{BoolExp, IntExp, StorageItem},
            StorageUpdate,
        },
        vm::{eval::Assignment, value::EnvValue},
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    #[test]
    fn does_not_wrap() -> anyhow::Result<()> {
        let mut assignment = Assignment::default();
        assignment.variables.insert("a".into(), U256::MAX);
        let valuation = Valuation::new(&assignment);

        let sum = IntExp::plus(IntExp::var("a", uint256()), IntExp::lit(1));
        let expected = crate::utility::pow2(256);
        assert_eq!(valuation.int(&sum)?, expected);
        assert!(!valuation.bool(&BoolExp::in_range(uint256(), sum))?);

        Ok(())
    }

    #[test]
    fn reads_signed_variables_as_twos_complement() -> anyhow::Result<()> {
        let mut assignment = Assignment::default();
        assignment.variables.insert("a".into(), U256::MAX);
        assignment.variables.insert("b".into(), U256::new(0xff));
        let valuation = Valuation::new(&assignment);

        let int8 = AbiType::Int { size: 8 };
        let a = IntExp::var("a", int8.clone());
        let b = IntExp::var("b", int8.clone());
        assert_eq!(valuation.int(&a)?, BigInt::from(-1));
        assert_eq!(valuation.int(&b)?, BigInt::from(0xff));
        assert!(valuation.bool(&BoolExp::in_range(int8.clone(), a))?);
        assert!(!valuation.bool(&BoolExp::in_range(int8, b))?);

        Ok(())
    }

    #[test]
    fn division_by_zero_is_zero() -> anyhow::Result<()> {
        let valuation = Valuation::default();
        let div = IntExp::divide(IntExp::lit(7), IntExp::lit(0));
        let rem = IntExp::modulo(IntExp::lit(7), IntExp::lit(0));
        assert_eq!(valuation.int(&div)?, BigInt::from(0));
        assert_eq!(valuation.int(&rem)?, BigInt::from(0));

        Ok(())
    }

    #[test]
    fn post_state_defaults_to_pre_state() -> anyhow::Result<()> {
        let x = StorageItem::new("C", "x", uint256());
        let y = StorageItem::new("C", "y", uint256());
        let mut valuation = Valuation::default().with_pre("x", 3).with_pre("y", 5);

        let updates = vec![StorageUpdate::new(
            x.clone(),
            IntExp::plus(IntExp::pre(x.clone()), IntExp::env(EnvValue::CallValue)),
        )];
        valuation.environment.insert(EnvValue::CallValue, U256::new(2));
        valuation.apply(&updates)?;

        assert_eq!(valuation.int(&IntExp::post(x))?, BigInt::from(5));
        assert_eq!(valuation.int(&IntExp::post(y))?, BigInt::from(5));

        Ok(())
    }

    #[test]
    fn reads_pre_state_through_the_layout() -> anyhow::Result<()> {
        let layout = StorageLayout::new(vec![StorageVariable::value(
            "n",
            1u64,
            AbiType::Int { size: 16 },
        )]);
        let resolver = LayoutResolver::new("C", &layout)?;
        let mut assignment = Assignment::default();
        assignment.storage.insert(U256::ONE, U256::MAX);

        let valuation = Valuation::with_storage(&assignment, &resolver);
        let item = StorageItem::new("C", "n", AbiType::Int { size: 16 });
        assert_eq!(valuation.int(&IntExp::pre(item))?, BigInt::from(-1));

        Ok(())
    }

    #[test]
    fn range_facts_need_an_integer_range() {
        let fact = BoolExp::in_range(AbiType::String, IntExp::lit(0));
        assert!(Valuation::default().bool(&fact).is_err());
    }
}

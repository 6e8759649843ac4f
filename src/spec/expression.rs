//! This module contains the sort-safe expression language in which
//! specifications are written.
//!
//! Each sort of expression is its own type. Every operator takes its operands
//! at the sort it requires, so an ill-sorted expression cannot be constructed
//! at all: [`IntExp`] for integers, [`BoolExp`] for booleans, [`BytesExp`] for
//! byte strings and [`ContractExp`] for contract references. The [`Exp`] type
//! is the tagged union of all four for places that accept any sort.
//!
//! Integer expressions denote unbounded mathematical integers, not machine
//! words. Overflow is therefore expressed explicitly through
//! [`BoolExp::InRange`] facts.

use std::fmt::{Display, Formatter};

use num::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    constant::WORD_SIZE_BITS,
    contract::abi::AbiType,
    utility::pow2,
    vm::value::EnvValue,
};

/// The sort of an expression.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    Integer,
    Boolean,
    ByteString,
    Contract,
}

/// Whether a storage reference reads the state before or after a transition.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    Pre,
    Post,
}

/// A named storage variable of a contract, with its declared value type.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct StorageItem {
    pub contract: String,

    pub name: String,

    #[serde(rename = "type")]
    pub typ: AbiType,
}

impl StorageItem {
    #[must_use]
    pub fn new(contract: impl Into<String>, name: impl Into<String>, typ: AbiType) -> Self {
        let contract = contract.into();
        let name = name.into();
        Self {
            contract,
            name,
            typ,
        }
    }
}

/// An integer-sorted expression.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntExp {
    Lit {
        value: BigInt,
    },

    /// A calldata variable of the declared type `typ`.
    Var {
        name: String,
        #[serde(rename = "type")]
        typ:  AbiType,
    },

    /// An environment value.
    Env {
        value: EnvValue,
    },

    /// A reference to a storage item in the pre- or post-state.
    Entry {
        timing: Timing,
        item:   StorageItem,
    },

    Add {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    Sub {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    Mul {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    Div {
        dividend: Box<IntExp>,
        divisor:  Box<IntExp>,
    },
    Mod {
        dividend: Box<IntExp>,
        divisor:  Box<IntExp>,
    },
    Exp {
        base:     Box<IntExp>,
        exponent: Box<IntExp>,
    },

    Ite {
        condition: Box<BoolExp>,
        then:      Box<IntExp>,
        otherwise: Box<IntExp>,
    },
}

impl IntExp {
    #[must_use]
    pub fn lit(value: impl Into<BigInt>) -> Self {
        let value = value.into();
        Self::Lit { value }
    }

    #[must_use]
    pub fn var(name: impl Into<String>, typ: AbiType) -> Self {
        let name = name.into();
        Self::Var { name, typ }
    }

    #[must_use]
    pub fn env(value: EnvValue) -> Self {
        Self::Env { value }
    }

    #[must_use]
    pub fn pre(item: StorageItem) -> Self {
        Self::Entry {
            timing: Timing::Pre,
            item,
        }
    }

    #[must_use]
    pub fn post(item: StorageItem) -> Self {
        Self::Entry {
            timing: Timing::Post,
            item,
        }
    }

    #[must_use]
    pub fn plus(left: IntExp, right: IntExp) -> Self {
        Self::Add {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn minus(left: IntExp, right: IntExp) -> Self {
        Self::Sub {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn times(left: IntExp, right: IntExp) -> Self {
        Self::Mul {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn divide(dividend: IntExp, divisor: IntExp) -> Self {
        Self::Div {
            dividend: Box::new(dividend),
            divisor:  Box::new(divisor),
        }
    }

    #[must_use]
    pub fn modulo(dividend: IntExp, divisor: IntExp) -> Self {
        Self::Mod {
            dividend: Box::new(dividend),
            divisor:  Box::new(divisor),
        }
    }

    #[must_use]
    pub fn power(base: IntExp, exponent: IntExp) -> Self {
        Self::Exp {
            base:     Box::new(base),
            exponent: Box::new(exponent),
        }
    }

    #[must_use]
    pub fn ite(condition: BoolExp, then: IntExp, otherwise: IntExp) -> Self {
        Self::Ite {
            condition: Box::new(condition),
            then:      Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Encodes `condition` as the integer `1` when it holds and `0` otherwise,
    /// as the EVM represents booleans.
    #[must_use]
    pub fn bool_word(condition: BoolExp) -> Self {
        Self::ite(condition, Self::lit(1), Self::lit(0))
    }

    /// Gets the condition of an expression built by [`Self::bool_word`].
    #[must_use]
    pub fn as_bool_word(&self) -> Option<&BoolExp> {
        match self {
            Self::Ite {
                condition,
                then,
                otherwise,
            } if then.is_lit(1) && otherwise.is_lit(0) => Some(condition),
            _ => None,
        }
    }

    /// Checks whether the value of the expression depends directly on a
    /// signed calldata variable or storage item.
    ///
    /// Conditions of conditional expressions are not considered, as only the
    /// chosen branch contributes to the value.
    #[must_use]
    pub fn mentions_signed(&self) -> bool {
        match self {
            Self::Var { typ, .. } | Self::Entry { item: StorageItem { typ, .. }, .. } => {
                matches!(typ, AbiType::Int { .. })
            }
            Self::Lit { .. } | Self::Env { .. } => false,
            Self::Add { left, right } | Self::Sub { left, right } | Self::Mul { left, right } => {
                left.mentions_signed() || right.mentions_signed()
            }
            Self::Div { dividend, divisor } | Self::Mod { dividend, divisor } => {
                dividend.mentions_signed() || divisor.mentions_signed()
            }
            Self::Exp { base, exponent } => base.mentions_signed() || exponent.mentions_signed(),
            Self::Ite { then, otherwise, .. } => {
                then.mentions_signed() || otherwise.mentions_signed()
            }
        }
    }

    /// Checks whether the equality of `left` and `right` as words coincides
    /// with their equality as integers, which fails when a signed value is
    /// compared with anything other than a signed value or a literal that
    /// signed values can take.
    #[must_use]
    pub fn equatable(left: &IntExp, right: &IntExp) -> bool {
        let comparable = |signed: &IntExp, other: &IntExp| {
            !signed.mentions_signed()
                || other.mentions_signed()
                || matches!(other, Self::Lit { value } if *value < pow2(WORD_SIZE_BITS - 1))
        };
        comparable(left, right) && comparable(right, left)
    }

    /// Checks if the expression is the literal `value`.
    #[must_use]
    pub fn is_lit(&self, value: i64) -> bool {
        matches!(self, Self::Lit { value: v } if *v == BigInt::from(value))
    }

    /// Calls `f` on this expression and every integer expression nested
    /// within it, including those inside conditions.
    pub fn visit(&self, f: &mut dyn FnMut(&IntExp)) {
        f(self);
        match self {
            Self::Lit { .. } | Self::Var { .. } | Self::Env { .. } | Self::Entry { .. } => (),
            Self::Add { left, right } | Self::Sub { left, right } | Self::Mul { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Div { dividend, divisor } | Self::Mod { dividend, divisor } => {
                dividend.visit(f);
                divisor.visit(f);
            }
            Self::Exp { base, exponent } => {
                base.visit(f);
                exponent.visit(f);
            }
            Self::Ite {
                condition,
                then,
                otherwise,
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
        }
    }
}

/// A boolean-sorted expression.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolExp {
    Lit {
        value: bool,
    },

    And {
        left:  Box<BoolExp>,
        right: Box<BoolExp>,
    },
    Or {
        left:  Box<BoolExp>,
        right: Box<BoolExp>,
    },
    Impl {
        antecedent: Box<BoolExp>,
        consequent: Box<BoolExp>,
    },
    Neg {
        value: Box<BoolExp>,
    },

    Lt {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    LEq {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    Gt {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },
    GEq {
        left:  Box<IntExp>,
        right: Box<IntExp>,
    },

    Eq {
        equality: Box<Equality>,
    },
    NEq {
        equality: Box<Equality>,
    },

    /// The fact that `value` lies within the range of integers inhabiting
    /// `typ`.
    InRange {
        #[serde(rename = "type")]
        typ:   AbiType,
        value: Box<IntExp>,
    },
}

impl BoolExp {
    /// The literal `true`.
    pub const TRUE: BoolExp = BoolExp::Lit { value: true };

    #[must_use]
    pub fn conj(left: BoolExp, right: BoolExp) -> Self {
        Self::And {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn disj(left: BoolExp, right: BoolExp) -> Self {
        Self::Or {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn implies(antecedent: BoolExp, consequent: BoolExp) -> Self {
        Self::Impl {
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }

    #[must_use]
    pub fn negate(value: BoolExp) -> Self {
        Self::Neg {
            value: Box::new(value),
        }
    }

    #[must_use]
    pub fn lt(left: IntExp, right: IntExp) -> Self {
        Self::Lt {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn leq(left: IntExp, right: IntExp) -> Self {
        Self::LEq {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn gt(left: IntExp, right: IntExp) -> Self {
        Self::Gt {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn geq(left: IntExp, right: IntExp) -> Self {
        Self::GEq {
            left:  Box::new(left),
            right: Box::new(right),
        }
    }

    /// Constructs the equality of the integers `left` and `right`.
    #[must_use]
    pub fn int_eq(left: IntExp, right: IntExp) -> Self {
        Self::Eq {
            equality: Box::new(Equality::Integer { left, right }),
        }
    }

    /// Constructs the disequality of the integers `left` and `right`.
    #[must_use]
    pub fn int_neq(left: IntExp, right: IntExp) -> Self {
        Self::NEq {
            equality: Box::new(Equality::Integer { left, right }),
        }
    }

    #[must_use]
    pub fn in_range(typ: AbiType, value: IntExp) -> Self {
        Self::InRange {
            typ,
            value: Box::new(value),
        }
    }

    /// Splits the expression into its top-level conjuncts, in order.
    #[must_use]
    pub fn conjuncts(self) -> Vec<BoolExp> {
        match self {
            Self::And { left, right } => {
                let mut conjuncts = left.conjuncts();
                conjuncts.extend(right.conjuncts());
                conjuncts
            }
            other => vec![other],
        }
    }

    /// Calls `f` on every integer expression nested within this expression.
    pub fn visit(&self, f: &mut dyn FnMut(&IntExp)) {
        match self {
            Self::Lit { .. } => (),
            Self::And { left, right } | Self::Or { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Impl {
                antecedent,
                consequent,
            } => {
                antecedent.visit(f);
                consequent.visit(f);
            }
            Self::Neg { value } => value.visit(f),
            Self::Lt { left, right }
            | Self::LEq { left, right }
            | Self::Gt { left, right }
            | Self::GEq { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Eq { equality } | Self::NEq { equality } => equality.visit(f),
            Self::InRange { value, .. } => value.visit(f),
        }
    }
}

/// A byte-string-sorted expression.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BytesExp {
    Lit { value: Vec<u8> },
    Var { name: String },
}

/// A contract-sorted expression.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractExp {
    /// A reference called `name` to an instance of `contract`.
    Var { name: String, contract: String },
}

/// An equality between two expressions of the same sort.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Equality {
    Integer { left: IntExp, right: IntExp },
    Boolean { left: BoolExp, right: BoolExp },
    ByteString { left: BytesExp, right: BytesExp },
    Contract { left: ContractExp, right: ContractExp },
}

impl Equality {
    /// Gets the sort of both sides of the equality.
    #[must_use]
    pub fn sort(&self) -> Sort {
        match self {
            Self::Integer { .. } => Sort::Integer,
            Self::Boolean { .. } => Sort::Boolean,
            Self::ByteString { .. } => Sort::ByteString,
            Self::Contract { .. } => Sort::Contract,
        }
    }

    fn visit(&self, f: &mut dyn FnMut(&IntExp)) {
        match self {
            Self::Integer { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            Self::Boolean { left, right } => {
                left.visit(f);
                right.visit(f);
            }
            Self::ByteString { .. } | Self::Contract { .. } => (),
        }
    }
}

/// An expression of any sort.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Exp {
    Integer(IntExp),
    Boolean(BoolExp),
    ByteString(BytesExp),
    Contract(ContractExp),
}

impl Exp {
    /// Gets the sort of the expression, which is fixed by its constructor.
    #[must_use]
    pub fn sort(&self) -> Sort {
        match self {
            Self::Integer(_) => Sort::Integer,
            Self::Boolean(_) => Sort::Boolean,
            Self::ByteString(_) => Sort::ByteString,
            Self::Contract(_) => Sort::Contract,
        }
    }

    /// Constructs the equality of `self` and `other`, if they have the same
    /// sort.
    #[must_use]
    pub fn equality(self, other: Exp) -> Option<Equality> {
        let equality = match (self, other) {
            (Self::Integer(left), Self::Integer(right)) => Equality::Integer { left, right },
            (Self::Boolean(left), Self::Boolean(right)) => Equality::Boolean { left, right },
            (Self::ByteString(left), Self::ByteString(right)) => {
                Equality::ByteString { left, right }
            }
            (Self::Contract(left), Self::Contract(right)) => Equality::Contract { left, right },
            _ => return None,
        };

        Some(equality)
    }
}

impl From<IntExp> for Exp {
    fn from(value: IntExp) -> Self {
        Self::Integer(value)
    }
}

impl From<BoolExp> for Exp {
    fn from(value: BoolExp) -> Self {
        Self::Boolean(value)
    }
}

impl Display for StorageItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.contract, self.name)
    }
}

impl Display for IntExp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lit { value } => write!(f, "{value}"),
            Self::Var { name, .. } => write!(f, "{name}"),
            Self::Env { value } => write!(f, "{value}"),
            Self::Entry {
                timing: Timing::Pre,
                item,
            } => write!(f, "pre({})", item.name),
            Self::Entry {
                timing: Timing::Post,
                item,
            } => write!(f, "post({})", item.name),
            Self::Add { left, right } => write!(f, "({left} + {right})"),
            Self::Sub { left, right } => write!(f, "({left} - {right})"),
            Self::Mul { left, right } => write!(f, "({left} * {right})"),
            Self::Div { dividend, divisor } => write!(f, "({dividend} / {divisor})"),
            Self::Mod { dividend, divisor } => write!(f, "({dividend} % {divisor})"),
            Self::Exp { base, exponent } => write!(f, "({base} ^ {exponent})"),
            Self::Ite {
                condition,
                then,
                otherwise,
            } => write!(f, "(if {condition} then {then} else {otherwise})"),
        }
    }
}

impl Display for BoolExp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lit { value } => write!(f, "{value}"),
            Self::And { left, right } => write!(f, "({left} and {right})"),
            Self::Or { left, right } => write!(f, "({left} or {right})"),
            Self::Impl {
                antecedent,
                consequent,
            } => write!(f, "({antecedent} => {consequent})"),
            Self::Neg { value } => write!(f, "not({value})"),
            Self::Lt { left, right } => write!(f, "({left} < {right})"),
            Self::LEq { left, right } => write!(f, "({left} <= {right})"),
            Self::Gt { left, right } => write!(f, "({left} > {right})"),
            Self::GEq { left, right } => write!(f, "({left} >= {right})"),
            Self::Eq { equality } => {
                let (left, right) = equality.sides();
                write!(f, "({left} == {right})")
            }
            Self::NEq { equality } => {
                let (left, right) = equality.sides();
                write!(f, "({left} != {right})")
            }
            Self::InRange { typ, value } => write!(f, "inRange({typ}, {value})"),
        }
    }
}

impl Equality {
    fn sides(&self) -> (String, String) {
        match self {
            Self::Integer { left, right } => (left.to_string(), right.to_string()),
            Self::Boolean { left, right } => (left.to_string(), right.to_string()),
            Self::ByteString { left, right } => (left.to_string(), right.to_string()),
            Self::Contract { left, right } => (left.to_string(), right.to_string()),
        }
    }
}

impl Display for BytesExp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lit { value } => write!(f, "0x{}", hex::encode(value)),
            Self::Var { name } => write!(f, "{name}"),
        }
    }
}

impl Display for ContractExp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Var { name, .. } => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        contract::abi::AbiType,
        spec::expression::{BoolExp, BytesExp, Exp, IntExp, Sort, StorageItem},
        vm::value::EnvValue,
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    #[test]
    fn sorts_are_fixed_by_constructors() {
        let int = Exp::from(IntExp::plus(IntExp::lit(1), IntExp::var("v", uint256())));
        let boolean = Exp::from(BoolExp::lt(IntExp::lit(1), IntExp::lit(2)));
        assert_eq!(int.sort(), Sort::Integer);
        assert_eq!(boolean.sort(), Sort::Boolean);
    }

    #[test]
    fn equalities_require_matching_sorts() {
        let int = Exp::from(IntExp::lit(1));
        let bytes = Exp::ByteString(BytesExp::Lit { value: vec![1] });
        assert!(int.clone().equality(bytes).is_none());
        let equality = int.clone().equality(int).map(|e| e.sort());
        assert_eq!(equality, Some(Sort::Integer));
    }

    #[test]
    fn finds_signed_values_outside_conditions() {
        let s = IntExp::var("s", AbiType::Int { size: 256 });
        let n = IntExp::pre(StorageItem::new("C", "n", AbiType::Int { size: 8 }));
        assert!(IntExp::plus(IntExp::lit(1), s.clone()).mentions_signed());
        assert!(IntExp::divide(IntExp::var("v", uint256()), n).mentions_signed());

        let chosen = IntExp::ite(
            BoolExp::int_eq(s.clone(), IntExp::lit(0)),
            IntExp::lit(1),
            IntExp::var("v", uint256()),
        );
        assert!(!chosen.mentions_signed());
        assert!(!IntExp::bool_word(BoolExp::lt(s, IntExp::lit(5))).mentions_signed());
    }

    #[test]
    fn recognises_boolean_words() {
        let condition = BoolExp::lt(IntExp::lit(1), IntExp::lit(2));
        let word = IntExp::bool_word(condition.clone());
        assert_eq!(word.as_bool_word(), Some(&condition));
        assert_eq!(IntExp::lit(1).as_bool_word(), None);
    }

    #[test]
    fn splits_top_level_conjunctions() {
        let a = BoolExp::lt(IntExp::lit(1), IntExp::lit(2));
        let b = BoolExp::TRUE;
        let c = BoolExp::disj(a.clone(), b.clone());
        let nested = BoolExp::conj(BoolExp::conj(a.clone(), b.clone()), c.clone());
        assert_eq!(nested.conjuncts(), vec![a, b, c]);
    }

    #[test]
    fn displays_fully_parenthesised() {
        let item = StorageItem::new("C", "x", uint256());
        let sum = IntExp::plus(IntExp::pre(item), IntExp::env(EnvValue::CallValue));
        let fact = BoolExp::negate(BoolExp::in_range(uint256(), sum));
        assert_eq!(fact.to_string(), "not(inRange(uint256, (pre(x) + CALLVALUE)))");
    }

    #[test]
    fn visits_nested_integers() {
        let condition = BoolExp::int_eq(IntExp::env(EnvValue::Caller), IntExp::lit(0));
        let exp = IntExp::ite(condition, IntExp::lit(1), IntExp::var("v", uint256()));
        let mut seen = Vec::new();
        exp.visit(&mut |e| seen.push(e.clone()));
        assert!(seen.contains(&IntExp::env(EnvValue::Caller)));
        assert!(seen.contains(&IntExp::var("v", uint256())));
        assert_eq!(seen.len(), 5);
    }
}

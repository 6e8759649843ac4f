//! This module contains the canonicaliser for boolean expressions produced by
//! translation.
//!
//! Translation encodes word-level comparisons as `if c then 1 else 0`, and
//! path conditions compare such words against zero. Canonicalisation removes
//! these encodings again so that conditions read as the comparisons they
//! are.

use crate::spec::expression::{BoolExp, Equality, IntExp};

/// Canonicalises `exp`, working bottom-up and descending into the conditions
/// nested inside integer terms.
///
/// The following rewrites are applied, each to either side of an equality:
///
/// ```code
/// not(not(p))              => p
/// (if c then 1 else 0) == 1 => c
/// (if c then 1 else 0) == 0 => not(c)
/// (if c then 1 else 0) != 0 => c
/// (if c then 1 else 0) != 1 => not(c)
/// ```
///
/// The result is equivalent to `exp`, and canonicalising it again leaves it
/// unchanged.
#[must_use]
pub fn canonicalize(exp: BoolExp) -> BoolExp {
    match exp {
        BoolExp::Lit { .. } => exp,
        BoolExp::And { left, right } => BoolExp::conj(canonicalize(*left), canonicalize(*right)),
        BoolExp::Or { left, right } => BoolExp::disj(canonicalize(*left), canonicalize(*right)),
        BoolExp::Impl {
            antecedent,
            consequent,
        } => BoolExp::implies(canonicalize(*antecedent), canonicalize(*consequent)),
        BoolExp::Neg { value } => not(canonicalize(*value)),
        BoolExp::Lt { left, right } => BoolExp::lt(integer(*left), integer(*right)),
        BoolExp::LEq { left, right } => BoolExp::leq(integer(*left), integer(*right)),
        BoolExp::Gt { left, right } => BoolExp::gt(integer(*left), integer(*right)),
        BoolExp::GEq { left, right } => BoolExp::geq(integer(*left), integer(*right)),
        BoolExp::Eq { equality } => equal(*equality, true),
        BoolExp::NEq { equality } => equal(*equality, false),
        BoolExp::InRange { typ, value } => BoolExp::in_range(typ, integer(*value)),
    }
}

/// Negates the canonical `exp`, cancelling a double negation.
fn not(exp: BoolExp) -> BoolExp {
    match exp {
        BoolExp::Neg { value } => *value,
        other => BoolExp::negate(other),
    }
}

/// Canonicalises an equality (when `positive`) or disequality.
fn equal(equality: Equality, positive: bool) -> BoolExp {
    let equality = match equality {
        Equality::Integer { left, right } => {
            let (left, right) = (integer(left), integer(right));
            if let Some(exp) = compared_with_literal(&left, &right, positive)
                .or_else(|| compared_with_literal(&right, &left, positive))
            {
                return exp;
            }
            Equality::Integer { left, right }
        }
        Equality::Boolean { left, right } => Equality::Boolean {
            left:  canonicalize(left),
            right: canonicalize(right),
        },
        other => other,
    };

    let equality = Box::new(equality);
    if positive {
        BoolExp::Eq { equality }
    } else {
        BoolExp::NEq { equality }
    }
}

/// Removes the boolean word encoding from the comparison of `word` with
/// `literal`, if `word` is a boolean word and `literal` is zero or one.
fn compared_with_literal(word: &IntExp, literal: &IntExp, positive: bool) -> Option<BoolExp> {
    let condition = word.as_bool_word()?.clone();
    let holds = match (literal.is_lit(1), literal.is_lit(0)) {
        (true, _) => positive,
        (_, true) => !positive,
        _ => return None,
    };

    Some(if holds { condition } else { not(condition) })
}

/// Canonicalises the conditions nested within the integer term `exp`.
fn integer(exp: IntExp) -> IntExp {
    match exp {
        IntExp::Lit { .. } | IntExp::Var { .. } | IntExp::Env { .. } | IntExp::Entry { .. } => exp,
        IntExp::Add { left, right } => IntExp::plus(integer(*left), integer(*right)),
        IntExp::Sub { left, right } => IntExp::minus(integer(*left), integer(*right)),
        IntExp::Mul { left, right } => IntExp::times(integer(*left), integer(*right)),
        IntExp::Div { dividend, divisor } => IntExp::divide(integer(*dividend), integer(*divisor)),
        IntExp::Mod { dividend, divisor } => IntExp::modulo(integer(*dividend), integer(*divisor)),
        IntExp::Exp { base, exponent } => IntExp::power(integer(*base), integer(*exponent)),
        IntExp::Ite {
            condition,
            then,
            otherwise,
        } => IntExp::ite(canonicalize(*condition), integer(*then), integer(*otherwise)),
    }
}

//! This module contains property tests relating the machine semantics of the
//! terms produced by exploration to the unbounded semantics of their
//! translations.
#![cfg(test)]

use ethnum::U256;
use evm_spec_decompiler::{
    contract::abi::{AbiType, Argument, Interface},
    layout::{LayoutResolver, StorageLayout},
    spec::{
        eval::Valuation,
        expression::{BoolExp, IntExp},
    },
    translate::{canonical::canonicalize, idiom::Idioms, Translator},
    utility::word_to_integer,
    vm::{
        eval,
        eval::Assignment,
        value::{Prop, Word},
    },
};
use proptest::prelude::*;

fn uint256() -> AbiType {
    AbiType::UInt { size: 256 }
}

/// Words biased toward the boundaries at which overflow checks flip.
fn word() -> impl Strategy<Value = U256> {
    prop_oneof![
        Just(U256::ZERO),
        Just(U256::ONE),
        Just(U256::MAX),
        Just(U256::MAX - U256::ONE),
        Just(U256::ONE << 128u32),
        any::<u8>().prop_map(U256::from),
        any::<u128>().prop_map(U256::new),
        (any::<u128>(), any::<u128>()).prop_map(|(hi, lo)| U256::from_words(hi, lo)),
    ]
}

fn assignment(a: U256, b: U256) -> Assignment {
    let mut assignment = Assignment::default();
    assignment.variables.insert("a".into(), a);
    assignment.variables.insert("b".into(), b);
    assignment
}

/// Translates the condition `eq(word, 0)` the way path conditions are.
fn translate_guard(guard: &Word) -> anyhow::Result<BoolExp> {
    let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
    let interface = Interface::new(
        "f",
        vec![Argument::new("a", uint256()), Argument::new("b", uint256())],
    );
    let idioms = Idioms::default();
    let translator = Translator::new(&resolver, &interface, &idioms);

    let prop = Prop::eq_words(guard.clone(), Word::lit(0u8));
    Ok(canonicalize(translator.prop(&prop)?))
}

fn addition_guard() -> Word {
    Word::less_than(Word::bit_xor(Word::var("a"), Word::max()), Word::var("b"))
}

fn multiplication_guard() -> Word {
    let a = Word::var("a");
    Word::bit_and(
        Word::is_zero(Word::is_zero(a.clone())),
        Word::less_than(Word::divide(Word::max(), a), Word::var("b")),
    )
}

/// Conditions over `a` and `b` that mix in boolean word encodings.
fn condition() -> impl Strategy<Value = BoolExp> {
    let a = || IntExp::var("a", uint256());
    let b = || IntExp::var("b", uint256());
    let leaf = prop_oneof![
        any::<bool>().prop_map(|value| BoolExp::Lit { value }),
        Just(BoolExp::lt(a(), b())),
        any::<u8>().prop_map(move |k| BoolExp::int_eq(a(), IntExp::lit(k))),
        Just(BoolExp::in_range(uint256(), IntExp::plus(a(), b()))),
    ];

    leaf.prop_recursive(4, 32, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(BoolExp::negate),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExp::conj(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExp::disj(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| BoolExp::implies(l, r)),
            (inner, 0..2i64, any::<bool>()).prop_map(|(c, k, positive)| {
                let encoded = IntExp::bool_word(c);
                if positive {
                    BoolExp::int_eq(encoded, IntExp::lit(k))
                } else {
                    BoolExp::int_neq(encoded, IntExp::lit(k))
                }
            }),
        ]
    })
}

proptest! {
    #[test]
    fn addition_idiom_agrees_with_the_machine(a in word(), b in word()) {
        let assignment = assignment(a, b);
        let guard = Prop::eq_words(addition_guard(), Word::lit(0u8));
        let translated = translate_guard(&addition_guard())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let on_machine = eval::prop(&guard, &assignment)?;
        let unbounded = Valuation::new(&assignment).bool(&translated)?;
        prop_assert_eq!(on_machine, unbounded);
        prop_assert_eq!(on_machine, a.checked_add(b).is_some());
    }

    #[test]
    fn multiplication_idiom_agrees_with_the_machine(a in word(), b in word()) {
        let assignment = assignment(a, b);
        let guard = Prop::eq_words(multiplication_guard(), Word::lit(0u8));
        let translated = translate_guard(&multiplication_guard())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let on_machine = eval::prop(&guard, &assignment)?;
        let unbounded = Valuation::new(&assignment).bool(&translated)?;
        prop_assert_eq!(on_machine, unbounded);
        prop_assert_eq!(on_machine, a.checked_mul(b).is_some());
    }

    #[test]
    fn bounded_terms_evaluate_identically(a in word(), b in word()) {
        // Comparisons of atoms never wrap, so both semantics agree on them
        let assignment = assignment(a, b);
        let machine = eval::word(&Word::less_than(Word::var("a"), Word::var("b")), &assignment)?;
        let exp = IntExp::bool_word(BoolExp::lt(
            IntExp::var("a", uint256()),
            IntExp::var("b", uint256()),
        ));
        let unbounded = Valuation::new(&assignment).int(&exp)?;
        prop_assert_eq!(word_to_integer(machine), unbounded);
    }

    #[test]
    fn canonicalization_is_idempotent(exp in condition()) {
        let once = canonicalize(exp);
        let twice = canonicalize(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn canonicalization_preserves_truth(exp in condition(), a in word(), b in word()) {
        let valuation = Valuation::new(&assignment(a, b));
        let before = valuation.bool(&exp)?;
        let after = valuation.bool(&canonicalize(exp))?;
        prop_assert_eq!(before, after);
    }
}

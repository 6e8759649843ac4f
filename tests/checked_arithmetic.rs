//! This module is an integration test that checks the overflow guards emitted
//! for checked arithmetic are lifted into range facts, and that the resulting
//! specification round-trips.
#![cfg(test)]

use std::sync::Arc;

use evm_spec_decompiler as esd;
use evm_spec_decompiler::{
    contract::{
        abi::{Argument, Interface, Method},
        Contract,
        EntryPoint,
    },
    decompiler::Config,
    error::{self, translation},
    layout::{StorageLayout, StorageVariable},
    observer::NullObserver,
    spec::{
        expression::{BoolExp, IntExp, StorageItem},
        StorageUpdate,
    },
    translate::{self, idiom::Idioms},
    verify::sampling::SamplingSolver,
    vm::{buffer::Buf, program::Branch, storage::Storage, value::Word},
};

mod common;

fn add() -> Method {
    Method::new(
        Interface::new(
            "add",
            vec![
                Argument::new("a", common::uint256()),
                Argument::new("b", common::uint256()),
            ],
        ),
        vec![common::uint256()],
    )
}

fn scale() -> Method {
    Method::new(
        Interface::new(
            "scale",
            vec![
                Argument::new("a", common::uint256()),
                Argument::new("b", common::uint256()),
            ],
        ),
        vec![common::uint256()],
    )
}

fn increment() -> Method {
    Method::new(Interface::new("increment", vec![]), vec![])
}

fn contract() -> Contract {
    let layout = StorageLayout::new(vec![StorageVariable::value(
        "count",
        0usize,
        common::uint256(),
    )]);
    Contract::new("Counter", vec![0x60, 0x80], vec![0x60, 0x80, 0xfe])
        .with_method(add())
        .with_method(scale())
        .with_method(increment())
        .with_layout(layout)
}

fn explorer() -> common::ScriptedExplorer {
    let (a, b) = (Word::var("a"), Word::var("b"));

    // lt(xor(a, MAX), b)
    let add_overflows = Word::less_than(Word::bit_xor(a.clone(), Word::max()), b.clone());
    let sum = Branch::new(
        vec![],
        Buf::word(Word::plus(a.clone(), b.clone())),
        Storage::Abstract,
    );

    // and(iszero(iszero(a)), lt(div(MAX, a), b))
    let mul_overflows = Word::bit_and(
        Word::is_zero(Word::is_zero(a.clone())),
        Word::less_than(Word::divide(Word::max(), a.clone()), b.clone()),
    );
    let product = Branch::new(vec![], Buf::word(Word::times(a, b)), Storage::Abstract);

    let count = common::sload(0);
    let increment_overflows =
        Word::less_than(Word::bit_xor(count.clone(), Word::max()), Word::lit(1u8));
    let incremented = Branch::new(
        vec![],
        Buf::empty(),
        Storage::Abstract.write(Word::lit(0u8), Word::plus(count, Word::lit(1u8))),
    );

    common::ScriptedExplorer::deploying(&[0x60, 0x80, 0xfe])
        .with_method(
            &add(),
            common::revert_if(add_overflows, "overflow", common::success(sum)),
        )
        .with_method(
            &scale(),
            common::revert_if(mul_overflows, "overflow", common::success(product)),
        )
        .with_method(
            &increment(),
            common::revert_if(increment_overflows, "overflow", common::success(incremented)),
        )
}

fn var(name: &str) -> IntExp {
    IntExp::var(name, common::uint256())
}

fn in_range(value: IntExp) -> BoolExp {
    BoolExp::in_range(common::uint256(), value)
}

#[test]
fn lifts_overflow_checks_into_range_facts() -> anyhow::Result<()> {
    let decompiler =
        common::new_decompiler(contract(), explorer(), NullObserver.in_arc()).summarize();
    let specification = decompiler.assemble()?.enrich().verify()?.specification().clone();

    let add = specification.behaviours_of("add(uint256,uint256)");
    assert_eq!(add.len(), 1);
    let sum = IntExp::plus(var("a"), var("b"));
    assert_eq!(
        add[0].preconditions,
        vec![in_range(sum.clone()), in_range(var("a")), in_range(var("b"))]
    );
    assert_eq!(add[0].returns, Some(sum));

    let scale = specification.behaviours_of("scale(uint256,uint256)");
    assert_eq!(scale.len(), 1);
    let product = IntExp::times(var("a"), var("b"));
    let guarded = BoolExp::implies(
        BoolExp::int_neq(var("a"), IntExp::lit(0)),
        in_range(product.clone()),
    );
    assert_eq!(scale[0].preconditions[0], guarded);
    assert_eq!(scale[0].returns, Some(product));

    Ok(())
}

#[test]
fn ranges_storage_that_is_read() -> anyhow::Result<()> {
    let decompiler = common::new_decompiler(contract(), explorer(), NullObserver.in_arc());
    let specification = decompiler.decompile()?;

    let count = StorageItem::new("Counter", "count", common::uint256());
    let incremented = IntExp::plus(IntExp::pre(count.clone()), IntExp::lit(1));
    let behaviours = specification.behaviours_of("increment()");
    assert_eq!(behaviours.len(), 1);
    assert_eq!(
        behaviours[0].preconditions,
        vec![
            in_range(incremented.clone()),
            in_range(IntExp::pre(count.clone())),
            in_range(IntExp::post(count.clone())),
        ]
    );
    assert_eq!(
        behaviours[0].storage_updates,
        vec![StorageUpdate::new(count, incremented)]
    );

    Ok(())
}

#[test]
fn rejects_overflow_checks_without_idioms() {
    let idioms = translate::Config::default().with_idioms(Idioms::none());
    let decompiler = esd::new(
        contract(),
        Arc::new(explorer()),
        SamplingSolver::default().in_arc(),
        Config::default().with_translation(idioms),
        NullObserver.in_arc(),
    );
    let errors = decompiler.decompile().err().unwrap_or_default();

    assert_eq!(errors.len(), 3);
    for signature in ["add(uint256,uint256)", "scale(uint256,uint256)", "increment()"] {
        let at = errors.at(&EntryPoint::Method {
            signature: signature.into(),
        });
        assert!(matches!(
            at[0],
            error::Error::Translation(translation::Error::UnsupportedWord { .. })
        ));
    }
}

#[test]
fn rejects_chained_overflow_checks() {
    let arguments = ["a", "b", "c"].map(|name| Argument::new(name, common::uint256()));
    let total = Method::new(
        Interface::new("total", arguments.to_vec()),
        vec![common::uint256()],
    );
    let contract = Contract::new("Totals", vec![0x60, 0x80], vec![0x60, 0x80, 0xfe])
        .with_method(total.clone())
        .with_layout(StorageLayout::default());

    // The second check guards a + b + c, whose left operand is itself a sum
    let (a, b, c) = (Word::var("a"), Word::var("b"), Word::var("c"));
    let partial = Word::plus(a.clone(), b.clone());
    let first = Word::less_than(Word::bit_xor(a, Word::max()), b);
    let second = Word::less_than(Word::bit_xor(partial.clone(), Word::max()), c.clone());
    let sum = Branch::new(vec![], Buf::word(Word::plus(partial, c)), Storage::Abstract);
    let program = common::revert_if(
        first,
        "overflow",
        common::revert_if(second, "overflow", common::success(sum)),
    );
    let explorer =
        common::ScriptedExplorer::deploying(&[0x60, 0x80, 0xfe]).with_method(&total, program);

    let errors = common::new_decompiler(contract, explorer, NullObserver.in_arc())
        .decompile()
        .err()
        .unwrap_or_default();

    assert_eq!(errors.len(), 1);
    let at_total = errors.at(&EntryPoint::Method {
        signature: "total(uint256,uint256,uint256)".into(),
    });
    let error::Error::Translation(translation::Error::UnsupportedWord { term }) = at_total[0] else {
        panic!("expected an unsupported word, got {}", at_total[0]);
    };
    assert!(matches!(term.as_ref(), Word::Xor { .. }));
}

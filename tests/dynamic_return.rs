//! This module is an integration test that checks a method with a dynamically
//! sized return is rejected without affecting the other methods of the same
//! contract.
#![cfg(test)]

use std::sync::Arc;

use evm_spec_decompiler::{
    contract::{
        abi::{AbiType, Interface, Method},
        Contract,
        EntryPoint,
    },
    error::{self, assembly},
    layout::{StorageLayout, StorageVariable},
    observer::{Event, RecordingObserver},
    spec::expression::{IntExp, StorageItem},
    vm::{buffer::Buf, program::Branch, storage::Storage},
};

mod common;

fn name() -> Method {
    Method::new(Interface::new("name", vec![]), vec![AbiType::String])
}

fn get() -> Method {
    Method::new(Interface::new("get", vec![]), vec![common::uint256()])
}

fn contract() -> Contract {
    let layout = StorageLayout::new(vec![StorageVariable::value(
        "x",
        0usize,
        common::uint256(),
    )]);
    Contract::new("Named", vec![0x60, 0x80], vec![0xfe])
        .with_method(name())
        .with_method(get())
        .with_layout(layout)
}

fn explorer() -> common::ScriptedExplorer {
    let text = Buf::Abstract {
        name: "name".into(),
    };
    let returns_name = Branch::new(vec![], text, Storage::Abstract);
    let returns_x = Branch::new(vec![], Buf::word(common::sload(0)), Storage::Abstract);

    common::ScriptedExplorer::deploying(&[0xfe])
        .with_method(&name(), common::success(returns_name))
        .with_method(&get(), common::success(returns_x))
}

#[test]
fn rejects_only_the_dynamic_return() -> anyhow::Result<()> {
    let observer = Arc::new(RecordingObserver::new());
    let decompiler = common::new_decompiler(contract(), explorer(), observer.clone());
    let errors = decompiler.decompile().err().unwrap_or_default();

    // Exactly one entry point fails, with the dynamic return named
    let name_entry = EntryPoint::Method {
        signature: "name()".into(),
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.at(&name_entry),
        vec![&error::Error::Assembly(assembly::Error::DynamicReturn {
            typ: AbiType::String,
        })]
    );
    assert!(errors.to_string().contains("dynamically sized return"));

    let rejected = observer.events().into_iter().any(|e| {
        matches!(e, Event::EntryRejected { entry, .. } if entry == name_entry)
    });
    assert!(rejected);

    Ok(())
}

#[test]
fn keeps_the_other_methods_inspectable() -> anyhow::Result<()> {
    let decompiler = common::new_decompiler(
        contract(),
        explorer(),
        Arc::new(RecordingObserver::new()),
    );
    let assembly = decompiler.summarize().assembly();

    assert!(assembly.behaviours_of("name()").is_none());
    let get = assembly
        .behaviours_of("get()")
        .ok_or_else(|| anyhow::anyhow!("get() was not assembled"))?;
    assert_eq!(get.len(), 1);

    let x = StorageItem::new("Named", "x", common::uint256());
    assert_eq!(get[0].returns, Some(IntExp::pre(x)));
    assert!(assembly.constructor.is_ok());

    Ok(())
}

//! This module contains types useful for dealing with concrete contracts that
//! you want to decompile.

pub mod abi;

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    fs::File,
    io::Read,
};

use anyhow::anyhow;
use ethnum::U256;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    contract::abi::{AbiType, Argument, Interface, Method},
    layout::{SlotType, StorageLayout, StorageVariable},
};

/// The name given to the interface of every constructor.
pub const CONSTRUCTOR_NAME: &str = "constructor";

/// A point at which execution of the contract can begin, used to attribute
/// results and errors to the part of the contract that produced them.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    /// The creation code of the contract.
    Constructor,

    /// The method with the provided canonical `signature` in the runtime code.
    Method { signature: String },

    /// The runtime code as a whole, as seen by the selector dispatcher.
    Runtime,
}

impl EntryPoint {
    /// Constructs the entry point for the provided `method`.
    #[must_use]
    pub fn method(method: &Method) -> Self {
        Self::Method {
            signature: method.signature(),
        }
    }
}

impl Display for EntryPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constructor => write!(f, "{CONSTRUCTOR_NAME}"),
            Self::Method { signature } => write!(f, "{signature}"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// A representation of a contract that is passed to the library.
///
/// It carries both the creation and runtime bytecode, along with the parts of
/// the compiler's output that describe how the contract is called and how its
/// storage is laid out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Contract {
    /// The name of the contract.
    pub name: String,

    /// The bytecode that is executed to deploy the contract.
    pub creation_code: Vec<u8>,

    /// The bytecode that is stored on chain and executed upon each call.
    pub runtime_code: Vec<u8>,

    /// The interface of the constructor.
    pub constructor: Interface,

    /// The methods exposed by the runtime code, in declaration order.
    pub methods: Vec<Method>,

    /// The compiler-reported storage layout.
    pub layout: StorageLayout,
}

impl Contract {
    /// Creates a new contract called `name` from its `creation_code` and
    /// `runtime_code`.
    ///
    /// The contract initially has a constructor taking no arguments, no
    /// methods and an empty storage layout.
    #[must_use]
    pub fn new(name: impl Into<String>, creation_code: Vec<u8>, runtime_code: Vec<u8>) -> Self {
        let name = name.into();
        let constructor = Interface::new(CONSTRUCTOR_NAME, vec![]);
        let methods = Vec::new();
        let layout = StorageLayout::default();
        Self {
            name,
            creation_code,
            runtime_code,
            constructor,
            methods,
            layout,
        }
    }

    /// Sets the arguments taken by the constructor.
    #[must_use]
    pub fn with_constructor(mut self, arguments: impl Into<Vec<Argument>>) -> Self {
        self.constructor = Interface::new(CONSTRUCTOR_NAME, arguments);
        self
    }

    /// Adds `method` to the methods exposed by the contract.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Sets the storage layout of the contract.
    #[must_use]
    pub fn with_layout(mut self, layout: StorageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Gets the method with the provided canonical `signature`, if it exists.
    #[must_use]
    pub fn method(&self, signature: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.signature() == signature)
    }

    /// Gets all of the entry points of the contract, constructor first.
    #[must_use]
    pub fn entry_points(&self) -> Vec<EntryPoint> {
        std::iter::once(EntryPoint::Constructor)
            .chain(self.methods.iter().map(EntryPoint::method))
            .collect()
    }

    /// Creates a new contract from the file at the provided `path`.
    ///
    /// The file at `path` must be a compiler artifact in JSON form; see
    /// [`Self::from_artifact_json`] for the fields that are read.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the file cannot be read or is not a valid artifact.
    pub fn new_from_file(path: impl Into<String>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut file = File::open(path).map_err(|_| anyhow!("File not available"))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|_| anyhow!("File could not be read"))?;

        Self::from_artifact_json(&contents)
    }

    /// Creates a new contract from the JSON artifact produced by the compiler.
    ///
    /// The artifact must contain the `abi`, `bytecode.object` and
    /// `deployedBytecode.object` fields, and may contain `contractName` and
    /// `storageLayout` (with its `storage` and `types` tables). The bytecode
    /// must be fully linked.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the artifact is malformed or uses types that cannot
    /// be represented.
    pub fn from_artifact_json(json: &str) -> anyhow::Result<Self> {
        let artifact: CompiledContract =
            serde_json::from_str(json).map_err(|e| anyhow!("Could not parse artifact: {e}"))?;

        let creation_code = decode_bytecode(&artifact.bytecode.object)?;
        let runtime_code = decode_bytecode(&artifact.deployed_bytecode.object)?;
        let mut contract = Self::new(
            artifact.contract_name.unwrap_or_default(),
            creation_code,
            runtime_code,
        );

        for entry in &artifact.abi {
            match entry.kind.as_str() {
                "constructor" => {
                    contract = contract.with_constructor(entry.arguments()?);
                }
                "function" => {
                    let interface = Interface::new(entry.name.clone(), entry.arguments()?);
                    let outputs = entry
                        .outputs
                        .iter()
                        .map(AbiParameter::typ)
                        .collect::<anyhow::Result<Vec<_>>>()?;
                    contract = contract.with_method(Method::new(interface, outputs));
                }
                _ => (),
            }
        }

        if let Some(layout) = &artifact.storage_layout {
            contract = contract.with_layout(layout.resolve()?);
        }

        Ok(contract)
    }
}

/// Decodes hex-encoded bytecode, with or without the `0x` prefix.
fn decode_bytecode(code: &str) -> anyhow::Result<Vec<u8>> {
    let code = code.strip_prefix("0x").unwrap_or(code);
    hex::decode(code).map_err(|_| anyhow!("Could not decode hex"))
}

/// A wrapper for the parts of the JSON representation of the compiled contract
/// on disk that we care about.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompiledContract {
    #[serde(default)]
    contract_name:     Option<String>,
    abi:               Vec<AbiEntry>,
    bytecode:          BytecodeObject,
    deployed_bytecode: BytecodeObject,
    #[serde(default)]
    storage_layout:    Option<CompiledLayout>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct BytecodeObject {
    object: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct AbiEntry {
    #[serde(rename = "type")]
    kind:    String,
    #[serde(default)]
    name:    String,
    #[serde(default)]
    inputs:  Vec<AbiParameter>,
    #[serde(default)]
    outputs: Vec<AbiParameter>,
}

impl AbiEntry {
    fn arguments(&self) -> anyhow::Result<Vec<Argument>> {
        self.inputs
            .iter()
            .map(|p| -> anyhow::Result<Argument> { Ok(Argument::new(p.name.clone(), p.typ()?)) })
            .collect()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct AbiParameter {
    #[serde(default)]
    name:       String,
    #[serde(rename = "type")]
    typ:        String,
    #[serde(default)]
    components: Vec<AbiParameter>,
}

impl AbiParameter {
    /// Resolves the parameter's type, expanding tuple components in place of
    /// the `tuple` keyword.
    fn typ(&self) -> anyhow::Result<AbiType> {
        let spelling = match self.typ.strip_prefix("tuple") {
            Some(dimensions) => {
                let elements = self
                    .components
                    .iter()
                    .map(AbiParameter::typ)
                    .collect::<anyhow::Result<Vec<_>>>()?;
                format!("({}){dimensions}", elements.iter().join(","))
            }
            None => self.typ.clone(),
        };

        Ok(spelling.parse::<AbiType>()?)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct CompiledLayout {
    storage: Vec<CompiledVariable>,
    #[serde(default)]
    types:   HashMap<String, CompiledType>,
}

impl CompiledLayout {
    fn resolve(&self) -> anyhow::Result<StorageLayout> {
        let mut layout = StorageLayout::default();
        for variable in &self.storage {
            let slot = variable
                .slot
                .parse::<U256>()
                .map_err(|_| anyhow!("Invalid slot {} for {}", variable.slot, variable.label))?;
            let typ = self.slot_type(&variable.typ)?;
            layout.add(StorageVariable::new(
                variable.label.clone(),
                slot,
                variable.offset,
                typ,
            ));
        }

        Ok(layout)
    }

    fn slot_type(&self, id: &str) -> anyhow::Result<SlotType> {
        let typ = self.compiled_type(id)?;
        if typ.encoding != "mapping" {
            return Ok(SlotType::Value {
                typ: typ.value_type()?,
            });
        }

        let key_id = typ
            .key
            .as_deref()
            .ok_or_else(|| anyhow!("Mapping {id} has no key type"))?;
        let value_id = typ
            .value
            .as_deref()
            .ok_or_else(|| anyhow!("Mapping {id} has no value type"))?;
        let key = self.compiled_type(key_id)?.value_type()?;

        let slot_type = match self.slot_type(value_id)? {
            SlotType::Value { typ } => SlotType::Mapping {
                keys:  vec![key],
                value: typ,
            },
            SlotType::Mapping { mut keys, value } => {
                keys.insert(0, key);
                SlotType::Mapping { keys, value }
            }
        };

        Ok(slot_type)
    }

    fn compiled_type(&self, id: &str) -> anyhow::Result<&CompiledType> {
        self.types
            .get(id)
            .ok_or_else(|| anyhow!("Unknown storage type {id}"))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
struct CompiledVariable {
    label:  String,
    slot:   String,
    offset: usize,
    #[serde(rename = "type")]
    typ:    String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompiledType {
    encoding:        String,
    label:           String,
    #[serde(default)]
    key:             Option<String>,
    #[serde(default)]
    value:           Option<String>,
    number_of_bytes: String,
}

impl CompiledType {
    /// Interprets the type's label as an ABI type.
    fn value_type(&self) -> anyhow::Result<AbiType> {
        if let Ok(typ) = self.label.parse() {
            return Ok(typ);
        }

        if self.label.starts_with("contract ") {
            return Ok(AbiType::Address);
        }

        if self.label.starts_with("enum ") {
            let bytes = self
                .number_of_bytes
                .parse::<usize>()
                .map_err(|_| anyhow!("Invalid width for {}", self.label))?;
            return Ok(AbiType::UInt { size: bytes * 8 });
        }

        // Struct members are never read through a layout, so they remain opaque.
        if self.label.starts_with("struct ") {
            return Ok(AbiType::Tuple {
                elements: Vec::new(),
            });
        }

        Err(anyhow!("Unsupported storage type {}", self.label))
    }
}

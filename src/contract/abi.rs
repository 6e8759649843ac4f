//! This module contains the definition of the solidity ABI types that the
//! library is capable of reading from compiler output, along with the
//! interfaces of the entry points that use them.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use ethnum::U256;
use itertools::Itertools;
use num::BigInt;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::{
    constant::{ADDRESS_WIDTH_BITS, SELECTOR_WIDTH_BYTES, WORD_SIZE_BITS, WORD_SIZE_BYTES},
    utility::{pow2, U256Wrapper},
};

/// Solidity ABI types as declared in a contract's interface and storage
/// layout.
///
/// # Invariants
///
/// Each individual variant in the enum describes the invariants placed upon it.
/// It is the responsibility of the code constructing these values to ensure
/// that the invariants are satisfied. Values produced by [`AbiType::from_str`]
/// always satisfy them.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbiType {
    /// Unsigned integers of a given `size` in bits, where `8 <= size <= 256 &&
    /// size % 8 == 0`.
    UInt { size: usize },

    /// Signed (two's complement) integers of a given `size` in bits, where `8
    /// <= size <= 256 && size % 8 == 0`.
    Int { size: usize },

    /// Addresses, assumed equivalent to `UInt { size: 160 }` except for
    /// interpretation.
    Address,

    /// Booleans, with the values `0` and `1`.
    Bool,

    /// Byte arrays of a fixed `length`, where `0 < length <= 32`.
    Bytes { length: usize },

    /// A dynamically-sized byte array, with each element packed.
    DynBytes,

    /// A dynamically-sized UTF-8 string.
    String,

    /// A fixed-`size` array containing elements of an element type `tp`.
    Array {
        size: U256Wrapper,
        #[serde(rename = "type")]
        tp:   Box<AbiType>,
    },

    /// A dynamically-sized array containing elements of a type `tp`.
    DynArray {
        #[serde(rename = "type")]
        tp: Box<AbiType>,
    },

    /// A tuple (or struct), with the specified `elements` in order.
    Tuple { elements: Vec<AbiType> },

    /// An external function pointer, consisting of an address followed by a
    /// selector.
    Function,
}

impl AbiType {
    /// Checks if values of this type have a size that is only known at
    /// runtime.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::DynBytes | Self::String | Self::DynArray { .. } => true,
            Self::Array { tp, .. } => tp.is_dynamic(),
            Self::Tuple { elements } => elements.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Checks if this type is a tuple.
    #[must_use]
    pub fn is_tuple(&self) -> bool {
        matches!(self, Self::Tuple { .. })
    }

    /// Checks if this type is a function pointer.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function)
    }

    /// Checks if this type is an elementary value type that occupies at most
    /// one word.
    #[must_use]
    pub fn is_elementary(&self) -> bool {
        matches!(
            self,
            Self::UInt { .. } | Self::Int { .. } | Self::Address | Self::Bool | Self::Bytes { .. }
        )
    }

    /// Gets the half-open integer range `[low, high)` of the values that
    /// inhabit this type, if it is interpreted as an integer.
    #[must_use]
    pub fn integer_range(&self) -> Option<(BigInt, BigInt)> {
        match self {
            Self::UInt { size } => Some((BigInt::from(0), pow2(*size))),
            Self::Int { size } => {
                let half = pow2(size.saturating_sub(1));
                Some((-half.clone(), half))
            }
            Self::Address => Some((BigInt::from(0), pow2(ADDRESS_WIDTH_BITS))),
            Self::Bool => Some((BigInt::from(0), BigInt::from(2))),
            _ => None,
        }
    }

    /// Gets the width of this type in bits if it is interpreted as an
    /// integer.
    #[must_use]
    pub fn integer_width(&self) -> Option<usize> {
        match self {
            Self::UInt { size } | Self::Int { size } => Some(*size),
            Self::Address => Some(ADDRESS_WIDTH_BITS),
            Self::Bool => Some(1),
            _ => None,
        }
    }
}

/// Prints the canonical spelling of the type as used in method signatures.
impl Display for AbiType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UInt { size } => write!(f, "uint{size}"),
            Self::Int { size } => write!(f, "int{size}"),
            Self::Address => write!(f, "address"),
            Self::Bool => write!(f, "bool"),
            Self::Bytes { length } => write!(f, "bytes{length}"),
            Self::DynBytes => write!(f, "bytes"),
            Self::String => write!(f, "string"),
            Self::Array { size, tp } => write!(f, "{tp}[{size}]"),
            Self::DynArray { tp } => write!(f, "{tp}[]"),
            Self::Tuple { elements } => write!(f, "({})", elements.iter().join(",")),
            Self::Function => write!(f, "function"),
        }
    }
}

/// The error produced when a string does not spell a valid ABI type.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("Invalid ABI type {0:?}")]
pub struct InvalidAbiType(pub String);

impl FromStr for AbiType {
    type Err = InvalidAbiType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || InvalidAbiType(s.to_string());

        if let Some(prefix) = s.strip_suffix(']') {
            let open = prefix.rfind('[').ok_or_else(invalid)?;
            let tp = Box::new(prefix[..open].parse::<AbiType>()?);
            let dimension = &prefix[open + 1..];
            return if dimension.is_empty() {
                Ok(Self::DynArray { tp })
            } else {
                let size = dimension.parse::<usize>().map_err(|_| invalid())?;
                Ok(Self::Array {
                    size: size.into(),
                    tp,
                })
            };
        }

        if let Some(body) = s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let elements = split_top_level(body)
                .into_iter()
                .map(str::parse)
                .collect::<Result<Vec<AbiType>, _>>()?;
            return Ok(Self::Tuple { elements });
        }

        let typ = match s {
            "address" => Self::Address,
            "bool" => Self::Bool,
            "bytes" => Self::DynBytes,
            "string" => Self::String,
            "function" => Self::Function,
            "uint" => Self::UInt {
                size: WORD_SIZE_BITS,
            },
            "int" => Self::Int {
                size: WORD_SIZE_BITS,
            },
            _ => {
                if let Some(size) = s.strip_prefix("uint") {
                    Self::UInt {
                        size: parse_integer_width(size).ok_or_else(invalid)?,
                    }
                } else if let Some(size) = s.strip_prefix("int") {
                    Self::Int {
                        size: parse_integer_width(size).ok_or_else(invalid)?,
                    }
                } else if let Some(length) = s.strip_prefix("bytes") {
                    let length = length.parse::<usize>().map_err(|_| invalid())?;
                    if length == 0 || length > WORD_SIZE_BYTES {
                        return Err(invalid());
                    }
                    Self::Bytes { length }
                } else {
                    return Err(invalid());
                }
            }
        };

        Ok(typ)
    }
}

/// Parses the bit width suffix of an integer type.
fn parse_integer_width(size: &str) -> Option<usize> {
    let size = size.parse::<usize>().ok()?;
    (size > 0 && size <= WORD_SIZE_BITS && size % 8 == 0).then_some(size)
}

/// Splits the comma-separated elements of a tuple body without splitting
/// inside nested tuples.
fn split_top_level(body: &str) -> Vec<&str> {
    if body.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (ix, char) in body.char_indices() {
        match char {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..ix]);
                start = ix + 1;
            }
            _ => (),
        }
    }
    parts.push(&body[start..]);

    parts
}

/// A method selector, being the first four bytes of the keccak hash of the
/// method's signature.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Selector(pub [u8; SELECTOR_WIDTH_BYTES]);

impl Selector {
    /// Computes the selector for the provided method `signature`, such as
    /// `transfer(address,uint256)`.
    #[must_use]
    pub fn of(signature: &str) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(signature.as_bytes());
        let hash = hasher.finalize();

        let mut bytes = [0u8; SELECTOR_WIDTH_BYTES];
        bytes.copy_from_slice(&hash[..SELECTOR_WIDTH_BYTES]);
        Self(bytes)
    }

    /// Gets the selector as a word, placed in the low-order bytes.
    #[must_use]
    pub fn as_word(&self) -> U256 {
        U256::from(u32::from_be_bytes(self.0))
    }

    /// Constructs a selector from the low-order four bytes of `word`.
    #[must_use]
    pub fn from_word(word: U256) -> Self {
        let bytes = word.to_be_bytes();
        let mut selector = [0u8; SELECTOR_WIDTH_BYTES];
        selector.copy_from_slice(&bytes[WORD_SIZE_BYTES - SELECTOR_WIDTH_BYTES..]);
        Self(selector)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        let bytes: [u8; SELECTOR_WIDTH_BYTES] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("selectors are four bytes long"))?;
        Ok(Self(bytes))
    }
}

/// A named and typed argument to an entry point.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Argument {
    pub name: String,

    #[serde(rename = "type")]
    pub typ: AbiType,
}

impl Argument {
    /// Constructs a new argument called `name` of type `typ`.
    #[must_use]
    pub fn new(name: impl Into<String>, typ: AbiType) -> Self {
        let name = name.into();
        Self { name, typ }
    }
}

/// The calling interface of an entry point: its name and ordered arguments.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Interface {
    pub name: String,

    pub arguments: Vec<Argument>,
}

impl Interface {
    /// Constructs a new interface called `name` taking `arguments`.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: impl Into<Vec<Argument>>) -> Self {
        let name = name.into();
        let arguments = arguments.into();
        Self { name, arguments }
    }

    /// Gets the canonical signature of the interface, for example
    /// `set(uint256)`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "{}({})",
            self.name,
            self.arguments.iter().map(|a| &a.typ).join(",")
        )
    }

    /// Gets the selector through which calls to this interface are
    /// dispatched.
    #[must_use]
    pub fn selector(&self) -> Selector {
        Selector::of(&self.signature())
    }

    /// Gets the argument called `name`, if it exists.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// A method exposed by the runtime code of a contract.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Method {
    pub interface: Interface,

    /// The declared return types of the method, in order.
    pub outputs: Vec<AbiType>,
}

impl Method {
    /// Constructs a new method with the provided `interface` that returns
    /// `outputs`.
    #[must_use]
    pub fn new(interface: Interface, outputs: impl Into<Vec<AbiType>>) -> Self {
        let outputs = outputs.into();
        Self { interface, outputs }
    }

    /// Gets the selector of the method.
    #[must_use]
    pub fn selector(&self) -> Selector {
        self.interface.selector()
    }

    /// Gets the canonical signature of the method.
    #[must_use]
    pub fn signature(&self) -> String {
        self.interface.signature()
    }
}

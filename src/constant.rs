//! This module contains constants that are needed throughout the codebase.

/// The width of a word on the EVM in bits.
pub const WORD_SIZE_BITS: usize = 256;

/// The width of a word on the EVM in bytes.
pub const WORD_SIZE_BYTES: usize = WORD_SIZE_BITS / BYTE_SIZE_BITS;

/// The size of a byte in bits.
pub const BYTE_SIZE_BITS: usize = 8;

/// The width of an address on the EVM in bits.
pub const ADDRESS_WIDTH_BITS: usize = 160;

/// The width of a method selector in bytes.
///
/// This is the prefix of the call data that the contract dispatches upon, and
/// is the first four bytes of the keccak hash of the method's signature.
pub const SELECTOR_WIDTH_BYTES: usize = 4;

/// The number of assignments that the sampling solver evaluates per
/// equivalence query by default.
pub const DEFAULT_SAMPLE_COUNT: usize = 256;

/// The number of random selectors that the sampling solver probes when
/// checking exhaustiveness, in addition to those found in the bytecode.
pub const DEFAULT_SELECTOR_SAMPLE_COUNT: usize = 64;

/// The number of assignments tried for each probed selector when checking
/// exhaustiveness.
pub const DEFAULT_ASSIGNMENTS_PER_SELECTOR: usize = 8;

/// The seed used for the sampling solver's random number generator by default.
pub const DEFAULT_SAMPLE_SEED: u64 = 0x00de_c0de_5eed;

/// Whether the round-trip verifier checks that every selector dispatched by
/// the runtime code is covered by a behaviour by default.
pub const DEFAULT_CHECK_EXHAUSTIVENESS: bool = true;

/// The largest offset at which a concrete evaluation will write into a
/// buffer.
///
/// This is used to bound evaluation and ensure that we don't end up
/// allocating too much memory for a sampled offset.
pub const MAXIMUM_BUFFER_OFFSET_BYTES: usize = 0x1_0000;

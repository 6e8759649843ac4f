//! This module contains the representation of symbolic byte buffers, such as
//! the data returned from a call.

use ethnum::U256;

use crate::{constant::WORD_SIZE_BYTES, utility::word_to_offset, vm::value::Word};

/// A symbolic byte buffer.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Buf {
    /// A buffer of fully-known bytes.
    Concrete { bytes: Vec<u8> },

    /// A buffer about which nothing is known.
    Abstract { name: String },

    /// The word `value` written at `offset` over the contents of `base`.
    WriteWord {
        offset: Word,
        value:  Word,
        base:   Box<Buf>,
    },
}

impl Buf {
    /// Constructs an empty concrete buffer.
    #[must_use]
    pub fn empty() -> Self {
        Self::Concrete { bytes: Vec::new() }
    }

    /// Constructs a buffer containing only `value` at offset zero.
    #[must_use]
    pub fn word(value: Word) -> Self {
        Self::WriteWord {
            offset: Word::lit(0u8),
            value,
            base: Box::new(Self::empty()),
        }
    }
}

/// Reads the word at the concrete `offset` of `buffer`, if the shape of the
/// buffer determines it.
///
/// A word written at exactly `offset` is returned directly, and a concrete
/// buffer is read with zero padding. Reads past a write at a different
/// concrete offset look through to its base only when the two words cannot
/// overlap.
#[must_use]
pub fn read_word(buffer: &Buf, offset: usize) -> Option<Word> {
    match buffer {
        Buf::Concrete { bytes } => {
            let mut word = [0u8; WORD_SIZE_BYTES];
            for (ix, byte) in word.iter_mut().enumerate() {
                *byte = bytes.get(offset + ix).copied().unwrap_or_default();
            }
            Some(Word::lit(U256::from_be_bytes(word)))
        }
        Buf::Abstract { .. } => None,
        Buf::WriteWord {
            offset: written,
            value,
            base,
        } => {
            let written = word_to_offset(written.as_lit()?)?;
            if written == offset {
                Some(value.clone())
            } else if written + WORD_SIZE_BYTES <= offset || offset + WORD_SIZE_BYTES <= written {
                read_word(base, offset)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::vm::{
        buffer::{read_word, Buf},
        value::Word,
    };

    #[test]
    fn reads_written_words() {
        let buffer = Buf::word(Word::var("r"));
        assert_eq!(read_word(&buffer, 0), Some(Word::var("r")));
    }

    #[test]
    fn reads_concrete_buffers_with_padding() {
        let buffer = Buf::Concrete { bytes: vec![0x01] };
        let expected = U256::from(1u8) << 248u32;
        assert_eq!(read_word(&buffer, 0), Some(Word::lit(expected)));
        assert_eq!(read_word(&Buf::empty(), 0), Some(Word::lit(0u8)));
    }

    #[test]
    fn looks_through_disjoint_writes_only() {
        let buffer = Buf::WriteWord {
            offset: Word::lit(32u8),
            value:  Word::var("later"),
            base:   Box::new(Buf::word(Word::var("first"))),
        };
        assert_eq!(read_word(&buffer, 0), Some(Word::var("first")));

        let overlapping = Buf::WriteWord {
            offset: Word::lit(16u8),
            value:  Word::var("later"),
            base:   Box::new(Buf::word(Word::var("first"))),
        };
        assert_eq!(read_word(&overlapping, 0), None);
        assert_eq!(read_word(&Buf::Abstract { name: "b".into() }, 0), None);
    }
}

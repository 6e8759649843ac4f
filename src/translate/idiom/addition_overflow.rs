//! This module provides an idiom that recognises the overflow check emitted
//! for checked unsigned addition.

use ethnum::U256;

use crate::{
    contract::abi::AbiType,
    error::translation::Result,
    spec::expression::{BoolExp, IntExp},
    translate::{
        idiom::{unsigned_operand, Idiom},
        Translator,
    },
    vm::value::{Prop, Word},
};

/// This idiom detects the check that `x + y` overflows a word.
///
/// The compiler emits the check as a comparison against the bitwise
/// complement of one operand, which is `2^256 - 1 - x`:
///
/// ```code
/// lt(xor(x, MAX), y)
///
/// becomes
///
/// not(inRange(uint256, x + y))
/// ```
///
/// The complement may appear on either side of the `xor`. At the level of
/// words the result is encoded as a boolean word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdditionOverflow;

impl AdditionOverflow {
    /// Constructs a new instance of the addition overflow idiom.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn recognise(
        complement: &Word,
        y: &Word,
        translator: &Translator<'_>,
    ) -> Result<Option<BoolExp>> {
        let Word::Xor { left, right } = complement else {
            return Ok(None);
        };
        let x = if right.is_lit(U256::MAX) {
            left
        } else if left.is_lit(U256::MAX) {
            right
        } else {
            return Ok(None);
        };

        let Some(x) = unsigned_operand(x, translator)? else {
            return Ok(None);
        };
        let Some(y) = unsigned_operand(y, translator)? else {
            return Ok(None);
        };

        let sum = IntExp::plus(x, y);
        let uint256 = AbiType::UInt { size: 256 };
        Ok(Some(BoolExp::negate(BoolExp::in_range(uint256, sum))))
    }
}

impl Default for AdditionOverflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Idiom for AdditionOverflow {
    fn word(&self, word: &Word, translator: &Translator<'_>) -> Result<Option<IntExp>> {
        let Word::Lt { left, right } = word else {
            return Ok(None);
        };

        Ok(Self::recognise(left, right, translator)?.map(IntExp::bool_word))
    }

    fn prop(&self, prop: &Prop, translator: &Translator<'_>) -> Result<Option<BoolExp>> {
        let Prop::Lt { left, right } = prop else {
            return Ok(None);
        };

        Self::recognise(left, right, translator)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        contract::abi::{AbiType, Argument, Interface},
        error::translation::Error,
        layout::{LayoutResolver, StorageLayout},
        spec::expression::{BoolExp, IntExp},
        translate::{
            idiom::{addition_overflow::AdditionOverflow, Idiom, Idioms},
            Translator,
        },
        vm::value::{Prop, Word},
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    fn overflow() -> BoolExp {
        let sum = IntExp::plus(IntExp::var("a", uint256()), IntExp::var("b", uint256()));
        BoolExp::negate(BoolExp::in_range(uint256(), sum))
    }

    fn interface() -> Interface {
        Interface::new(
            "add",
            vec![
                Argument::new("a", uint256()),
                Argument::new("b", uint256()),
                Argument::new("s", AbiType::Int { size: 256 }),
            ],
        )
    }

    #[test]
    fn recognises_either_operand_order() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
        let interface = interface();
        let idioms = Idioms::none();
        let translator = Translator::new(&resolver, &interface, &idioms);
        let idiom = AdditionOverflow::new();

        let complement = Word::bit_xor(Word::var("a"), Word::max());
        let prop = Prop::lt(complement, Word::var("b"));
        assert_eq!(idiom.prop(&prop, &translator)?, Some(overflow()));

        let flipped = Word::bit_xor(Word::max(), Word::var("a"));
        let word = Word::less_than(flipped, Word::var("b"));
        assert_eq!(
            idiom.word(&word, &translator)?,
            Some(IntExp::bool_word(overflow()))
        );

        Ok(())
    }

    #[test]
    fn ignores_other_shapes() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
        let interface = interface();
        let idioms = Idioms::none();
        let translator = Translator::new(&resolver, &interface, &idioms);
        let idiom = AdditionOverflow::new();

        let not_complement = Word::bit_xor(Word::var("a"), Word::lit(1u8));
        let word = Word::less_than(not_complement, Word::var("b"));
        assert_eq!(idiom.word(&word, &translator)?, None);

        let signed = Word::bit_xor(Word::var("s"), Word::max());
        let word = Word::less_than(signed, Word::var("b"));
        assert_eq!(idiom.word(&word, &translator)?, None);

        let plain = Prop::lt(Word::var("a"), Word::var("b"));
        assert_eq!(idiom.prop(&plain, &translator)?, None);

        Ok(())
    }

    #[test]
    fn unmatched_shapes_fall_through_to_structural_translation() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
        let interface = interface();
        let idioms = Idioms::default();
        let translator = Translator::new(&resolver, &interface, &idioms);

        let complement = Word::bit_xor(Word::var("a"), Word::max());
        let word = Word::less_than(complement, Word::var("b"));
        assert_eq!(translator.word(&word)?, IntExp::bool_word(overflow()));

        let not_complement = Word::bit_xor(Word::var("a"), Word::lit(1u8));
        let word = Word::less_than(not_complement, Word::var("b"));
        assert!(matches!(
            translator.word(&word),
            Err(Error::UnsupportedWord { .. })
        ));

        Ok(())
    }
}

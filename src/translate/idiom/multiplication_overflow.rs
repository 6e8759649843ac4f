//! This module provides an idiom that recognises the overflow check emitted
//! for checked unsigned multiplication.

use ethnum::U256;

use crate::{
    contract::abi::AbiType,
    error::translation::Result,
    spec::expression::{BoolExp, IntExp},
    translate::{
        idiom::{unsigned_operand, Idiom},
        Translator,
    },
    vm::value::{Prop, Term, Word},
};

/// This idiom detects the check that `x * z` overflows a word.
///
/// The compiler guards the division against a zero `x`, so the check has the
/// following form, where `x` and `x'` are structurally identical:
///
/// ```code
/// and(not(eq(x, 0)), lt(div(MAX, x'), z))
///
/// becomes
///
/// not(x != 0 => inRange(uint256, x * z))
/// ```
///
/// At the level of words the guard is `iszero(iszero(x))` and the conjunction
/// is a bitwise `and` of the two boolean words.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MultiplicationOverflow;

impl MultiplicationOverflow {
    /// Constructs a new instance of the multiplication overflow idiom.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Recognises the check from the `guarded` operand of the guard and the
    /// comparison of `quotient` with `z`.
    fn recognise(
        guarded: &Word,
        quotient: &Word,
        z: &Word,
        translator: &Translator<'_>,
    ) -> Result<Option<BoolExp>> {
        let Word::Div { dividend, divisor } = quotient else {
            return Ok(None);
        };
        if !dividend.is_lit(U256::MAX) || divisor.as_ref() != guarded {
            return Ok(None);
        }

        let Some(x) = unsigned_operand(guarded, translator)? else {
            return Ok(None);
        };
        let Some(z) = unsigned_operand(z, translator)? else {
            return Ok(None);
        };

        let non_zero = BoolExp::int_neq(x.clone(), IntExp::lit(0));
        let product = IntExp::times(x, z);
        let uint256 = AbiType::UInt { size: 256 };
        let in_range = BoolExp::implies(non_zero, BoolExp::in_range(uint256, product));
        Ok(Some(BoolExp::negate(in_range)))
    }
}

impl Default for MultiplicationOverflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Idiom for MultiplicationOverflow {
    fn word(&self, word: &Word, translator: &Translator<'_>) -> Result<Option<IntExp>> {
        let Word::And { left, right } = word else {
            return Ok(None);
        };
        let Word::IsZero { number } = left.as_ref() else {
            return Ok(None);
        };
        let Word::IsZero { number: guarded } = number.as_ref() else {
            return Ok(None);
        };
        let Word::Lt {
            left: quotient,
            right: z,
        } = right.as_ref()
        else {
            return Ok(None);
        };

        Ok(Self::recognise(guarded, quotient, z, translator)?.map(IntExp::bool_word))
    }

    fn prop(&self, prop: &Prop, translator: &Translator<'_>) -> Result<Option<BoolExp>> {
        let Prop::And { left, right } = prop else {
            return Ok(None);
        };
        let Prop::Neg(guard) = left.as_ref() else {
            return Ok(None);
        };
        let Prop::Eq {
            left: Term::Word(guard_left),
            right: Term::Word(guard_right),
        } = guard.as_ref()
        else {
            return Ok(None);
        };
        // The zero may be on either side of the guard
        let guarded = match (guard_left.is_lit(U256::ZERO), guard_right.is_lit(U256::ZERO)) {
            (false, true) => guard_left,
            (true, false) => guard_right,
            _ => return Ok(None),
        };
        let Prop::Lt {
            left: quotient,
            right: z,
        } = right.as_ref()
        else {
            return Ok(None);
        };

        Self::recognise(guarded, quotient, z, translator)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        contract::abi::{AbiType, Argument, Interface},
        layout::{LayoutResolver, StorageLayout},
        spec::expression::{BoolExp, IntExp},
        translate::{
            idiom::{multiplication_overflow::MultiplicationOverflow, Idiom, Idioms},
            Translator,
        },
        vm::value::{Prop, Word},
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    fn interface() -> Interface {
        Interface::new(
            "mul",
            vec![Argument::new("x", uint256()), Argument::new("z", uint256())],
        )
    }

    fn overflow() -> BoolExp {
        let x = IntExp::var("x", uint256());
        let z = IntExp::var("z", uint256());
        BoolExp::negate(BoolExp::implies(
            BoolExp::int_neq(x.clone(), IntExp::lit(0)),
            BoolExp::in_range(uint256(), IntExp::times(x, z)),
        ))
    }

    #[test]
    fn recognises_the_guarded_check() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
        let interface = interface();
        let idioms = Idioms::none();
        let translator = Translator::new(&resolver, &interface, &idioms);
        let idiom = MultiplicationOverflow::new();

        let quotient = Word::divide(Word::max(), Word::var("x"));
        let prop = Prop::conj(
            Prop::negate(Prop::eq_words(Word::var("x"), Word::lit(0u8))),
            Prop::lt(quotient.clone(), Word::var("z")),
        );
        assert_eq!(idiom.prop(&prop, &translator)?, Some(overflow()));

        let flipped = Prop::conj(
            Prop::negate(Prop::eq_words(Word::lit(0u8), Word::var("x"))),
            Prop::lt(quotient.clone(), Word::var("z")),
        );
        assert_eq!(idiom.prop(&flipped, &translator)?, Some(overflow()));

        let word = Word::bit_and(
            Word::is_zero(Word::is_zero(Word::var("x"))),
            Word::less_than(quotient, Word::var("z")),
        );
        assert_eq!(
            idiom.word(&word, &translator)?,
            Some(IntExp::bool_word(overflow()))
        );

        Ok(())
    }

    #[test]
    fn requires_the_guard_to_match_the_divisor() -> anyhow::Result<()> {
        let resolver = LayoutResolver::new("C", &StorageLayout::default())?;
        let interface = interface();
        let idioms = Idioms::none();
        let translator = Translator::new(&resolver, &interface, &idioms);
        let idiom = MultiplicationOverflow::new();

        let prop = Prop::conj(
            Prop::negate(Prop::eq_words(Word::var("z"), Word::lit(0u8))),
            Prop::lt(Word::divide(Word::max(), Word::var("x")), Word::var("z")),
        );
        assert_eq!(idiom.prop(&prop, &translator)?, None);

        let prop = Prop::conj(
            Prop::negate(Prop::eq_words(Word::var("x"), Word::lit(0u8))),
            Prop::lt(Word::divide(Word::lit(7u8), Word::var("x")), Word::var("z")),
        );
        assert_eq!(idiom.prop(&prop, &translator)?, None);

        Ok(())
    }
}

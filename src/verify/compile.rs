//! This module contains the compiler from specifications back into the
//! symbolic domain of the bytecode, so that both can be checked against one
//! another.
//!
//! Integer expressions become wrapping word terms and storage references
//! become reads of the pre-state or post-state store. Range facts are the
//! exception, as they are about unbounded values: a compiled `inRange` holds
//! under an assignment precisely when the unbounded value of its operand lies
//! in the range of its type.

use std::collections::BTreeMap;

use ethnum::U256;

use crate::{
    constant::{BYTE_SIZE_BITS, WORD_SIZE_BITS},
    contract::abi::AbiType,
    error::verification::{Error, Result},
    layout::LayoutResolver,
    spec::{
        expression::{BoolExp, Equality, IntExp, StorageItem, Timing},
        Behaviour,
        Constructor,
        StorageUpdate,
    },
    utility::{integer_to_word, low_bits_mask},
    vm::{
        buffer::Buf,
        program::Branch,
        storage::Storage,
        value::{Prop, Term, Word},
    },
};

/// Compiles the `constructor` of a contract into a single success branch
/// that starts from empty storage and returns `runtime_code`.
///
/// # Errors
///
/// Returns [`Err`] if any part of the constructor cannot be compiled.
pub fn constructor(
    resolver: &LayoutResolver,
    constructor: &Constructor,
    runtime_code: &[u8],
) -> Result<Branch> {
    let initial = Compiler::new(resolver, Storage::empty());
    let storage = initial.updates(Storage::empty(), &constructor.initial_storage)?;
    let compiler = initial.with_post(storage.clone(), &constructor.initial_storage);

    let conditions = compiler.conditions(&constructor.preconditions)?;
    let returned = Buf::Concrete {
        bytes: runtime_code.to_vec(),
    };

    Ok(Branch::new(conditions, returned, storage))
}

/// Compiles `behaviour` into a single success branch over abstract storage.
///
/// # Errors
///
/// Returns [`Err`] if any part of the behaviour cannot be compiled.
pub fn behaviour(resolver: &LayoutResolver, behaviour: &Behaviour) -> Result<Branch> {
    let initial = Compiler::new(resolver, Storage::Abstract);
    let storage = initial.updates(Storage::Abstract, &behaviour.storage_updates)?;
    let compiler = initial.with_post(storage.clone(), &behaviour.storage_updates);

    let conditions = compiler.conditions(&behaviour.preconditions)?;
    let returned = match &behaviour.returns {
        Some(value) => Buf::word(compiler.int(value)?),
        None => Buf::empty(),
    };

    Ok(Branch::new(conditions, returned, storage))
}

/// Compiles expressions against a fixed pre-state store and, optionally, the
/// post-state store produced by a set of updates.
#[derive(Clone, Debug)]
pub struct Compiler<'a> {
    resolver: &'a LayoutResolver,
    pre:      Storage,
    post:     Option<Storage>,
    updates:  BTreeMap<String, IntExp>,
}

impl<'a> Compiler<'a> {
    /// Constructs a compiler that reads the pre-state from `pre` and has no
    /// post-state.
    #[must_use]
    pub fn new(resolver: &'a LayoutResolver, pre: Storage) -> Self {
        Self {
            resolver,
            pre,
            post: None,
            updates: BTreeMap::new(),
        }
    }

    /// Sets the post-state to `post`, which must be the result of applying
    /// `updates` to the pre-state.
    #[must_use]
    pub fn with_post(mut self, post: Storage, updates: &[StorageUpdate]) -> Self {
        self.post = Some(post);
        self.updates = updates
            .iter()
            .map(|u| (u.item.name.clone(), u.value.clone()))
            .collect();
        self
    }

    /// Compiles `updates` as writes on top of `base`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any target or value cannot be compiled.
    pub fn updates(&self, base: Storage, updates: &[StorageUpdate]) -> Result<Storage> {
        updates.iter().try_fold(base, |storage, update| {
            let slot = self.slot(&update.item)?;
            Ok(storage.write(Word::lit(slot), self.int(&update.value)?))
        })
    }

    /// Compiles each of `preconditions`, dropping those that are trivially
    /// true.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any precondition cannot be compiled.
    pub fn conditions(&self, preconditions: &[BoolExp]) -> Result<Vec<Prop>> {
        let mut conditions = Vec::new();
        for precondition in preconditions {
            let condition = self.bool(precondition)?;
            if condition != Prop::Bool(true) {
                conditions.push(condition);
            }
        }

        Ok(conditions)
    }

    /// Compiles the integer expression `exp` into a wrapping word term.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if `exp` contains a literal outside the word range, or
    /// refers to storage that cannot be located.
    pub fn int(&self, exp: &IntExp) -> Result<Word> {
        let word = match exp {
            IntExp::Lit { value } => Word::lit(
                integer_to_word(value).ok_or_else(|| Error::LiteralOutOfRange {
                    value: value.clone(),
                })?,
            ),
            IntExp::Var { name, .. } => Word::var(name),
            IntExp::Env { value } => Word::env(*value),
            IntExp::Entry { timing, item } => {
                Word::sload(Word::lit(self.slot(item)?), self.store(*timing)?.clone())
            }
            IntExp::Add { left, right } => Word::plus(self.int(left)?, self.int(right)?),
            IntExp::Sub { left, right } => Word::minus(self.int(left)?, self.int(right)?),
            IntExp::Mul { left, right } => Word::times(self.int(left)?, self.int(right)?),
            IntExp::Div { dividend, divisor } => {
                let (dividend, divisor) = self.unsigned(exp, dividend, divisor)?;
                Word::divide(dividend, divisor)
            }
            IntExp::Mod { dividend, divisor } => {
                let (dividend, divisor) = self.unsigned(exp, dividend, divisor)?;
                Word::Mod {
                    dividend: Box::new(dividend),
                    divisor:  Box::new(divisor),
                }
            }
            IntExp::Exp { base, exponent } => {
                let (base, exponent) = self.unsigned(exp, base, exponent)?;
                Word::Exp {
                    base:     Box::new(base),
                    exponent: Box::new(exponent),
                }
            }
            IntExp::Ite {
                condition,
                then,
                otherwise,
            } => Word::ite(
                self.bool_word(condition)?,
                self.int(then)?,
                self.int(otherwise)?,
            ),
        };

        Ok(word)
    }

    /// Compiles the boolean expression `exp` into a proposition.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if any contained integer cannot be compiled, if `exp`
    /// compares byte strings or contracts, or if it states a range fact that
    /// has no exact compilation.
    pub fn bool(&self, exp: &BoolExp) -> Result<Prop> {
        let prop = match exp {
            BoolExp::Lit { value } => Prop::Bool(*value),
            BoolExp::And { left, right } => Prop::conj(self.bool(left)?, self.bool(right)?),
            BoolExp::Or { left, right } => Prop::disj(self.bool(left)?, self.bool(right)?),
            BoolExp::Impl {
                antecedent,
                consequent,
            } => Prop::implies(self.bool(antecedent)?, self.bool(consequent)?),
            BoolExp::Neg { value } => Prop::negate(self.bool(value)?),
            BoolExp::Lt { left, right } => {
                let (left, right) = self.unsigned(exp, left, right)?;
                Prop::lt(left, right)
            }
            BoolExp::LEq { left, right } => {
                let (left, right) = self.unsigned(exp, left, right)?;
                Prop::LEq { left, right }
            }
            BoolExp::Gt { left, right } => {
                let (left, right) = self.unsigned(exp, left, right)?;
                Prop::Gt { left, right }
            }
            BoolExp::GEq { left, right } => {
                let (left, right) = self.unsigned(exp, left, right)?;
                Prop::GEq { left, right }
            }
            BoolExp::Eq { equality } => self.equality(equality)?,
            BoolExp::NEq { equality } => Prop::negate(self.equality(equality)?),
            BoolExp::InRange { typ, value } => self.range(typ, value)?,
        };

        Ok(prop)
    }

    /// Compiles the boolean expression `exp` into a word that is `1` when it
    /// holds and `0` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] under the same conditions as [`Self::bool`].
    pub fn bool_word(&self, exp: &BoolExp) -> Result<Word> {
        prop_word(&self.bool(exp)?)
    }

    fn equality(&self, equality: &Equality) -> Result<Prop> {
        match equality {
            Equality::Integer { left, right } if IntExp::equatable(left, right) => {
                Ok(Prop::eq_words(self.int(left)?, self.int(right)?))
            }
            Equality::Integer { left, right } => Err(Error::uncompilable(format!(
                "word equality of {left} and {right} differs from their integer equality"
            ))),
            Equality::Boolean { left, right } => Ok(Prop::eq_words(
                self.bool_word(left)?,
                self.bool_word(right)?,
            )),
            Equality::ByteString { .. } | Equality::Contract { .. } => Err(Error::uncompilable(
                format!("{:?} equality has no word representation", equality.sort()),
            )),
        }
    }

    /// Compiles `inRange(typ, exp)`.
    ///
    /// Atoms, conditionals and single arithmetic operations over unsigned
    /// operands compile exactly. Anything else is rejected, as its unbounded
    /// value cannot in general be recovered from the wrapped word.
    fn range(&self, typ: &AbiType, exp: &IntExp) -> Result<Prop> {
        let Some(width) = typ.integer_width() else {
            return Err(Error::uncompilable(format!("{typ} has no integer range")));
        };
        let signed = matches!(typ, AbiType::Int { .. });
        let exp = self.unfold(exp);

        let prop = match exp {
            IntExp::Lit { value } => Prop::Bool(
                typ.integer_range()
                    .is_some_and(|(low, high)| &low <= value && value < &high),
            ),
            IntExp::Ite {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.bool(condition)?;
                or(
                    and(condition.clone(), self.range(typ, then)?),
                    and(not(condition), self.range(typ, otherwise)?),
                )
            }
            IntExp::Var { .. } | IntExp::Env { .. } | IntExp::Entry { .. } => {
                let word = self.int(exp)?;
                match (signed, signed_atom(exp) == Some(true)) {
                    (false, false) => below(word, width),
                    (false, true) => below(word, width.min(WORD_SIZE_BITS - 1)),
                    (true, false) => below(word, width - 1),
                    (true, true) if width >= WORD_SIZE_BITS => Prop::Bool(true),
                    (true, true) => {
                        let bytes = (width / BYTE_SIZE_BITS).saturating_sub(1);
                        let extended = Word::SignExtend {
                            bytes: Box::new(Word::lit(U256::new(bytes as u128))),
                            value: Box::new(word.clone()),
                        };
                        Prop::eq_words(extended, word)
                    }
                }
            }
            IntExp::Sub { left, right } if signed => {
                let (l, r) = self.operands(exp, left, right)?;
                let bound = power_of_two(width - 1);
                or(
                    and(
                        ge(l.clone(), r.clone()),
                        Prop::lt(Word::minus(l.clone(), r.clone()), bound.clone()),
                    ),
                    and(
                        Prop::lt(l.clone(), r.clone()),
                        Prop::LEq {
                            left:  Word::minus(r, l),
                            right: bound,
                        },
                    ),
                )
            }
            IntExp::Add { left, right }
            | IntExp::Sub { left, right }
            | IntExp::Mul { left, right }
            | IntExp::Div {
                dividend: left,
                divisor: right,
            }
            | IntExp::Mod {
                dividend: left,
                divisor: right,
            } => {
                let (l, r) = self.operands(exp, left, right)?;
                let kept = match exp {
                    IntExp::Add { .. } => ge(Word::plus(l.clone(), r), l),
                    IntExp::Sub { .. } => ge(l, r),
                    IntExp::Mul { .. } => or(
                        Prop::eq_words(l.clone(), Word::lit(0u8)),
                        Prop::eq_words(Word::divide(Word::times(l.clone(), r.clone()), l), r),
                    ),
                    _ => Prop::Bool(true),
                };
                let value = self.int(exp)?;
                and(kept, below(value, if signed { width - 1 } else { width }))
            }
            IntExp::Exp { .. } => {
                return Err(Error::uncompilable(format!(
                    "range of the exponentiation {exp}"
                )))
            }
        };

        Ok(prop)
    }

    /// Compiles the operands of `exp`, which the machine reads as unsigned
    /// words, failing if either is signed.
    fn unsigned(
        &self,
        exp: &dyn std::fmt::Display,
        left: &IntExp,
        right: &IntExp,
    ) -> Result<(Word, Word)> {
        if left.mentions_signed() || right.mentions_signed() {
            return Err(Error::uncompilable(format!(
                "unsigned reading of a signed operand in {exp}"
            )));
        }

        Ok((self.int(left)?, self.int(right)?))
    }

    /// Compiles the operands of the arithmetic operation `exp`, which must
    /// both be unsigned atoms or literals.
    fn operands(&self, exp: &IntExp, left: &IntExp, right: &IntExp) -> Result<(Word, Word)> {
        let unsigned = |e: &IntExp| {
            let e = self.unfold(e);
            matches!(e, IntExp::Lit { .. }) || signed_atom(e) == Some(false)
        };
        if !unsigned(left) || !unsigned(right) {
            return Err(Error::uncompilable(format!(
                "range of the compound expression {exp}"
            )));
        }

        Ok((self.int(self.unfold(left))?, self.int(self.unfold(right))?))
    }

    /// Replaces a post-state reference to an updated item by the value it
    /// was updated to.
    fn unfold<'e>(&'e self, exp: &'e IntExp) -> &'e IntExp {
        match exp {
            IntExp::Entry {
                timing: Timing::Post,
                item,
            } => self.updates.get(&item.name).unwrap_or(exp),
            _ => exp,
        }
    }

    fn slot(&self, item: &StorageItem) -> Result<U256> {
        if item.contract != self.resolver.contract() {
            return Err(Error::uncompilable(format!(
                "{item} is not storage of {}",
                self.resolver.contract()
            )));
        }
        self.resolver
            .slot_of(&item.name)
            .ok_or_else(|| Error::uncompilable(format!("{item} has no slot")))
    }

    fn store(&self, timing: Timing) -> Result<&Storage> {
        match timing {
            Timing::Pre => Ok(&self.pre),
            Timing::Post => self
                .post
                .as_ref()
                .ok_or_else(|| Error::uncompilable("post-state read without a post-state")),
        }
    }
}

/// Converts `prop` into a word that is `1` when it holds and `0` otherwise.
///
/// # Errors
///
/// Returns [`Err`] if `prop` compares terms that are not words.
pub fn prop_word(prop: &Prop) -> Result<Word> {
    let word = match prop {
        Prop::Bool(value) => Word::lit(u8::from(*value)),
        Prop::Eq {
            left: Term::Word(left),
            right: Term::Word(right),
        } => Word::equals(left.clone(), right.clone()),
        Prop::Eq { .. } => {
            return Err(Error::uncompilable("comparison of terms that are not words"))
        }
        Prop::Lt { left, right } => Word::less_than(left.clone(), right.clone()),
        Prop::Gt { left, right } => Word::Gt {
            left:  Box::new(left.clone()),
            right: Box::new(right.clone()),
        },
        Prop::LEq { left, right } => Word::LEq {
            left:  Box::new(left.clone()),
            right: Box::new(right.clone()),
        },
        Prop::GEq { left, right } => Word::GEq {
            left:  Box::new(left.clone()),
            right: Box::new(right.clone()),
        },
        Prop::Neg(inner) => Word::is_zero(prop_word(inner)?),
        Prop::And { left, right } => Word::bit_and(prop_word(left)?, prop_word(right)?),
        Prop::Or { left, right } => Word::bit_or(prop_word(left)?, prop_word(right)?),
        Prop::Impl {
            antecedent,
            consequent,
        } => Word::bit_or(Word::is_zero(prop_word(antecedent)?), prop_word(consequent)?),
    };

    Ok(word)
}

/// Gets whether `exp` is a signed atom, an unsigned atom, or not an atom at
/// all.
fn signed_atom(exp: &IntExp) -> Option<bool> {
    match exp {
        IntExp::Var { typ, .. } => Some(matches!(typ, AbiType::Int { .. })),
        IntExp::Entry { item, .. } => Some(matches!(item.typ, AbiType::Int { .. })),
        IntExp::Env { .. } => Some(false),
        _ => None,
    }
}

/// The word `2^bits`, for `bits` below the word size.
fn power_of_two(bits: usize) -> Word {
    Word::lit(low_bits_mask(bits) + U256::ONE)
}

/// The proposition that `word` is below `2^bits`.
fn below(word: Word, bits: usize) -> Prop {
    if bits >= WORD_SIZE_BITS {
        Prop::Bool(true)
    } else {
        Prop::lt(word, power_of_two(bits))
    }
}

fn ge(left: Word, right: Word) -> Prop {
    Prop::GEq { left, right }
}

fn and(left: Prop, right: Prop) -> Prop {
    match (left, right) {
        (Prop::Bool(true), p) | (p, Prop::Bool(true)) => p,
        (Prop::Bool(false), _) | (_, Prop::Bool(false)) => Prop::Bool(false),
        (l, r) => Prop::conj(l, r),
    }
}

fn or(left: Prop, right: Prop) -> Prop {
    match (left, right) {
        (Prop::Bool(false), p) | (p, Prop::Bool(false)) => p,
        (Prop::Bool(true), _) | (_, Prop::Bool(true)) => Prop::Bool(true),
        (l, r) => Prop::disj(l, r),
    }
}

fn not(prop: Prop) -> Prop {
    match prop {
        Prop::Bool(value) => Prop::Bool(!value),
        Prop::Neg(inner) => *inner,
        p => Prop::negate(p),
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;
    use num::BigInt;

    use crate::{
        contract::abi::{AbiType, Interface},
        error::verification::Error,
        layout::{LayoutResolver, StorageLayout, StorageVariable},
        spec::{
            eval::Valuation,
            expression::{BoolExp, BytesExp, Equality, IntExp, StorageItem},
            Behaviour,
            Constructor,
            StorageUpdate,
        },
        verify::compile::{self, Compiler},
        vm::{
            buffer::Buf,
            eval::{self, Assignment},
            storage::Storage,
            value::{EnvValue, Prop, Word},
        },
    };

    fn uint256() -> AbiType {
        AbiType::UInt { size: 256 }
    }

    fn resolver() -> anyhow::Result<LayoutResolver> {
        let layout = StorageLayout::new(vec![
            StorageVariable::value("x", 0usize, uint256()),
            StorageVariable::value("n", 1usize, AbiType::Int { size: 8 }),
        ]);
        Ok(LayoutResolver::new("C", &layout)?)
    }

    fn x() -> StorageItem {
        StorageItem::new("C", "x", uint256())
    }

    fn deposit() -> Behaviour {
        let sum = IntExp::plus(IntExp::pre(x()), IntExp::env(EnvValue::CallValue));
        Behaviour {
            name:            "deposit".into(),
            contract:        "C".into(),
            interface:       Interface::new("deposit", vec![]),
            branch:          0,
            preconditions:   vec![
                BoolExp::TRUE,
                BoolExp::in_range(uint256(), IntExp::post(x())),
            ],
            storage_updates: vec![StorageUpdate::new(x(), sum)],
            returns:         Some(IntExp::post(x())),
        }
    }

    #[test]
    fn compiles_behaviours_over_abstract_storage() -> anyhow::Result<()> {
        let resolver = resolver()?;
        let branch = compile::behaviour(&resolver, &deposit())?;

        let sum = Word::plus(
            Word::sload(Word::lit(0u8), Storage::Abstract),
            Word::env(EnvValue::CallValue),
        );
        let storage = Storage::Abstract.write(Word::lit(0u8), sum.clone());
        assert_eq!(branch.entrypoint_storage(), Some(&storage));

        let no_overflow = Prop::GEq {
            left:  sum,
            right: Word::sload(Word::lit(0u8), Storage::Abstract),
        };
        assert_eq!(branch.conditions, vec![no_overflow]);
        assert_eq!(
            branch.returned,
            Buf::word(Word::sload(Word::lit(0u8), storage))
        );

        Ok(())
    }

    #[test]
    fn compiles_constructors_over_empty_storage() -> anyhow::Result<()> {
        let resolver = resolver()?;
        let constructor = Constructor {
            contract:        "C".into(),
            interface:       Interface::new("constructor", vec![]),
            preconditions:   vec![],
            initial_storage: vec![StorageUpdate::new(x(), IntExp::lit(0))],
        };

        let branch = compile::constructor(&resolver, &constructor, &[0xfe])?;
        let storage = Storage::empty().write(Word::lit(0u8), Word::lit(0u8));
        assert_eq!(branch.entrypoint_storage(), Some(&storage));
        assert_eq!(branch.returned, Buf::Concrete { bytes: vec![0xfe] });
        assert!(branch.conditions.is_empty());

        Ok(())
    }

    #[test]
    fn compiles_narrow_and_signed_ranges() -> anyhow::Result<()> {
        let resolver = resolver()?;
        let compiler = Compiler::new(&resolver, Storage::Abstract);

        let narrow = BoolExp::in_range(
            AbiType::UInt { size: 8 },
            IntExp::var("a", AbiType::UInt { size: 8 }),
        );
        assert_eq!(
            compiler.bool(&narrow)?,
            Prop::lt(Word::var("a"), Word::lit(256u16))
        );

        let int8 = AbiType::Int { size: 8 };
        let signed = BoolExp::in_range(int8.clone(), IntExp::var("b", int8.clone()));
        let extended = Word::SignExtend {
            bytes: Box::new(Word::lit(0u8)),
            value: Box::new(Word::var("b")),
        };
        assert_eq!(
            compiler.bool(&signed)?,
            Prop::eq_words(extended, Word::var("b"))
        );

        let literal = BoolExp::in_range(int8, IntExp::lit(-129));
        assert_eq!(compiler.bool(&literal)?, Prop::Bool(false));

        Ok(())
    }

    #[test]
    fn range_facts_agree_with_unbounded_evaluation() -> anyhow::Result<()> {
        let resolver = resolver()?;
        let compiler = Compiler::new(&resolver, Storage::Abstract);
        let a = IntExp::var("a", uint256());
        let b = IntExp::var("b", uint256());
        let n = IntExp::pre(StorageItem::new("C", "n", AbiType::Int { size: 8 }));

        let int8 = AbiType::Int { size: 8 };
        let facts = vec![
            BoolExp::in_range(uint256(), IntExp::plus(a.clone(), b.clone())),
            BoolExp::in_range(uint256(), IntExp::minus(a.clone(), b.clone())),
            BoolExp::in_range(uint256(), IntExp::times(a.clone(), b.clone())),
            BoolExp::in_range(AbiType::UInt { size: 8 }, IntExp::plus(a.clone(), b.clone())),
            BoolExp::in_range(int8.clone(), IntExp::minus(a.clone(), b.clone())),
            BoolExp::in_range(int8.clone(), IntExp::times(a.clone(), b)),
            BoolExp::in_range(int8.clone(), n.clone()),
            BoolExp::in_range(int8, a.clone()),
            BoolExp::in_range(uint256(), n.clone()),
            BoolExp::in_range(
                AbiType::UInt { size: 8 },
                IntExp::ite(BoolExp::lt(a, IntExp::lit(10)), IntExp::lit(1), n),
            ),
        ];
        let values = [
            U256::ZERO,
            U256::ONE,
            U256::new(200),
            U256::new(0x7f),
            U256::MAX,
            U256::MAX - U256::new(0x7f),
            U256::ONE << 128u32,
        ];

        for fact in &facts {
            let compiled = compiler.bool(fact)?;
            for (a, b) in values.iter().flat_map(|a| values.iter().map(move |b| (*a, *b))) {
                let mut assignment = Assignment::default();
                assignment.variables.insert("a".into(), a);
                assignment.variables.insert("b".into(), b);
                assignment.storage.insert(U256::ONE, b);
                let valuation = Valuation::with_storage(&assignment, &resolver);

                assert_eq!(
                    eval::prop(&compiled, &assignment)?,
                    valuation.bool(fact)?,
                    "{fact} at {assignment}"
                );
            }
        }

        Ok(())
    }

    #[test]
    fn rejects_what_words_cannot_express() -> anyhow::Result<()> {
        let resolver = resolver()?;
        let compiler = Compiler::new(&resolver, Storage::Abstract);

        let huge = IntExp::lit(crate::utility::pow2(256));
        assert_eq!(
            compiler.int(&huge),
            Err(Error::LiteralOutOfRange {
                value: crate::utility::pow2(256),
            })
        );
        assert!(compiler.int(&IntExp::lit(BigInt::from(-1))).is_err());

        let bytes = BoolExp::Eq {
            equality: Box::new(Equality::ByteString {
                left:  BytesExp::Var { name: "s".into() },
                right: BytesExp::Lit { value: vec![] },
            }),
        };
        assert!(matches!(
            compiler.bool(&bytes),
            Err(Error::Uncompilable { .. })
        ));

        let n = IntExp::pre(StorageItem::new("C", "n", AbiType::Int { size: 8 }));
        let mixed = BoolExp::in_range(uint256(), IntExp::plus(n, IntExp::var("a", uint256())));
        assert!(matches!(
            compiler.bool(&mixed),
            Err(Error::Uncompilable { .. })
        ));

        let s = IntExp::var("s", AbiType::Int { size: 256 });
        let below = BoolExp::lt(s.clone(), IntExp::lit(5));
        assert!(matches!(
            compiler.bool(&below),
            Err(Error::Uncompilable { .. })
        ));
        assert!(matches!(
            compiler.int(&IntExp::divide(s.clone(), IntExp::lit(2))),
            Err(Error::Uncompilable { .. })
        ));
        let all_ones = IntExp::lit(crate::utility::pow2(256) - BigInt::from(1));
        assert!(matches!(
            compiler.bool(&BoolExp::int_eq(s.clone(), all_ones)),
            Err(Error::Uncompilable { .. })
        ));
        assert!(compiler.bool(&BoolExp::int_eq(s, IntExp::lit(5))).is_ok());

        let post = IntExp::post(x());
        assert!(matches!(
            compiler.int(&post),
            Err(Error::Uncompilable { .. })
        ));
        let foreign = IntExp::pre(StorageItem::new("D", "x", uint256()));
        assert!(matches!(
            compiler.int(&foreign),
            Err(Error::Uncompilable { .. })
        ));

        Ok(())
    }
}

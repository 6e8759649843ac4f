//! This module contains a [`Solver`] that decides queries by evaluating both
//! sides under a deterministic sequence of sampled assignments.
//!
//! Sampling is a bounded check and not a proof. An answer of
//! [`Equivalence::Counterexample`] or [`Coverage::Missing`] is always genuine,
//! but an answer of [`Equivalence::Equivalent`] only means that no sample
//! told the two sides apart.
//!
//! Samples are drawn from the corner cases of word arithmetic, the literals
//! that occur in the query and their neighbours, and uniformly random words
//! of random widths.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use ethnum::U256;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    constant::{
        ADDRESS_WIDTH_BITS,
        DEFAULT_ASSIGNMENTS_PER_SELECTOR,
        DEFAULT_SAMPLE_COUNT,
        DEFAULT_SAMPLE_SEED,
        DEFAULT_SELECTOR_SAMPLE_COUNT,
        WORD_SIZE_BITS,
    },
    contract::abi::Selector,
    error::verification::Result,
    utility::low_bits_mask,
    verify::{Counterexample, Coverage, DynSolver, Equivalence, Outcome, Solver},
    vm::{
        buffer::Buf,
        eval::{self, Assignment},
        program::{Branch, TerminalState},
        storage::Storage,
        value::{EnvValue, Prop, Term, Word},
    },
};

/// The configuration for the sampling solver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of assignments tried for each equivalence query.
    ///
    /// Defaults to [`DEFAULT_SAMPLE_COUNT`].
    pub samples: usize,

    /// The seed from which every sequence of samples is generated.
    ///
    /// Defaults to [`DEFAULT_SAMPLE_SEED`].
    pub seed: u64,

    /// The number of random selectors tried for each exhaustiveness query, in
    /// addition to those that occur in the runtime code.
    ///
    /// Defaults to [`DEFAULT_SELECTOR_SAMPLE_COUNT`].
    pub selector_samples: usize,

    /// The number of assignments tried for each selector in an
    /// exhaustiveness query.
    ///
    /// Defaults to [`DEFAULT_ASSIGNMENTS_PER_SELECTOR`].
    pub assignments_per_selector: usize,
}

impl Config {
    /// Sets the `samples` config parameter to `value`.
    #[must_use]
    pub fn with_samples(mut self, value: usize) -> Self {
        self.samples = value;
        self
    }

    /// Sets the `seed` config parameter to `value`.
    #[must_use]
    pub fn with_seed(mut self, value: u64) -> Self {
        self.seed = value;
        self
    }

    /// Sets the `selector_samples` config parameter to `value`.
    #[must_use]
    pub fn with_selector_samples(mut self, value: usize) -> Self {
        self.selector_samples = value;
        self
    }

    /// Sets the `assignments_per_selector` config parameter to `value`.
    #[must_use]
    pub fn with_assignments_per_selector(mut self, value: usize) -> Self {
        self.assignments_per_selector = value;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            samples:                  DEFAULT_SAMPLE_COUNT,
            seed:                     DEFAULT_SAMPLE_SEED,
            selector_samples:         DEFAULT_SELECTOR_SAMPLE_COUNT,
            assignments_per_selector: DEFAULT_ASSIGNMENTS_PER_SELECTOR,
        }
    }
}

/// A solver that evaluates both sides of a query under sampled assignments.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SamplingSolver {
    config: Config,
}

impl SamplingSolver {
    /// Constructs a sampling solver with the provided `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wraps `self` into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynSolver {
        Arc::new(self)
    }

    /// Gets the configuration of the solver.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Solver for SamplingSolver {
    fn check_equivalence(
        &self,
        specification: &[Branch],
        bytecode: &[Branch],
    ) -> Result<Equivalence> {
        let mut atoms = Atoms::default();
        specification.iter().chain(bytecode).for_each(|b| atoms.branch(b));
        let sampler = Sampler::new(&atoms);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        for sample in 0..self.config.samples {
            let assignment = sampler.assignment(sample, &mut rng);
            let expected = outcome(specification, &atoms.slots, &assignment)?;
            let actual = outcome(bytecode, &atoms.slots, &assignment)?;

            if expected != actual {
                return Ok(Equivalence::Counterexample(Counterexample {
                    assignment,
                    expected,
                    actual,
                    sample,
                }));
            }
        }

        Ok(Equivalence::Equivalent)
    }

    fn check_exhaustiveness(
        &self,
        selectors: &[Selector],
        runtime: &[TerminalState],
    ) -> Result<Coverage> {
        let mut atoms = Atoms::default();
        runtime.iter().for_each(|s| s.conditions().iter().for_each(|c| atoms.prop(c)));
        let sampler = Sampler::new(&atoms);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let declared: BTreeSet<U256> = selectors.iter().map(Selector::as_word).collect();
        let random = (0..self.config.selector_samples).map(|_| U256::from(rng.gen::<u32>()));
        let candidates: BTreeSet<U256> = sampler
            .selectors
            .iter()
            .copied()
            .chain(random.collect::<Vec<_>>())
            .filter(|s| !declared.contains(s))
            .collect();

        let mut missing = Vec::new();
        for candidate in candidates {
            for sample in 0..self.config.assignments_per_selector {
                let mut assignment = sampler.assignment(sample, &mut rng);
                assignment.selector = candidate;
                if reaches(runtime, &assignment)? {
                    missing.push(Selector::from_word(candidate));
                    break;
                }
            }
        }

        if missing.is_empty() {
            Ok(Coverage::Covered)
        } else {
            missing.sort();
            missing.dedup();
            Ok(Coverage::Missing(missing))
        }
    }
}

/// Computes the outcome of the first of `branches` whose conditions hold
/// under `assignment`, with the final storage read at every one of `slots`.
fn outcome(
    branches: &[Branch],
    slots: &BTreeSet<U256>,
    assignment: &Assignment,
) -> Result<Option<Outcome>> {
    let unwritten = Storage::Abstract;
    for branch in branches {
        if !eval::all(&branch.conditions, assignment)? {
            continue;
        }

        let store = branch.entrypoint_storage().unwrap_or(&unwritten);
        let returned = eval::buffer(&branch.returned, assignment)?;
        let storage = slots
            .iter()
            .chain(assignment.storage.keys())
            .map(|slot| Ok((*slot, eval::slot(store, *slot, assignment)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        return Ok(Some(Outcome { returned, storage }));
    }

    Ok(None)
}

/// Checks whether any state of `runtime` that does not revert is reachable
/// under `assignment`.
fn reaches(runtime: &[TerminalState], assignment: &Assignment) -> Result<bool> {
    for state in runtime {
        if matches!(state, TerminalState::Failure { .. }) {
            continue;
        }
        if eval::all(state.conditions(), assignment)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Everything in a query that an assignment can give a value to, along with
/// the literals that suggest which values are interesting.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct Atoms {
    variables:   BTreeSet<String>,
    environment: BTreeSet<EnvValue>,
    slots:       BTreeSet<U256>,
    literals:    BTreeSet<U256>,
    selector:    bool,
}

impl Atoms {
    fn branch(&mut self, branch: &Branch) {
        branch.conditions.iter().for_each(|c| self.prop(c));
        self.buffer(&branch.returned);
        branch.storage.values().for_each(|s| self.storage(s));
    }

    fn prop(&mut self, prop: &Prop) {
        match prop {
            Prop::Bool(_) => (),
            Prop::Eq { left, right } => {
                self.term(left);
                self.term(right);
            }
            Prop::Lt { left, right }
            | Prop::Gt { left, right }
            | Prop::LEq { left, right }
            | Prop::GEq { left, right } => {
                self.word(left);
                self.word(right);
            }
            Prop::Neg(inner) => self.prop(inner),
            Prop::And { left, right } | Prop::Or { left, right } => {
                self.prop(left);
                self.prop(right);
            }
            Prop::Impl {
                antecedent,
                consequent,
            } => {
                self.prop(antecedent);
                self.prop(consequent);
            }
        }
    }

    fn term(&mut self, term: &Term) {
        match term {
            Term::Word(word) => self.word(word),
            Term::Buf(buf) => self.buffer(buf),
            Term::Storage(storage) => self.storage(storage),
        }
    }

    fn word(&mut self, word: &Word) {
        match word {
            Word::Lit { value } => {
                self.literals.insert(*value);
            }
            Word::Var { name } => {
                self.variables.insert(name.clone());
            }
            Word::Env { value } => {
                self.environment.insert(*value);
            }
            Word::Selector => self.selector = true,
            Word::Add { left, right }
            | Word::Sub { left, right }
            | Word::Mul { left, right }
            | Word::Lt { left, right }
            | Word::Gt { left, right }
            | Word::LEq { left, right }
            | Word::GEq { left, right }
            | Word::Eq { left, right }
            | Word::And { left, right }
            | Word::Or { left, right }
            | Word::Xor { left, right }
            | Word::Div {
                dividend: left,
                divisor: right,
            }
            | Word::Mod {
                dividend: left,
                divisor: right,
            }
            | Word::Exp {
                base: left,
                exponent: right,
            }
            | Word::SignExtend {
                bytes: left,
                value: right,
            } => {
                self.word(left);
                self.word(right);
            }
            Word::IsZero { number: value } | Word::Not { value } => self.word(value),
            Word::Ite {
                condition,
                then,
                otherwise,
            } => {
                self.word(condition);
                self.word(then);
                self.word(otherwise);
            }
            Word::SLoad { key, storage } => {
                if let Some(slot) = key.as_lit() {
                    self.slots.insert(slot);
                }
                self.word(key);
                self.storage(storage);
            }
            Word::Keccak { data } => self.buffer(data),
        }
    }

    fn buffer(&mut self, buffer: &Buf) {
        match buffer {
            Buf::Concrete { .. } | Buf::Abstract { .. } => (),
            Buf::WriteWord {
                offset,
                value,
                base,
            } => {
                self.word(offset);
                self.word(value);
                self.buffer(base);
            }
        }
    }

    fn storage(&mut self, storage: &Storage) {
        match storage {
            Storage::Abstract => (),
            Storage::Concrete { slots } => self.slots.extend(slots.keys().copied()),
            Storage::Write { key, value, prior } => {
                if let Some(slot) = key.as_lit() {
                    self.slots.insert(slot);
                }
                self.word(key);
                self.word(value);
                self.storage(prior);
            }
        }
    }
}

/// Generates assignments for the atoms of a query.
#[derive(Clone, Debug)]
struct Sampler {
    variables:   Vec<String>,
    environment: Vec<EnvValue>,
    slots:       Vec<U256>,
    interesting: Vec<U256>,
    selectors:   Vec<U256>,
    selector:    bool,
}

impl Sampler {
    fn new(atoms: &Atoms) -> Self {
        let half = U256::ONE << 255u32;
        let address = U256::ONE << 160u32;
        let mut interesting = vec![
            U256::ZERO,
            U256::ONE,
            U256::new(2),
            U256::new(255),
            U256::new(256),
            U256::MAX,
            U256::MAX - U256::ONE,
            half,
            half - U256::ONE,
            address,
            address - U256::ONE,
        ];
        for literal in &atoms.literals {
            interesting.extend([
                *literal,
                literal.wrapping_add(U256::ONE),
                literal.wrapping_sub(U256::ONE),
            ]);
        }
        interesting.sort();
        interesting.dedup();

        let selectors = atoms
            .literals
            .iter()
            .copied()
            .filter(|l| *l <= U256::from(u32::MAX))
            .collect();

        Self {
            variables: atoms.variables.iter().cloned().collect(),
            environment: atoms.environment.iter().copied().collect(),
            slots: atoms.slots.iter().copied().collect(),
            interesting,
            selectors,
            selector: atoms.selector,
        }
    }

    /// Generates the assignment numbered `sample`.
    ///
    /// The first assignment sets everything to zero and the second sets
    /// everything to the largest word. After those, every value is drawn from
    /// `rng`. The selector cycles through the literals that could be
    /// selectors, when there are any.
    fn assignment(&self, sample: usize, rng: &mut StdRng) -> Assignment {
        let value = |rng: &mut StdRng| match sample {
            0 => U256::ZERO,
            1 => U256::MAX,
            _ => self.value(rng),
        };

        let mut assignment = Assignment::default();
        for name in &self.variables {
            assignment.variables.insert(name.clone(), value(rng));
        }
        for env in &self.environment {
            let raw = value(rng);
            let raw = if env.typ().integer_width() == Some(ADDRESS_WIDTH_BITS) && rng.gen_bool(0.75)
            {
                raw & low_bits_mask(ADDRESS_WIDTH_BITS)
            } else {
                raw
            };
            assignment.environment.insert(*env, raw);
        }
        for slot in &self.slots {
            assignment.storage.insert(*slot, value(rng));
        }

        if self.selector {
            assignment.selector = match self.selectors.as_slice() {
                [] => U256::from(rng.gen::<u32>()),
                selectors => selectors[sample % selectors.len()],
            };
        }

        assignment
    }

    fn value(&self, rng: &mut StdRng) -> U256 {
        if rng.gen_bool(0.5) {
            if let Some(value) = self.interesting.choose(rng) {
                return *value;
            }
        }

        let word = U256::from_words(rng.gen(), rng.gen());
        let bits = rng.gen_range(1..=WORD_SIZE_BITS);
        word & low_bits_mask(bits)
    }
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::{
        contract::abi::Selector,
        verify::{
            sampling::{Config, SamplingSolver},
            Coverage,
            Equivalence,
            Solver,
        },
        vm::{
            buffer::Buf,
            program::{Branch, TerminalState},
            storage::Storage,
            value::{Prop, Word},
        },
    };

    fn store(value: Word) -> Branch {
        Branch::new(
            vec![],
            Buf::empty(),
            Storage::Abstract.write(Word::lit(0u8), value),
        )
    }

    #[test]
    fn agrees_with_itself() -> anyhow::Result<()> {
        let branch = store(Word::plus(Word::var("a"), Word::var("b")));
        let solver = SamplingSolver::default();
        assert!(solver.check_equivalence(&[branch.clone()], &[branch])?.is_equivalent());

        Ok(())
    }

    #[test]
    fn tells_apart_programs_that_differ_only_at_a_corner() -> anyhow::Result<()> {
        let exact = store(Word::var("a"));
        let cornered = store(Word::ite(
            Word::equals(Word::var("a"), Word::max()),
            Word::lit(0u8),
            Word::var("a"),
        ));

        let solver = SamplingSolver::default();
        let Equivalence::Counterexample(counterexample) =
            solver.check_equivalence(&[exact], &[cornered])?
        else {
            anyhow::bail!("expected a counterexample");
        };
        assert_eq!(counterexample.assignment.variables["a"], U256::MAX);

        Ok(())
    }

    #[test]
    fn distinguishes_success_from_failure() -> anyhow::Result<()> {
        let guarded = Branch::new(
            vec![Prop::lt(Word::var("a"), Word::lit(10u8))],
            Buf::empty(),
            Storage::Abstract,
        );
        let unguarded = Branch::new(vec![], Buf::empty(), Storage::Abstract);

        let solver = SamplingSolver::new(Config::default().with_samples(16).with_seed(7));
        let result = solver.check_equivalence(&[guarded], &[unguarded])?;
        let Equivalence::Counterexample(counterexample) = result else {
            anyhow::bail!("expected a counterexample");
        };
        assert_eq!(counterexample.expected, None);
        assert!(counterexample.actual.is_some());

        Ok(())
    }

    #[test]
    fn is_deterministic() -> anyhow::Result<()> {
        let left = store(Word::times(Word::var("a"), Word::lit(3u8)));
        let right = store(Word::plus(Word::var("a"), Word::var("a")));

        let solver = SamplingSolver::default();
        let first = solver.check_equivalence(&[left.clone()], &[right.clone()])?;
        let second = solver.check_equivalence(&[left], &[right])?;
        assert_eq!(first, second);
        assert!(!first.is_equivalent());

        Ok(())
    }

    #[test]
    fn finds_undeclared_selectors_in_the_dispatcher() -> anyhow::Result<()> {
        let dispatch = |selector: u32| {
            TerminalState::Success(Branch::new(
                vec![Prop::eq_words(Word::Selector, Word::lit(selector))],
                Buf::empty(),
                Storage::Abstract,
            ))
        };
        let fallback = TerminalState::Failure {
            conditions: vec![],
            reason:     "no matching selector".into(),
        };
        let runtime = vec![dispatch(0x1111_1111), dispatch(0x2222_2222), fallback];

        let solver = SamplingSolver::default();
        let declared = Selector::from_word(U256::new(0x1111_1111));
        let coverage = solver.check_exhaustiveness(&[declared], &runtime)?;
        assert_eq!(
            coverage,
            Coverage::Missing(vec![Selector::from_word(U256::new(0x2222_2222))])
        );

        let both = [declared, Selector::from_word(U256::new(0x2222_2222))];
        assert_eq!(solver.check_exhaustiveness(&both, &runtime)?, Coverage::Covered);

        Ok(())
    }
}

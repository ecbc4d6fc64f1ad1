//! `ProgramBuilder` (spec §4.5): the append-only construction buffer that
//! enforces scope, context, and variable-numbering invariants while new
//! code is emitted, spliced, or adopted from a foreign program.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::RngCore;
use thiserror::Error;

use crate::analysis::CompositeAnalyzerState;
use crate::codegen::GeneratorPool;
use crate::config::FuzzerConfig;
use crate::ir::{Context, Instruction, JsType, Opcode, Program, Role, Variable, Vocabulary};

#[derive(Debug, Error, PartialEq)]
pub enum BuilderError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("no visible variable satisfies the requested constraint")]
    NoVisibleVariable,
    #[error("splice could not be performed: {0}")]
    SpliceFailed(String),
    #[error("no code generator applies in the current context")]
    NoApplicableGenerator,
}

pub type BuilderResult<T> = Result<T, BuilderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    Generating,
    Splicing,
    Hybrid,
}

/// The construction buffer. Owns a draft `code` vector and one instance
/// of each analyzer kept synchronized with it, plus (while an
/// `AdoptingScope` is open) a renumbering map from foreign to local
/// `Variable`s.
pub struct ProgramBuilder<'a> {
    config: &'a FuzzerConfig,
    rng: &'a mut dyn RngCore,
    vocabulary: Vocabulary,
    code: Vec<Instruction>,
    analyzers: CompositeAnalyzerState,
    next_variable: u32,
    renumbering: Option<HashMap<Variable, Variable>>,
    recursion_depth: u32,
}

/// Hard ceiling on nested `build_recursive` calls (if/while/try bodies
/// generating further control flow): keeps a pathological run of bandit
/// draws from recursing until the stack overflows.
const MAX_RECURSION_DEPTH: u32 = 4;

impl<'a> ProgramBuilder<'a> {
    pub fn new(config: &'a FuzzerConfig, rng: &'a mut dyn RngCore) -> Self {
        ProgramBuilder {
            config,
            rng,
            vocabulary: Vocabulary::default(),
            code: Vec::new(),
            analyzers: CompositeAnalyzerState::new(),
            next_variable: 0,
            renumbering: None,
            recursion_depth: 0,
        }
    }

    pub fn random_int(&mut self) -> i64 {
        let vocab = self.vocabulary.clone();
        vocab.random_int(self.rng)
    }

    pub fn random_float(&mut self) -> f64 {
        let vocab = self.vocabulary.clone();
        vocab.random_float(self.rng)
    }

    pub fn random_bigint(&mut self) -> String {
        let vocab = self.vocabulary.clone();
        vocab.random_bigint(self.rng)
    }

    pub fn random_string(&mut self) -> String {
        let vocab = self.vocabulary.clone();
        vocab.random_string_literal(self.rng)
    }

    pub fn random_property_name(&mut self) -> String {
        let vocab = self.vocabulary.clone();
        vocab.random_property_name(self.rng)
    }

    pub fn random_method_name(&mut self) -> String {
        let vocab = self.vocabulary.clone();
        vocab.random_method_name(self.rng)
    }

    pub fn random_builtin_name(&mut self) -> String {
        let vocab = self.vocabulary.clone();
        vocab.random_builtin_name(self.rng)
    }

    /// Generate `n` further instructions if the nesting ceiling hasn't
    /// been reached yet; a no-op once it has, so a deeply nested
    /// selection of control-flow generators degrades to an empty body
    /// instead of blowing the stack.
    pub fn build_recursive(&mut self, n: usize, pool: &mut GeneratorPool) -> BuilderResult<()> {
        if self.recursion_depth >= MAX_RECURSION_DEPTH {
            return Ok(());
        }
        self.recursion_depth += 1;
        let result = self.build(n, BuildStrategy::Generating, pool, None);
        self.recursion_depth -= 1;
        result
    }

    pub fn config(&self) -> &FuzzerConfig {
        self.config
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn context(&self) -> Context {
        self.analyzers.context()
    }

    pub fn currently_in_dead_code(&self) -> bool {
        self.analyzers.currently_in_dead_code()
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    fn fresh_variable(&mut self) -> Variable {
        let v = Variable(self.next_variable);
        self.next_variable += 1;
        v
    }

    fn check_context(&self, opcode: &Opcode) -> BuilderResult<()> {
        let required = opcode.required_context();
        let open = self.context();
        let ok = if matches!(opcode, Opcode::LoopBreak) {
            open.intersects(required)
        } else {
            open.contains(required)
        };
        if ok {
            Ok(())
        } else {
            Err(BuilderError::InvariantViolation(format!(
                "opcode requires context {:?} but only {:?} is open",
                required, open
            )))
        }
    }

    fn check_inputs_visible(&self, instr: &Instruction) -> BuilderResult<()> {
        let visible = self.analyzers.visible_variables();
        for input in instr.inputs() {
            if !visible.contains(input) {
                return Err(BuilderError::InvariantViolation(format!(
                    "input {} is not visible at this position",
                    input
                )));
            }
        }
        Ok(())
    }

    /// Append an already-local instruction (no foreign variables),
    /// validating every model invariant. This is the path
    /// `BaseInstructionMutator` uses to copy unchanged instructions
    /// across while walking an input program.
    pub fn append(&mut self, instr: Instruction) -> BuilderResult<()> {
        self.check_context(&instr.opcode)?;
        self.check_inputs_visible(&instr)?;
        let indexed = instr.with_index(self.code.len());
        self.next_variable = self.next_variable.max(
            indexed.all_outputs().map(|v| v.number() + 1).max().unwrap_or(0),
        );
        self.analyzers.analyze(&indexed);
        self.code.push(indexed);
        Ok(())
    }

    /// Append a freshly-constructed instruction whose outputs don't yet
    /// have variable numbers assigned; returns the assigned output
    /// variables in (outer, inner) order.
    pub fn emit(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> BuilderResult<(Vec<Variable>, Vec<Variable>)> {
        let shape = opcode.shape();
        let outputs: Vec<Variable> = (0..shape.num_outputs).map(|_| self.fresh_variable()).collect();
        let inner_outputs: Vec<Variable> = (0..shape.num_inner_outputs).map(|_| self.fresh_variable()).collect();
        let instr = Instruction::new(opcode, inputs, outputs.clone(), inner_outputs.clone(), self.code.len());
        self.append(instr)?;
        Ok((outputs, inner_outputs))
    }

    /// Begin a scoped adoption session from `source`: all `adopt` calls
    /// made through the returned guard share one renumbering table,
    /// released when the guard drops (normal exit or early return via
    /// `?`).
    pub fn adopting(&mut self) -> AdoptingScope<'_, 'a> {
        self.renumbering.get_or_insert_with(HashMap::new);
        AdoptingScope { builder: self }
    }

    fn renumber(&mut self, v: Variable) -> Variable {
        match &mut self.renumbering {
            Some(map) => *map.entry(v).or_insert_with(|| {
                let fresh = Variable(self.next_variable);
                self.next_variable += 1;
                fresh
            }),
            None => v,
        }
    }

    /// Pre-seed the active renumbering session with an explicit
    /// foreign→local mapping, used by splicing to bind a free input to
    /// an already-visible local variable instead of manufacturing a
    /// fresh one.
    pub fn seed_renumbering(&mut self, foreign: Variable, local: Variable) {
        self.renumbering.get_or_insert_with(HashMap::new).insert(foreign, local);
    }

    /// Adopt one foreign instruction: renumber every variable it
    /// mentions through the active renumbering session (or pass through
    /// unchanged if no session is open) and append the result.
    pub fn adopt(&mut self, instr: &Instruction) -> BuilderResult<()> {
        let renumbered = match &self.renumbering {
            Some(map) => {
                // First pass: ensure every variable has a mapping without
                // borrowing self mutably while iterating `instr`.
                let vars: Vec<Variable> = instr.inputs().iter().copied().chain(instr.all_outputs()).collect();
                let mut pending = Vec::new();
                for v in vars {
                    if !map.contains_key(&v) {
                        pending.push(v);
                    }
                }
                for v in pending {
                    self.renumber(v);
                }
                let map = self.renumbering.as_ref().unwrap();
                instr.renumbered(map)
            }
            None => instr.clone(),
        };
        self.append(renumbered)
    }

    pub fn random_variable(&mut self) -> BuilderResult<Variable> {
        let visible: Vec<Variable> = self.analyzers.visible_variables().into_iter().collect();
        visible.choose(self.rng).copied().ok_or(BuilderError::NoVisibleVariable)
    }

    pub fn random_variable_of_type(&mut self, ty: &JsType) -> BuilderResult<Variable> {
        let candidates: Vec<Variable> = self
            .analyzers
            .visible_variables()
            .into_iter()
            .filter(|v| self.analyzers.type_of(*v).is_usable_as(ty))
            .collect();
        candidates.choose(self.rng).copied().ok_or(BuilderError::NoVisibleVariable)
    }

    pub fn random_variable_for_use_as(&mut self, ty: &JsType) -> BuilderResult<Variable> {
        let candidates: Vec<Variable> = self
            .analyzers
            .visible_variables()
            .into_iter()
            .filter(|v| self.analyzers.type_of(*v).may_be(ty))
            .collect();
        candidates.choose(self.rng).copied().ok_or(BuilderError::NoVisibleVariable)
    }

    pub fn random_variable_from_outer_scope(&mut self) -> BuilderResult<Variable> {
        let candidates: Vec<Variable> = self.analyzers.variables_from_outer_scope().into_iter().collect();
        candidates.choose(self.rng).copied().ok_or(BuilderError::NoVisibleVariable)
    }

    /// A non-empty prefix of a shuffled selection of up to `k` visible
    /// variables.
    pub fn random_variables_up_to(&mut self, k: usize) -> Vec<Variable> {
        let mut visible: Vec<Variable> = self.analyzers.visible_variables().into_iter().collect();
        visible.shuffle(self.rng);
        visible.truncate(k.max(1));
        if visible.is_empty() {
            return visible;
        }
        let take = self.rng.next_u32() as usize % visible.len() + 1;
        visible.truncate(take);
        visible
    }

    pub fn type_of(&self, v: Variable) -> JsType {
        self.analyzers.type_of(v)
    }

    pub fn visible_variable_count(&self) -> usize {
        self.analyzers.visible_variables().len()
    }

    pub fn rng(&mut self) -> &mut dyn RngCore {
        self.rng
    }

    /// Ensure at least `n` variables are visible, synthesizing integer
    /// literals if necessary (used before recursive code generation,
    /// spec §4.5).
    pub fn ensure_minimum_visible_variables(&mut self, n: usize) -> BuilderResult<()> {
        while self.visible_variable_count() < n {
            let value = self.vocabulary.random_int(self.rng);
            self.emit(Opcode::LoadInteger(value), vec![])?;
        }
        Ok(())
    }

    /// `splice(from, at)`: copy the minimal closed dataflow slice of
    /// `from` ending at instruction index `at` into this builder's
    /// `code`, rewiring free inputs to locally visible compatible
    /// variables (spec §4.5 splicing algorithm).
    pub fn splice(&mut self, from: &Program, at: usize) -> BuilderResult<()> {
        let mut scope = self.adopting();
        scope.splice(from, at)
    }

    /// `build(n, by: strategy)`: repeatedly add code until `n`
    /// instructions have been generated.
    pub fn build(&mut self, n: usize, strategy: BuildStrategy, pool: &mut GeneratorPool, corpus_sample: Option<&Program>) -> BuilderResult<()> {
        let start = self.code.len();
        let mut attempts = 0;
        while self.code.len() - start < n && attempts < n * 4 + 8 {
            attempts += 1;
            match strategy {
                BuildStrategy::Generating => self.generate_one(pool)?,
                BuildStrategy::Splicing => {
                    if let Some(src) = corpus_sample {
                        self.splice_one(src)?;
                    } else {
                        self.generate_one(pool)?;
                    }
                }
                BuildStrategy::Hybrid => {
                    if self.rng.next_u32().is_multiple_of(2) {
                        if corpus_sample.is_none() || self.splice_one(corpus_sample.unwrap()).is_err() {
                            self.generate_one(pool)?;
                        }
                    } else {
                        self.generate_one(pool)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn splice_one(&mut self, src: &Program) -> BuilderResult<()> {
        if src.is_empty() {
            return Err(BuilderError::SpliceFailed("empty source program".into()));
        }
        let idx = self.rng.next_u32() as usize % src.len();
        self.splice(src, idx)
    }

    fn generate_one(&mut self, pool: &mut GeneratorPool) -> BuilderResult<()> {
        self.ensure_minimum_visible_variables(3)?;
        let context = self.context();
        let idx = pool.select(context, self.rng).ok_or(BuilderError::NoApplicableGenerator)?;
        let generator = pool.generator(idx).clone();
        let inputs: Vec<Variable> = generator
            .input_types
            .iter()
            .map(|t| self.random_variable_for_use_as(t))
            .collect::<BuilderResult<_>>()?;
        let result = (generator.body)(self, &inputs, pool);
        pool.record_outcome(idx, if result.is_ok() { 1.0 } else { 0.0 });
        result
    }

    /// Finalize the draft into a new immutable `Program`, resetting all
    /// builder state.
    pub fn finalize(&mut self) -> Program {
        let code = std::mem::take(&mut self.code);
        self.analyzers = CompositeAnalyzerState::new();
        self.next_variable = 0;
        self.renumbering = None;
        self.recursion_depth = 0;
        Program::new(code)
    }
}

fn typer_for(program: &Program, v: Variable) -> JsType {
    let mut typer = crate::analysis::Typer::new();
    for instr in program.iter() {
        typer.analyze(instr);
        if instr.all_outputs().any(|o| o == v) {
            break;
        }
    }
    typer.type_of(v)
}

/// Compute the minimal set of instruction indices (ascending) closed
/// under: the instruction itself; if it sits inside one or more open
/// blocks, the enclosing block-group-start/end pair and the active
/// sibling arm header for each (so the slice stays structurally valid
/// FuzzIL on its own); and, for every included *structural* header, the
/// defining instructions of its own non-free inputs (e.g. a nested
/// function's parameters come from its own `BeginFunctionDefinition`).
/// Ordinary dataflow producers are deliberately left out — their
/// outputs are free inputs that `AdoptingScope::splice` remaps to
/// locally visible variables (spec §4.5 splicing algorithm step 3).
fn compute_closed_slice(program: &Program, at: usize) -> Vec<usize> {
    let mut included: HashSet<usize> = HashSet::new();
    included.insert(at);

    let mut depth = 0i32;
    for i in (0..at).rev() {
        match program[i].opcode.role() {
            Role::BlockGroupEnd => depth += 1,
            Role::BlockGroupStart => {
                if depth == 0 {
                    included.insert(i);
                    let mut fwd_depth = 0i32;
                    for j in at..program.len() {
                        match program[j].opcode.role() {
                            Role::BlockGroupStart => fwd_depth += 1,
                            Role::BlockGroupEnd => {
                                if fwd_depth == 0 {
                                    included.insert(j);
                                    break;
                                }
                                fwd_depth -= 1;
                            }
                            _ => {}
                        }
                    }
                } else {
                    depth -= 1;
                }
            }
            Role::BlockStart | Role::BlockEnd if depth == 0 => {
                included.insert(i);
            }
            _ => {}
        }
    }

    loop {
        let mut grew = false;
        let snapshot: Vec<usize> = included.iter().copied().collect();
        for &i in &snapshot {
            for input in program[i].inputs() {
                if let Some(def) = find_definition(program, *input, i) {
                    if matches!(program[def].opcode.role(), Role::BlockGroupStart | Role::BlockStart) && included.insert(def) {
                        grew = true;
                    }
                }
            }
        }
        if !grew {
            break;
        }
    }

    let mut result: Vec<usize> = included.into_iter().collect();
    result.sort_unstable();
    result
}

fn find_definition(program: &Program, v: Variable, before: usize) -> Option<usize> {
    (0..before).rev().find(|&i| program[i].all_outputs().any(|o| o == v))
}

/// RAII guard for a scoped adoption session (spec §4.5 `adopting`):
/// dropping it clears the renumbering table, guaranteeing the builder's
/// internal buffers are released on every exit path, including early
/// return through `?` (spec §5).
pub struct AdoptingScope<'b, 'a> {
    builder: &'b mut ProgramBuilder<'a>,
}

impl<'b, 'a> AdoptingScope<'b, 'a> {
    pub fn adopt(&mut self, instr: &Instruction) -> BuilderResult<()> {
        self.builder.adopt(instr)
    }

    pub fn seed(&mut self, foreign: Variable, local: Variable) {
        self.builder.seed_renumbering(foreign, local);
    }

    /// Generate further code while the adoption session stays open, so
    /// freshly emitted variables and renumbered-foreign ones keep
    /// sharing one counter and never collide.
    pub fn build(&mut self, n: usize, strategy: BuildStrategy, pool: &mut GeneratorPool, corpus_sample: Option<&Program>) -> BuilderResult<()> {
        self.builder.build(n, strategy, pool, corpus_sample)
    }

    pub fn emit(&mut self, opcode: Opcode, inputs: Vec<Variable>) -> BuilderResult<(Vec<Variable>, Vec<Variable>)> {
        self.builder.emit(opcode, inputs)
    }

    /// Escape hatch for callers (e.g. the runtime-assisted mutators) that
    /// need builder methods with no dedicated passthrough here, such as
    /// `random_variables_up_to` or passing the builder into
    /// `translate_action_inputs`.
    pub fn builder(&mut self) -> &mut ProgramBuilder<'a> {
        self.builder
    }

    /// Adopt the minimal closed dataflow slice of `from` ending at `at`,
    /// rewiring its free inputs to locally visible compatible variables,
    /// without opening a nested renumbering session — callers that are
    /// already walking a foreign program under one `AdoptingScope` can
    /// call this mid-walk and keep sharing that scope's mapping.
    pub fn splice(&mut self, from: &Program, at: usize) -> BuilderResult<()> {
        let target = &from[at];
        if matches!(target.opcode.role(), crate::ir::Role::Jump)
            || matches!(target.opcode.role(), crate::ir::Role::BlockGroupEnd | crate::ir::Role::BlockEnd)
            || target.opcode.attributes().contains(crate::ir::Attributes::PRIMITIVE)
            || target.opcode.attributes().contains(crate::ir::Attributes::LITERAL)
        {
            return Err(BuilderError::SpliceFailed("instruction kind is not spliceable".into()));
        }

        if !self.builder.context().contains(target.opcode.required_context())
            && !matches!(target.opcode, Opcode::LoopBreak)
        {
            return Err(BuilderError::SpliceFailed("target context not open at splice site".into()));
        }

        let slice = compute_closed_slice(from, at);

        let defined: HashSet<Variable> = slice.iter().flat_map(|&i| from[i].all_outputs()).collect();
        let mut free: Vec<Variable> = Vec::new();
        for &i in &slice {
            for v in from[i].inputs() {
                if !defined.contains(v) && !free.contains(v) {
                    free.push(*v);
                }
            }
        }

        for &foreign in &free {
            let ty = typer_for(from, foreign);
            let local = self
                .builder
                .random_variable_for_use_as(&ty)
                .or_else(|_| self.builder.random_variable())
                .map_err(|_| BuilderError::SpliceFailed("no compatible local variable for free input".into()))?;
            self.builder.seed_renumbering(foreign, local);
        }
        for &i in &slice {
            self.builder.adopt(&from[i])?;
        }
        Ok(())
    }
}

impl<'b, 'a> Drop for AdoptingScope<'b, 'a> {
    fn drop(&mut self) {
        self.builder.renumbering = None;
    }
}

//! Mutators (spec §4.7/§4.8/§4.9): each takes one parent `Program` and
//! produces a child by walking it through a `ProgramBuilder`, copying
//! most instructions unchanged and rewriting a bounded, randomly chosen
//! subset. `MutationOutcome` is a closed sum type rather than an
//! exception so "this mutator doesn't apply here" is an ordinary value,
//! not a control-flow surprise.

pub mod combine;
pub mod codegen_mutator;
pub mod input;
pub mod jit_stress;
pub mod operation;
pub mod runtime_assisted;
pub mod splice;

use std::collections::HashSet;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::RngCore;
use thiserror::Error;

use crate::builder::{BuilderError, ProgramBuilder};
use crate::config::FuzzerConfig;
use crate::ir::{Action, ActionError, Instruction, Program};

pub use combine::CombineMutator;
pub use codegen_mutator::CodeGenMutator;
pub use input::InputMutator;
pub use jit_stress::JitStressMutator;
pub use operation::OperationMutator;
pub use splice::SpliceMutator;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Builder(#[from] BuilderError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("{0}")]
    Other(String),
}

/// `Produced`/`NotApplicable`/`Failed` (spec §4.7): a successful mutation
/// that changed nothing observable is still `Produced`, since "no-op
/// mutation" is a legitimate (if wasted) outcome; `NotApplicable` means
/// no candidate site existed at all.
#[derive(Debug)]
pub enum MutationOutcome {
    Produced(Program),
    NotApplicable,
    Failed(MutationError),
}

pub trait Mutator {
    fn name(&self) -> &'static str;

    /// `donor` is a second program some mutators need (splicing,
    /// combining); mutators that don't use one simply ignore it.
    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn RngCore,
        donor: Option<&Program>,
    ) -> MutationOutcome;
}

/// Shared instruction-walking skeleton (spec's `BaseInstructionMutator`):
/// pick up to `max_simultaneous` instructions matching `predicate`, walk
/// the program once, and call `transform` on the selected ones while
/// copying everything else through unchanged. `NotApplicable` if nothing
/// matches.
pub fn mutate_selected(
    program: &Program,
    config: &FuzzerConfig,
    rng: &mut dyn RngCore,
    max_simultaneous: usize,
    predicate: impl Fn(&Instruction) -> bool,
    mut transform: impl FnMut(&mut ProgramBuilder<'_>, &Instruction) -> Result<Instruction, MutationError>,
) -> MutationOutcome {
    let candidates: Vec<usize> =
        program.iter().enumerate().filter(|(_, instr)| predicate(instr)).map(|(idx, _)| idx).collect();
    if candidates.is_empty() {
        return MutationOutcome::NotApplicable;
    }
    let mut shuffled = candidates;
    shuffled.shuffle(rng);
    shuffled.truncate(max_simultaneous.max(1));
    let targets: HashSet<usize> = shuffled.into_iter().collect();

    let mut builder = ProgramBuilder::new(config, rng);
    for instr in program.iter() {
        let outcome = if targets.contains(&instr.index) {
            transform(&mut builder, instr).and_then(|rewritten| Ok(builder.append(rewritten)?))
        } else {
            builder.append(instr.clone()).map_err(MutationError::from)
        };
        if let Err(e) = outcome {
            return MutationOutcome::Failed(e);
        }
    }
    let child = builder.finalize().with_parent(Arc::new(program.clone()));
    MutationOutcome::Produced(child)
}

/// Resolve an `Action`'s inputs into builder-visible variables, emitting
/// fresh literal loads for inputs that aren't already variables (spec
/// §4.9's instrument→execute→interpret→rewrite pipeline, rewrite step).
pub(crate) fn translate_action_inputs(
    builder: &mut ProgramBuilder<'_>,
    action: &Action,
    ctx: &crate::ir::TranslationContext,
) -> Result<Vec<crate::ir::Variable>, MutationError> {
    use crate::ir::TranslatedInput;
    let (_, remaining_inputs) = crate::ir::action_opcode(action)?;
    let mut vars = Vec::with_capacity(remaining_inputs.len());
    for input in &remaining_inputs {
        match input.resolve(ctx)? {
            TranslatedInput::ExistingVariable(v) => vars.push(v),
            TranslatedInput::FreshLiteral(opcode) => {
                let (outputs, _) = builder.emit(opcode, vec![])?;
                vars.push(outputs[0]);
            }
        }
    }
    Ok(vars)
}

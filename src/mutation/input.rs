//! `InputMutator` (spec §4.7): replaces one input of a randomly chosen
//! instruction with another visible variable. `typeAwareness` selects
//! between `loose` (any visible variable) and `aware` (must be usable as
//! the original input's inferred type, falling back to any visible
//! variable if none qualifies). Inputs to block-end instructions are
//! always drawn from the outer scope, since a block-end's inouts are
//! read after the block's own inner scope has already closed.

use rand::Rng;

use super::{mutate_selected, MutationError, MutationOutcome, Mutator};
use crate::builder::ProgramBuilder;
use crate::config::FuzzerConfig;
use crate::ir::{Instruction, Program, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAwareness {
    Loose,
    Aware,
}

#[derive(Debug, Clone, Copy)]
pub struct InputMutator {
    pub type_awareness: TypeAwareness,
}

impl Default for InputMutator {
    fn default() -> Self {
        InputMutator { type_awareness: TypeAwareness::Aware }
    }
}

impl InputMutator {
    pub fn loose() -> Self {
        InputMutator { type_awareness: TypeAwareness::Loose }
    }

    pub fn aware() -> Self {
        InputMutator { type_awareness: TypeAwareness::Aware }
    }
}

impl Mutator for InputMutator {
    fn name(&self) -> &'static str {
        "InputMutator"
    }

    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn rand::RngCore,
        _donor: Option<&Program>,
    ) -> MutationOutcome {
        let awareness = self.type_awareness;
        mutate_selected(
            program,
            config,
            rng,
            config.mutation.default_max_simultaneous_mutations,
            |instr: &Instruction| instr.num_inputs() > 0,
            move |b, instr| replace_one_input(b, instr, awareness),
        )
    }
}

fn replace_one_input(b: &mut ProgramBuilder<'_>, instr: &Instruction, awareness: TypeAwareness) -> Result<Instruction, MutationError> {
    let slot = b.rng().gen_range(0..instr.num_inputs());
    let is_block_end = matches!(instr.opcode.role(), Role::BlockEnd | Role::BlockGroupEnd);
    let replacement = if is_block_end {
        b.random_variable_from_outer_scope()?
    } else {
        match awareness {
            TypeAwareness::Aware => {
                let wanted = b.type_of(instr.inputs()[slot]);
                b.random_variable_of_type(&wanted).or_else(|_| b.random_variable())?
            }
            TypeAwareness::Loose => b.random_variable()?,
        }
    };
    Ok(instr.with_replaced_input(slot, replacement))
}

//! `JitStressMutator` (spec §4.8): appends the current program, optionally
//! generates filler code after it, then calls an existing function-typed
//! variable with freshly sampled arguments — re-invoking code that may
//! already be JIT-compiled, in the hope of triggering optimizer bugs.

use rand::Rng;

use super::{MutationError, MutationOutcome, Mutator};
use crate::builder::{BuildStrategy, BuilderError, ProgramBuilder};
use crate::codegen::GeneratorPool;
use crate::config::FuzzerConfig;
use crate::ir::{JsType, Opcode, Program};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct JitStressMutator;

impl Mutator for JitStressMutator {
    fn name(&self) -> &'static str {
        "JitStressMutator"
    }

    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn rand::RngCore,
        _donor: Option<&Program>,
    ) -> MutationOutcome {
        if program.is_empty() {
            return MutationOutcome::NotApplicable;
        }
        let generate_filler = rng.gen_bool(0.5);

        let mut pool = GeneratorPool::default_pool();
        let mut builder = ProgramBuilder::new(config, rng);
        let result = (|| -> Result<(), MutationError> {
            let mut scope = builder.adopting();
            for instr in program.iter() {
                scope.adopt(instr)?;
            }
            if generate_filler {
                scope.build(config.mutation.default_code_generation_amount, BuildStrategy::Generating, &mut pool, None)?;
            }
            let callee = scope.builder().random_variable_of_type(&JsType::function())?;
            let args = scope.builder().random_variables_up_to(3);
            let spreads = vec![false; args.len()];
            let mut call_inputs = vec![callee];
            call_inputs.extend(args);
            scope.emit(Opcode::CallFunction { spreads }, call_inputs)?;
            Ok(())
        })();

        match result {
            Ok(()) => {
                let child = builder.finalize().with_parent(Arc::new(program.clone()));
                MutationOutcome::Produced(child)
            }
            // No function-typed variable is visible to re-invoke: this
            // program simply isn't a candidate, not a builder failure.
            Err(MutationError::Builder(BuilderError::NoVisibleVariable)) => MutationOutcome::NotApplicable,
            Err(e) => MutationOutcome::Failed(e),
        }
    }
}

//! `CombineMutator` (spec §4.8): inlines an entire donor program, which
//! is assumed already closed (no free variables), at a random point in
//! the parent.

use rand::seq::SliceRandom;

use super::{MutationError, MutationOutcome, Mutator};
use crate::analysis::{ContextAnalyzer, DeadCodeAnalyzer};
use crate::builder::ProgramBuilder;
use crate::config::FuzzerConfig;
use crate::ir::{Context, Program};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct CombineMutator;

/// Cursor positions that are both live and in the required script context
/// only — the Open Question's resolution (spec §9): appending a foreign
/// program mid-function, mid-loop, etc. is not allowed, only at top level.
fn script_only_live_insertion_points(program: &Program) -> Vec<usize> {
    let mut dead_code = DeadCodeAnalyzer::new();
    let mut context = ContextAnalyzer::new();
    let mut points = Vec::new();
    let is_script_only = |ctx: Context| ctx == Context::SCRIPT;
    if !dead_code.currently_in_dead_code() && is_script_only(context.context()) {
        points.push(0);
    }
    for instr in program.iter() {
        dead_code.analyze(instr);
        context.analyze(instr);
        if !dead_code.currently_in_dead_code() && is_script_only(context.context()) {
            points.push(instr.index + 1);
        }
    }
    points
}

impl Mutator for CombineMutator {
    fn name(&self) -> &'static str {
        "CombineMutator"
    }

    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn rand::RngCore,
        donor: Option<&Program>,
    ) -> MutationOutcome {
        let Some(donor) = donor else {
            return MutationOutcome::NotApplicable;
        };
        if donor.is_empty() {
            return MutationOutcome::NotApplicable;
        }
        let candidates = script_only_live_insertion_points(program);
        let Some(&insertion_point) = candidates.choose(rng) else {
            return MutationOutcome::NotApplicable;
        };

        let mut builder = ProgramBuilder::new(config, rng);
        let result = (|| -> Result<(), MutationError> {
            let mut scope = builder.adopting();
            let mut inserted = false;
            for instr in program.iter() {
                if instr.index == insertion_point {
                    for donor_instr in donor.iter() {
                        scope.adopt(donor_instr)?;
                    }
                    inserted = true;
                }
                scope.adopt(instr)?;
            }
            if !inserted {
                for donor_instr in donor.iter() {
                    scope.adopt(donor_instr)?;
                }
            }
            Ok(())
        })();

        if let Err(e) = result {
            return MutationOutcome::Failed(e);
        }

        let child = builder.finalize().with_parent(Arc::new(program.clone()));
        MutationOutcome::Produced(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildStrategy;
    use crate::codegen::GeneratorPool;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_program(seed: u64, n: usize) -> Program {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut pool = GeneratorPool::default_pool();
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.build(n, BuildStrategy::Generating, &mut pool, None).unwrap();
        builder.finalize()
    }

    #[test]
    fn combines_donor_and_parent_instruction_counts() {
        let config = FuzzerConfig::default();
        let parent = sample_program(30, 8);
        let donor = sample_program(31, 6);

        let mut mutator = CombineMutator;
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let child = match mutator.mutate(&parent, &config, &mut rng, Some(&donor)) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert_eq!(child.len(), parent.len() + donor.len());
    }

    #[test]
    fn never_inserts_inside_a_function_body() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(50);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.emit(crate::ir::Opcode::BeginFunctionDefinition { num_parameters: 0 }, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::LoadInteger(1), vec![]).unwrap();
        builder.emit(crate::ir::Opcode::Return, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::EndFunctionDefinition, vec![]).unwrap();
        let parent = builder.finalize();
        let donor = sample_program(51, 3);

        for trial in 0..64 {
            let mut mutate_rng = ChaCha8Rng::seed_from_u64(trial);
            let mut mutator = CombineMutator;
            if let MutationOutcome::Produced(child) = mutator.mutate(&parent, &config, &mut mutate_rng, Some(&donor)) {
                // The donor's code must not land between BeginFunctionDefinition
                // and EndFunctionDefinition.
                let begin = child.iter().position(|i| matches!(i.opcode, crate::ir::Opcode::BeginFunctionDefinition { .. })).unwrap();
                let end = child.iter().position(|i| matches!(i.opcode, crate::ir::Opcode::EndFunctionDefinition)).unwrap();
                assert_eq!(end - begin, 3, "function body grew: donor code was inserted mid-function");
            }
        }
    }

    #[test]
    fn not_applicable_without_a_donor() {
        let config = FuzzerConfig::default();
        let parent = sample_program(1, 5);
        let mut mutator = CombineMutator;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert!(matches!(mutator.mutate(&parent, &config, &mut rng, None), MutationOutcome::NotApplicable));
    }
}

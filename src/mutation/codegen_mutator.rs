//! `CodeGenMutator` (spec §4.7): inserts a small amount of freshly
//! generated code at a random point in the program, leaving every
//! existing instruction untouched. Owns its own `GeneratorPool` so the
//! bandit's weights persist across calls instead of resetting each time.

use rand::seq::SliceRandom;

use super::{MutationError, MutationOutcome, Mutator};
use crate::analysis::DeadCodeAnalyzer;
use crate::builder::{BuildStrategy, ProgramBuilder};
use crate::codegen::GeneratorPool;
use crate::config::FuzzerConfig;
use crate::ir::Program;
use std::sync::Arc;

/// Cursor positions (as instruction indices, `program.len()` meaning
/// "after the last instruction") where the program is not currently
/// past an unconditional terminator — spec §4.8's "live-code positions".
fn live_insertion_points(program: &Program) -> Vec<usize> {
    let mut analyzer = DeadCodeAnalyzer::new();
    let mut points = Vec::new();
    if !analyzer.currently_in_dead_code() {
        points.push(0);
    }
    for instr in program.iter() {
        analyzer.analyze(instr);
        if !analyzer.currently_in_dead_code() {
            points.push(instr.index + 1);
        }
    }
    points
}

pub struct CodeGenMutator {
    pool: GeneratorPool,
}

impl Default for CodeGenMutator {
    fn default() -> Self {
        CodeGenMutator { pool: GeneratorPool::default_pool() }
    }
}

impl CodeGenMutator {
    pub fn from_config(config: &FuzzerConfig) -> Self {
        CodeGenMutator { pool: GeneratorPool::from_config(&config.bandit) }
    }
}

impl Mutator for CodeGenMutator {
    fn name(&self) -> &'static str {
        "CodeGenMutator"
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
        let live_points = live_insertion_points(program);
        let Some(&insertion_point) = live_points.choose(rng) else {
            return MutationOutcome::NotApplicable;
        };
        let amount = config.mutation.default_code_generation_amount;

        let mut builder = ProgramBuilder::new(config, rng);
        {
            // Renumbering the adopted original instructions (rather than
            // appending them with their old variable numbers verbatim)
            // keeps them from colliding with the fresh variables the
            // inserted generated code allocates from the same counter.
            let mut scope = builder.adopting();
            for instr in program.iter() {
                if instr.index == insertion_point {
                    if let Err(e) = scope.build(amount, BuildStrategy::Generating, &mut self.pool, None) {
                        return MutationOutcome::Failed(MutationError::from(e));
                    }
                }
                if let Err(e) = scope.adopt(instr) {
                    return MutationOutcome::Failed(MutationError::from(e));
                }
            }
            if insertion_point == program.len() {
                if let Err(e) = scope.build(amount, BuildStrategy::Generating, &mut self.pool, None) {
                    return MutationOutcome::Failed(MutationError::from(e));
                }
            }
        }

        let child = builder.finalize().with_parent(Arc::new(program.clone()));
        MutationOutcome::Produced(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildStrategy as Strategy;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn inserts_code_without_losing_original_instructions() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut pool = GeneratorPool::default_pool();
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.build(5, Strategy::Generating, &mut pool, None).unwrap();
        let seed = builder.finalize();

        let mut mutator = CodeGenMutator::default();
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(6);
        let child = match mutator.mutate(&seed, &config, &mut mutate_rng, None) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert!(child.len() > seed.len());
    }

    #[test]
    fn live_insertion_points_exclude_positions_after_an_unconditional_return() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.emit(crate::ir::Opcode::BeginFunctionDefinition { num_parameters: 0 }, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::Return, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::LoadInteger(1), vec![]).unwrap();
        builder.emit(crate::ir::Opcode::EndFunctionDefinition, vec![]).unwrap();
        let program = builder.finalize();

        let points = live_insertion_points(&program);
        // Live: before the function (0), and right after its header,
        // before the Return (1). Dead from the Return onward (2, 3).
        assert!(points.contains(&0));
        assert!(points.contains(&1));
        assert!(!points.contains(&2));
        assert!(!points.contains(&3));
    }

    #[test]
    fn not_applicable_to_empty_program() {
        let config = FuzzerConfig::default();
        let empty = Program::new(vec![]);
        let mut mutator = CodeGenMutator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(mutator.mutate(&empty, &config, &mut rng, None), MutationOutcome::NotApplicable));
    }
}

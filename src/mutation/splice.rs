//! `SpliceMutator` (spec §4.8): copies a minimal closed dataflow slice
//! from a donor program into a random point of the parent, rewiring the
//! slice's free inputs to variables already visible at the splice site.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{MutationError, MutationOutcome, Mutator};
use crate::analysis::DeadCodeAnalyzer;
use crate::builder::ProgramBuilder;
use crate::config::FuzzerConfig;
use crate::ir::Program;
use std::sync::Arc;

/// Cursor positions where the program is not currently past an
/// unconditional terminator (spec §4.8: "At live-code positions, splice a
/// slice from a randomly chosen corpus element") — inserting after a
/// `Return`/`Throw` would produce code nothing can ever execute.
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

#[derive(Debug, Default)]
pub struct SpliceMutator;

impl Mutator for SpliceMutator {
    fn name(&self) -> &'static str {
        "SpliceMutator"
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
        let live_points = live_insertion_points(program);
        if live_points.is_empty() {
            return MutationOutcome::NotApplicable;
        }
        // Bounded retries over the donor index and insertion point (spec
        // §4.5 splicing algorithm step 1): not every instruction is
        // spliceable, and a given splice site may not yet have a visible
        // variable of the right type to remap a free input to.
        const MAX_SPLICE_ATTEMPTS: usize = 16;
        let mut last_err = MutationError::Other("no spliceable instruction found in donor".into());
        for _ in 0..MAX_SPLICE_ATTEMPTS {
            let at = rng.gen_range(0..donor.len());
            let insertion_point = *live_points.choose(rng).unwrap();
            let mut builder = ProgramBuilder::new(config, rng);
            let result = (|| -> Result<(), MutationError> {
                // One continuous renumbering session for the whole walk: the
                // donor slice's free variables must resolve to the same local
                // variables the original program's own instructions were just
                // renumbered to, and instructions copied after the splice
                // point must still see the renumbering assigned to instructions
                // copied before it.
                let mut scope = builder.adopting();
                let mut spliced = false;
                for instr in program.iter() {
                    if instr.index == insertion_point {
                        scope.splice(donor, at)?;
                        spliced = true;
                    }
                    scope.adopt(instr)?;
                }
                if !spliced {
                    scope.splice(donor, at)?;
                }
                Ok(())
            })();

            match result {
                Ok(()) => {
                    let child = builder.finalize().with_parent(Arc::new(program.clone()));
                    return MutationOutcome::Produced(child);
                }
                Err(e) => last_err = e,
            }
        }
        MutationOutcome::Failed(last_err)
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
    fn splices_donor_code_into_the_parent() {
        let config = FuzzerConfig::default();
        let parent = sample_program(20, 10);
        let donor = sample_program(21, 10);

        let mut mutator = SpliceMutator;
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let child = match mutator.mutate(&parent, &config, &mut rng, Some(&donor)) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert!(child.len() >= parent.len());
    }

    #[test]
    fn never_splices_into_dead_code_after_an_unconditional_return() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(40);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.emit(crate::ir::Opcode::BeginFunctionDefinition { num_parameters: 0 }, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::Return, vec![]).unwrap();
        builder.emit(crate::ir::Opcode::LoadInteger(1), vec![]).unwrap();
        builder.emit(crate::ir::Opcode::EndFunctionDefinition, vec![]).unwrap();
        let parent = builder.finalize();
        let donor = sample_program(41, 5);

        for trial in 0..64 {
            let mut mutate_rng = ChaCha8Rng::seed_from_u64(trial);
            let mut mutator = SpliceMutator;
            if let MutationOutcome::Produced(child) = mutator.mutate(&parent, &config, &mut mutate_rng, Some(&donor)) {
                // The dead LoadInteger(1) between Return and EndFunctionDefinition
                // must stay the only instruction there; nothing may be spliced
                // in after the Return within the same function body.
                let ret = child.iter().position(|i| matches!(i.opcode, crate::ir::Opcode::Return)).unwrap();
                let end = child.iter().position(|i| matches!(i.opcode, crate::ir::Opcode::EndFunctionDefinition)).unwrap();
                assert_eq!(end - ret, 2, "splice landed in dead code after the Return");
            }
        }
    }

    #[test]
    fn not_applicable_without_a_donor() {
        let config = FuzzerConfig::default();
        let parent = sample_program(1, 5);
        let mut mutator = SpliceMutator;
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        assert!(matches!(mutator.mutate(&parent, &config, &mut rng, None), MutationOutcome::NotApplicable));
    }
}

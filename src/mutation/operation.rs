//! `OperationMutator` (spec §4.7): resamples an instruction's mutable
//! parameters in place, or grows a variadic instruction's effective
//! input count, keeping the opcode's discriminant (and therefore its
//! shape/context/role) unchanged.

use rand::Rng;

use super::{mutate_selected, MutationError, MutationOutcome, Mutator};
use crate::builder::ProgramBuilder;
use crate::config::FuzzerConfig;
use crate::ir::{Attributes, Instruction, Program};

#[derive(Debug, Default)]
pub struct OperationMutator;

impl Mutator for OperationMutator {
    fn name(&self) -> &'static str {
        "OperationMutator"
    }

    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn rand::RngCore,
        _donor: Option<&Program>,
    ) -> MutationOutcome {
        mutate_selected(
            program,
            config,
            rng,
            config.mutation.default_max_simultaneous_mutations,
            |instr: &Instruction| {
                let attrs = instr.opcode.attributes();
                attrs.contains(Attributes::MUTABLE_PARAMETERS) || attrs.contains(Attributes::VARIADIC)
            },
            resample_or_extend,
        )
    }
}

fn resample_or_extend(b: &mut ProgramBuilder<'_>, instr: &Instruction) -> Result<Instruction, MutationError> {
    let vocab = b.vocabulary().clone();
    let attrs = instr.opcode.attributes();

    if attrs.contains(Attributes::MUTABLE_PARAMETERS) && (!attrs.contains(Attributes::VARIADIC) || b.rng().gen_bool(0.5)) {
        if let Some(new_opcode) = instr.opcode.mutate_parameters(b.rng(), &vocab) {
            return Ok(instr.with_opcode(new_opcode, vec![]));
        }
    }

    if attrs.contains(Attributes::VARIADIC) {
        let n = b.rng().gen_range(1..=2usize);
        if let Some(new_opcode) = instr.opcode.extend_variadic(n, b.rng(), &vocab) {
            let mut extra = Vec::with_capacity(n);
            for _ in 0..n {
                extra.push(b.random_variable()?);
            }
            return Ok(instr.with_opcode(new_opcode, extra));
        }
    }

    Ok(instr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Opcode;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn resamples_a_property_name() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        let (obj, _) = builder.emit(Opcode::LoadThis, vec![]).unwrap();
        builder.emit(Opcode::GetProperty("length".into()), vec![obj[0]]).unwrap();
        let seed = builder.finalize();

        let mut mutator = OperationMutator;
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(9);
        let child = match mutator.mutate(&seed, &config, &mut mutate_rng, None) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert!(matches!(child[1].opcode, Opcode::GetProperty(_)));
    }

    #[test]
    fn not_applicable_when_nothing_is_mutable() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.emit(Opcode::LoadThis, vec![]).unwrap();
        let seed = builder.finalize();

        let mut mutator = OperationMutator;
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(2);
        assert!(matches!(mutator.mutate(&seed, &config, &mut mutate_rng, None), MutationOutcome::NotApplicable));
    }
}

//! End-to-end scenarios from spec §8, exercised through the public
//! mutator API rather than the in-module unit tests.

use fuzzil_core::builder::ProgramBuilder;
use fuzzil_core::config::FuzzerConfig;
use fuzzil_core::ir::{BinaryOp, Opcode, Variable};
use fuzzil_core::mutation::{CombineMutator, Mutator, MutationOutcome, OperationMutator, SpliceMutator};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn add_program() -> fuzzil_core::Program {
    let config = FuzzerConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut builder = ProgramBuilder::new(&config, &mut rng);
    let (v0, _) = builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
    let (v1, _) = builder.emit(Opcode::LoadInteger(2), vec![]).unwrap();
    builder.emit(Opcode::BinaryOperation(BinaryOp::Add), vec![v0[0], v1[0]]).unwrap();
    builder.finalize()
}

#[test]
fn operation_mutator_can_resample_add_into_a_different_binary_op() {
    let config = FuzzerConfig::default();
    let seed = add_program();

    for trial in 0..64 {
        let mut mutator = OperationMutator;
        let mut rng = ChaCha8Rng::seed_from_u64(trial);
        if let MutationOutcome::Produced(child) = mutator.mutate(&seed, &config, &mut rng, None) {
            assert_eq!(child.len(), seed.len());
            if let Opcode::BinaryOperation(op) = child[2].opcode {
                if op != BinaryOp::Add {
                    assert_eq!(child[2].inputs(), [Variable(0), Variable(1)], "inouts must stay unchanged");
                    return;
                }
            }
        }
    }
    panic!("no trial resampled Add into a different binary operator");
}

#[test]
fn splice_across_programs_remaps_the_free_input_and_excludes_unrelated_code() {
    // Spec §8 scenario 4: w0 = LoadInt 7; w1 = LoadString "x"; w2 = GetProperty("len", w1).
    // Splicing w2's closure {w1, w2} into a target with a visible string v0
    // must remap w1 -> v0 and must not drag in w0.
    let config = FuzzerConfig::default();
    let mut donor_rng = ChaCha8Rng::seed_from_u64(1);
    let mut donor_builder = ProgramBuilder::new(&config, &mut donor_rng);
    donor_builder.emit(Opcode::LoadInteger(7), vec![]).unwrap();
    let (w1, _) = donor_builder.emit(Opcode::LoadString("x".into()), vec![]).unwrap();
    donor_builder.emit(Opcode::GetProperty("len".into()), vec![w1[0]]).unwrap();
    let donor = donor_builder.finalize();

    let mut target_rng = ChaCha8Rng::seed_from_u64(2);
    let mut target_builder = ProgramBuilder::new(&config, &mut target_rng);
    target_builder.emit(Opcode::LoadString("seed".into()), vec![]).unwrap();
    let target = target_builder.finalize();

    let mut mutator = SpliceMutator;
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let child = match mutator.mutate(&target, &config, &mut rng, Some(&donor)) {
        MutationOutcome::Produced(p) => p,
        other => panic!("expected Produced, got {other:?}"),
    };

    // Donor's LoadInt 7 (w0) must never appear: the closure of w2 is {w1, w2}.
    assert!(
        !child.iter().any(|i| matches!(i.opcode, Opcode::LoadInteger(7))),
        "splice pulled in code outside the closed slice"
    );
    let spliced_get_property = child.iter().find(|i| matches!(i.opcode, Opcode::GetProperty(_))).expect("GetProperty missing from child");
    // The free input (donor's w1) must resolve to a variable already visible
    // in the target, not to a freshly adopted copy of donor's LoadString.
    let resolved_input = spliced_get_property.inputs()[0];
    let load_string_count = child.iter().filter(|i| matches!(i.opcode, Opcode::LoadString(_))).count();
    assert_eq!(load_string_count, 1, "free input should have been remapped, not duplicated");
    assert_eq!(resolved_input, Variable(0), "free input should resolve to the target's existing visible string");
}

#[test]
fn combine_mutator_inlines_a_closed_donor_program_whole() {
    let config = FuzzerConfig::default();
    let mut donor_rng = ChaCha8Rng::seed_from_u64(10);
    let mut donor_builder = ProgramBuilder::new(&config, &mut donor_rng);
    donor_builder.emit(Opcode::LoadInteger(1), vec![]).unwrap();
    donor_builder.emit(Opcode::LoadInteger(2), vec![]).unwrap();
    let donor = donor_builder.finalize();

    let mut target_rng = ChaCha8Rng::seed_from_u64(11);
    let mut target_builder = ProgramBuilder::new(&config, &mut target_rng);
    target_builder.emit(Opcode::LoadThis, vec![]).unwrap();
    let target = target_builder.finalize();

    let mut mutator = CombineMutator;
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    let child = match mutator.mutate(&target, &config, &mut rng, Some(&donor)) {
        MutationOutcome::Produced(p) => p,
        other => panic!("expected Produced, got {other:?}"),
    };
    assert_eq!(child.len(), target.len() + donor.len());
}

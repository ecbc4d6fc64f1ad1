//! `decode(encode(P)) ≡ P` up to bijective variable renumbering, and the
//! stream framing used for on-disk corpora round-trips multiple records.

use std::collections::HashMap;

use fuzzil_core::builder::{BuildStrategy, ProgramBuilder};
use fuzzil_core::codegen::GeneratorPool;
use fuzzil_core::config::FuzzerConfig;
use fuzzil_core::ir::{Program, Variable};
use fuzzil_core::serialization::{decode_program, encode_program, ProgramReader, ProgramWriter};
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

fn assert_equivalent_up_to_renumbering(a: &Program, b: &Program) {
    assert_eq!(a.len(), b.len());
    let mut remap: HashMap<Variable, Variable> = HashMap::new();
    for (ia, ib) in a.iter().zip(b.iter()) {
        assert_eq!(std::mem::discriminant(&ia.opcode), std::mem::discriminant(&ib.opcode));
        for (va, vb) in ia.all_outputs().zip(ib.all_outputs()) {
            remap.insert(va, vb);
        }
    }
    for (ia, ib) in a.iter().zip(b.iter()) {
        let expected: Vec<Variable> = ia.inputs().iter().map(|v| remap[v]).collect();
        assert_eq!(expected, ib.inputs());
    }
}

#[test]
fn decoded_program_is_structurally_equivalent_to_the_original() {
    for seed in 0..10 {
        let program = sample_program(seed, 25);
        let bytes = encode_program(&program).unwrap();
        let decoded = decode_program(&bytes).unwrap();
        assert_equivalent_up_to_renumbering(&program, &decoded);
    }
}

#[test]
fn stream_round_trips_a_corpus_of_several_programs() {
    let programs: Vec<Program> = (0..5).map(|seed| sample_program(seed + 100, 15)).collect();

    let mut buffer = Vec::new();
    {
        let mut writer = ProgramWriter::new(&mut buffer);
        for program in &programs {
            writer.write_program(program).unwrap();
        }
    }

    let mut reader = ProgramReader::new(buffer.as_slice());
    for original in &programs {
        let decoded = reader.read_program().unwrap().expect("expected a record");
        assert_equivalent_up_to_renumbering(original, &decoded);
    }
    assert!(reader.read_program().unwrap().is_none(), "expected clean end of stream");
}

//! `fuzzil-core`: the structural mutation engine and typed intermediate
//! representation underlying a coverage-guided JavaScript engine fuzzer.
//!
//! This crate covers the FuzzIL program model (opcode catalog,
//! instructions, programs, the abstract type lattice), the incremental
//! analyzer framework, the invariant-enforcing `ProgramBuilder`, the
//! code generator pool with its Exp3.1 selection bandit, the concrete
//! mutator family, and the runtime-assisted mutation protocol
//! (instrument → execute → interpret → rewrite). The corpus store,
//! target-engine executor, and JavaScript lifter are modeled only as
//! the external trait interfaces a consumer must supply (spec §6);
//! this crate does not parse or execute JavaScript itself.

pub mod analysis;
pub mod builder;
pub mod codegen;
pub mod config;
pub mod external;
pub mod ir;
pub mod mutation;
pub mod serialization;
pub mod stats;

pub use builder::{BuilderError, BuilderResult, ProgramBuilder};
pub use config::FuzzerConfig;
pub use ir::{Instruction, Opcode, Program, Variable};
pub use mutation::{Mutator, MutationOutcome};

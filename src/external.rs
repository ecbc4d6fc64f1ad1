//! External collaborators named in spec §6: the corpus store, the
//! target-engine executor, and the JavaScript lifter. The core only
//! depends on these as traits — implementing a real target executor or
//! lifter is out of scope (spec §1).

use std::time::Duration;

use rand::RngCore;

use crate::ir::Program;

pub trait Corpus {
    fn random_element(&mut self, rng: &mut dyn RngCore) -> Option<Program>;
    fn random_element_for_splicing(&mut self, rng: &mut dyn RngCore) -> Option<Program>;
    fn add(&mut self, program: Program);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed(i32),
    TimedOut,
    Crashed(i32),
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub outcome: ExecutionOutcome,
    pub stdout: String,
    pub stderr: String,
    pub fuzzout: String,
    pub exec_time: Duration,
}

pub trait Executor {
    fn execute(&mut self, program: &Program, timeout: Duration) -> ExecutionResult;
}

#[derive(Debug, Clone, Default)]
pub struct LifterOptions {
    pub include_comments: bool,
}

pub trait Lifter {
    fn lift(&self, program: &Program, options: &LifterOptions) -> String;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct InMemoryCorpus {
        pub programs: Vec<Program>,
    }

    impl Corpus for InMemoryCorpus {
        fn random_element(&mut self, rng: &mut dyn RngCore) -> Option<Program> {
            if self.programs.is_empty() {
                return None;
            }
            let idx = (rng.next_u32() as usize) % self.programs.len();
            Some(self.programs[idx].clone())
        }

        fn random_element_for_splicing(&mut self, rng: &mut dyn RngCore) -> Option<Program> {
            self.random_element(rng)
        }

        fn add(&mut self, program: Program) {
            self.programs.push(program);
        }
    }

    /// Replays a scripted sequence of `ExecutionResult`s, letting
    /// runtime-assisted mutator tests drive deterministic fuzzout
    /// content without a real target engine.
    pub struct ScriptedExecutor {
        pub results: VecDeque<ExecutionResult>,
    }

    impl Executor for ScriptedExecutor {
        fn execute(&mut self, _program: &Program, _timeout: Duration) -> ExecutionResult {
            self.results.pop_front().unwrap_or(ExecutionResult {
                outcome: ExecutionOutcome::Succeeded,
                stdout: String::new(),
                stderr: String::new(),
                fuzzout: String::new(),
                exec_time: Duration::from_millis(0),
            })
        }
    }

    pub struct NullLifter;

    impl Lifter for NullLifter {
        fn lift(&self, program: &Program, _options: &LifterOptions) -> String {
            format!("/* {} instructions */", program.len())
        }
    }
}

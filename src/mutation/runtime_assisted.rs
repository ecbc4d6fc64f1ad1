//! Runtime-assisted protocol (spec §4.9): instrument a program with an
//! `Explore`/`Probe`/`Fixup` opcode, execute it, parse the executor's
//! tagged `fuzzout` lines, and rewrite the instrumentation into concrete
//! FuzzIL (or drop it, or keep the original guarded form).

use std::time::Duration;

use rand::seq::SliceRandom;

use super::{translate_action_inputs, MutationError, MutationOutcome, Mutator};
use crate::builder::ProgramBuilder;
use crate::config::FuzzerConfig;
use crate::external::{ExecutionOutcome, Executor};
use crate::ir::{Action, ActionInput, ActionOp, Attributes, Opcode, Program, TranslationContext, Variable};
use std::sync::Arc;

const RECOVERABLE_ERRORS: &[&str] =
    &["maximum call stack size exceeded", "out of memory", "too much recursion"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentationOutcome {
    Success,
    CannotInstrument,
    InstrumentedProgramFailed,
    InstrumentedProgramTimedOut,
    NoResults,
    UnexpectedError,
}

impl InstrumentationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::CannotInstrument => "cannot_instrument",
            Self::InstrumentedProgramFailed => "instrumented_program_failed",
            Self::InstrumentedProgramTimedOut => "instrumented_program_timed_out",
            Self::NoResults => "no_results",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

#[derive(Debug, Clone)]
enum ProtocolLine {
    Action(Action),
    Failure(String),
    Error(String),
}

fn parse_fuzzout(tag: &str, fuzzout: &str) -> Vec<ProtocolLine> {
    let action_prefix = format!("{tag}_ACTION: ");
    let failure_prefix = format!("{tag}_FAILURE: ");
    let error_prefix = format!("{tag}_ERROR: ");
    let mut lines = Vec::new();
    for line in fuzzout.lines() {
        if let Some(json) = line.strip_prefix(action_prefix.as_str()) {
            if let Ok(action) = serde_json::from_str::<Action>(json.trim()) {
                lines.push(ProtocolLine::Action(action));
            }
        } else if let Some(id) = line.strip_prefix(failure_prefix.as_str()) {
            lines.push(ProtocolLine::Failure(id.trim().to_string()));
        } else if let Some(text) = line.strip_prefix(error_prefix.as_str()) {
            lines.push(ProtocolLine::Error(text.trim().to_string()));
        }
    }
    lines
}

fn is_fatal_error(text: &str) -> bool {
    !RECOVERABLE_ERRORS.iter().any(|known| text.contains(known))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeAssistedKind {
    Explore,
    Probe,
    Fixup,
}

impl RuntimeAssistedKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Explore => "EXPLORE",
            Self::Probe => "PROBE",
            Self::Fixup => "FIXUP",
        }
    }
}

/// Builds a `Fixup` Action for a guardable instruction whose inputs are
/// simple enough to describe: the receiver becomes the Fixup's explored
/// value, any remaining inputs become `ArgumentIndex` references.
fn opcode_to_fixup_action(id: String, instr: &crate::ir::Instruction) -> Option<(Action, Variable, Vec<Variable>)> {
    match &instr.opcode {
        Opcode::GetProperty(name) => Some((
            Action {
                id,
                operation: ActionOp::GetProperty,
                inputs: vec![ActionInput::PropertyName(name.clone())],
                is_guarded: true,
            },
            instr.inputs()[0],
            vec![],
        )),
        Opcode::SetProperty(name) => Some((
            Action {
                id,
                operation: ActionOp::SetProperty,
                inputs: vec![ActionInput::PropertyName(name.clone()), ActionInput::ArgumentIndex(0)],
                is_guarded: true,
            },
            instr.inputs()[0],
            vec![instr.inputs()[1]],
        )),
        Opcode::GetElement(idx) => Some((
            Action {
                id,
                operation: ActionOp::GetElement,
                inputs: vec![ActionInput::ElementIndex(*idx)],
                is_guarded: true,
            },
            instr.inputs()[0],
            vec![],
        )),
        Opcode::SetElement(idx) => Some((
            Action {
                id,
                operation: ActionOp::SetElement,
                inputs: vec![ActionInput::ElementIndex(*idx), ActionInput::ArgumentIndex(0)],
                is_guarded: true,
            },
            instr.inputs()[0],
            vec![instr.inputs()[1]],
        )),
        _ => None,
    }
}

/// Shared state machine for the three runtime-assisted mutators: owns an
/// `Executor` (unlike the other mutators, which are pure) and a
/// monotonic id counter so instrumentation points within one mutation
/// carry stable, unique ids.
pub struct RuntimeAssistedMutator<E: Executor> {
    kind: RuntimeAssistedKind,
    executor: E,
    base_timeout: Duration,
    next_id: u64,
    last_outcome: InstrumentationOutcome,
}

impl<E: Executor> RuntimeAssistedMutator<E> {
    pub fn new(kind: RuntimeAssistedKind, executor: E, base_timeout: Duration) -> Self {
        RuntimeAssistedMutator { kind, executor, base_timeout, next_id: 0, last_outcome: InstrumentationOutcome::NoResults }
    }

    pub fn last_outcome(&self) -> InstrumentationOutcome {
        self.last_outcome
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("{}{}", self.kind.tag().to_ascii_lowercase(), self.next_id);
        self.next_id += 1;
        id
    }
}

impl<E: Executor> Mutator for RuntimeAssistedMutator<E> {
    fn name(&self) -> &'static str {
        match self.kind {
            RuntimeAssistedKind::Explore => "ExplorationMutator",
            RuntimeAssistedKind::Probe => "ProbingMutator",
            RuntimeAssistedKind::Fixup => "FixupMutator",
        }
    }

    fn mutate(
        &mut self,
        program: &Program,
        config: &FuzzerConfig,
        rng: &mut dyn rand::RngCore,
        _donor: Option<&Program>,
    ) -> MutationOutcome {
        match self.kind {
            RuntimeAssistedKind::Explore => self.mutate_explore(program, config, rng),
            RuntimeAssistedKind::Probe => self.mutate_probe(program, config, rng),
            RuntimeAssistedKind::Fixup => self.mutate_fixup(program, config, rng),
        }
    }
}

impl<E: Executor> RuntimeAssistedMutator<E> {
    fn timeout(&self, config: &FuzzerConfig) -> Duration {
        self.base_timeout * config.runtime_assisted.timeout_multiplier
    }

    fn mutate_explore(&mut self, program: &Program, config: &FuzzerConfig, rng: &mut dyn rand::RngCore) -> MutationOutcome {
        let candidates: Vec<usize> =
            program.iter().enumerate().filter(|(_, i)| i.all_outputs().next().is_some()).map(|(idx, _)| idx).collect();
        if candidates.is_empty() {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::NotApplicable;
        }
        let target = *candidates.choose(rng).unwrap();
        let id = self.fresh_id();

        let mut builder = ProgramBuilder::new(config, &mut *rng);
        let build_result = (|| -> Result<(), MutationError> {
            let mut scope = builder.adopting();
            for instr in program.iter() {
                scope.adopt(instr)?;
                if instr.index == target {
                    let value = instr.all_outputs().next().unwrap();
                    let extra = scope.builder().random_variables_up_to(2);
                    let mut inputs = vec![value];
                    inputs.extend(extra);
                    scope.emit(Opcode::Explore { id: id.clone() }, inputs)?;
                }
            }
            Ok(())
        })();
        if let Err(e) = build_result {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::Failed(e);
        }
        let instrumented = builder.finalize();

        let result = self.executor.execute(&instrumented, self.timeout(config));
        match result.outcome {
            ExecutionOutcome::TimedOut => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramTimedOut;
                return MutationOutcome::Failed(MutationError::Other("instrumented program timed out".into()));
            }
            ExecutionOutcome::Crashed(_) => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramFailed;
                return MutationOutcome::Failed(MutationError::Other("instrumented program crashed".into()));
            }
            _ => {}
        }

        let lines = parse_fuzzout(self.kind.tag(), &result.fuzzout);
        let action = lines.iter().find_map(|line| match line {
            ProtocolLine::Action(a) if a.id == id => Some(a.clone()),
            _ => None,
        });
        if let Some(text) = lines.iter().find_map(|line| match line {
            ProtocolLine::Error(t) => Some(t.clone()),
            _ => None,
        }) {
            if is_fatal_error(&text) {
                self.last_outcome = InstrumentationOutcome::UnexpectedError;
                return MutationOutcome::Failed(MutationError::Other(format!("runtime reported: {text}")));
            }
        }
        let Some(action) = action else {
            self.last_outcome = InstrumentationOutcome::NoResults;
            return MutationOutcome::NotApplicable;
        };

        let mut rewrite_builder = ProgramBuilder::new(config, &mut *rng);
        let rewrite_result = (|| -> Result<(), MutationError> {
            let mut scope = rewrite_builder.adopting();
            for instr in instrumented.iter() {
                if let Opcode::Explore { id: this_id } = &instr.opcode {
                    if *this_id == id {
                        let explored_value = instr.inputs()[0];
                        let args = instr.inputs()[1..].to_vec();
                        let ctx = TranslationContext { args, explored_value };
                        let vars = translate_action_inputs(scope.builder(), &action, &ctx)?;
                        let (op, _) = crate::ir::action_opcode(&action)?;
                        let mut full_inputs = vec![explored_value];
                        full_inputs.extend(vars);
                        scope.emit(op, full_inputs)?;
                        continue;
                    }
                }
                scope.adopt(instr)?;
            }
            Ok(())
        })();
        if let Err(e) = rewrite_result {
            self.last_outcome = InstrumentationOutcome::UnexpectedError;
            return MutationOutcome::Failed(e);
        }

        self.last_outcome = InstrumentationOutcome::Success;
        let child = rewrite_builder.finalize().with_parent(Arc::new(program.clone()));
        MutationOutcome::Produced(child)
    }

    fn mutate_probe(&mut self, program: &Program, config: &FuzzerConfig, rng: &mut dyn rand::RngCore) -> MutationOutcome {
        let candidates: Vec<usize> =
            program.iter().enumerate().filter(|(_, i)| i.all_outputs().next().is_some()).map(|(idx, _)| idx).collect();
        if candidates.is_empty() {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::NotApplicable;
        }
        let target = *candidates.choose(rng).unwrap();
        let id = self.fresh_id();

        let mut builder = ProgramBuilder::new(config, &mut *rng);
        let build_result = (|| -> Result<(), MutationError> {
            let mut scope = builder.adopting();
            for instr in program.iter() {
                scope.adopt(instr)?;
                if instr.index == target {
                    let value = instr.all_outputs().next().unwrap();
                    scope.emit(Opcode::Probe { id: id.clone() }, vec![value])?;
                }
            }
            Ok(())
        })();
        if let Err(e) = build_result {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::Failed(e);
        }
        let instrumented = builder.finalize();

        let result = self.executor.execute(&instrumented, self.timeout(config));
        match result.outcome {
            ExecutionOutcome::TimedOut => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramTimedOut;
                return MutationOutcome::Failed(MutationError::Other("instrumented program timed out".into()));
            }
            ExecutionOutcome::Crashed(_) => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramFailed;
                return MutationOutcome::Failed(MutationError::Other("instrumented program crashed".into()));
            }
            _ => {}
        }

        // A probe never rewrites into replacement code: it only observes.
        // The instrumentation opcode is always stripped before the
        // program is handed back, win or lose.
        let mut rewrite_builder = ProgramBuilder::new(config, &mut *rng);
        let rewrite_result = (|| -> Result<(), MutationError> {
            let mut scope = rewrite_builder.adopting();
            for instr in instrumented.iter() {
                if matches!(&instr.opcode, Opcode::Probe { id: this_id } if *this_id == id) {
                    continue;
                }
                scope.adopt(instr)?;
            }
            Ok(())
        })();
        if let Err(e) = rewrite_result {
            self.last_outcome = InstrumentationOutcome::UnexpectedError;
            return MutationOutcome::Failed(e);
        }

        self.last_outcome = InstrumentationOutcome::Success;
        let child = rewrite_builder.finalize().with_parent(Arc::new(program.clone()));
        MutationOutcome::Produced(child)
    }

    fn mutate_fixup(&mut self, program: &Program, config: &FuzzerConfig, rng: &mut dyn rand::RngCore) -> MutationOutcome {
        let candidates: Vec<usize> = program
            .iter()
            .enumerate()
            .filter(|(_, i)| i.opcode.attributes().contains(Attributes::GUARDABLE))
            .map(|(idx, _)| idx)
            .collect();
        if candidates.is_empty() {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::NotApplicable;
        }
        let target = *candidates.choose(rng).unwrap();
        let id = self.fresh_id();
        let Some((action, explored_value, args)) = opcode_to_fixup_action(id.clone(), &program[target]) else {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::NotApplicable;
        };

        let mut builder = ProgramBuilder::new(config, &mut *rng);
        let build_result = (|| -> Result<(), MutationError> {
            let mut scope = builder.adopting();
            for instr in program.iter() {
                if instr.index == target {
                    let mut inputs = vec![explored_value];
                    inputs.extend(args.iter().copied());
                    scope.emit(Opcode::Fixup { id: id.clone(), action: Box::new(action.clone()), guarded: true }, inputs)?;
                    continue;
                }
                scope.adopt(instr)?;
            }
            Ok(())
        })();
        if let Err(e) = build_result {
            self.last_outcome = InstrumentationOutcome::CannotInstrument;
            return MutationOutcome::Failed(e);
        }
        let instrumented = builder.finalize();

        let result = self.executor.execute(&instrumented, self.timeout(config));
        match result.outcome {
            ExecutionOutcome::TimedOut => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramTimedOut;
                return MutationOutcome::Failed(MutationError::Other("instrumented program timed out".into()));
            }
            ExecutionOutcome::Crashed(_) => {
                self.last_outcome = InstrumentationOutcome::InstrumentedProgramFailed;
                return MutationOutcome::Failed(MutationError::Other("instrumented program crashed".into()));
            }
            _ => {}
        }

        let lines = parse_fuzzout(self.kind.tag(), &result.fuzzout);
        let keep_guard = lines.iter().any(|line| matches!(line, ProtocolLine::Failure(fid) if *fid == id));
        let resolved_action = lines.iter().find_map(|line| match line {
            ProtocolLine::Action(a) if a.id == id => Some(a.clone()),
            _ => None,
        });

        let mut rewrite_builder = ProgramBuilder::new(config, &mut *rng);
        let rewrite_result = (|| -> Result<(), MutationError> {
            let mut scope = rewrite_builder.adopting();
            for instr in instrumented.iter() {
                if let Opcode::Fixup { id: this_id, action: fixup_action, guarded } = &instr.opcode {
                    if *this_id == id {
                        if keep_guard {
                            scope.emit(Opcode::Fixup {
                                id: this_id.clone(),
                                action: fixup_action.clone(),
                                guarded: *guarded,
                            }, instr.inputs().to_vec())?;
                        } else {
                            let to_translate = resolved_action.as_ref().unwrap_or(fixup_action.as_ref());
                            let explored_value = instr.inputs()[0];
                            let args = instr.inputs()[1..].to_vec();
                            let ctx = TranslationContext { args, explored_value };
                            let vars = translate_action_inputs(scope.builder(), to_translate, &ctx)?;
                            let (op, _) = crate::ir::action_opcode(to_translate)?;
                            let mut full_inputs = vec![explored_value];
                            full_inputs.extend(vars);
                            scope.emit(op, full_inputs)?;
                        }
                        continue;
                    }
                }
                scope.adopt(instr)?;
            }
            Ok(())
        })();
        if let Err(e) = rewrite_result {
            self.last_outcome = InstrumentationOutcome::UnexpectedError;
            return MutationOutcome::Failed(e);
        }

        self.last_outcome = InstrumentationOutcome::Success;
        let child = rewrite_builder.finalize().with_parent(Arc::new(program.clone()));
        MutationOutcome::Produced(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildStrategy;
    use crate::codegen::GeneratorPool;
    use crate::external::mock::ScriptedExecutor;
    use crate::external::ExecutionResult;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    fn scripted(fuzzout: &str) -> ScriptedExecutor {
        ScriptedExecutor {
            results: VecDeque::from(vec![ExecutionResult {
                outcome: ExecutionOutcome::Succeeded,
                stdout: String::new(),
                stderr: String::new(),
                fuzzout: fuzzout.to_string(),
                exec_time: Duration::from_millis(1),
            }]),
        }
    }

    #[test]
    fn explore_rewrites_into_a_call_method_instruction() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(50);
        let mut pool = GeneratorPool::default_pool();
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.build(6, BuildStrategy::Generating, &mut pool, None).unwrap();
        let seed = builder.finalize();

        let fuzzout = "EXPLORE_ACTION: {\"id\":\"explore0\",\"operation\":\"CALL_METHOD\",\"inputs\":[{\"methodName\":\"push\"}]}\n";
        let executor = scripted(fuzzout);
        let mut mutator = RuntimeAssistedMutator::new(RuntimeAssistedKind::Explore, executor, Duration::from_secs(1));
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(51);
        let outcome = mutator.mutate(&seed, &config, &mut mutate_rng, None);
        assert!(matches!(outcome, MutationOutcome::Produced(_)));
        assert_eq!(mutator.last_outcome(), InstrumentationOutcome::Success);
    }

    #[test]
    fn explore_with_no_matching_action_is_not_applicable() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(52);
        let mut pool = GeneratorPool::default_pool();
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        builder.build(4, BuildStrategy::Generating, &mut pool, None).unwrap();
        let seed = builder.finalize();

        let executor = scripted("");
        let mut mutator = RuntimeAssistedMutator::new(RuntimeAssistedKind::Explore, executor, Duration::from_secs(1));
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(53);
        let outcome = mutator.mutate(&seed, &config, &mut mutate_rng, None);
        assert!(matches!(outcome, MutationOutcome::NotApplicable));
        assert_eq!(mutator.last_outcome(), InstrumentationOutcome::NoResults);
    }

    #[test]
    fn fixup_failure_keeps_the_guard() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(60);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        let (obj, _) = builder.emit(Opcode::LoadThis, vec![]).unwrap();
        builder.emit(Opcode::GetProperty("foo".into()), vec![obj[0]]).unwrap();
        let seed = builder.finalize();

        let fuzzout = "FIXUP_FAILURE: fixup0\n";
        let executor = scripted(fuzzout);
        let mut mutator = RuntimeAssistedMutator::new(RuntimeAssistedKind::Fixup, executor, Duration::from_secs(1));
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(61);
        let child = match mutator.mutate(&seed, &config, &mut mutate_rng, None) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert!(child.iter().any(|i| matches!(i.opcode, Opcode::Fixup { guarded: true, .. })));
    }

    #[test]
    fn fixup_success_removes_the_guard() {
        let config = FuzzerConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(62);
        let mut builder = ProgramBuilder::new(&config, &mut rng);
        let (obj, _) = builder.emit(Opcode::LoadThis, vec![]).unwrap();
        builder.emit(Opcode::GetProperty("foo".into()), vec![obj[0]]).unwrap();
        let seed = builder.finalize();

        let fuzzout = "FIXUP_ACTION: {\"id\":\"fixup0\",\"operation\":\"GET_PROPERTY\",\"inputs\":[{\"propertyName\":\"foo\"}],\"isGuarded\":false}\n";
        let executor = scripted(fuzzout);
        let mut mutator = RuntimeAssistedMutator::new(RuntimeAssistedKind::Fixup, executor, Duration::from_secs(1));
        let mut mutate_rng = ChaCha8Rng::seed_from_u64(63);
        let child = match mutator.mutate(&seed, &config, &mut mutate_rng, None) {
            MutationOutcome::Produced(p) => p,
            other => panic!("expected Produced, got {other:?}"),
        };
        assert!(!child.iter().any(|i| matches!(i.opcode, Opcode::Fixup { .. })));
        assert!(child.iter().any(|i| matches!(i.opcode, Opcode::GetProperty(_))));
    }
}

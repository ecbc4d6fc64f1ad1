//! Incremental analyzer passes over an instruction stream (spec §4.4).
//! Each sub-analyzer is a plain state struct with a `analyze(instr)` step
//! function and no dependency on the program model beyond reading
//! `Instruction`s — they never touch `ProgramBuilder` directly.

pub mod context;
pub mod dead_code;
pub mod scope;
pub mod typer;

pub use context::ContextAnalyzer;
pub use dead_code::DeadCodeAnalyzer;
pub use scope::ScopeAnalyzer;
pub use typer::Typer;

use std::collections::HashSet;

use crate::ir::{Context, Instruction, JsType, Variable};

/// The four analyzers, bundled and kept in lock-step by `ProgramBuilder`.
#[derive(Debug, Clone, Default)]
pub struct CompositeAnalyzerState {
    pub dead_code: DeadCodeAnalyzer,
    pub context: ContextAnalyzer,
    pub scope: ScopeAnalyzer,
    pub typer: Typer,
}

impl CompositeAnalyzerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one instruction through every analyzer, in program order.
    /// Must be called exactly once per appended instruction, after the
    /// instruction has been considered open (spec §4.4).
    pub fn analyze(&mut self, instr: &Instruction) {
        self.dead_code.analyze(instr);
        self.context.analyze(instr);
        self.scope.analyze(instr);
        self.typer.analyze(instr);
    }

    pub fn currently_in_dead_code(&self) -> bool {
        self.dead_code.currently_in_dead_code()
    }

    pub fn context(&self) -> Context {
        self.context.context()
    }

    pub fn visible_variables(&self) -> HashSet<Variable> {
        self.scope.visible_variables()
    }

    pub fn variables_from_outer_scope(&self) -> HashSet<Variable> {
        self.scope.variables_from_outer_scope()
    }

    pub fn type_of(&self, v: Variable) -> JsType {
        self.typer.type_of(v)
    }
}

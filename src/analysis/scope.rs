//! Scope analysis (spec §3(e), §4.4): tracks which variables are
//! currently visible, honoring the "block groups behave like
//! S-expressions" rule — a block-group-start's *outer* outputs become
//! visible in the enclosing frame only after the matching group-end,
//! while *inner* outputs of inner block heads are visible only between
//! that head and the next inner head / group-end.

use std::collections::HashSet;

use crate::ir::{Instruction, Role, Variable};

#[derive(Debug, Clone, Default)]
struct Frame {
    variables: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub struct ScopeAnalyzer {
    frames: Vec<Frame>,
    /// Outer outputs of an open block-group-start, deferred until its
    /// matching group-end is processed (one pending set per open group).
    pending_outer_outputs: Vec<Vec<Variable>>,
}

impl Default for ScopeAnalyzer {
    fn default() -> Self {
        ScopeAnalyzer { frames: vec![Frame::default()], pending_outer_outputs: vec![] }
    }
}

impl ScopeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&mut self, instr: &Instruction) {
        match instr.opcode.role() {
            Role::BlockGroupStart => {
                self.pending_outer_outputs.push(instr.outputs().to_vec());
                self.frames.push(Frame::default());
                self.frames.last_mut().unwrap().variables.extend(instr.inner_outputs());
            }
            Role::BlockStart => {
                // sibling arm: pop the previous arm's inner variables,
                // push this arm's inner outputs at the same nesting level.
                self.frames.pop();
                self.frames.push(Frame::default());
                self.frames.last_mut().unwrap().variables.extend(instr.inner_outputs());
            }
            Role::BlockEnd => {
                self.frames.pop();
                self.frames.push(Frame::default());
            }
            Role::BlockGroupEnd => {
                self.frames.pop();
                if let Some(outer) = self.pending_outer_outputs.pop() {
                    if let Some(enclosing) = self.frames.last_mut() {
                        enclosing.variables.extend(outer);
                    }
                }
            }
            Role::Normal | Role::Jump => {
                if let Some(top) = self.frames.last_mut() {
                    top.variables.extend(instr.outputs());
                    top.variables.extend(instr.inner_outputs());
                }
            }
        }
    }

    pub fn visible_variables(&self) -> HashSet<Variable> {
        self.frames.iter().flat_map(|f| f.variables.iter().copied()).collect()
    }

    /// Variables visible in any frame except the innermost one.
    pub fn variables_from_outer_scope(&self) -> HashSet<Variable> {
        self.frames[..self.frames.len().saturating_sub(1)]
            .iter()
            .flat_map(|f| f.variables.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode};

    fn instr(op: Opcode, outputs: Vec<Variable>, inner: Vec<Variable>) -> Instruction {
        Instruction::new(op, vec![], outputs, inner, 0)
    }

    #[test]
    fn function_value_is_invisible_until_after_end() {
        let mut s = ScopeAnalyzer::new();
        let f = Variable(0);
        s.analyze(&instr(Opcode::BeginFunctionDefinition { num_parameters: 0 }, vec![f], vec![]));
        assert!(!s.visible_variables().contains(&f), "outer output visible too early");
        s.analyze(&instr(Opcode::EndFunctionDefinition, vec![], vec![]));
        assert!(s.visible_variables().contains(&f));
    }

    #[test]
    fn inner_parameter_only_visible_inside_function_body() {
        let mut s = ScopeAnalyzer::new();
        let f = Variable(0);
        let p = Variable(1);
        s.analyze(&instr(Opcode::BeginFunctionDefinition { num_parameters: 1 }, vec![f], vec![p]));
        assert!(s.visible_variables().contains(&p));
        s.analyze(&instr(Opcode::EndFunctionDefinition, vec![], vec![]));
        assert!(!s.visible_variables().contains(&p), "parameter leaked out of function body");
    }

    #[test]
    fn catch_parameter_scoped_to_catch_arm_only() {
        let mut s = ScopeAnalyzer::new();
        let e = Variable(0);
        s.analyze(&instr(Opcode::BeginTry, vec![], vec![]));
        s.analyze(&instr(Opcode::BeginCatch, vec![], vec![e]));
        assert!(s.visible_variables().contains(&e));
        s.analyze(&instr(Opcode::BeginFinally, vec![], vec![]));
        assert!(!s.visible_variables().contains(&e));
    }
}

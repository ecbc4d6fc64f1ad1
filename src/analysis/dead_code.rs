//! Dead-code analysis (spec §4.4): tracks whether the cursor is past an
//! unconditional terminator with no intervening joining block boundary.
//!
//! Modeled as a stack of per-nesting-level "dead" flags rather than a
//! flat depth counter, so that a sibling arm (`else`, `catch`, `finally`,
//! a `switch` case) correctly re-enters *the enclosing* level's liveness
//! instead of inheriting whatever the just-closed arm left behind.

use crate::ir::{Instruction, Role};

#[derive(Debug, Clone)]
pub struct DeadCodeAnalyzer {
    stack: Vec<bool>,
}

impl Default for DeadCodeAnalyzer {
    fn default() -> Self {
        DeadCodeAnalyzer { stack: vec![false] }
    }
}

impl DeadCodeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&mut self, instr: &Instruction) {
        match instr.opcode.role() {
            Role::BlockGroupStart => {
                let inherited = *self.stack.last().unwrap();
                self.stack.push(inherited);
            }
            Role::BlockStart | Role::BlockEnd => {
                // A sibling arm or inner-block close: discard the arm we
                // were in and re-inherit the enclosing level's liveness.
                self.stack.pop();
                let inherited = *self.stack.last().unwrap();
                self.stack.push(inherited);
            }
            Role::BlockGroupEnd => {
                self.stack.pop();
                if self.stack.is_empty() {
                    self.stack.push(false);
                }
            }
            Role::Jump if instr.opcode.is_unconditional_terminator() => {
                *self.stack.last_mut().unwrap() = true;
            }
            Role::Normal | Role::Jump => {}
        }
    }

    pub fn currently_in_dead_code(&self) -> bool {
        *self.stack.last().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode, Variable};

    /// Builds a well-formed instruction for any opcode, padding
    /// inputs/outputs up to what its shape requires with fresh dummy
    /// variables — these tests only care about control-flow role, not
    /// dataflow, so the variable identities themselves are unused.
    fn instr(op: Opcode) -> Instruction {
        let shape = op.shape();
        let inputs = (0..shape.min_inputs as u32).map(Variable).collect();
        let outputs = (100..100 + shape.num_outputs as u32).map(Variable).collect();
        let inner_outputs = (200..200 + shape.num_inner_outputs as u32).map(Variable).collect();
        Instruction::new(op, inputs, outputs, inner_outputs, 0)
    }

    #[test]
    fn code_after_return_is_dead() {
        let mut a = DeadCodeAnalyzer::new();
        assert!(!a.currently_in_dead_code());
        a.analyze(&instr(Opcode::Return));
        assert!(a.currently_in_dead_code());
    }

    #[test]
    fn else_branch_reenters_live_code() {
        let mut a = DeadCodeAnalyzer::new();
        a.analyze(&instr(Opcode::BeginIf { inverted: false }));
        a.analyze(&instr(Opcode::Return));
        assert!(a.currently_in_dead_code());
        a.analyze(&instr(Opcode::BeginElse));
        assert!(!a.currently_in_dead_code());
    }

    #[test]
    fn end_of_try_catch_joins_back_to_enclosing_liveness() {
        let mut a = DeadCodeAnalyzer::new();
        a.analyze(&instr(Opcode::BeginTry));
        a.analyze(&instr(Opcode::ThrowException));
        assert!(a.currently_in_dead_code());
        a.analyze(&instr(Opcode::BeginCatch));
        assert!(!a.currently_in_dead_code());
        a.analyze(&instr(Opcode::EndTryCatch));
        assert!(!a.currently_in_dead_code());
    }

    #[test]
    fn nested_dead_code_inside_already_dead_outer_stays_dead() {
        let mut a = DeadCodeAnalyzer::new();
        a.analyze(&instr(Opcode::Return)); // outer dead
        a.analyze(&instr(Opcode::BeginIf { inverted: false }));
        a.analyze(&instr(Opcode::BeginElse));
        a.analyze(&instr(Opcode::EndIf));
        assert!(a.currently_in_dead_code(), "outer deadness must survive a nested if/else");
    }
}

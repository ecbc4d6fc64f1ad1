//! Context analysis (spec §4.4): a stack of `(opcode, context_delta)`
//! frames mirroring block nesting. `context()` is the union of the base
//! script context and every currently open delta.

use crate::ir::{Context, Instruction, Role};

#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    stack: Vec<Context>,
}

impl Default for ContextAnalyzer {
    fn default() -> Self {
        ContextAnalyzer { stack: vec![Context::SCRIPT] }
    }
}

impl ContextAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union of the base script context and every open context delta.
    pub fn context(&self) -> Context {
        self.stack.iter().fold(Context::empty(), |acc, c| acc | *c)
    }

    pub fn analyze(&mut self, instr: &Instruction) {
        match instr.opcode.role() {
            Role::BlockGroupStart => self.stack.push(instr.opcode.provided_context()),
            Role::BlockStart | Role::BlockEnd => {
                // Sibling arm: the previous arm's delta goes away, this
                // arm's own delta (if any) takes its place.
                self.stack.pop();
                self.stack.push(instr.opcode.provided_context());
            }
            Role::BlockGroupEnd => {
                self.stack.pop();
                if self.stack.is_empty() {
                    self.stack.push(Context::SCRIPT);
                }
            }
            Role::Normal | Role::Jump => {}
        }
    }
}

//! Variables and instructions (spec §3, §4.2).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::opcode::Opcode;

/// A variable identity: a dense, non-negative integer assigned at
/// definition time, stable across adoption between builders (the
/// adopting builder renumbers foreign variables into fresh local ones,
/// but within one program a `Variable`'s number never changes once
/// assigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Variable(pub u32);

impl Variable {
    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An immutable instruction: `(opcode, inouts, index)`. `inouts` is
/// partitioned as `[inputs ‖ outputs ‖ inner_outputs]` by counts taken
/// from the opcode's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    inouts: Vec<Variable>,
    num_outputs: u8,
    num_inner_outputs: u8,
    pub index: usize,
}

impl Instruction {
    /// Build an instruction, partitioning `inouts` by the opcode's shape.
    /// `num_inputs` is whatever the caller determined is appropriate
    /// (≥ `shape.min_inputs` for variadic opcodes, exactly `min_inputs`
    /// otherwise); `outputs` and `inner_outputs` must match the shape
    /// exactly.
    pub fn new(opcode: Opcode, inputs: Vec<Variable>, outputs: Vec<Variable>, inner_outputs: Vec<Variable>, index: usize) -> Self {
        let shape = opcode.shape();
        debug_assert!(inputs.len() >= shape.min_inputs as usize);
        debug_assert_eq!(outputs.len(), shape.num_outputs as usize);
        debug_assert_eq!(inner_outputs.len(), shape.num_inner_outputs as usize);
        let num_outputs = outputs.len() as u8;
        let num_inner_outputs = inner_outputs.len() as u8;
        let mut inouts = inputs;
        inouts.extend(outputs);
        inouts.extend(inner_outputs);
        Instruction { opcode, inouts, num_outputs, num_inner_outputs, index }
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inouts[..self.inouts.len() - self.num_outputs as usize - self.num_inner_outputs as usize]
    }

    pub fn outputs(&self) -> &[Variable] {
        let start = self.inouts.len() - self.num_outputs as usize - self.num_inner_outputs as usize;
        &self.inouts[start..start + self.num_outputs as usize]
    }

    pub fn inner_outputs(&self) -> &[Variable] {
        let start = self.inouts.len() - self.num_inner_outputs as usize;
        &self.inouts[start..]
    }

    /// All outputs, outer then inner — the set of variables this
    /// instruction defines.
    pub fn all_outputs(&self) -> impl Iterator<Item = Variable> + '_ {
        self.outputs().iter().chain(self.inner_outputs().iter()).copied()
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs().len()
    }

    /// Replace a single input in place, used by `InputMutator`. Panics if
    /// `slot` is not an input position.
    pub fn with_replaced_input(&self, slot: usize, replacement: Variable) -> Instruction {
        assert!(slot < self.num_inputs(), "input slot out of range");
        let mut inouts = self.inouts.clone();
        inouts[slot] = replacement;
        Instruction { opcode: self.opcode.clone(), inouts, num_outputs: self.num_outputs, num_inner_outputs: self.num_inner_outputs, index: self.index }
    }

    pub fn with_opcode(&self, opcode: Opcode, extra_inputs: Vec<Variable>) -> Instruction {
        let insert_at = self.inouts.len() - self.num_outputs as usize - self.num_inner_outputs as usize;
        let mut inouts = self.inouts.clone();
        for (i, v) in extra_inputs.into_iter().enumerate() {
            inouts.insert(insert_at + i, v);
        }
        Instruction { opcode, inouts, num_outputs: self.num_outputs, num_inner_outputs: self.num_inner_outputs, index: self.index }
    }

    pub fn with_index(&self, index: usize) -> Instruction {
        Instruction { index, ..self.clone() }
    }

    /// Apply a variable renumbering (used during adoption between
    /// builders) to every variable this instruction mentions.
    pub fn renumbered(&self, map: &std::collections::HashMap<Variable, Variable>) -> Instruction {
        let inouts = self.inouts.iter().map(|v| *map.get(v).unwrap_or(v)).collect();
        Instruction { opcode: self.opcode.clone(), inouts, num_outputs: self.num_outputs, num_inner_outputs: self.num_inner_outputs, index: self.index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::opcode::{BinaryOp, Opcode};

    #[test]
    fn partitions_inouts_by_shape() {
        let v = |n: u32| Variable(n);
        let instr = Instruction::new(
            Opcode::BinaryOperation(BinaryOp::Add),
            vec![v(0), v(1)],
            vec![v(2)],
            vec![],
            2,
        );
        assert_eq!(instr.inputs(), &[v(0), v(1)]);
        assert_eq!(instr.outputs(), &[v(2)]);
        assert_eq!(instr.inner_outputs(), &[]);
    }

    #[test]
    fn with_replaced_input_only_touches_inputs() {
        let v = |n: u32| Variable(n);
        let instr = Instruction::new(Opcode::BinaryOperation(BinaryOp::Add), vec![v(0), v(1)], vec![v(2)], vec![], 2);
        let replaced = instr.with_replaced_input(1, v(0));
        assert_eq!(replaced.inputs(), &[v(0), v(0)]);
        assert_eq!(replaced.outputs(), &[v(2)]);
    }
}

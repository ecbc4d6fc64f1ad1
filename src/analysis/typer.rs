//! Type inference ("Typer", spec §4.4): an abstract interpreter computing
//! one `JsType` per `Variable`, with per-opcode transfer functions and
//! `union`-based joins at control-flow merges. Monotone and conservative:
//! anything not understood widens to `.anything()`.

use std::collections::HashMap;

use crate::ir::{BinaryOp, Instruction, JsType, Opcode, TypeMask, UnaryOp, Variable};

#[derive(Debug, Clone, Default)]
pub struct Typer {
    types: HashMap<Variable, JsType>,
}

impl Typer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, v: Variable) -> JsType {
        self.types.get(&v).cloned().unwrap_or_else(JsType::anything)
    }

    /// Run the transfer function for `instr` and record the resulting
    /// type(s) for its outputs. Joins with any type already on record for
    /// the same variable (relevant when re-analyzing after a splice)
    /// rather than overwriting, keeping inference monotone.
    pub fn analyze(&mut self, instr: &Instruction) {
        let result = self.transfer(instr);
        for (v, t) in instr.all_outputs().zip(result) {
            self.join_into(v, t);
        }
    }

    fn join_into(&mut self, v: Variable, t: JsType) {
        let joined = match self.types.get(&v) {
            Some(existing) => existing.union(&t),
            None => t,
        };
        self.types.insert(v, joined);
    }

    fn transfer(&self, instr: &Instruction) -> Vec<JsType> {
        use Opcode::*;
        match &instr.opcode {
            LoadInteger(_) => vec![JsType::integer()],
            LoadBigInt(_) => vec![JsType::bigint()],
            LoadFloat(_) => vec![JsType::float()],
            LoadString(_) => vec![JsType::string()],
            LoadBoolean(_) => vec![JsType::boolean()],
            LoadUndefined => vec![JsType::undefined()],
            LoadNull => vec![JsType::exact(TypeMask::NULL)],
            LoadThis | LoadBuiltin(_) => vec![JsType::anything()],
            LoadRegExp { .. } => vec![JsType::exact(TypeMask::REGEXP)],
            CreateArray => vec![JsType::exact(TypeMask::OBJECT | TypeMask::ITERABLE)],
            CreateObject(names) => vec![JsType::object_with(names.clone())],
            CreateTemplateString(_) => vec![JsType::string()],
            Dup => vec![self.type_of(instr.inputs()[0])],
            GetProperty(_) | GetElement(_) | GetComputedProperty | DeleteProperty(_) => {
                vec![JsType::anything()]
            }
            CallFunction { .. } | CallMethod { .. } | CallComputedMethod { .. } => {
                vec![JsType::anything()]
            }
            Construct { .. } => vec![JsType::object()],
            UnaryOperation(op) => vec![match op {
                UnaryOp::Not => JsType::boolean(),
                _ => JsType::anything(),
            }],
            BinaryOperation(op) => vec![match op {
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => JsType::anything(),
                BinaryOp::Add => {
                    let (l, r) = (self.type_of(instr.inputs()[0]), self.type_of(instr.inputs()[1]));
                    if l.is_usable_as(&JsType::integer()) && r.is_usable_as(&JsType::integer()) {
                        JsType::integer()
                    } else if l.is_usable_as(&JsType::string()) || r.is_usable_as(&JsType::string()) {
                        JsType::string()
                    } else {
                        JsType::integer().union(&JsType::float()).union(&JsType::string())
                    }
                }
                _ => JsType::integer().union(&JsType::float()),
            }],
            TypeOf => vec![JsType::string()],
            CompareOperation(_) | InstanceOf | In => vec![JsType::boolean()],
            BeginFunctionDefinition { .. } => vec![JsType::function()],
            BeginClassDefinition { .. } => vec![JsType::exact(TypeMask::CONSTRUCTOR)],
            BeginCatch => vec![JsType::anything()],
            BeginForInLoop => vec![JsType::string()],
            BeginForOfLoop => vec![JsType::anything()],
            BeginForLoop => vec![JsType::integer()],
            BeginCodeString => vec![JsType::string()],
            Explore { .. } | Fixup { .. } => vec![JsType::anything()],
            _ => vec![JsType::anything(); instr.outputs().len() + instr.inner_outputs().len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Opcode, Variable};

    #[test]
    fn load_integer_produces_definite_integer() {
        let mut t = Typer::new();
        let instr = Instruction::new(Opcode::LoadInteger(1), vec![], vec![Variable(0)], vec![], 0);
        t.analyze(&instr);
        assert!(t.type_of(Variable(0)).is_usable_as(&JsType::integer()));
    }

    #[test]
    fn unknown_opcode_output_widens_to_anything() {
        let mut t = Typer::new();
        let instr = Instruction::new(Opcode::LoadThis, vec![], vec![Variable(0)], vec![], 0);
        t.analyze(&instr);
        let ty = t.type_of(Variable(0));
        assert!(ty.definite().is_empty());
        assert!(ty.possible().is_all());
    }

    #[test]
    fn add_of_two_integers_infers_integer() {
        let mut t = Typer::new();
        t.analyze(&Instruction::new(Opcode::LoadInteger(1), vec![], vec![Variable(0)], vec![], 0));
        t.analyze(&Instruction::new(Opcode::LoadInteger(2), vec![], vec![Variable(1)], vec![], 1));
        t.analyze(&Instruction::new(
            Opcode::BinaryOperation(BinaryOp::Add),
            vec![Variable(0), Variable(1)],
            vec![Variable(2)],
            vec![],
            2,
        ));
        assert!(t.type_of(Variable(2)).is_usable_as(&JsType::integer()));
    }
}

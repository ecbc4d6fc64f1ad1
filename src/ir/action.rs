//! Actions: the JSON-serializable description of a concrete JS-level
//! operation exchanged between instrumented runtime code and a
//! runtime-assisted mutator (spec §3, §4.9).

use serde::{Deserialize, Serialize};

use super::instruction::Variable;
use super::opcode::{BinaryOp, CompareOp, Opcode};

/// A single JS-level action the runtime observed as applicable to an
/// explored/probed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub operation: ActionOp,
    pub inputs: Vec<ActionInput>,
    #[serde(default)]
    pub is_guarded: bool,
}

/// The closed set of JS-level operations an Action can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOp {
    Call,
    Construct,
    CallMethod,
    GetProperty,
    SetProperty,
    GetElement,
    SetElement,
    Arithmetic,
    Compare,
    Bitwise,
    TypeTest,
    SymbolRegistration,
}

impl ActionOp {
    /// Fixed arity (number of `ActionInput`s expected) for each action,
    /// used to validate a parsed Action before translation.
    pub fn arity(&self) -> usize {
        match self {
            ActionOp::Call => 1,        // variadic args beyond the fixed callee; checked loosely
            ActionOp::Construct => 1,
            ActionOp::CallMethod => 1,
            ActionOp::GetProperty => 1,
            ActionOp::SetProperty => 2,
            ActionOp::GetElement => 1,
            ActionOp::SetElement => 2,
            ActionOp::Arithmetic => 2,
            ActionOp::Compare => 2,
            ActionOp::Bitwise => 2,
            ActionOp::TypeTest => 0,
            ActionOp::SymbolRegistration => 1,
        }
    }
}

/// One input to an Action: either a reference to a foreign argument, a
/// literal to be loaded fresh, an opcode parameter, or a special
/// context-provided value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionInput {
    ArgumentIndex(usize),
    PropertyName(String),
    ElementIndex(i64),
    MethodName(String),
    Int(i64),
    Float(f64),
    BigIntString(String),
    Str(String),
    Special(SpecialName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpecialName {
    ExploredValue,
}

/// Context available while translating an Action into FuzzIL
/// instructions: the foreign arguments already adopted into the builder,
/// plus the special-name dictionary (currently just the explored value).
pub struct TranslationContext {
    pub args: Vec<Variable>,
    pub explored_value: Variable,
}

/// Translate one `ActionInput` into a builder-visible `Variable`,
/// emitting a fresh literal-load instruction when the input isn't
/// already a variable. Returns the opcode to append plus (for literal
/// inputs) the new instruction's would-be output; callers feed that
/// through `ProgramBuilder::append`.
pub enum TranslatedInput {
    ExistingVariable(Variable),
    FreshLiteral(Opcode),
}

impl ActionInput {
    pub fn resolve(&self, ctx: &TranslationContext) -> Result<TranslatedInput, ActionError> {
        use ActionInput::*;
        Ok(match self {
            ArgumentIndex(i) => TranslatedInput::ExistingVariable(
                *ctx.args.get(*i).ok_or(ActionError::ArgumentOutOfRange(*i))?,
            ),
            Int(v) => TranslatedInput::FreshLiteral(Opcode::LoadInteger(*v)),
            Float(v) => TranslatedInput::FreshLiteral(Opcode::LoadFloat(*v)),
            BigIntString(v) => TranslatedInput::FreshLiteral(Opcode::LoadBigInt(v.clone())),
            Str(v) => TranslatedInput::FreshLiteral(Opcode::LoadString(v.clone())),
            Special(SpecialName::ExploredValue) => {
                TranslatedInput::ExistingVariable(ctx.explored_value)
            }
            // property/method/element inputs bind to opcode parameters rather than
            // resolving to a variable; callers must not call `resolve` on these.
            PropertyName(_) | ElementIndex(_) | MethodName(_) => {
                return Err(ActionError::NotAVariableInput)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("action referenced out-of-range argument index {0}")]
    ArgumentOutOfRange(usize),
    #[error("action input is a parameter binding, not a variable reference")]
    NotAVariableInput,
    #[error("action operation {op:?} expects arity {expected}, got {actual}")]
    ArityMismatch { op: ActionOp, expected: usize, actual: usize },
    #[error("unsupported action operation {0:?}")]
    Unsupported(ActionOp),
}

/// Translate an `Action` into the opcode(s) it corresponds to, per the
/// static dispatch table in spec §4.9/§9. Property/method/element inputs
/// bind directly to opcode parameters; argument/literal/special inputs
/// resolve through `ActionInput::resolve` and are appended by the caller
/// before this returns the operation opcode.
pub fn action_opcode(action: &Action) -> Result<(Opcode, Vec<ActionInput>), ActionError> {
    use ActionInput::*;
    let op = action.operation;
    match op {
        ActionOp::Call => Ok((Opcode::CallFunction { spreads: vec![] }, action.inputs.clone())),
        ActionOp::Construct => Ok((Opcode::Construct { spreads: vec![] }, action.inputs.clone())),
        ActionOp::CallMethod => {
            let method = action
                .inputs
                .iter()
                .find_map(|i| match i {
                    MethodName(m) => Some(m.clone()),
                    _ => None,
                })
                .ok_or(ActionError::ArityMismatch { op, expected: op.arity(), actual: action.inputs.len() })?;
            let rest: Vec<ActionInput> =
                action.inputs.iter().filter(|i| !matches!(i, MethodName(_))).cloned().collect();
            Ok((Opcode::CallMethod { method, spreads: vec![] }, rest))
        }
        ActionOp::GetProperty => {
            let name = property_name(&action.inputs)?;
            Ok((Opcode::GetProperty(name), vec![]))
        }
        ActionOp::SetProperty => {
            let name = property_name(&action.inputs)?;
            let rest: Vec<ActionInput> =
                action.inputs.iter().filter(|i| !matches!(i, PropertyName(_))).cloned().collect();
            Ok((Opcode::SetProperty(name), rest))
        }
        ActionOp::GetElement => {
            let idx = element_index(&action.inputs)?;
            Ok((Opcode::GetElement(idx), vec![]))
        }
        ActionOp::SetElement => {
            let idx = element_index(&action.inputs)?;
            let rest: Vec<ActionInput> =
                action.inputs.iter().filter(|i| !matches!(i, ElementIndex(_))).cloned().collect();
            Ok((Opcode::SetElement(idx), rest))
        }
        ActionOp::Arithmetic => {
            Ok((Opcode::BinaryOperation(BinaryOp::Add), action.inputs.clone()))
        }
        ActionOp::Compare => {
            Ok((Opcode::CompareOperation(CompareOp::Equal), action.inputs.clone()))
        }
        ActionOp::Bitwise => Ok((Opcode::BinaryOperation(BinaryOp::BitAnd), action.inputs.clone())),
        ActionOp::TypeTest => Ok((Opcode::TypeOf, vec![])),
        ActionOp::SymbolRegistration => Err(ActionError::Unsupported(op)),
    }
}

fn property_name(inputs: &[ActionInput]) -> Result<String, ActionError> {
    inputs
        .iter()
        .find_map(|i| match i {
            ActionInput::PropertyName(n) => Some(n.clone()),
            _ => None,
        })
        .ok_or(ActionError::NotAVariableInput)
}

fn element_index(inputs: &[ActionInput]) -> Result<i64, ActionError> {
    inputs
        .iter()
        .find_map(|i| match i {
            ActionInput::ElementIndex(n) => Some(*n),
            _ => None,
        })
        .ok_or(ActionError::NotAVariableInput)
}

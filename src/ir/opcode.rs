//! Operation catalog: the closed set of FuzzIL opcodes and their static
//! metadata (shape, attributes, required/provided context, block role).
//!
//! Every per-opcode behavior — how many inputs/outputs it has, which
//! contexts it needs, whether it opens or closes a block — resolves
//! through the `match` blocks below. There is no dynamic dispatch: a
//! mutator that wants to know "is this opcode variadic?" asks
//! `opcode.attributes().contains(Attributes::VARIADIC)`, the same way the
//! rest of this codebase resolves per-variant behavior through metadata
//! tables instead of trait objects.

use bitflags::bitflags;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::action::Action;

bitflags! {
    /// Syntactic/semantic regions that can be open at a program position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Context: u32 {
        const SCRIPT           = 1 << 0;
        const SUBROUTINE       = 1 << 1;
        const CLASS_BODY       = 1 << 2;
        const LOOP             = 1 << 3;
        const SWITCH           = 1 << 4;
        const WITH             = 1 << 5;
        const CODE_STRING      = 1 << 6;
        const WASM_MODULE      = 1 << 7;
        const WASM_FUNCTION    = 1 << 8;
        const WASM_TYPE_GROUP  = 1 << 9;
    }
}

bitflags! {
    /// Static attributes an opcode can carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u32 {
        const MUTABLE_PARAMETERS  = 1 << 0;
        const VARIADIC            = 1 << 1;
        const BLOCK_START         = 1 << 2;
        const BLOCK_END           = 1 << 3;
        const BLOCK_GROUP_START   = 1 << 4;
        const BLOCK_GROUP_END     = 1 << 5;
        const PRIMITIVE           = 1 << 6;
        const LITERAL             = 1 << 7;
        const JUMP                = 1 << 8;
        const PURE                = 1 << 9;
        const GUARDABLE           = 1 << 10;
    }
}

/// The structural role an opcode plays with respect to block nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Normal,
    /// An inner block head that joins a sibling arm of an already-open
    /// block group (`else`, `catch`, `finally`, a `switch` case).
    BlockStart,
    /// Closes an inner block head opened by `BlockStart` (a switch case
    /// body), without closing the enclosing group.
    BlockEnd,
    BlockGroupStart,
    BlockGroupEnd,
    Jump,
}

/// Which block-group (if/else, try/catch/finally, …) an opcode belongs
/// to. Shared by the group-start, every inner head, and the group-end so
/// that matching can be validated: a `BeginCatch` may only appear while
/// the innermost open group is `BlockGroup::Try`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockGroup {
    If,
    Try,
    Switch,
    FunctionDefinition,
    ClassDefinition,
    With,
    CodeString,
    WhileLoop,
    DoWhileLoop,
    ForLoop,
    ForInLoop,
    ForOfLoop,
}

/// Input/output arity of an opcode. `min_inputs` is the number of inputs
/// present even before a variadic opcode's trailing extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub min_inputs: u8,
    pub num_outputs: u8,
    pub num_inner_outputs: u8,
    pub variadic: bool,
}

impl Shape {
    const fn fixed(inputs: u8, outputs: u8, inner_outputs: u8) -> Self {
        Shape { min_inputs: inputs, num_outputs: outputs, num_inner_outputs: inner_outputs, variadic: false }
    }

    const fn variadic(min_inputs: u8, outputs: u8, inner_outputs: u8) -> Self {
        Shape { min_inputs, num_outputs: outputs, num_inner_outputs: inner_outputs, variadic: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitwiseNot,
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    BitAnd,
    BitOr,
    Xor,
    LShift,
    RShift,
    UnsignedRShift,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub const ALL: &'static [BinaryOp] = &[
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Exp,
        BinaryOp::BitAnd,
        BinaryOp::BitOr,
        BinaryOp::Xor,
        BinaryOp::LShift,
        BinaryOp::RShift,
        BinaryOp::UnsignedRShift,
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CompareOp {
    pub const ALL: &'static [CompareOp] = &[
        CompareOp::Equal,
        CompareOp::NotEqual,
        CompareOp::StrictEqual,
        CompareOp::StrictNotEqual,
        CompareOp::LessThan,
        CompareOp::LessThanOrEqual,
        CompareOp::GreaterThan,
        CompareOp::GreaterThanOrEqual,
    ];
}

/// The closed opcode catalog. Each variant that has FuzzIL-level
/// "mutable parameters" carries them directly as payload (rather than in
/// a side table) so `Instruction` stays a plain `(opcode, inouts, index)`
/// record as spec'd.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Opcode {
    // --- Literals ---
    LoadInteger(i64),
    LoadBigInt(String),
    LoadFloat(f64),
    LoadString(String),
    LoadBoolean(bool),
    LoadUndefined,
    LoadNull,
    LoadThis,
    LoadRegExp { pattern: String, flags: u8 },
    LoadBuiltin(String),

    // --- Composite literals ---
    CreateArray,
    CreateObject(Vec<String>),
    CreateTemplateString(Vec<String>),

    Dup,

    // --- Property / element access ---
    GetProperty(String),
    SetProperty(String),
    DeleteProperty(String),
    GetElement(i64),
    SetElement(i64),
    GetComputedProperty,
    SetComputedProperty,

    // --- Calls ---
    CallFunction { spreads: Vec<bool> },
    Construct { spreads: Vec<bool> },
    CallMethod { method: String, spreads: Vec<bool> },
    CallComputedMethod { spreads: Vec<bool> },

    // --- Operators ---
    UnaryOperation(UnaryOp),
    BinaryOperation(BinaryOp),
    CompareOperation(CompareOp),
    TypeOf,
    InstanceOf,
    In,

    // --- if/else ---
    BeginIf { inverted: bool },
    BeginElse,
    EndIf,

    // --- loops ---
    BeginWhileLoop,
    EndWhileLoop,
    BeginDoWhileLoop,
    EndDoWhileLoop,
    BeginForLoop,
    EndForLoop,
    BeginForInLoop,
    EndForInLoop,
    BeginForOfLoop,
    EndForOfLoop,
    LoopBreak,
    LoopContinue,

    // --- try/catch/finally ---
    BeginTry,
    BeginCatch,
    BeginFinally,
    EndTryCatch,
    ThrowException,

    // --- switch ---
    BeginSwitch,
    BeginSwitchCase { is_default: bool },
    EndSwitchCase,
    EndSwitch,

    // --- functions ---
    BeginFunctionDefinition { num_parameters: u8 },
    EndFunctionDefinition,
    Return,

    // --- classes ---
    BeginClassDefinition { has_superclass: bool },
    BeginClassMethod { name: String, is_static: bool },
    EndClassDefinition,

    // --- with / code strings ---
    BeginWith,
    EndWith,
    BeginCodeString,
    EndCodeString,

    // --- runtime-assisted instrumentation (internal-only opcodes) ---
    Explore { id: String },
    Probe { id: String },
    Fixup { id: String, action: Box<Action>, guarded: bool },

    Nop,
    Print,
}

impl Opcode {
    pub fn shape(&self) -> Shape {
        use Opcode::*;
        match self {
            LoadInteger(_) | LoadBigInt(_) | LoadFloat(_) | LoadString(_) | LoadBoolean(_)
            | LoadUndefined | LoadNull | LoadThis | LoadRegExp { .. } | LoadBuiltin(_) => {
                Shape::fixed(0, 1, 0)
            }
            CreateArray => Shape::variadic(0, 1, 0),
            CreateObject(names) => Shape::variadic(names.len() as u8, 1, 0),
            CreateTemplateString(parts) => {
                Shape::variadic(parts.len().saturating_sub(1) as u8, 1, 0)
            }
            Dup => Shape::fixed(1, 1, 0),
            GetProperty(_) | GetElement(_) => Shape::fixed(1, 1, 0),
            SetProperty(_) | SetElement(_) => Shape::fixed(2, 0, 0),
            DeleteProperty(_) => Shape::fixed(1, 1, 0),
            GetComputedProperty => Shape::fixed(2, 1, 0),
            SetComputedProperty => Shape::fixed(3, 0, 0),
            CallFunction { .. } => Shape::variadic(1, 1, 0),
            Construct { .. } => Shape::variadic(1, 1, 0),
            CallMethod { .. } => Shape::variadic(1, 1, 0),
            CallComputedMethod { .. } => Shape::variadic(2, 1, 0),
            UnaryOperation(_) => Shape::fixed(1, 1, 0),
            BinaryOperation(_) | CompareOperation(_) | InstanceOf | In => Shape::fixed(2, 1, 0),
            TypeOf => Shape::fixed(1, 1, 0),
            BeginIf { .. } => Shape::fixed(1, 0, 0),
            BeginElse | EndIf => Shape::fixed(0, 0, 0),
            BeginWhileLoop => Shape::fixed(1, 0, 0),
            EndWhileLoop => Shape::fixed(0, 0, 0),
            BeginDoWhileLoop => Shape::fixed(0, 0, 0),
            EndDoWhileLoop => Shape::fixed(1, 0, 0),
            BeginForLoop => Shape::fixed(3, 0, 1),
            EndForLoop => Shape::fixed(0, 0, 0),
            BeginForInLoop => Shape::fixed(1, 0, 1),
            EndForInLoop => Shape::fixed(0, 0, 0),
            BeginForOfLoop => Shape::fixed(1, 0, 1),
            EndForOfLoop => Shape::fixed(0, 0, 0),
            LoopBreak | LoopContinue => Shape::fixed(0, 0, 0),
            BeginTry => Shape::fixed(0, 0, 0),
            BeginCatch => Shape::fixed(0, 0, 1),
            BeginFinally => Shape::fixed(0, 0, 0),
            EndTryCatch => Shape::fixed(0, 0, 0),
            ThrowException => Shape::fixed(1, 0, 0),
            BeginSwitch => Shape::fixed(1, 0, 0),
            BeginSwitchCase { is_default } => Shape::fixed(if *is_default { 0 } else { 1 }, 0, 0),
            EndSwitchCase => Shape::fixed(0, 0, 0),
            EndSwitch => Shape::fixed(0, 0, 0),
            BeginFunctionDefinition { num_parameters } => {
                Shape::fixed(0, 1, *num_parameters)
            }
            EndFunctionDefinition => Shape::fixed(0, 0, 0),
            Return => Shape::variadic(0, 0, 0),
            BeginClassDefinition { has_superclass } => {
                Shape::fixed(if *has_superclass { 1 } else { 0 }, 1, 0)
            }
            BeginClassMethod { .. } => Shape::fixed(0, 0, 1),
            EndClassDefinition => Shape::fixed(0, 0, 0),
            BeginWith => Shape::fixed(1, 0, 0),
            EndWith => Shape::fixed(0, 0, 0),
            BeginCodeString => Shape::fixed(0, 1, 0),
            EndCodeString => Shape::fixed(0, 0, 0),
            Explore { .. } => Shape::variadic(1, 1, 0),
            Probe { .. } => Shape::fixed(1, 0, 0),
            Fixup { .. } => Shape::variadic(1, 1, 0),
            Nop => Shape::fixed(0, 0, 0),
            Print => Shape::fixed(1, 0, 0),
        }
    }

    pub fn attributes(&self) -> Attributes {
        use Opcode::*;
        let mut a = Attributes::empty();
        match self {
            LoadInteger(_) | LoadBigInt(_) | LoadFloat(_) | LoadString(_) | LoadBoolean(_)
            | LoadUndefined | LoadNull | LoadThis => {
                a |= Attributes::LITERAL | Attributes::PURE | Attributes::PRIMITIVE;
            }
            LoadRegExp { .. } | LoadBuiltin(_) => {
                a |= Attributes::LITERAL | Attributes::MUTABLE_PARAMETERS;
            }
            CreateArray => a |= Attributes::VARIADIC,
            CreateObject(_) => a |= Attributes::VARIADIC | Attributes::MUTABLE_PARAMETERS,
            CreateTemplateString(_) => a |= Attributes::VARIADIC | Attributes::MUTABLE_PARAMETERS,
            GetProperty(_) | SetProperty(_) | DeleteProperty(_) => {
                a |= Attributes::MUTABLE_PARAMETERS | Attributes::GUARDABLE;
            }
            GetElement(_) | SetElement(_) => {
                a |= Attributes::MUTABLE_PARAMETERS | Attributes::GUARDABLE;
            }
            GetComputedProperty | SetComputedProperty => a |= Attributes::GUARDABLE,
            CallFunction { .. } | Construct { .. } | CallComputedMethod { .. } => {
                a |= Attributes::VARIADIC | Attributes::GUARDABLE;
            }
            CallMethod { .. } => {
                a |= Attributes::VARIADIC | Attributes::MUTABLE_PARAMETERS | Attributes::GUARDABLE;
            }
            UnaryOperation(_) | BinaryOperation(_) | CompareOperation(_) => {
                a |= Attributes::MUTABLE_PARAMETERS | Attributes::PURE;
            }
            TypeOf | InstanceOf | In => a |= Attributes::PURE,
            BeginIf { .. } => a |= Attributes::BLOCK_GROUP_START | Attributes::MUTABLE_PARAMETERS,
            BeginElse => a |= Attributes::BLOCK_START,
            EndIf => a |= Attributes::BLOCK_GROUP_END,
            BeginWhileLoop | BeginDoWhileLoop | BeginForLoop | BeginForInLoop | BeginForOfLoop => {
                a |= Attributes::BLOCK_GROUP_START;
            }
            EndWhileLoop | EndDoWhileLoop | EndForLoop | EndForInLoop | EndForOfLoop => {
                a |= Attributes::BLOCK_GROUP_END;
            }
            LoopBreak | LoopContinue => a |= Attributes::JUMP,
            BeginTry => a |= Attributes::BLOCK_GROUP_START,
            BeginCatch | BeginFinally => a |= Attributes::BLOCK_START,
            EndTryCatch => a |= Attributes::BLOCK_GROUP_END,
            ThrowException => a |= Attributes::JUMP,
            BeginSwitch => a |= Attributes::BLOCK_GROUP_START,
            BeginSwitchCase { .. } => a |= Attributes::BLOCK_START | Attributes::MUTABLE_PARAMETERS,
            EndSwitchCase => a |= Attributes::BLOCK_END,
            EndSwitch => a |= Attributes::BLOCK_GROUP_END,
            BeginFunctionDefinition { .. } => {
                a |= Attributes::BLOCK_GROUP_START | Attributes::MUTABLE_PARAMETERS;
            }
            EndFunctionDefinition => a |= Attributes::BLOCK_GROUP_END,
            Return => a |= Attributes::JUMP | Attributes::VARIADIC,
            BeginClassDefinition { .. } => {
                a |= Attributes::BLOCK_GROUP_START | Attributes::MUTABLE_PARAMETERS;
            }
            BeginClassMethod { .. } => a |= Attributes::BLOCK_START | Attributes::MUTABLE_PARAMETERS,
            EndClassDefinition => a |= Attributes::BLOCK_GROUP_END,
            BeginWith => a |= Attributes::BLOCK_GROUP_START,
            EndWith => a |= Attributes::BLOCK_GROUP_END,
            BeginCodeString => a |= Attributes::BLOCK_GROUP_START,
            EndCodeString => a |= Attributes::BLOCK_GROUP_END,
            Explore { .. } => a |= Attributes::VARIADIC | Attributes::GUARDABLE,
            Probe { .. } => {}
            Fixup { guarded, .. } => {
                a |= Attributes::VARIADIC | Attributes::MUTABLE_PARAMETERS;
                if *guarded {
                    a |= Attributes::GUARDABLE;
                }
            }
            Dup | Nop | Print => {}
        }
        a
    }

    pub fn role(&self) -> Role {
        use Opcode::*;
        match self {
            BeginElse | BeginCatch | BeginFinally | BeginSwitchCase { .. } => Role::BlockStart,
            EndSwitchCase => Role::BlockEnd,
            BeginIf { .. } | BeginTry | BeginSwitch | BeginFunctionDefinition { .. }
            | BeginClassDefinition { .. } | BeginWith | BeginCodeString | BeginWhileLoop
            | BeginDoWhileLoop | BeginForLoop | BeginForInLoop | BeginForOfLoop => {
                Role::BlockGroupStart
            }
            EndIf | EndTryCatch | EndSwitch | EndFunctionDefinition | EndClassDefinition
            | EndWith | EndCodeString | EndWhileLoop | EndDoWhileLoop | EndForLoop
            | EndForInLoop | EndForOfLoop => Role::BlockGroupEnd,
            LoopBreak | LoopContinue | Return | ThrowException => Role::Jump,
            BeginClassMethod { .. } => Role::BlockStart,
            _ => Role::Normal,
        }
    }

    pub fn block_group(&self) -> Option<BlockGroup> {
        use Opcode::*;
        Some(match self {
            BeginIf { .. } | BeginElse | EndIf => BlockGroup::If,
            BeginTry | BeginCatch | BeginFinally | EndTryCatch => BlockGroup::Try,
            BeginSwitch | BeginSwitchCase { .. } | EndSwitchCase | EndSwitch => BlockGroup::Switch,
            BeginFunctionDefinition { .. } | EndFunctionDefinition | BeginClassMethod { .. } => {
                BlockGroup::FunctionDefinition
            }
            BeginClassDefinition { .. } | EndClassDefinition => BlockGroup::ClassDefinition,
            BeginWith | EndWith => BlockGroup::With,
            BeginCodeString | EndCodeString => BlockGroup::CodeString,
            BeginWhileLoop | EndWhileLoop => BlockGroup::WhileLoop,
            BeginDoWhileLoop | EndDoWhileLoop => BlockGroup::DoWhileLoop,
            BeginForLoop | EndForLoop => BlockGroup::ForLoop,
            BeginForInLoop | EndForInLoop => BlockGroup::ForInLoop,
            BeginForOfLoop | EndForOfLoop => BlockGroup::ForOfLoop,
            _ => return None,
        })
    }

    /// Context required to be open at this opcode's position. `LoopBreak`
    /// is the one documented exception to plain subset-checking: it needs
    /// *either* `LOOP` or `SWITCH`, not both, so it is checked specially
    /// by `ProgramBuilder`/`ContextAnalyzer` rather than through this
    /// value alone.
    pub fn required_context(&self) -> Context {
        use Opcode::*;
        match self {
            Return => Context::SUBROUTINE,
            LoopContinue => Context::LOOP,
            LoopBreak => Context::LOOP | Context::SWITCH,
            BeginClassMethod { .. } => Context::CLASS_BODY,
            _ => Context::SCRIPT,
        }
    }

    pub fn provided_context(&self) -> Context {
        use Opcode::*;
        match self {
            BeginFunctionDefinition { .. } => Context::SUBROUTINE,
            BeginWhileLoop | BeginDoWhileLoop | BeginForLoop | BeginForInLoop | BeginForOfLoop => {
                Context::LOOP
            }
            BeginSwitch => Context::SWITCH,
            BeginClassDefinition { .. } => Context::CLASS_BODY,
            BeginWith => Context::WITH,
            BeginCodeString => Context::CODE_STRING,
            _ => Context::empty(),
        }
    }

    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(self.role(), Role::Jump)
    }

    pub fn is_guarded_default(&self) -> bool {
        self.attributes().contains(Attributes::GUARDABLE)
    }

    /// The catalog's "mutate" contract for opcodes with mutable
    /// parameters (spec §4.1): resample this opcode's payload, keeping
    /// the discriminant (and therefore the shape/context/role) fixed.
    /// Returns `None` for opcodes without mutable parameters.
    pub fn mutate_parameters(&self, rng: &mut dyn rand::RngCore, vocab: &super::vocabulary::Vocabulary) -> Option<Opcode> {
        use rand::seq::SliceRandom;
        use Opcode::*;
        Some(match self {
            LoadRegExp { .. } => LoadRegExp {
                pattern: vocab.random_regexp_pattern(rng),
                flags: rng.gen_range(0..16),
            },
            LoadBuiltin(_) => LoadBuiltin(vocab.random_builtin_name(rng)),
            CreateObject(names) => {
                CreateObject(names.iter().map(|_| vocab.random_property_name(rng)).collect())
            }
            CreateTemplateString(parts) => CreateTemplateString(
                parts.iter().map(|_| vocab.random_string_literal(rng)).collect(),
            ),
            GetProperty(_) => GetProperty(vocab.random_property_name(rng)),
            SetProperty(_) => SetProperty(vocab.random_property_name(rng)),
            DeleteProperty(_) => DeleteProperty(vocab.random_property_name(rng)),
            GetElement(_) => GetElement(rng.gen_range(0..16) as i64),
            SetElement(_) => SetElement(rng.gen_range(0..16) as i64),
            CallMethod { method: _, spreads } => CallMethod {
                method: vocab.random_method_name(rng),
                spreads: spreads.clone(),
            },
            UnaryOperation(_) => {
                UnaryOperation(*[UnaryOp::Neg, UnaryOp::Not, UnaryOp::BitwiseNot, UnaryOp::Inc, UnaryOp::Dec]
                    .choose(rng)
                    .unwrap())
            }
            BinaryOperation(_) => BinaryOperation(*BinaryOp::ALL.choose(rng).unwrap()),
            CompareOperation(_) => CompareOperation(*CompareOp::ALL.choose(rng).unwrap()),
            BeginIf { inverted } => BeginIf { inverted: !inverted },
            BeginSwitchCase { is_default } => BeginSwitchCase { is_default: *is_default },
            BeginClassDefinition { has_superclass } => {
                BeginClassDefinition { has_superclass: *has_superclass }
            }
            BeginClassMethod { name: _, is_static } => {
                BeginClassMethod { name: vocab.random_method_name(rng), is_static: *is_static }
            }
            BeginFunctionDefinition { num_parameters } => {
                BeginFunctionDefinition { num_parameters: *num_parameters }
            }
            Fixup { id, action, guarded } => {
                Fixup { id: id.clone(), action: action.clone(), guarded: !guarded }
            }
            _ => return None,
        })
    }

    /// Extend a variadic opcode's effective input count by `n` (the
    /// `VariadicExtension` path of `OperationMutator`). Returns `None` for
    /// non-variadic opcodes. Most variadic opcodes carry no payload that
    /// needs updating; the ones that do (spread bitmaps, per-property
    /// name lists) grow here in lockstep with the new inputs.
    pub fn extend_variadic(&self, n: usize, rng: &mut dyn rand::RngCore, vocab: &super::vocabulary::Vocabulary) -> Option<Opcode> {
        use Opcode::*;
        if !self.attributes().contains(Attributes::VARIADIC) {
            return None;
        }
        Some(match self {
            CreateArray => CreateArray,
            CreateObject(names) => {
                let mut names = names.clone();
                for _ in 0..n {
                    names.push(vocab.random_property_name(rng));
                }
                CreateObject(names)
            }
            CreateTemplateString(parts) => {
                let mut parts = parts.clone();
                for _ in 0..n {
                    parts.push(vocab.random_string_literal(rng));
                }
                CreateTemplateString(parts)
            }
            CallFunction { spreads } => {
                let mut spreads = spreads.clone();
                spreads.extend(std::iter::repeat_n(false, n));
                CallFunction { spreads }
            }
            Construct { spreads } => {
                let mut spreads = spreads.clone();
                spreads.extend(std::iter::repeat_n(false, n));
                Construct { spreads }
            }
            CallMethod { method, spreads } => {
                let mut spreads = spreads.clone();
                spreads.extend(std::iter::repeat_n(false, n));
                CallMethod { method: method.clone(), spreads }
            }
            CallComputedMethod { spreads } => {
                let mut spreads = spreads.clone();
                spreads.extend(std::iter::repeat_n(false, n));
                CallComputedMethod { spreads }
            }
            Return => Return,
            Explore { id } => Explore { id: id.clone() },
            Fixup { id, action, guarded } => {
                Fixup { id: id.clone(), action: action.clone(), guarded: *guarded }
            }
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn block_group_start_and_end_share_a_group() {
        let start = Opcode::BeginIf { inverted: false };
        let end = Opcode::EndIf;
        assert_eq!(start.block_group(), end.block_group());
        assert_eq!(start.block_group(), Some(BlockGroup::If));
    }

    #[test]
    fn loop_break_requires_loop_or_switch() {
        let req = Opcode::LoopBreak.required_context();
        assert!(req.contains(Context::LOOP));
        assert!(req.contains(Context::SWITCH));
    }

    #[test]
    fn variadic_extension_grows_spread_bitmap() {
        let op = Opcode::CallFunction { spreads: vec![false] };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let vocab = super::super::vocabulary::Vocabulary::default();
        let extended = op.extend_variadic(2, &mut rng, &vocab).unwrap();
        match extended {
            Opcode::CallFunction { spreads } => assert_eq!(spreads.len(), 3),
            _ => panic!("wrong opcode"),
        }
    }

    #[test]
    fn return_requires_subroutine_context() {
        assert_eq!(Opcode::Return.required_context(), Context::SUBROUTINE);
    }
}


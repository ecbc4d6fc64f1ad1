//! The FuzzIL program model: the operation catalog, instruction/program
//! records, the abstract type lattice, the Action protocol payload, and
//! the shared vocabulary used when sampling fresh literals/names.

pub mod action;
pub mod instruction;
pub mod opcode;
pub mod program;
pub mod types;
pub mod vocabulary;

pub use action::{
    action_opcode, Action, ActionError, ActionInput, ActionOp, SpecialName, TranslatedInput,
    TranslationContext,
};
pub use instruction::{Instruction, Variable};
pub use opcode::{Attributes, BinaryOp, BlockGroup, CompareOp, Context, Opcode, Role, Shape, UnaryOp};
pub use program::{Program, TypeCollectionStatus};
pub use types::{JsType, Signature, TypeExtension, TypeMask};
pub use vocabulary::Vocabulary;

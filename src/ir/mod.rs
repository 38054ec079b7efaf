//! Representation of lowered functions: values, instructions, blocks.

pub mod entities;
pub mod function;
pub mod instructions;
pub mod repr;
pub mod value;

pub use crate::ir::entities::{Block, DeclId, TempId, TypeId};
pub use crate::ir::function::{BlockData, BlockIter, Func, FuncParam, Phi};
pub use crate::ir::instructions::{Inst, Jump, Opcode};
pub use crate::ir::repr::Repr;
pub use crate::ir::value::{Bitfield, ConstVal, LValue, Name, Value, ValueKind};

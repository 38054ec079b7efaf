//! Stele, the SSA lowering core of a C compiler backend.
//!
//! The crate takes the typed, semantically checked trees a C front end
//! produces and lowers them into a control-flow graph of basic blocks
//! holding three-address SSA instructions, ready for a textual IR consumer
//! to optimize and assemble. It covers expression and initializer lowering,
//! the scalar conversion rules (including the unsigned↔float emulations the
//! consumer lacks instructions for), bit-field access, aggregate
//! scalarization, `switch` dispatch, and forward-referenced labels.
//!
//! Out of scope here: lexing, parsing, type checking, declaration scopes,
//! and the serialization of the produced IR, which plugs in behind
//! [`emit::Emitter`].
//!
//! The overall shape of a driver:
//!
//! ```
//! use stele::emit::TextEmitter;
//! use stele::tree::DeclData;
//! use stele::{FuncBuilder, Unit};
//!
//! let mut unit = Unit::new();
//! let mut sink = TextEmitter::new();
//! let fty = unit.types.func_type(unit.types.int_id, Vec::new(), false, true);
//! let decl = unit.new_decl(DeclData::func(fty));
//! let mut b = FuncBuilder::new(&mut unit, &mut sink, decl, "answer").unwrap();
//! let forty_two = stele::ir::Value::int_const(stele::ir::repr::I32, 42);
//! b.ret(Some(forty_two));
//! let func = b.finish();
//! sink.emit_func(&unit, &func, true);
//! assert!(sink.finish().contains("ret 42"));
//! ```

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub use cranelift_entity as entity;

pub mod emit;
pub mod errors;
pub mod ir;
pub mod lower;
pub mod tree;
pub mod types;
mod unit;

pub use crate::errors::{Error, Result};
pub use crate::lower::{FuncBuilder, SwitchCases};
pub use crate::unit::Unit;

//! IR entity references.
//!
//! Blocks, C type descriptors, and declaration records need to reference each
//! other freely: the block graph is cyclic (loops), and type descriptors are
//! recursive (a struct may contain a pointer to itself). Instead of fighting
//! the borrow checker with owning pointers, every entity is a `u32` index into
//! an arena owned by its enclosing [`Func`](crate::ir::Func) or
//! [`Unit`](crate::Unit), wrapped in a distinct type so indices cannot be
//! mixed up.

use cranelift_entity::entity_impl;

/// An opaque reference to a basic block in a [`Func`](crate::ir::Func).
///
/// Blocks are chained in emission order through
/// [`BlockData::next`](crate::ir::BlockData); the reference order itself is
/// arbitrary.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// An opaque reference to a C type descriptor in the translation unit's type
/// table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);
entity_impl!(TypeId, "type");

/// An opaque reference to a declaration record in the translation unit.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);
entity_impl!(DeclId, "decl");

/// An opaque reference to a compiler-generated expression slot.
///
/// The front end introduces these when desugaring constructs that must reuse
/// a computed value (compound assignment, for instance). An assignment whose
/// target is a temp slot records the right-hand value; a later temp
/// expression reads it back. See [`ExprKind::Temp`](crate::tree::ExprKind).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TempId(u32);
entity_impl!(TempId, "tmp");

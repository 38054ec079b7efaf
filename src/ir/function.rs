//! Function bodies: blocks, phis, and the append state.
//!
//! A [`Func`] owns every block and instruction created while one C function
//! is translated; dropping it releases all of them. Blocks live in an arena
//! keyed by [`Block`] and are chained in emission order through
//! [`BlockData::next`], so the cyclic block graph (loops) never turns into
//! cyclic ownership.
//!
//! Appending is stateful: instructions go to the block designated `end`,
//! which advances as labels are placed. Once a block has a terminator, both
//! appends and further terminators are silently dropped; this is how
//! unreachable code after `return` or `goto` vanishes from the output.

use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::PrimaryMap;
use log::trace;
use rustc_hash::FxHashMap;

use crate::ir::entities::{Block, DeclId, TypeId};
use crate::ir::instructions::{Inst, Jump, Opcode};
use crate::ir::repr::{Repr, I64, IPTR};
use crate::ir::value::{Name, Value, ValueKind};

/// A two-way value merge at the head of a block.
///
/// The IR's phis always have exactly two incoming edges; joins with more
/// predecessors are modeled by chaining blocks. `val[i]` is the value
/// arriving from `blk[i]`.
#[derive(Clone, Default)]
pub struct Phi {
    /// Incoming edge sources.
    pub blk: [PackedOption<Block>; 2],
    /// Values arriving over the matching edges.
    pub val: [Option<Value>; 2],
    /// Merged result, a temporary of the block's function.
    pub res: Option<Value>,
}

impl Phi {
    /// True when the block actually merges values.
    pub fn is_set(&self) -> bool {
        self.res.is_some()
    }
}

/// One basic block.
#[derive(Clone)]
pub struct BlockData {
    /// Label, printed as `@base.id`.
    pub label: Name,
    /// Instructions in append order.
    pub insts: Vec<Inst>,
    /// Optional value merge at the head of the block.
    pub phi: Phi,
    /// Terminator; `Jump::None` while the block is still open. A block left
    /// open at emission time falls through to its successor in the chain.
    pub jump: Jump,
    /// Next block in emission order.
    pub next: PackedOption<Block>,
}

impl BlockData {
    fn new(label: Name) -> Self {
        Self {
            label,
            insts: Vec::new(),
            phi: Phi::default(),
            jump: Jump::None,
            next: PackedOption::default(),
        }
    }
}

/// One lowered formal parameter.
#[derive(Clone)]
pub struct FuncParam {
    /// Parameter name, for scope binding by the front end.
    pub name: String,
    /// Incoming SSA temporary.
    pub temp: Value,
    /// Type the value arrives as (after promotion in old-style
    /// definitions); determines the header token.
    pub ty: TypeId,
    /// The local object declaration the parameter was stored into, or that
    /// aliases the incoming reference for aggregates.
    pub decl: DeclId,
}

/// A function under construction.
pub struct Func {
    /// Declaration this function defines.
    pub decl: DeclId,
    /// External name.
    pub name: String,
    /// C function type.
    ty: TypeId,
    /// Block arena.
    pub blocks: PrimaryMap<Block, BlockData>,
    /// Entry block; holds the stack allocations of all locals.
    pub start: Block,
    /// Current append target, advanced by [`Func::label`].
    pub end: Block,
    /// Lowered parameters, in order.
    pub params: Vec<FuncParam>,
    /// Lazily created targets for named labels, keyed by label spelling.
    pub(crate) gotos: FxHashMap<String, Block>,
    /// `__func__` declaration; cleared once its data has been emitted.
    pub(crate) name_decl: Option<DeclId>,
    /// Last SSA temporary id handed out.
    last_id: u64,
}

impl Func {
    /// Create a function whose entry block is `start_label`.
    pub(crate) fn new(decl: DeclId, name: String, ty: TypeId, start_label: Name) -> Self {
        let mut blocks = PrimaryMap::new();
        let start = blocks.push(BlockData::new(start_label));
        Self {
            decl,
            name,
            ty,
            blocks,
            start,
            end: start,
            params: Vec::new(),
            gotos: FxHashMap::default(),
            name_decl: None,
            last_id: 0,
        }
    }

    /// The C type of this function.
    pub fn func_type(&self) -> TypeId {
        self.ty
    }

    /// The declaration of `__func__`, for scope binding by the front end.
    ///
    /// `None` once the identifier has been referenced and its data emitted.
    pub fn name_decl(&self) -> Option<DeclId> {
        self.name_decl
    }

    /// Add an empty block to the arena. The block does not enter the
    /// emission chain until [`Func::label`] places it.
    pub fn make_block(&mut self, label: Name) -> Block {
        self.blocks.push(BlockData::new(label))
    }

    /// Mint a fresh SSA temporary of the given repr.
    pub fn new_temp(&mut self, repr: Repr) -> Value {
        self.last_id += 1;
        Value { kind: ValueKind::Temp(self.last_id), repr }
    }

    /// True once the current block has a terminator; subsequent appends are
    /// dropped.
    pub fn is_sealed(&self) -> bool {
        self.blocks[self.end].jump.is_set()
    }

    /// Append a value-producing instruction to the current block.
    ///
    /// Returns the fresh result temporary, or `None` when the current block
    /// is already terminated and the instruction was dropped.
    pub fn inst(
        &mut self,
        op: Opcode,
        repr: Repr,
        arg0: Option<Value>,
        arg1: Option<Value>,
    ) -> Option<Value> {
        if self.is_sealed() {
            return None;
        }
        let res = self.new_temp(repr);
        self.blocks[self.end].insts.push(Inst {
            op,
            res: Some(res.clone()),
            args: [arg0, arg1],
        });
        Some(res)
    }

    /// Append an instruction with no result (stores, argument attachment,
    /// `vastart`). Dropped when the current block is terminated.
    pub fn inst_void(&mut self, op: Opcode, arg0: Option<Value>, arg1: Option<Value>) {
        if self.is_sealed() {
            return;
        }
        self.blocks[self.end].insts.push(Inst { op, res: None, args: [arg0, arg1] });
    }

    /// Append a stack allocation of `size` bytes to the entry block and
    /// return its address.
    ///
    /// Allocations always live in the entry block no matter where the
    /// declaration appears, so the consumer reserves the whole frame up
    /// front.
    pub fn append_alloc(&mut self, op: Opcode, size: u64) -> Value {
        debug_assert!(op.is_alloc());
        let res = self.new_temp(IPTR);
        self.blocks[self.start].insts.push(Inst {
            op,
            res: Some(res.clone()),
            args: [Some(Value::int_const(I64, size)), None],
        });
        res
    }

    /// Place `b` in the emission chain and make it the append target.
    pub fn label(&mut self, b: Block) {
        trace!("label @{}", self.blocks[b].label);
        self.blocks[self.end].next = b.into();
        self.end = b;
    }

    /// Terminate the current block with an unconditional jump, unless it is
    /// already terminated.
    pub fn jmp(&mut self, target: Block) {
        if !self.is_sealed() {
            self.blocks[self.end].jump = Jump::Jmp(target);
        }
    }

    /// Terminate the current block with a conditional branch: to `then` when
    /// `cond` is non-zero, otherwise to `els`. No-op on a terminated block.
    pub fn jnz(&mut self, cond: Value, then: Block, els: Block) {
        if !self.is_sealed() {
            self.blocks[self.end].jump = Jump::Jnz(cond, then, els);
        }
    }

    /// Terminate the current block with a return. No-op on a terminated
    /// block.
    pub fn ret(&mut self, v: Option<Value>) {
        if !self.is_sealed() {
            self.blocks[self.end].jump = Jump::Ret(v);
        }
    }

    /// Blocks in emission order.
    pub fn block_order(&self) -> BlockIter<'_> {
        BlockIter { func: self, next: Some(self.start) }
    }
}

/// Iterator over a function's blocks in emission order.
pub struct BlockIter<'a> {
    func: &'a Func,
    next: Option<Block>,
}

impl Iterator for BlockIter<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let b = self.next?;
        self.next = self.func.blocks[b].next.expand();
        Some(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::repr::I32;
    use cranelift_entity::EntityRef;

    fn test_func() -> Func {
        Func::new(DeclId::new(0), "f".into(), TypeId::new(0), Name::private("start", 1))
    }

    #[test]
    fn append_and_chain() {
        let mut f = test_func();
        let body = f.make_block(Name::private("body", 2));
        f.label(body);
        let a = f.inst(Opcode::Add, I32, Some(Value::int_const(I32, 1)), Some(Value::int_const(I32, 2)));
        assert!(a.is_some());
        let order: Vec<Block> = f.block_order().collect();
        assert_eq!(order, vec![f.start, body]);
        assert_eq!(f.blocks[body].insts.len(), 1);
    }

    #[test]
    fn temps_are_unique() {
        let mut f = test_func();
        let a = f.new_temp(I32);
        let b = f.new_temp(I64);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "%.1");
        assert_eq!(b.to_string(), "%.2");
    }

    #[test]
    fn terminator_is_idempotent() {
        let mut f = test_func();
        let t1 = f.make_block(Name::private("a", 2));
        let t2 = f.make_block(Name::private("b", 3));
        f.ret(None);
        // Later terminators and instructions are dropped.
        f.jmp(t1);
        f.jnz(Value::int_const(I32, 1), t1, t2);
        assert!(matches!(f.blocks[f.end].jump, Jump::Ret(None)));
        assert!(f.inst(Opcode::Add, I32, None, None).is_none());
        f.inst_void(Opcode::Storew, None, None);
        assert!(f.blocks[f.end].insts.is_empty());
    }

    #[test]
    fn allocs_go_to_start() {
        let mut f = test_func();
        let body = f.make_block(Name::private("body", 2));
        f.label(body);
        let addr = f.append_alloc(Opcode::Alloc8, 16);
        assert_eq!(addr.repr, IPTR);
        assert_eq!(f.blocks[f.start].insts.len(), 1);
        assert!(f.blocks[body].insts.is_empty());
        // Terminating the body does not affect entry-block allocations.
        f.ret(None);
        f.append_alloc(Opcode::Alloc4, 4);
        assert_eq!(f.blocks[f.start].insts.len(), 2);
    }
}

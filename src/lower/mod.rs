//! Lowering of typed trees into SSA functions.
//!
//! [`FuncBuilder`] drives the translation of one C function. It owns the
//! [`Func`] under construction and borrows the translation unit and the
//! emission sink, because lowering has unit-level side effects: aggregate
//! types are declared on first use and string-literal data is emitted the
//! first time a literal is referenced.
//!
//! Statement-level control flow stays upstream; the front end drives it
//! through the block and terminator methods here, while expressions,
//! initializers, and `switch` dispatch are lowered whole.

mod convert;
mod expr;
mod init;
mod switch;

pub use self::switch::SwitchCases;

use log::debug;

use crate::emit::Emitter;
use crate::errors::{Error, Result};
use crate::ir::entities::{Block, DeclId, TempId, TypeId};
use crate::ir::function::{Func, FuncParam};
use crate::ir::instructions::Opcode;
use crate::ir::repr::{Repr, I32, IPTR};
use crate::ir::value::{Bitfield, LValue, Value};
use crate::tree::{DeclData, Qual, SourceLoc};
use crate::types::TypeKind;
use crate::unit::Unit;
use rustc_hash::FxHashMap;

/// Builder for a single function.
pub struct FuncBuilder<'a> {
    /// Translation unit the function belongs to.
    pub unit: &'a mut Unit,
    sink: &'a mut dyn Emitter,
    /// The function under construction.
    pub func: Func,
    /// Values of compiler-generated expression slots.
    temps: FxHashMap<TempId, Value>,
}

impl<'a> core::fmt::Debug for FuncBuilder<'a> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FuncBuilder").field("func", &self.func.name).finish()
    }
}

impl<'a> FuncBuilder<'a> {
    /// Begin the definition of the function declared by `decl`.
    ///
    /// Allocates and stores every named parameter (converting from the
    /// promoted type in old-style definitions), pre-declares `__func__`, and
    /// leaves the builder appending to a fresh `body` block.
    pub fn new(
        unit: &'a mut Unit,
        sink: &'a mut dyn Emitter,
        decl: DeclId,
        name: &str,
    ) -> Result<Self> {
        debug!("lowering function '{name}'");
        let fty = unit.decls[decl].ty;
        let floc = unit.decls[decl].loc;
        let start = unit.new_block_name("start");
        let func = Func::new(decl, name.to_string(), fty, start);
        let mut b = Self { unit, sink, func, temps: FxHashMap::default() };

        let ret = b.unit.types[fty].base.expect("function type without return type");
        b.unit.declare_type(b.sink, ret);

        let info = b.unit.types[fty].func.clone().expect("not a function type");
        for p in &info.params {
            let Some(pname) = &p.name else {
                return Err(Error::UnnamedParam { loc: floc, func: name.to_string() });
            };
            let pt = if info.prototype { p.ty } else { b.unit.types.promote(p.ty) };
            b.unit.declare_type(b.sink, pt);
            let repr = b.unit.types.value_repr(pt).expect("parameter of void type");
            let temp = b.func.new_temp(repr);
            let d = b.unit.new_decl(DeclData::object(p.ty, p.qual).at(floc));
            if matches!(b.unit.types[p.ty].kind, TypeKind::Struct | TypeKind::Union) {
                // Aggregates arrive by reference; the incoming temp is
                // already the object's address.
                b.unit.decls[d].value = Some(temp.clone());
            } else {
                let v = if p.ty == pt {
                    temp.clone()
                } else {
                    b.convert(p.ty, pt, temp.clone()).expect("parameter conversion")
                };
                b.alloc_decl(d)?;
                let addr = b.unit.decls[d].value.clone().unwrap();
                b.store(p.ty, Qual::NONE, LValue::new(addr), v, floc)?;
            }
            b.func.params.push(FuncParam { name: pname.clone(), temp, ty: pt, decl: d });
        }

        let n = name.len() as u64 + 1;
        let name_ty = b.unit.types.array_of(b.unit.types.char_id, n);
        let name_global = b.unit.new_global("__func__", true);
        let mut name_data = DeclData::object(name_ty, Qual::constant());
        name_data.value = Some(name_global);
        let nd = b.unit.new_decl(name_data);
        b.func.name_decl = Some(nd);

        let body = b.new_block("body");
        b.func.label(body);
        Ok(b)
    }

    /// Finish construction and hand back the function.
    pub fn finish(self) -> Func {
        self.func
    }

    /// Create a block with a fresh, unit-unique label.
    pub fn new_block(&mut self, base: &'static str) -> Block {
        let label = self.unit.new_block_name(base);
        self.func.make_block(label)
    }

    /// Place `b` in the emission chain and append there from now on.
    pub fn label(&mut self, b: Block) {
        self.func.label(b);
    }

    /// Terminate the current block with a jump, unless already terminated.
    pub fn jmp(&mut self, target: Block) {
        self.func.jmp(target);
    }

    /// Terminate the current block with a conditional branch, unless
    /// already terminated.
    pub fn jnz(&mut self, cond: Value, then: Block, els: Block) {
        self.func.jnz(cond, then, els);
    }

    /// Terminate the current block with a return, unless already
    /// terminated.
    pub fn ret(&mut self, v: Option<Value>) {
        self.func.ret(v);
    }

    /// The target block of a named label, created on first mention.
    ///
    /// Both `goto name;` and `name:` resolve through this table, so forward
    /// references need no fixup pass: whichever side comes first creates the
    /// block, and defining the label later simply places that block.
    pub fn goto_label(&mut self, name: &str) -> Block {
        if let Some(&b) = self.func.gotos.get(name) {
            return b;
        }
        let label = self.unit.new_block_name(name.to_string());
        let b = self.func.make_block(label);
        self.func.gotos.insert(name.to_string(), b);
        b
    }

    /// Allocate storage for an object declaration in the entry block and
    /// record its address on the declaration.
    pub fn alloc_decl(&mut self, d: DeclId) -> Result<()> {
        let ty = self.unit.decls[d].ty;
        let td = &self.unit.types[ty];
        debug_assert!(td.size > 0, "allocating incomplete type");
        let natural = td.align;
        let size = td.size;
        let align = match self.unit.decls[d].align {
            0 => natural,
            a if a < natural => {
                return Err(Error::AlignTooSmall {
                    loc: self.unit.decls[d].loc,
                    required: natural,
                    given: a,
                })
            }
            a => a,
        };
        let op = match align {
            1 | 2 | 4 => Opcode::Alloc4,
            8 => Opcode::Alloc8,
            16 => Opcode::Alloc16,
            _ => panic!("invalid alignment: {align}"),
        };
        let addr = self.func.append_alloc(op, size);
        self.unit.decls[d].value = Some(addr);
        Ok(())
    }

    /// Append a value-producing instruction to the current block.
    ///
    /// Callers establish that the block is open before descending into a
    /// lowering helper; reaching a terminated block here is a bug.
    fn op(&mut self, op: Opcode, repr: Repr, arg0: Value, arg1: Option<Value>) -> Value {
        self.func
            .inst(op, repr, Some(arg0), arg1)
            .expect("instruction appended to a terminated block")
    }

    /// Isolate a bit-field from the raw storage unit in `v`: shift the
    /// field's high end up, then shift back down with the extension the
    /// field's type calls for.
    pub(crate) fn bits_extract(&mut self, t: TypeId, v: Value, bits: Bitfield) -> Value {
        let mut v = v;
        let repr = self.unit.types.repr(t).expect("bit-field of unrepresentable type");
        if bits.after != 0 {
            v = self.op(Opcode::Shl, repr, v, Some(Value::int_const(I32, bits.after as u64)));
        }
        if bits.before + bits.after != 0 {
            let shift = if self.unit.types.is_signed(t) { Opcode::Sar } else { Opcode::Shr };
            v = self.op(
                shift,
                repr,
                v,
                Some(Value::int_const(I32, (bits.before + bits.after) as u64)),
            );
        }
        v
    }

    /// Load a value of type `t` from `lval`.
    ///
    /// Aggregates are not loaded; their address is the value. Sub-word
    /// integers pick the extending load matching their signedness, and a
    /// bit-field extent narrows the loaded storage unit afterwards.
    pub fn load(&mut self, t: TypeId, lval: LValue) -> Value {
        use Opcode::*;
        let td = &self.unit.types[t];
        let op = match td.kind {
            TypeKind::Pointer => Loadl,
            TypeKind::Struct | TypeKind::Union | TypeKind::Array => return lval.addr,
            _ => {
                debug_assert!(td.props.is_real());
                match td.size {
                    1 => {
                        if td.signed {
                            Loadsb
                        } else {
                            Loadub
                        }
                    }
                    2 => {
                        if td.signed {
                            Loadsh
                        } else {
                            Loaduh
                        }
                    }
                    4 => {
                        if td.props.is_float() {
                            Loads
                        } else if td.signed {
                            Loadsw
                        } else {
                            Loaduw
                        }
                    }
                    8 => {
                        if td.props.is_float() {
                            Loadd
                        } else {
                            Loadl
                        }
                    }
                    _ => panic!("unimplemented load"),
                }
            }
        };
        let repr = self.unit.types.repr(t).expect("load of unrepresentable type");
        let v = self.op(op, repr, lval.addr, None);
        self.bits_extract(t, v, lval.bits)
    }

    /// Store `v` of type `t` into `lval` and return the value an immediate
    /// re-read would produce.
    ///
    /// For bit-fields that is the stored value truncated and re-extended to
    /// the field's width, which is what an assignment expression must yield.
    /// Aggregate stores scalarize into an alignment-wide copy loop with a
    /// narrower tail when the size is not a multiple of the alignment.
    pub fn store(
        &mut self,
        t: TypeId,
        qual: Qual,
        lval: LValue,
        v: Value,
        loc: SourceLoc,
    ) -> Result<Value> {
        use Opcode::*;
        if qual.is_volatile() {
            return Err(Error::VolatileStore { loc });
        }
        if qual.is_const() {
            return Err(Error::ConstStore { loc });
        }
        let mut t = t;
        debug_assert!(
            !lval.bits.any() || self.unit.types.props(t).is_int(),
            "bit-field store into a non-integer"
        );
        match self.unit.types[t].kind {
            TypeKind::Struct | TypeKind::Union | TypeKind::Array => {
                let size = self.unit.types[t].size;
                let align = match self.unit.types[t].align {
                    a @ (1 | 2 | 4 | 8) => a as u64,
                    a => panic!("invalid alignment {a}"),
                };
                let mut src = v.clone();
                let mut dst = lval.addr;
                let mut offset = 0;
                while offset < size {
                    let mut w = align;
                    while w > size - offset {
                        w >>= 1;
                    }
                    let (loadop, storeop) = copy_ops(w);
                    let tmp = self.op(loadop, IPTR, src.clone(), None);
                    self.func.inst_void(storeop, Some(tmp), Some(dst.clone()));
                    offset += w;
                    if offset < size {
                        let stride = Value::int_const(IPTR, w);
                        src = self.op(Add, IPTR, src, Some(stride.clone()));
                        dst = self.op(Add, IPTR, dst, Some(stride));
                    }
                }
                Ok(v)
            }
            _ => {
                if self.unit.types[t].kind == TypeKind::Pointer {
                    t = self.unit.types.ulong_id;
                }
                debug_assert!(self.unit.types.props(t).is_scalar());
                let td = &self.unit.types[t];
                let size = td.size;
                let is_float = td.props.is_float();
                let (loadop, storeop) = match size {
                    1 => (Loadub, Storeb),
                    2 => (Loaduh, Storeh),
                    4 => (Loaduw, if is_float { Stores } else { Storew }),
                    8 => (Loadl, if is_float { Stored } else { Storel }),
                    _ => panic!("unimplemented store"),
                };
                let repr = td.repr.expect("store of unrepresentable type");
                let mut v = v;
                let mut r = v.clone();
                if lval.bits.any() {
                    let total = size as u32 * 8;
                    debug_assert!(lval.bits.before + lval.bits.after < total);
                    let mask = (u64::MAX >> (lval.bits.after + 64 - total))
                        ^ ((1u64 << lval.bits.before) - 1);
                    v = self.op(Shl, repr, v, Some(Value::int_const(I32, lval.bits.before as u64)));
                    r = self.bits_extract(t, v.clone(), lval.bits);
                    v = self.op(And, repr, v, Some(Value::int_const(repr, mask)));
                    let cur = self.op(loadop, repr, lval.addr.clone(), None);
                    let keep = self.op(And, repr, cur, Some(Value::int_const(repr, !mask)));
                    v = self.op(Or, repr, v, Some(keep));
                }
                self.func.inst_void(storeop, Some(v), Some(lval.addr));
                Ok(r)
            }
        }
    }
}

/// Load/store pair for one chunk width of an aggregate copy.
fn copy_ops(width: u64) -> (Opcode, Opcode) {
    use Opcode::*;
    match width {
        1 => (Loadub, Storeb),
        2 => (Loaduh, Storeh),
        4 => (Loaduw, Storew),
        8 => (Loadl, Storel),
        _ => panic!("invalid copy width {width}"),
    }
}

//! Expression lowering.
//!
//! [`FuncBuilder::expr`] walks a typed expression and returns the SSA value
//! of its rvalue. `None` means the expression has no value: it is void-typed
//! or sits in dead code after a terminator, where everything it would emit
//! is dropped.
//!
//! Sub-expressions are evaluated strictly left to right, so every side
//! effect of one full expression lands in the instruction stream in source
//! order.

use smallvec::SmallVec;

use crate::errors::{Error, Result};
use crate::ir::entities::DeclId;
use crate::ir::instructions::Opcode;
use crate::ir::repr::IPTR;
use crate::ir::value::{ConstVal, LValue, Value};
use crate::tree::{BinaryOp, BuiltinKind, DeclData, DeclKind, Expr, ExprKind, IncDecOp, Init, UnaryOp};
use crate::types::TypeKind;

use super::FuncBuilder;

impl FuncBuilder<'_> {
    /// Lower `e` to its rvalue.
    pub fn expr(&mut self, e: &Expr) -> Result<Option<Value>> {
        if self.func.is_sealed() {
            return Ok(None);
        }
        match &e.kind {
            ExprKind::Ident(d) => {
                let decl = &self.unit.decls[*d];
                match decl.kind {
                    DeclKind::Object => {
                        let addr = decl.value.clone().expect("object without storage");
                        let lval = LValue::new(addr);
                        let ty = decl.ty;
                        self.ident_data(*d);
                        Ok(Some(self.load(ty, lval)))
                    }
                    DeclKind::Const => Ok(Some(decl.value.clone().expect("constant without value"))),
                    DeclKind::Func => panic!("unimplemented declaration kind"),
                }
            }
            ExprKind::Const(c) => {
                let repr = self.unit.types.repr(e.ty).expect("constant of unrepresentable type");
                let props = self.unit.types.props(e.ty);
                let is_int = props.is_int() || self.unit.types[e.ty].kind == TypeKind::Pointer;
                match (is_int, c) {
                    (true, ConstVal::Int(n)) => Ok(Some(Value::int_const(repr, *n))),
                    (false, ConstVal::Float(x)) => Ok(Some(Value::float_const(repr, *x))),
                    _ => panic!("constant does not match its type"),
                }
            }
            ExprKind::Bitfield { .. } | ExprKind::Compound(_) => {
                let lval = self.lval(e)?;
                Ok(Some(self.load(e.ty, lval)))
            }
            ExprKind::IncDec { op, post, base } => {
                let lval = self.lval(base)?;
                let l = self.load(base.ty, lval.clone());
                let repr = self.unit.types.repr(e.ty).expect("increment of unrepresentable type");
                let td = &self.unit.types[e.ty];
                let r = match td.kind {
                    TypeKind::Pointer => {
                        let elem = td.base.expect("pointer without pointee");
                        Value::int_const(repr, self.unit.types[elem].size)
                    }
                    _ if td.props.is_int() => Value::int_const(repr, 1),
                    _ if td.props.is_float() => Value::float_const(repr, 1.0),
                    _ => panic!("not a scalar"),
                };
                let op = if *op == IncDecOp::Inc { Opcode::Add } else { Opcode::Sub };
                let v = self.op(op, repr, l.clone(), Some(r));
                let v = self.store(e.ty, e.qual, lval, v, e.loc)?;
                Ok(Some(if *post { l } else { v }))
            }
            ExprKind::Call { base, args } => {
                let fty = {
                    let pt = &self.unit.types[base.ty];
                    debug_assert_eq!(pt.kind, TypeKind::Pointer);
                    pt.base.expect("call through a non-function pointer")
                };
                let variadic =
                    self.unit.types[fty].func.as_ref().expect("call of a non-function").variadic;
                let op = if variadic { Opcode::Vacall } else { Opcode::Call };
                let mut argvals: SmallVec<[(Value, Option<Value>); 8]> =
                    SmallVec::with_capacity(args.len());
                for arg in args {
                    self.unit.declare_type(self.sink, arg.ty);
                    let v = self.expr(arg)?.expect("argument with no value");
                    argvals.push((v, self.unit.types[arg.ty].value.clone()));
                }
                self.unit.declare_type(self.sink, e.ty);
                let callee = self.expr(base)?.expect("callee with no value");
                let ret_token = self.unit.types[e.ty].value.clone();
                let res = match self.unit.types.value_repr(e.ty) {
                    Some(repr) => Some(self.op(op, repr, callee, ret_token)),
                    None => {
                        self.func.inst_void(op, Some(callee), ret_token);
                        None
                    }
                };
                for (v, token) in argvals {
                    self.func.inst_void(Opcode::Arg, Some(v), token);
                }
                Ok(res)
            }
            ExprKind::Unary { op, base } => match op {
                UnaryOp::Addr => {
                    let lval = self.lval(base)?;
                    Ok(Some(lval.addr))
                }
                UnaryOp::Deref => {
                    let addr = self.expr(base)?.expect("dereference of no value");
                    Ok(Some(self.load(e.ty, LValue::new(addr))))
                }
            },
            ExprKind::Cast { base } => {
                let Some(l) = self.expr(base)? else {
                    return Ok(None);
                };
                Ok(self.convert(e.ty, base.ty, l))
            }
            ExprKind::Binary { op: BinaryOp::LogicAnd, lhs, rhs }
            | ExprKind::Binary { op: BinaryOp::LogicOr, lhs, rhs } => {
                let or = matches!(e.kind, ExprKind::Binary { op: BinaryOp::LogicOr, .. });
                let l = self.expr(lhs)?.expect("operand with no value");
                let right = self.new_block("logic_right");
                let join = self.new_block("logic_join");
                if or {
                    self.func.jnz(l.clone(), join, right);
                } else {
                    self.func.jnz(l.clone(), right, join);
                }
                self.func.blocks[join].phi.val[0] = Some(l);
                self.func.blocks[join].phi.blk[0] = self.func.end.into();
                self.func.label(right);
                let r = self.expr(rhs)?;
                self.func.blocks[join].phi.val[1] = r;
                self.func.blocks[join].phi.blk[1] = self.func.end.into();
                self.func.label(join);
                let repr = self.unit.types.repr(e.ty).expect("logic result type");
                let res = self.func.new_temp(repr);
                self.func.blocks[join].phi.res = Some(res.clone());
                Ok(Some(res))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.expr(lhs)?.expect("operand with no value");
                let r = self.expr(rhs)?.expect("operand with no value");
                let opc = self.binary_opcode(*op, e, lhs);
                let repr = self.unit.types.repr(e.ty).expect("binary result type");
                Ok(Some(self.op(opc, repr, l, Some(r))))
            }
            ExprKind::Cond { cond, then, els } => {
                let bt = self.new_block("cond_true");
                let bf = self.new_block("cond_false");
                let join = self.new_block("cond_join");

                let c = self.expr(cond)?.expect("condition with no value");
                self.func.jnz(c, bt, bf);

                self.func.label(bt);
                self.func.blocks[join].phi.val[0] = self.expr(then)?;
                self.func.blocks[join].phi.blk[0] = self.func.end.into();
                self.func.jmp(join);

                self.func.label(bf);
                self.func.blocks[join].phi.val[1] = self.expr(els)?;
                self.func.blocks[join].phi.blk[1] = self.func.end.into();

                self.func.label(join);
                if e.ty == self.unit.types.void_id {
                    return Ok(None);
                }
                let repr = self.unit.types.repr(e.ty).expect("conditional result type");
                let res = self.func.new_temp(repr);
                self.func.blocks[join].phi.res = Some(res.clone());
                Ok(Some(res))
            }
            ExprKind::Assign { target, value } => {
                let r = self.expr(value)?.expect("assigned value");
                if let ExprKind::Temp(slot) = target.kind {
                    self.temps.insert(slot, r.clone());
                    Ok(Some(r))
                } else {
                    let lval = self.lval(target)?;
                    let r = self.store(target.ty, target.qual, lval, r, e.loc)?;
                    Ok(Some(r))
                }
            }
            ExprKind::Comma(exprs) => {
                let (last, rest) = exprs.split_last().expect("empty comma expression");
                for sub in rest {
                    self.expr(sub)?;
                }
                self.expr(last)
            }
            ExprKind::Builtin { kind, base } => match kind {
                BuiltinKind::VaStart => {
                    let ap = base.as_deref().expect("va_start without list");
                    let l = self.expr(ap)?.expect("va_list with no value");
                    self.func.inst_void(Opcode::Vastart, Some(l), None);
                    Ok(None)
                }
                BuiltinKind::VaArg => {
                    if !self.unit.types.props(e.ty).is_scalar() {
                        return Err(Error::NonScalarVaArg { loc: e.loc });
                    }
                    let ap = base.as_deref().expect("va_arg without list");
                    let l = self.expr(ap)?.expect("va_list with no value");
                    let repr = self.unit.types.repr(e.ty).expect("va_arg type");
                    Ok(Some(self.op(Opcode::Vaarg, repr, l, None)))
                }
                BuiltinKind::VaEnd => Ok(None),
                BuiltinKind::Alloca => {
                    let n = base.as_deref().expect("alloca without size");
                    let l = self.expr(n)?.expect("alloca size with no value");
                    Ok(Some(self.op(Opcode::Alloc16, IPTR, l, None)))
                }
            },
            ExprKind::Temp(slot) => {
                Ok(Some(self.temps.get(slot).expect("temp read before assignment").clone()))
            }
            ExprKind::String(_) => panic!("unimplemented expression"),
        }
    }

    /// Lower `e` as a designation of storage.
    pub fn lval(&mut self, e: &Expr) -> Result<LValue> {
        let (e, bits) = match &e.kind {
            ExprKind::Bitfield { base, bits } => (base.as_ref(), *bits),
            _ => (e, Default::default()),
        };
        let addr = match &e.kind {
            ExprKind::Ident(d) => {
                let decl = &self.unit.decls[*d];
                if !matches!(decl.kind, DeclKind::Object | DeclKind::Func) {
                    return Err(Error::IdentNotObject { loc: e.loc });
                }
                self.ident_data(*d);
                self.unit.decls[*d].value.clone().expect("object without storage")
            }
            ExprKind::String(bytes) => {
                let d = self.unit.string_decl(self.sink, bytes);
                self.unit.decls[d].value.clone().expect("string without storage")
            }
            ExprKind::Compound(init) => {
                let d = self.unit.new_decl(DeclData::object(e.ty, e.qual).at(e.loc));
                self.init(d, Some(init.as_slice()))?;
                self.unit.decls[d].value.clone().expect("compound literal without storage")
            }
            ExprKind::Unary { op: UnaryOp::Deref, base } => {
                self.expr(base)?.expect("dereference of no value")
            }
            _ => {
                if !matches!(self.unit.types[e.ty].kind, TypeKind::Struct | TypeKind::Union) {
                    return Err(Error::NotAnObject { loc: e.loc });
                }
                self.expr(e)?.expect("aggregate with no value")
            }
        };
        Ok(LValue::with_bits(addr, bits))
    }

    /// Emit the `__func__` data the first time the identifier is referenced.
    fn ident_data(&mut self, d: DeclId) {
        if self.func.name_decl != Some(d) {
            return;
        }
        self.func.name_decl = None;
        let ty = self.unit.decls[d].ty;
        let mut bytes = self.func.name.clone().into_bytes();
        bytes.push(0);
        let n = bytes.len() as u64;
        let init = [Init::new(0, n, Expr::new(ExprKind::String(bytes), ty))];
        self.sink.emit_data(self.unit, d, &init);
    }

    /// Pick the opcode of a non-logical binary operator from the operator,
    /// the result type, and the left operand's type.
    fn binary_opcode(&self, op: BinaryOp, e: &Expr, lhs: &Expr) -> Opcode {
        use Opcode::*;
        let mut t = lhs.ty;
        if self.unit.types[t].kind == TypeKind::Pointer {
            t = self.unit.types.ulong_id;
        }
        let td = &self.unit.types[t];
        let (size, signed, float) = (td.size, td.signed, td.props.is_float());
        let rd = &self.unit.types[e.ty];
        match op {
            BinaryOp::Mul => Mul,
            BinaryOp::Div => {
                if !rd.props.is_int() || rd.signed {
                    Div
                } else {
                    Udiv
                }
            }
            BinaryOp::Rem => {
                if rd.signed {
                    Rem
                } else {
                    Urem
                }
            }
            BinaryOp::Add => Add,
            BinaryOp::Sub => Sub,
            BinaryOp::Shl => Shl,
            BinaryOp::Shr => {
                if signed {
                    Sar
                } else {
                    Shr
                }
            }
            BinaryOp::BitOr => Or,
            BinaryOp::BitAnd => And,
            BinaryOp::BitXor => Xor,
            BinaryOp::Lt => match (size <= 4, float, signed) {
                (true, true, _) => Clts,
                (true, false, true) => Csltw,
                (true, false, false) => Cultw,
                (false, true, _) => Cltd,
                (false, false, true) => Csltl,
                (false, false, false) => Cultl,
            },
            BinaryOp::Gt => match (size <= 4, float, signed) {
                (true, true, _) => Cgts,
                (true, false, true) => Csgtw,
                (true, false, false) => Cugtw,
                (false, true, _) => Cgtd,
                (false, false, true) => Csgtl,
                (false, false, false) => Cugtl,
            },
            BinaryOp::Le => match (size <= 4, float, signed) {
                (true, true, _) => Cles,
                (true, false, true) => Cslew,
                (true, false, false) => Culew,
                (false, true, _) => Cled,
                (false, false, true) => Cslel,
                (false, false, false) => Culel,
            },
            BinaryOp::Ge => match (size <= 4, float, signed) {
                (true, true, _) => Cges,
                (true, false, true) => Csgew,
                (true, false, false) => Cugew,
                (false, true, _) => Cged,
                (false, false, true) => Csgel,
                (false, false, false) => Cugel,
            },
            BinaryOp::Eq => match (size <= 4, float) {
                (true, true) => Ceqs,
                (true, false) => Ceqw,
                (false, true) => Ceqd,
                (false, false) => Ceql,
            },
            BinaryOp::Ne => match (size <= 4, float) {
                (true, true) => Cnes,
                (true, false) => Cnew,
                (false, true) => Cned,
                (false, false) => Cnel,
            },
            BinaryOp::LogicAnd | BinaryOp::LogicOr => {
                unreachable!("short-circuit operators take the branching path")
            }
        }
    }
}

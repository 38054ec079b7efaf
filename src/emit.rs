//! The emission sink: the boundary between lowering and serialization.
//!
//! The core calls a sink at three points (aggregate type declarations,
//! global data, and finished functions), and a serializer additionally
//! breaks those down into names, values, reprs, instructions, and
//! terminators. [`TextEmitter`] is the reference implementation producing
//! the consumer's textual form; it is what the tests assert against, and a
//! production serializer replaces it behind the same trait.

use core::fmt::Write;

use crate::ir::entities::{DeclId, TypeId};
use crate::ir::function::Func;
use crate::ir::instructions::{Inst, Jump, Opcode};
use crate::ir::repr::Repr;
use crate::ir::value::{ConstVal, Name, Value, ValueKind};
use crate::tree::{ExprKind, Init};
use crate::types::TypeKind;
use crate::unit::Unit;

/// Serialization interface the lowering core emits through.
pub trait Emitter {
    /// Print a qualified symbol name.
    fn emit_name(&mut self, name: &Name);

    /// Print a value operand.
    fn emit_value(&mut self, v: &Value);

    /// Print the class or width token preceding an operand; `with` carries
    /// the aggregate type token when one replaces the repr.
    fn emit_repr(&mut self, r: Repr, with: Option<&Value>, ext: bool);

    /// Declare an aggregate type. Called exactly once per type and unit,
    /// after its member types.
    fn emit_type(&mut self, unit: &Unit, ty: TypeId);

    /// Print one instruction.
    fn emit_inst(&mut self, inst: &Inst);

    /// Print a block terminator. An unset terminator falls through and
    /// prints nothing.
    fn emit_jump(&mut self, func: &Func, jump: &Jump);

    /// Print a finished function, `global` meaning external linkage.
    fn emit_func(&mut self, unit: &Unit, func: &Func, global: bool);

    /// Print a global data definition for `decl` from its initializer.
    fn emit_data(&mut self, unit: &Unit, decl: DeclId, init: &[Init]);
}

/// Reference textual serializer.
///
/// Accumulates everything into a string, which keeps the lowering core free
/// of I/O; the driver decides where the text goes.
#[derive(Default)]
pub struct TextEmitter {
    out: String,
}

impl TextEmitter {
    /// An emitter with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the accumulated text.
    pub fn finish(self) -> String {
        self.out
    }

    /// The text produced so far.
    pub fn text(&self) -> &str {
        &self.out
    }

    fn token_of(unit: &Unit, ty: TypeId) -> String {
        match unit.types[ty].kind {
            TypeKind::Struct | TypeKind::Union => {
                let v = unit.types[ty].value.as_ref().expect("aggregate type not declared");
                v.to_string()
            }
            TypeKind::Array => {
                let elem = unit.types[ty].base.expect("array without element type");
                format!("{} {}", Self::token_of(unit, elem), unit.types[ty].array_len)
            }
            _ => {
                let r = unit.types[ty].repr.expect("member of unrepresentable type");
                r.ext_char().to_string()
            }
        }
    }

    fn write_call(&mut self, insts: &[Inst], at: usize) -> usize {
        let call = &insts[at];
        let _ = write!(self.out, "\t");
        if let Some(res) = &call.res {
            match call.args[1].as_ref().map(|v| &v.kind) {
                Some(ValueKind::Type(n)) => {
                    let _ = write!(self.out, "{res} =:{n} ");
                }
                _ => {
                    let _ = write!(self.out, "{res} ={} ", res.repr);
                }
            }
        }
        let callee = call.args[0].as_ref().expect("call without callee");
        let _ = write!(self.out, "call {callee}(");
        let mut n = at + 1;
        let mut first = true;
        while n < insts.len() && insts[n].op == Opcode::Arg {
            let arg = &insts[n];
            let v = arg.args[0].as_ref().expect("argument without value");
            if !first {
                let _ = write!(self.out, ", ");
            }
            match arg.args[1].as_ref().map(|t| &t.kind) {
                Some(ValueKind::Type(tok)) => {
                    let _ = write!(self.out, ":{tok} {v}");
                }
                _ => {
                    let _ = write!(self.out, "{} {v}", v.repr.ext_char());
                }
            }
            first = false;
            n += 1;
        }
        if call.op == Opcode::Vacall {
            if !first {
                let _ = write!(self.out, ", ");
            }
            let _ = write!(self.out, "...");
        }
        let _ = writeln!(self.out, ")");
        n
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut run = String::new();
        let mut first = true;
        let sep = |out: &mut String, first: &mut bool| {
            if !*first {
                out.push_str(", ");
            }
            *first = false;
        };
        for &b in bytes {
            let printable = (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\';
            if printable {
                run.push(b as char);
            } else {
                if !run.is_empty() {
                    sep(&mut self.out, &mut first);
                    let _ = write!(self.out, "b \"{run}\"");
                    run.clear();
                }
                sep(&mut self.out, &mut first);
                let _ = write!(self.out, "b {b}");
            }
        }
        if !run.is_empty() {
            sep(&mut self.out, &mut first);
            let _ = write!(self.out, "b \"{run}\"");
        }
    }
}

impl Emitter for TextEmitter {
    fn emit_name(&mut self, name: &Name) {
        let _ = write!(self.out, "{name}");
    }

    fn emit_value(&mut self, v: &Value) {
        let _ = write!(self.out, "{v}");
    }

    fn emit_repr(&mut self, r: Repr, with: Option<&Value>, ext: bool) {
        if let Some(Value { kind: ValueKind::Type(n), .. }) = with {
            let _ = write!(self.out, ":{n}");
        } else if ext {
            let _ = write!(self.out, "{}", r.ext_char());
        } else {
            let _ = write!(self.out, "{}", r.base_char());
        }
    }

    fn emit_type(&mut self, unit: &Unit, ty: TypeId) {
        let td = &unit.types[ty];
        let token = td.value.as_ref().expect("type emitted before declaration");
        let mut items = Vec::with_capacity(td.members.len());
        let mut prev_offset = None;
        for m in &td.members {
            // Bit-field members share a storage unit; print it once.
            if m.bits.any() && prev_offset == Some(m.offset) {
                continue;
            }
            prev_offset = Some(m.offset);
            let item = Self::token_of(unit, m.ty);
            match td.kind {
                TypeKind::Union => items.push(format!("{{ {item} }}")),
                _ => items.push(item),
            }
        }
        let sep = if td.kind == TypeKind::Union { " " } else { ", " };
        let _ = writeln!(
            self.out,
            "type {token} = align {} {{ {} }}",
            td.align,
            items.join(sep)
        );
    }

    fn emit_inst(&mut self, inst: &Inst) {
        let _ = write!(self.out, "\t");
        if let Some(res) = &inst.res {
            let _ = write!(self.out, "{res} ={} ", res.repr);
        }
        let _ = write!(self.out, "{}", inst.op);
        let mut first = true;
        for arg in inst.args.iter().flatten() {
            let _ = write!(self.out, "{} {arg}", if first { "" } else { "," });
            first = false;
        }
        let _ = writeln!(self.out);
    }

    fn emit_jump(&mut self, func: &Func, jump: &Jump) {
        match jump {
            Jump::None => {}
            Jump::Jmp(b) => {
                let _ = writeln!(self.out, "\tjmp @{}", func.blocks[*b].label);
            }
            Jump::Jnz(v, a, b) => {
                let _ = writeln!(
                    self.out,
                    "\tjnz {v}, @{}, @{}",
                    func.blocks[*a].label, func.blocks[*b].label
                );
            }
            Jump::Ret(Some(v)) => {
                let _ = writeln!(self.out, "\tret {v}");
            }
            Jump::Ret(None) => {
                let _ = writeln!(self.out, "\tret");
            }
        }
    }

    fn emit_func(&mut self, unit: &Unit, func: &Func, global: bool) {
        if global {
            let _ = write!(self.out, "export ");
        }
        let _ = write!(self.out, "function ");
        let ret = unit.types[func.func_type()].base.expect("function without return type");
        match unit.types[ret].kind {
            TypeKind::Void => {}
            TypeKind::Struct | TypeKind::Union => {
                let token = unit.types[ret].value.as_ref().expect("return type not declared");
                let _ = write!(self.out, "{token} ");
            }
            _ => {
                let r = unit.types[ret].repr.expect("unrepresentable return type");
                let _ = write!(self.out, "{} ", r.ext_char());
            }
        }
        let _ = write!(self.out, "${}(", func.name);
        let mut first = true;
        for p in &func.params {
            if !first {
                let _ = write!(self.out, ", ");
            }
            match unit.types[p.ty].kind {
                TypeKind::Struct | TypeKind::Union => {
                    let token = unit.types[p.ty].value.as_ref().expect("param type not declared");
                    let _ = write!(self.out, "{token} {}", p.temp);
                }
                _ => {
                    let r = unit.types[p.ty].repr.expect("unrepresentable parameter");
                    let _ = write!(self.out, "{} {}", r.ext_char(), p.temp);
                }
            }
            first = false;
        }
        if unit.types[func.func_type()].func.as_ref().is_some_and(|f| f.variadic) {
            if !first {
                let _ = write!(self.out, ", ");
            }
            let _ = write!(self.out, "...");
        }
        let _ = writeln!(self.out, ") {{");
        for b in func.block_order() {
            let data = &func.blocks[b];
            let _ = writeln!(self.out, "@{}", data.label);
            if let Some(res) = &data.phi.res {
                let b0 = data.phi.blk[0].expand().expect("phi without predecessor");
                let b1 = data.phi.blk[1].expand().expect("phi without predecessor");
                let v0 = data.phi.val[0].as_ref().expect("phi without value");
                let v1 = data.phi.val[1].as_ref().expect("phi without value");
                let _ = writeln!(
                    self.out,
                    "\t{res} ={} phi @{} {v0}, @{} {v1}",
                    res.repr, func.blocks[b0].label, func.blocks[b1].label
                );
            }
            let mut i = 0;
            while i < data.insts.len() {
                if data.insts[i].op.is_call() {
                    i = self.write_call(&data.insts, i);
                } else {
                    self.emit_inst(&data.insts[i]);
                    i += 1;
                }
            }
            self.emit_jump(func, &data.jump);
        }
        let _ = writeln!(self.out, "}}");
    }

    fn emit_data(&mut self, unit: &Unit, decl: DeclId, init: &[Init]) {
        let d = &unit.decls[decl];
        let addr = d.value.as_ref().expect("data without symbol");
        let size = unit.types[d.ty].size;
        let align = unit.types[d.ty].align;
        let _ = write!(self.out, "data {addr} = align {align} {{ ");
        let mut offset = 0;
        let mut first = true;
        for piece in init {
            if !first {
                let _ = write!(self.out, ", ");
            }
            first = false;
            if piece.start > offset {
                let _ = write!(self.out, "z {}, ", piece.start - offset);
            }
            match &piece.expr.kind {
                ExprKind::String(bytes) => {
                    let n = (bytes.len() as u64).min(piece.end - piece.start);
                    self.write_bytes(&bytes[..n as usize]);
                    offset = piece.start + n;
                }
                ExprKind::Const(c) => {
                    let r = unit.types[piece.expr.ty]
                        .repr
                        .expect("data initializer of unrepresentable type");
                    match c {
                        ConstVal::Int(v) => {
                            let _ = write!(self.out, "{} {}", r.ext_char(), *v as i64);
                        }
                        ConstVal::Float(x) => {
                            let _ = write!(self.out, "{} {x}", r.ext_char());
                        }
                    }
                    offset = piece.end;
                }
                _ => panic!("unsupported data initializer"),
            }
        }
        if offset < size {
            if !first {
                let _ = write!(self.out, ", ");
            }
            let _ = write!(self.out, "z {}", size - offset);
        }
        let _ = writeln!(self.out, " }}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::repr::{I32, I64, IPTR};
    use crate::tree::DeclData;
    use crate::tree::Qual;

    #[test]
    fn inst_text() {
        let mut e = TextEmitter::new();
        let a = Value::int_const(I32, 1);
        let b = Value::int_const(I32, 2);
        let res = Value { kind: ValueKind::Temp(3), repr: I32 };
        e.emit_inst(&Inst {
            op: Opcode::Add,
            res: Some(res),
            args: [Some(a), Some(b)],
        });
        assert_eq!(e.finish(), "\t%.3 =w add 1, 2\n");
    }

    #[test]
    fn store_text() {
        let mut e = TextEmitter::new();
        let v = Value::int_const(I64, 7);
        let addr = Value { kind: ValueKind::Temp(1), repr: IPTR };
        e.emit_inst(&Inst { op: Opcode::Storel, res: None, args: [Some(v), Some(addr)] });
        assert_eq!(e.finish(), "\tstorel 7, %.1\n");
    }

    #[test]
    fn data_with_zero_fill() {
        let mut unit = Unit::new();
        let ty = unit.types.array_of(unit.types.char_id, 4);
        let mut data = DeclData::object(ty, Qual::NONE);
        data.value = Some(unit.new_global("s", false));
        let d = unit.new_decl(data);
        let init = [Init::new(
            0,
            2,
            crate::tree::Expr::new(ExprKind::String(b"hi".to_vec()), ty),
        )];
        let mut e = TextEmitter::new();
        e.emit_data(&unit, d, &init);
        assert_eq!(e.finish(), "data $s = align 1 { b \"hi\", z 2 }\n");
    }

    #[test]
    fn byte_escapes() {
        let mut e = TextEmitter::new();
        e.write_bytes(b"a\"b\n\0");
        assert_eq!(e.finish(), "b \"a\", b 34, b \"b\", b 10, b 0");
    }
}

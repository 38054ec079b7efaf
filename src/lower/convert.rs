//! Scalar conversions.
//!
//! Integer widening picks the extension matching the source signedness;
//! narrowing is a plain copy, with the narrower use masking implicitly.
//! Conversions to `_Bool` reduce to a compare-against-zero. The consumer has
//! no unsigned↔float instructions, so the 64-bit unsigned cases are emulated
//! branch-wise: unsigned→float rounds to odd before halving so the final
//! doubling cannot double-round, and float→unsigned rebases around 2^63.

use crate::ir::entities::TypeId;
use crate::ir::instructions::Opcode;
use crate::ir::repr::{Repr, I32, I64};
use crate::ir::value::Value;
use crate::types::TypeKind;

use super::FuncBuilder;

impl FuncBuilder<'_> {
    /// Convert `l` from type `src` to type `dst`, returning the converted
    /// value, or `None` for conversions to `void`.
    pub fn convert(&mut self, dst: TypeId, src: TypeId, l: Value) -> Option<Value> {
        use Opcode::*;
        let mut src = src;
        let mut dst = dst;
        if self.unit.types[src].kind == TypeKind::Pointer {
            src = self.unit.types.ulong_id;
        }
        if self.unit.types[dst].kind == TypeKind::Pointer {
            dst = self.unit.types.ulong_id;
        }
        if self.unit.types[dst].kind == TypeKind::Void {
            return None;
        }
        if !self.unit.types.props(src).is_real() || !self.unit.types.props(dst).is_real() {
            panic!("unsupported conversion");
        }

        let sd = &self.unit.types[src];
        let (ssize, ssigned, sfloat) = (sd.size, sd.signed, sd.props.is_float());
        let dd = &self.unit.types[dst];
        let (dsize, dsigned, dint) = (dd.size, dd.signed, dd.props.is_int());
        let drepr = dd.repr.expect("conversion to unrepresentable type");
        let srepr = sd.repr.expect("conversion from unrepresentable type");

        if self.unit.types[dst].kind == TypeKind::Bool {
            let mut l = l;
            let (op, zero) = if !sfloat {
                match ssize {
                    1 => l = self.op(Extub, I32, l, None),
                    2 => l = self.op(Extuh, I32, l, None),
                    _ => {}
                }
                (if ssize == 8 { Cnel } else { Cnew }, Value::int_const(srepr, 0))
            } else {
                (if ssize == 8 { Cned } else { Cnes }, Value::float_const(srepr, 0.0))
            };
            return Some(self.op(op, drepr, l, Some(zero)));
        }

        let op = if dint {
            if !sfloat {
                if dsize <= ssize {
                    Copy
                } else {
                    match ssize {
                        4 => {
                            if ssigned {
                                Extsw
                            } else {
                                Extuw
                            }
                        }
                        2 => {
                            if ssigned {
                                Extsh
                            } else {
                                Extuh
                            }
                        }
                        1 => {
                            if ssigned {
                                Extsb
                            } else {
                                Extub
                            }
                        }
                        _ => panic!("unknown int conversion"),
                    }
                }
            } else {
                if !dsigned {
                    return Some(self.float_to_unsigned(drepr, l));
                }
                if ssize == 8 {
                    Dtosi
                } else {
                    Stosi
                }
            }
        } else if !sfloat {
            if !ssigned {
                return Some(self.unsigned_to_float(drepr, l));
            }
            if ssize == 8 {
                Sltof
            } else {
                Swtof
            }
        } else if ssize < dsize {
            Exts
        } else if ssize > dsize {
            Truncd
        } else {
            Copy
        };

        Some(self.op(op, drepr, l, None))
    }

    /// Unsigned integer to float.
    ///
    /// 32-bit sources zero-extend and use the signed conversion. For 64-bit
    /// sources with the high bit set, halve with the low bit folded in
    /// (round to odd), convert, and double.
    pub(crate) fn unsigned_to_float(&mut self, r: Repr, v: Value) -> Value {
        use Opcode::*;
        if v.repr.is_word() {
            let wide = self.op(Extuw, I64, v, None);
            return self.op(Sltof, r, wide, None);
        }

        let small = self.new_block("utof_small");
        let big = self.new_block("utof_big");
        let join = self.new_block("utof_join");
        self.func.blocks[join].phi.blk = [small.into(), big.into()];

        let is_big = self.op(Csltl, I32, v.clone(), Some(Value::int_const(I64, 0)));
        self.func.jnz(is_big, big, small);

        self.func.label(small);
        let direct = self.op(Sltof, r, v.clone(), None);
        self.func.blocks[join].phi.val[0] = Some(direct);
        self.func.jmp(join);

        self.func.label(big);
        let odd = self.op(And, I64, v.clone(), Some(Value::int_const(I64, 1)));
        let half = self.op(Shr, I64, v, Some(Value::int_const(I64, 1)));
        let rounded = self.op(Or, I64, half, Some(odd));
        let cvt = self.op(Sltof, r, rounded, None);
        let doubled = self.op(Add, r, cvt.clone(), Some(cvt));
        self.func.blocks[join].phi.val[1] = Some(doubled);

        self.func.label(join);
        let res = self.func.new_temp(r);
        self.func.blocks[join].phi.res = Some(res.clone());
        res
    }

    /// Float to unsigned integer.
    ///
    /// 32-bit destinations convert through signed 64-bit. For 64-bit
    /// destinations, sources at or above 2^63 are rebased below the signed
    /// range before converting and the sign bit is put back afterwards.
    pub(crate) fn float_to_unsigned(&mut self, r: Repr, v: Value) -> Value {
        use Opcode::*;
        let cvt_op = if v.repr.is_single() { Stosi } else { Dtosi };
        if r.is_word() {
            let wide = self.op(cvt_op, I64, v, None);
            return self.op(Copy, r, wide, None);
        }

        let small = self.new_block("ftou_small");
        let big = self.new_block("ftou_big");
        let join = self.new_block("ftou_join");
        self.func.blocks[join].phi.blk = [small.into(), big.into()];

        let max_flt = Value::float_const(v.repr, (1u64 << 63) as f64);
        let max_int = Value::int_const(I64, 1u64 << 63);

        let cmp = if v.repr.is_single() { Cges } else { Cged };
        let is_big = self.op(cmp, I32, v.clone(), Some(max_flt.clone()));
        self.func.jnz(is_big, big, small);

        self.func.label(small);
        let direct = self.op(cvt_op, r, v.clone(), None);
        self.func.blocks[join].phi.val[0] = Some(direct);
        self.func.jmp(join);

        self.func.label(big);
        let based = self.op(Sub, v.repr, v, Some(max_flt));
        let cvt = self.op(cvt_op, r, based, None);
        let fixed = self.op(Xor, r, cvt, Some(max_int));
        self.func.blocks[join].phi.val[1] = Some(fixed);

        self.func.label(join);
        let res = self.func.new_temp(r);
        self.func.blocks[join].phi.res = Some(res.clone());
        res
    }
}

//! Initializer lowering.
//!
//! An initializer arrives as pieces sorted by start offset. Lowering
//! guarantees every byte of the object is written exactly once per
//! initialization: gaps between pieces, and the tail after the last one,
//! are filled with zero stores whose width grows with the alignment the
//! current offset permits.

use crate::errors::Result;
use crate::ir::entities::DeclId;
use crate::ir::instructions::Opcode;
use crate::ir::repr::{I64, I8, IPTR};
use crate::ir::value::{LValue, Value};
use crate::tree::{ExprKind, Init, Qual};

use super::FuncBuilder;

impl FuncBuilder<'_> {
    /// Allocate `d` and run its initializer.
    ///
    /// With `None` the object is only allocated, like any uninitialized
    /// local. With `Some` the pieces are stored in ascending order and all
    /// remaining bytes zeroed, including everything when the list is empty.
    pub fn init(&mut self, d: DeclId, init: Option<&[Init]>) -> Result<()> {
        self.alloc_decl(d)?;
        let Some(pieces) = init else {
            return Ok(());
        };
        let base = self.unit.decls[d].value.clone().expect("object without storage");
        let ty = self.unit.decls[d].ty;
        let align = self.unit.types[ty].align;
        let size = self.unit.types[ty].size;

        let mut offset = 0;
        let mut max = 0;
        for piece in pieces {
            self.zero(&base, align, offset, piece.start);
            if let ExprKind::String(bytes) = &piece.expr.kind {
                let n = (bytes.len() as u64).min(piece.end - piece.start);
                for (i, &byte) in bytes.iter().take(n as usize).enumerate() {
                    let off = Value::int_const(IPTR, piece.start + i as u64);
                    let addr = self.op(Opcode::Add, IPTR, base.clone(), Some(off));
                    let ch = Value::int_const(I8, byte as u64);
                    let char_id = self.unit.types.char_id;
                    self.store(
                        char_id,
                        Qual::NONE,
                        LValue::with_bits(addr, piece.bits),
                        ch,
                        piece.expr.loc,
                    )?;
                }
                offset = piece.start + n;
            } else {
                // Bit-field pieces only write part of their storage unit,
                // so the unit must be zeroed before the first one lands.
                if offset < piece.end && piece.bits.any() {
                    self.zero(&base, align, offset, piece.end);
                }
                let mut addr = base.clone();
                // The consumer's memory optimizer does not fold `ptr + 0`,
                // so the add is skipped for the leading piece.
                if piece.start > 0 {
                    let off = Value::int_const(IPTR, piece.start);
                    addr = self.op(Opcode::Add, IPTR, addr, Some(off));
                }
                let src = self.expr(&piece.expr)?.expect("initializer with no value");
                self.store(
                    piece.expr.ty,
                    Qual::NONE,
                    LValue::with_bits(addr, piece.bits),
                    src,
                    piece.expr.loc,
                )?;
                offset = piece.end;
            }
            max = max.max(offset);
        }
        self.zero(&base, align, max, size);
        Ok(())
    }

    /// Zero `[offset, end)` relative to `addr` with naturally aligned
    /// stores: width starts at one byte and doubles as the running offset
    /// allows, bounded by the object's alignment.
    fn zero(&mut self, addr: &Value, align: u32, mut offset: u64, end: u64) {
        let zero = Value::int_const(I64, 0);
        let align = (align.max(1) as u64).min(8);
        let mut a = 1u64;
        while offset < end {
            if (align - (offset & (align - 1))) & a != 0 {
                let dst = if offset != 0 {
                    let off = Value::int_const(IPTR, offset);
                    self.op(Opcode::Add, IPTR, addr.clone(), Some(off))
                } else {
                    addr.clone()
                };
                self.func.inst_void(zero_store(a), Some(zero.clone()), Some(dst));
                offset += a;
            }
            if a < align {
                a <<= 1;
            }
        }
    }
}

/// Store opcode used for a zero run of the given width.
fn zero_store(width: u64) -> Opcode {
    match width {
        1 => Opcode::Storeb,
        2 => Opcode::Storeh,
        4 => Opcode::Storew,
        8 => Opcode::Storel,
        _ => panic!("invalid zero width {width}"),
    }
}

//! Machine representations of SSA values.
//!
//! The consumer's value universe is small: a value lives in a 32-bit word
//! register (`w`), a 64-bit long register (`l`), or a single/double float
//! register (`s`/`d`). Memory operations additionally distinguish the store
//! width of sub-word integers (`b`/`h`). A [`Repr`] pairs the register class
//! with the storage width; the seven constants below are the only values the
//! lowering core ever produces.

use core::fmt;

/// Register class and storage width of an SSA value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Repr {
    /// Value class: `b'w'`, `b'l'`, `b's'`, or `b'd'`.
    pub base: u8,
    /// Storage width for memory operations: `b'b'`, `b'h'`, or `base`.
    pub ext: u8,
}

/// 1-byte integer held in a word register.
pub const I8: Repr = Repr { base: b'w', ext: b'b' };
/// 2-byte integer held in a word register.
pub const I16: Repr = Repr { base: b'w', ext: b'h' };
/// 32-bit integer.
pub const I32: Repr = Repr { base: b'w', ext: b'w' };
/// 64-bit integer.
pub const I64: Repr = Repr { base: b'l', ext: b'l' };
/// 32-bit float.
pub const F32: Repr = Repr { base: b's', ext: b's' };
/// 64-bit float.
pub const F64: Repr = Repr { base: b'd', ext: b'd' };
/// Pointer; the target's pointers are 64-bit integers.
pub const IPTR: Repr = Repr { base: b'l', ext: b'l' };

impl Repr {
    /// True if the value class is the 32-bit word register.
    pub fn is_word(self) -> bool {
        self.base == b'w'
    }

    /// True if the value class is a float register.
    pub fn is_float(self) -> bool {
        self.base == b's' || self.base == b'd'
    }

    /// True if the value class is the single-precision float register.
    pub fn is_single(self) -> bool {
        self.base == b's'
    }

    /// The class token as printed before an instruction result.
    pub fn base_char(self) -> char {
        self.base as char
    }

    /// The width token as printed in memory operations and data directives.
    pub fn ext_char(self) -> char {
        self.ext as char
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.base_char())
    }
}

impl fmt::Debug for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.base_char(), self.ext_char())
    }
}

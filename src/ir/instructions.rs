//! Instruction kinds, instructions, and block terminators.
//!
//! The opcode table is the fixed, platform-neutral instruction set the IR
//! consumer understands; the lowering core selects from it and never invents
//! new kinds. Each opcode carries its textual mnemonic, which is all the
//! serializer needs besides the operands.

use core::fmt;

use crate::ir::entities::Block;
use crate::ir::value::Value;

/// An instruction kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[allow(missing_docs)]
pub enum Opcode {
    // Arithmetic and bitwise.
    Add,
    Sub,
    Mul,
    Div,
    Udiv,
    Rem,
    Urem,
    And,
    Or,
    Xor,
    Shl,
    Sar,
    Shr,

    // Comparisons, by operand class and width. Results are word-sized.
    Ceqw,
    Ceql,
    Ceqs,
    Ceqd,
    Cnew,
    Cnel,
    Cnes,
    Cned,
    Cslew,
    Csltw,
    Csgew,
    Csgtw,
    Culew,
    Cultw,
    Cugew,
    Cugtw,
    Cslel,
    Csltl,
    Csgel,
    Csgtl,
    Culel,
    Cultl,
    Cugel,
    Cugtl,
    Cles,
    Clts,
    Cges,
    Cgts,
    Cled,
    Cltd,
    Cged,
    Cgtd,

    // Memory.
    Storeb,
    Storeh,
    Storew,
    Storel,
    Stores,
    Stored,
    Loadsb,
    Loadub,
    Loadsh,
    Loaduh,
    Loadsw,
    Loaduw,
    Loadl,
    Loads,
    Loadd,

    // Integer extensions.
    Extsb,
    Extub,
    Extsh,
    Extuh,
    Extsw,
    Extuw,

    // Float conversions.
    Exts,
    Truncd,
    Stosi,
    Dtosi,
    Swtof,
    Sltof,

    Copy,

    // Stack allocation, prepended to the entry block.
    Alloc4,
    Alloc8,
    Alloc16,

    // Calls and variadic support. Arguments attach through `Arg`
    // instructions following their call in the stream.
    Call,
    Vacall,
    Arg,
    Vastart,
    Vaarg,
}

impl Opcode {
    /// Textual mnemonic understood by the consumer.
    pub fn name(self) -> &'static str {
        use self::Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Udiv => "udiv",
            Rem => "rem",
            Urem => "urem",
            And => "and",
            Or => "or",
            Xor => "xor",
            Shl => "shl",
            Sar => "sar",
            Shr => "shr",
            Ceqw => "ceqw",
            Ceql => "ceql",
            Ceqs => "ceqs",
            Ceqd => "ceqd",
            Cnew => "cnew",
            Cnel => "cnel",
            Cnes => "cnes",
            Cned => "cned",
            Cslew => "cslew",
            Csltw => "csltw",
            Csgew => "csgew",
            Csgtw => "csgtw",
            Culew => "culew",
            Cultw => "cultw",
            Cugew => "cugew",
            Cugtw => "cugtw",
            Cslel => "cslel",
            Csltl => "csltl",
            Csgel => "csgel",
            Csgtl => "csgtl",
            Culel => "culel",
            Cultl => "cultl",
            Cugel => "cugel",
            Cugtl => "cugtl",
            Cles => "cles",
            Clts => "clts",
            Cges => "cges",
            Cgts => "cgts",
            Cled => "cled",
            Cltd => "cltd",
            Cged => "cged",
            Cgtd => "cgtd",
            Storeb => "storeb",
            Storeh => "storeh",
            Storew => "storew",
            Storel => "storel",
            Stores => "stores",
            Stored => "stored",
            Loadsb => "loadsb",
            Loadub => "loadub",
            Loadsh => "loadsh",
            Loaduh => "loaduh",
            Loadsw => "loadsw",
            Loaduw => "loaduw",
            Loadl => "loadl",
            Loads => "loads",
            Loadd => "loadd",
            Extsb => "extsb",
            Extub => "extub",
            Extsh => "extsh",
            Extuh => "extuh",
            Extsw => "extsw",
            Extuw => "extuw",
            Exts => "exts",
            Truncd => "truncd",
            Stosi => "stosi",
            Dtosi => "dtosi",
            Swtof => "swtof",
            Sltof => "sltof",
            Copy => "copy",
            Alloc4 => "alloc4",
            Alloc8 => "alloc8",
            Alloc16 => "alloc16",
            Call => "call",
            Vacall => "call",
            Arg => "arg",
            Vastart => "vastart",
            Vaarg => "vaarg",
        }
    }

    /// True for plain and variadic calls.
    pub fn is_call(self) -> bool {
        matches!(self, Self::Call | Self::Vacall)
    }

    /// True for the store family; stores never produce a result.
    pub fn is_store(self) -> bool {
        matches!(
            self,
            Self::Storeb | Self::Storeh | Self::Storew | Self::Storel | Self::Stores | Self::Stored
        )
    }

    /// True for stack allocations, which live in the entry block.
    pub fn is_alloc(self) -> bool {
        matches!(self, Self::Alloc4 | Self::Alloc8 | Self::Alloc16)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A three-address instruction: `res = op arg0, arg1`.
///
/// `res` is present iff the instruction produces a value; each temporary is
/// the result of exactly one instruction. Unused operand slots are `None`.
#[derive(Clone, Debug)]
pub struct Inst {
    /// Instruction kind.
    pub op: Opcode,
    /// Result temporary, if the instruction produces one.
    pub res: Option<Value>,
    /// Operands; single-operand instructions leave `args[1]` empty.
    pub args: [Option<Value>; 2],
}

/// Block terminator.
///
/// `None` appears only while a block is still under construction; emitted
/// functions have a real terminator on every reachable block.
#[derive(Clone, Debug, Default)]
pub enum Jump {
    /// Block is still open.
    #[default]
    None,
    /// Unconditional jump.
    Jmp(Block),
    /// Branch on a word-sized condition: non-zero to the first target.
    Jnz(Value, Block, Block),
    /// Function return, with the returned value if any.
    Ret(Option<Value>),
}

impl Jump {
    /// True once a terminator has been set.
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::None)
    }
}

//! Diagnostics for malformed input.
//!
//! Only user errors surface as [`Error`]; they abort the current translation
//! unit. Violated internal invariants (unreachable kind dispatch, impossible
//! widths, a temporary without a representation) panic instead, since they
//! indicate a bug in the front end or in the lowering core itself.

use thiserror::Error;

use crate::tree::SourceLoc;

/// A user-level translation error with its source location.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Two `case` labels of one `switch` have the same value.
    #[error("{loc}: multiple 'case' labels with same value")]
    DuplicateCase {
        /// Location of the second label.
        loc: SourceLoc,
    },

    /// Stores through `volatile` lvalues are not supported yet.
    #[error("{loc}: volatile store is not yet supported")]
    VolatileStore {
        /// Location of the store.
        loc: SourceLoc,
    },

    /// The target of a store is `const`-qualified.
    #[error("{loc}: cannot store to 'const' object")]
    ConstStore {
        /// Location of the store.
        loc: SourceLoc,
    },

    /// A function definition has an unnamed parameter.
    #[error("{loc}: parameter name omitted in definition of function '{func}'")]
    UnnamedParam {
        /// Location of the definition.
        loc: SourceLoc,
        /// Name of the function being defined.
        func: String,
    },

    /// An identifier that names neither an object nor a function was used
    /// where storage is required.
    #[error("{loc}: identifier is not an object or function")]
    IdentNotObject {
        /// Location of the use.
        loc: SourceLoc,
    },

    /// An expression with no storage was used as an lvalue.
    #[error("{loc}: expression is not an object")]
    NotAnObject {
        /// Location of the expression.
        loc: SourceLoc,
    },

    /// `va_arg` with an aggregate type is not supported yet.
    #[error("{loc}: va_arg with non-scalar type is not yet supported")]
    NonScalarVaArg {
        /// Location of the call.
        loc: SourceLoc,
    },

    /// An explicit alignment is weaker than the type requires.
    #[error("{loc}: object requires alignment {required}, which is stricter than {given}")]
    AlignTooSmall {
        /// Location of the declaration.
        loc: SourceLoc,
        /// The type's natural alignment.
        required: u32,
        /// The alignment the declaration asked for.
        given: u32,
    },
}

/// Result of a lowering operation.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_location() {
        let e = Error::DuplicateCase { loc: SourceLoc::new(0x10) };
        assert_eq!(e.to_string(), "@0010: multiple 'case' labels with same value");
        let e = Error::UnnamedParam { loc: SourceLoc::default(), func: "main".into() };
        assert!(e.to_string().contains("'main'"));
    }
}

//! C type descriptors and their machine lowering.
//!
//! Each type carries its size, alignment, property bits, and the machine
//! representation its scalar values use. The target is fixed at compile
//! time: an LP64 machine with 64-bit pointers, so `long` and pointers share
//! the 64-bit integer repr.

use cranelift_entity::PrimaryMap;
use core::ops::Index;

use crate::ir::entities::TypeId;
use crate::ir::repr::{self, Repr};
use crate::ir::value::{Bitfield, Value};
use crate::tree::Qual;

/// Classification bits of a type.
///
/// `REAL` covers every arithmetic type (integers and floats); `SCALAR` adds
/// pointers. Aggregates and `void` carry no bits.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Props {
    bits: u8,
}

impl Props {
    const INT: u8 = 1;
    const FLOAT: u8 = 2;
    const REAL: u8 = 4;
    const SCALAR: u8 = 8;

    /// Properties of an integer type.
    pub fn int() -> Self {
        Self { bits: Self::INT | Self::REAL | Self::SCALAR }
    }

    /// Properties of a floating type.
    pub fn float() -> Self {
        Self { bits: Self::FLOAT | Self::REAL | Self::SCALAR }
    }

    /// Properties of a pointer type.
    pub fn pointer() -> Self {
        Self { bits: Self::SCALAR }
    }

    /// True for integer types.
    pub fn is_int(self) -> bool {
        self.bits & Self::INT != 0
    }

    /// True for floating types.
    pub fn is_float(self) -> bool {
        self.bits & Self::FLOAT != 0
    }

    /// True for arithmetic types.
    pub fn is_real(self) -> bool {
        self.bits & Self::REAL != 0
    }

    /// True for arithmetic and pointer types.
    pub fn is_scalar(self) -> bool {
        self.bits & Self::SCALAR != 0
    }
}

/// The kind of a C type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypeKind {
    /// `void`
    Void,
    /// `_Bool`; conversions to it reduce to a compare-against-zero.
    Bool,
    /// Character, integer, or floating type.
    Basic,
    /// Object or function pointer.
    Pointer,
    /// Array of a known length.
    Array,
    /// Structure.
    Struct,
    /// Union.
    Union,
    /// Function type.
    Func,
}

/// A named member of a struct or union.
#[derive(Clone, Debug)]
pub struct Member {
    /// Member name.
    pub name: String,
    /// Member type.
    pub ty: TypeId,
    /// Byte offset of the containing storage unit.
    pub offset: u64,
    /// Bit extent for bit-field members.
    pub bits: Bitfield,
}

/// A formal parameter of a function type.
#[derive(Clone, Debug)]
pub struct Param {
    /// Parameter name; `None` in abstract declarators, which is an error in
    /// a definition.
    pub name: Option<String>,
    /// Declared type.
    pub ty: TypeId,
    /// Declared qualifiers.
    pub qual: Qual,
}

/// Call interface of a function type.
#[derive(Clone, Debug)]
pub struct FuncInfo {
    /// Formal parameters.
    pub params: Vec<Param>,
    /// True for `...` functions.
    pub variadic: bool,
    /// False for old-style definitions, whose parameters undergo the
    /// default argument promotions.
    pub prototype: bool,
}

/// One C type.
#[derive(Clone, Debug)]
pub struct TypeData {
    /// Kind of type.
    pub kind: TypeKind,
    /// Size in bytes; 0 only for `void` and function types.
    pub size: u64,
    /// Natural alignment in bytes.
    pub align: u32,
    /// Classification bits.
    pub props: Props,
    /// Machine representation of scalar values; `None` for `void`,
    /// aggregates, and function types, which never live in a register.
    pub repr: Option<Repr>,
    /// Signedness, for integer types.
    pub signed: bool,
    /// Pointee, element, or return type.
    pub base: Option<TypeId>,
    /// Element count of an array type.
    pub array_len: u64,
    /// Members of a struct or union type.
    pub members: Vec<Member>,
    /// Struct or union tag, when one was written.
    pub tag: Option<String>,
    /// Call interface of a function type.
    pub func: Option<FuncInfo>,
    /// Token under which the aggregate has been declared to the sink;
    /// filled in by [`Unit::declare_type`](crate::Unit::declare_type).
    pub value: Option<Value>,
}

impl TypeData {
    fn scalar(kind: TypeKind, size: u64, props: Props, repr: Repr, signed: bool) -> Self {
        Self {
            kind,
            size,
            align: size as u32,
            props,
            repr: Some(repr),
            signed,
            base: None,
            array_len: 0,
            members: Vec::new(),
            tag: None,
            func: None,
            value: None,
        }
    }
}

/// The translation unit's type table.
///
/// Every well-known basic type is interned up front; derived types are added
/// as the front end builds declarations. All queries go through [`TypeId`].
pub struct Types {
    map: PrimaryMap<TypeId, TypeData>,
    /// `void`
    pub void_id: TypeId,
    /// `_Bool`
    pub bool_id: TypeId,
    /// `char` (signed on this target)
    pub char_id: TypeId,
    /// `signed char`
    pub schar_id: TypeId,
    /// `unsigned char`
    pub uchar_id: TypeId,
    /// `short`
    pub short_id: TypeId,
    /// `unsigned short`
    pub ushort_id: TypeId,
    /// `int`
    pub int_id: TypeId,
    /// `unsigned int`
    pub uint_id: TypeId,
    /// `long`
    pub long_id: TypeId,
    /// `unsigned long`; pointers convert through this type.
    pub ulong_id: TypeId,
    /// `long long`
    pub llong_id: TypeId,
    /// `unsigned long long`
    pub ullong_id: TypeId,
    /// `float`
    pub float_id: TypeId,
    /// `double`
    pub double_id: TypeId,
}

impl Types {
    /// Intern the basic types of the target.
    pub fn new() -> Self {
        let mut map = PrimaryMap::new();
        fn int(size: u64, signed: bool, r: Repr) -> TypeData {
            TypeData::scalar(TypeKind::Basic, size, Props::int(), r, signed)
        }
        let void_id = map.push(TypeData {
            kind: TypeKind::Void,
            size: 0,
            align: 0,
            props: Props::default(),
            repr: None,
            signed: false,
            base: None,
            array_len: 0,
            members: Vec::new(),
            tag: None,
            func: None,
            value: None,
        });
        let bool_id = map.push(TypeData::scalar(TypeKind::Bool, 1, Props::int(), repr::I8, false));
        let char_id = map.push(int(1, true, repr::I8));
        let schar_id = map.push(int(1, true, repr::I8));
        let uchar_id = map.push(int(1, false, repr::I8));
        let short_id = map.push(int(2, true, repr::I16));
        let ushort_id = map.push(int(2, false, repr::I16));
        let int_id = map.push(int(4, true, repr::I32));
        let uint_id = map.push(int(4, false, repr::I32));
        let long_id = map.push(int(8, true, repr::I64));
        let ulong_id = map.push(int(8, false, repr::I64));
        let llong_id = map.push(int(8, true, repr::I64));
        let ullong_id = map.push(int(8, false, repr::I64));
        let float_id =
            map.push(TypeData::scalar(TypeKind::Basic, 4, Props::float(), repr::F32, true));
        let double_id =
            map.push(TypeData::scalar(TypeKind::Basic, 8, Props::float(), repr::F64, true));
        Self {
            map,
            void_id,
            bool_id,
            char_id,
            schar_id,
            uchar_id,
            short_id,
            ushort_id,
            int_id,
            uint_id,
            long_id,
            ulong_id,
            llong_id,
            ullong_id,
            float_id,
            double_id,
        }
    }

    /// Add an arbitrary type descriptor.
    pub fn push(&mut self, data: TypeData) -> TypeId {
        self.map.push(data)
    }

    /// Pointer to `base`.
    pub fn pointer_to(&mut self, base: TypeId) -> TypeId {
        self.map.push(TypeData {
            kind: TypeKind::Pointer,
            size: 8,
            align: 8,
            props: Props::pointer(),
            repr: Some(repr::IPTR),
            signed: false,
            base: Some(base),
            array_len: 0,
            members: Vec::new(),
            tag: None,
            func: None,
            value: None,
        })
    }

    /// Array of `len` elements of `elem`.
    pub fn array_of(&mut self, elem: TypeId, len: u64) -> TypeId {
        let ed = &self.map[elem];
        let (esize, ealign) = (ed.size, ed.align);
        self.map.push(TypeData {
            kind: TypeKind::Array,
            size: esize * len,
            align: ealign,
            props: Props::default(),
            repr: None,
            signed: false,
            base: Some(elem),
            array_len: len,
            members: Vec::new(),
            tag: None,
            func: None,
            value: None,
        })
    }

    /// A struct type with naturally laid out members.
    pub fn struct_type(&mut self, tag: Option<&str>, fields: &[(&str, TypeId)]) -> TypeId {
        let mut members = Vec::with_capacity(fields.len());
        let mut offset = 0u64;
        let mut align = 1u32;
        for (name, ty) in fields {
            let fd = &self.map[*ty];
            let fa = fd.align.max(1) as u64;
            offset = (offset + fa - 1) & !(fa - 1);
            members.push(Member {
                name: (*name).to_string(),
                ty: *ty,
                offset,
                bits: Bitfield::default(),
            });
            offset += fd.size;
            align = align.max(fd.align);
        }
        let size = (offset + align as u64 - 1) & !(align as u64 - 1);
        self.aggregate(TypeKind::Struct, tag, members, size, align)
    }

    /// A union type; every member starts at offset 0.
    pub fn union_type(&mut self, tag: Option<&str>, fields: &[(&str, TypeId)]) -> TypeId {
        let mut members = Vec::with_capacity(fields.len());
        let mut size = 0u64;
        let mut align = 1u32;
        for (name, ty) in fields {
            let fd = &self.map[*ty];
            members.push(Member {
                name: (*name).to_string(),
                ty: *ty,
                offset: 0,
                bits: Bitfield::default(),
            });
            size = size.max(fd.size);
            align = align.max(fd.align);
        }
        let size = (size + align as u64 - 1) & !(align as u64 - 1);
        self.aggregate(TypeKind::Union, tag, members, size, align)
    }

    /// An aggregate with explicit layout, for bit-fields and packing the
    /// front end computed itself.
    pub fn aggregate(
        &mut self,
        kind: TypeKind,
        tag: Option<&str>,
        members: Vec<Member>,
        size: u64,
        align: u32,
    ) -> TypeId {
        debug_assert!(matches!(kind, TypeKind::Struct | TypeKind::Union));
        self.map.push(TypeData {
            kind,
            size,
            align,
            props: Props::default(),
            repr: None,
            signed: false,
            base: None,
            array_len: 0,
            members,
            tag: tag.map(str::to_string),
            func: None,
            value: None,
        })
    }

    /// A function type.
    pub fn func_type(
        &mut self,
        ret: TypeId,
        params: Vec<Param>,
        variadic: bool,
        prototype: bool,
    ) -> TypeId {
        self.map.push(TypeData {
            kind: TypeKind::Func,
            size: 0,
            align: 0,
            props: Props::default(),
            repr: None,
            signed: false,
            base: Some(ret),
            array_len: 0,
            members: Vec::new(),
            tag: None,
            func: Some(FuncInfo { params, variadic, prototype }),
            value: None,
        })
    }

    /// Machine repr of a scalar type.
    pub fn repr(&self, ty: TypeId) -> Option<Repr> {
        self.map[ty].repr
    }

    /// Classification bits.
    pub fn props(&self, ty: TypeId) -> Props {
        self.map[ty].props
    }

    /// True for signed integer types.
    pub fn is_signed(&self, ty: TypeId) -> bool {
        self.map[ty].signed
    }

    /// True for struct, union, and array types, which are handled by
    /// address rather than by value.
    pub fn is_aggregate(&self, ty: TypeId) -> bool {
        matches!(self.map[ty].kind, TypeKind::Struct | TypeKind::Union | TypeKind::Array)
    }

    /// Repr a value of this type occupies when moved through a register:
    /// the scalar repr, or the pointer repr for aggregates passed by
    /// address. `None` for `void`.
    pub fn value_repr(&self, ty: TypeId) -> Option<Repr> {
        match self.map[ty].kind {
            TypeKind::Void => None,
            TypeKind::Struct | TypeKind::Union | TypeKind::Array => Some(repr::IPTR),
            _ => self.map[ty].repr,
        }
    }

    /// Default argument promotion: integer types narrower than `int`
    /// promote to `int`, `float` promotes to `double`.
    pub fn promote(&self, ty: TypeId) -> TypeId {
        let d = &self.map[ty];
        if d.props.is_int() && d.size < 4 {
            self.int_id
        } else if ty == self.float_id {
            self.double_id
        } else {
            ty
        }
    }
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<TypeId> for Types {
    type Output = TypeData;

    fn index(&self, ty: TypeId) -> &TypeData {
        &self.map[ty]
    }
}

impl Types {
    /// Mutable access to one descriptor.
    pub fn get_mut(&mut self, ty: TypeId) -> &mut TypeData {
        &mut self.map[ty]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::repr::{F64, I16, I32, I64, I8, IPTR};

    #[test]
    fn basic_lowering() {
        let t = Types::new();
        assert_eq!(t.repr(t.char_id), Some(I8));
        assert_eq!(t.repr(t.short_id), Some(I16));
        assert_eq!(t.repr(t.int_id), Some(I32));
        assert_eq!(t.repr(t.long_id), Some(I64));
        assert_eq!(t.repr(t.double_id), Some(F64));
        assert_eq!(t[t.long_id].size, 8);
        assert!(t.is_signed(t.char_id));
        assert!(!t.is_signed(t.uint_id));
        assert!(t.props(t.float_id).is_float());
        assert!(!t.props(t.float_id).is_int());
        assert!(t.props(t.int_id).is_real());
    }

    #[test]
    fn pointers_are_unsigned_words() {
        let mut t = Types::new();
        let p = t.pointer_to(t.int_id);
        assert_eq!(t.repr(p), Some(IPTR));
        assert!(t.props(p).is_scalar());
        assert!(!t.props(p).is_real());
        assert_eq!(t[p].size, 8);
    }

    #[test]
    fn aggregates_have_no_scalar_repr() {
        let mut t = Types::new();
        let a = t.array_of(t.int_id, 3);
        assert_eq!(t.repr(a), None);
        assert_eq!(t.value_repr(a), Some(IPTR));
        assert_eq!(t[a].size, 12);
        let s = t.struct_type(Some("pair"), &[("a", t.char_id), ("b", t.int_id)]);
        assert_eq!(t[s].size, 8);
        assert_eq!(t[s].align, 4);
        assert_eq!(t[s].members[1].offset, 4);
        let u = t.union_type(None, &[("i", t.long_id), ("c", t.char_id)]);
        assert_eq!(t[u].size, 8);
    }

    #[test]
    fn promotions() {
        let t = Types::new();
        assert_eq!(t.promote(t.char_id), t.int_id);
        assert_eq!(t.promote(t.ushort_id), t.int_id);
        assert_eq!(t.promote(t.bool_id), t.int_id);
        assert_eq!(t.promote(t.uint_id), t.uint_id);
        assert_eq!(t.promote(t.float_id), t.double_id);
        assert_eq!(t.promote(t.double_id), t.double_id);
        assert_eq!(t.promote(t.long_id), t.long_id);
    }
}

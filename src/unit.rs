//! Translation-unit context.
//!
//! A [`Unit`] owns everything that outlives a single function: the type
//! table, declaration records, interned string literals, and the counters
//! that keep generated names unique. Functions borrow it mutably while they
//! are built; globals created here stay valid for the unit's lifetime.

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::emit::Emitter;
use crate::ir::entities::{DeclId, TempId, TypeId};
use crate::ir::repr::IPTR;
use crate::ir::value::{Name, Value, ValueKind};
use crate::tree::{DeclData, Decls, Expr, ExprKind, Init};
use crate::types::{TypeKind, Types};

/// State shared by every function of one translation unit.
pub struct Unit {
    /// Type table.
    pub types: Types,
    /// Declaration records.
    pub decls: Decls,
    /// Interned string literals, shared between identical spellings.
    strings: FxHashMap<Vec<u8>, DeclId>,
    /// Allocator for compiler-generated expression slots.
    temp_slots: PrimaryMap<TempId, ()>,
    next_global: u64,
    next_block: u64,
    next_type: u64,
}

impl Unit {
    /// An empty unit with the target's basic types interned.
    pub fn new() -> Self {
        Self {
            types: Types::new(),
            decls: PrimaryMap::new(),
            strings: FxHashMap::default(),
            temp_slots: PrimaryMap::new(),
            next_global: 0,
            next_block: 0,
            next_type: 0,
        }
    }

    /// Add a declaration record.
    pub fn new_decl(&mut self, data: DeclData) -> DeclId {
        self.decls.push(data)
    }

    /// Mint an expression slot for the front end's desugarings.
    pub fn new_temp_slot(&mut self) -> TempId {
        self.temp_slots.push(())
    }

    /// The address value of a global symbol.
    ///
    /// `private` symbols get a unit-unique id so the serializer can produce
    /// a distinct local name; external symbols print verbatim.
    pub fn new_global(&mut self, name: &str, private: bool) -> Value {
        let id = if private {
            self.next_global += 1;
            self.next_global
        } else {
            0
        };
        Value { kind: ValueKind::Global(Name { base: name.into(), id }), repr: IPTR }
    }

    /// A fresh, unit-unique block label.
    pub(crate) fn new_block_name(&mut self, base: impl Into<std::rc::Rc<str>>) -> Name {
        self.next_block += 1;
        Name::private(base, self.next_block)
    }

    /// Declare an aggregate type to the sink, once per unit.
    ///
    /// Member types are declared first so the sink can print the members by
    /// token. Non-aggregate types need no declaration; the result token is
    /// cached on the descriptor.
    pub fn declare_type(&mut self, sink: &mut dyn Emitter, ty: TypeId) {
        match self.types[ty].kind {
            TypeKind::Array => {
                let elem = self.types[ty].base.expect("array without element type");
                self.declare_type(sink, elem);
            }
            TypeKind::Struct | TypeKind::Union => {
                if self.types[ty].value.is_some() {
                    return;
                }
                let member_types: SmallVec<[TypeId; 8]> =
                    self.types[ty].members.iter().map(|m| m.ty).collect();
                for mt in member_types {
                    self.declare_type(sink, mt);
                }
                self.next_type += 1;
                let base: &str = self.types[ty].tag.as_deref().unwrap_or("type");
                let token = Value {
                    kind: ValueKind::Type(Name::private(base.to_string(), self.next_type)),
                    repr: IPTR,
                };
                self.types.get_mut(ty).value = Some(token);
                sink.emit_type(self, ty);
            }
            _ => {}
        }
    }

    /// The declaration backing a string literal, creating and emitting it on
    /// first use. Identical literals share one private global.
    pub fn string_decl(&mut self, sink: &mut dyn Emitter, bytes: &[u8]) -> DeclId {
        if let Some(&d) = self.strings.get(bytes) {
            return d;
        }
        let ty = self.types.array_of(self.types.char_id, bytes.len() as u64);
        let value = self.new_global("string", true);
        let mut data = DeclData::object(ty, crate::tree::Qual::NONE);
        data.value = Some(value);
        let d = self.decls.push(data);
        self.strings.insert(bytes.to_vec(), d);
        let init = [Init::new(
            0,
            bytes.len() as u64,
            Expr::new(ExprKind::String(bytes.to_vec()), ty),
        )];
        sink.emit_data(self, d, &init);
        d
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::new()
    }
}

//! Interned, canonicalizing type storage.
//!
//! # Architecture
//!
//! Every type is a [`TypeData`] node interned into the [`Pool`] and named by
//! an [`Idx`]. Structurally equal nodes intern to the same `Idx`, so type
//! equality is integer equality.
//!
//! Each node records its canonical form at interning time: the same node
//! with every name alias replaced by its underlying type. Because the
//! canonical form is itself interned, two types are semantically equal iff
//! their canonical `Idx` values are equal. This is what makes
//! `(canonical type, protocol)` a sound cache key for conformance.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tern_ir::Name;

use crate::{ArchetypeId, DeclId, GenericParamListId, TypeFlags};

/// Handle to an interned type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    pub const ERROR: Idx = Idx(0);
    /// The empty tuple `()`.
    pub const UNIT: Idx = Idx(1);
    pub const INT1: Idx = Idx(2);
    pub const INT64: Idx = Idx(3);
    pub const FLOAT64: Idx = Idx(4);
    pub const RAW_POINTER: Idx = Idx(5);
    pub const OBJECT_POINTER: Idx = Idx(6);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Idx(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        self.0 == Self::ERROR.0
    }
}

/// One element of a tuple type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TupleElt {
    pub label: Option<Name>,
    pub ty: Idx,
}

impl TupleElt {
    pub fn unlabeled(ty: Idx) -> Self {
        TupleElt { label: None, ty }
    }

    pub fn labeled(label: Name, ty: Idx) -> Self {
        TupleElt {
            label: Some(label),
            ty,
        }
    }
}

/// Structure of an interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    /// Result of a failed resolution. Matches nothing.
    Error,
    BuiltinInteger {
        bits: u16,
    },
    BuiltinFloat {
        bits: u16,
    },
    RawPointer,
    /// Strong reference to a reference-counted heap object.
    ObjectPointer,
    Tuple(Box<[TupleElt]>),
    Function {
        input: Idx,
        result: Idx,
    },
    PolymorphicFunction {
        input: Idx,
        result: Idx,
        generics: GenericParamListId,
    },
    Metatype(Idx),
    /// Struct, class or oneof type, unapplied.
    Nominal(DeclId),
    /// Protocol used as a type (an existential).
    Protocol(DeclId),
    /// Generic nominal type applied to arguments.
    BoundGeneric {
        decl: DeclId,
        args: Box<[Idx]>,
    },
    Archetype(ArchetypeId),
    ProtocolComposition(Box<[Idx]>),
    /// Addressable storage holding a value of the object type.
    LValue(Idx),
    /// Sugar: a reference to a type alias. Canonicalizes to `underlying`.
    NameAlias {
        decl: DeclId,
        underlying: Idx,
    },
}

struct TypeItem {
    data: TypeData,
    canonical: Idx,
    flags: TypeFlags,
}

/// Type interner.
pub struct Pool {
    items: Vec<TypeItem>,
    dedup: FxHashMap<TypeData, Idx>,
}

impl Pool {
    pub fn new() -> Self {
        let mut pool = Pool {
            items: Vec::with_capacity(64),
            dedup: FxHashMap::default(),
        };
        let fixed = [
            (Idx::ERROR, TypeData::Error),
            (Idx::UNIT, TypeData::Tuple(Box::new([]))),
            (Idx::INT1, TypeData::BuiltinInteger { bits: 1 }),
            (Idx::INT64, TypeData::BuiltinInteger { bits: 64 }),
            (Idx::FLOAT64, TypeData::BuiltinFloat { bits: 64 }),
            (Idx::RAW_POINTER, TypeData::RawPointer),
            (Idx::OBJECT_POINTER, TypeData::ObjectPointer),
        ];
        for (expected, data) in fixed {
            let idx = pool.intern(data);
            debug_assert_eq!(idx, expected, "pre-interned type landed in the wrong slot");
        }
        pool
    }

    /// Intern `data`, returning the existing handle if already present.
    pub fn intern(&mut self, data: TypeData) -> Idx {
        if let Some(&idx) = self.dedup.get(&data) {
            return idx;
        }

        let flags = self.compute_flags(&data);
        let canonical = if flags.contains(TypeFlags::HAS_SUGAR) {
            Some(self.canonicalize(&data))
        } else {
            None
        };

        let idx = Idx(u32::try_from(self.items.len())
            .unwrap_or_else(|_| panic!("type pool exceeded u32::MAX entries")));
        self.items.push(TypeItem {
            data: data.clone(),
            canonical: canonical.unwrap_or(idx),
            flags,
        });
        self.dedup.insert(data, idx);
        idx
    }

    #[inline]
    pub fn data(&self, idx: Idx) -> &TypeData {
        &self.items[idx.index()].data
    }

    #[inline]
    pub fn flags(&self, idx: Idx) -> TypeFlags {
        self.items[idx.index()].flags
    }

    /// Canonical form of `idx`. Idempotent.
    #[inline]
    pub fn canonical(&self, idx: Idx) -> Idx {
        self.items[idx.index()].canonical
    }

    #[inline]
    pub fn is_canonical(&self, idx: Idx) -> bool {
        self.canonical(idx) == idx
    }

    /// Semantic type equality: equal canonical forms.
    #[inline]
    pub fn is_equal(&self, a: Idx, b: Idx) -> bool {
        self.canonical(a) == self.canonical(b)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // ── Constructors ────────────────────────────────────────────────

    pub fn builtin_integer(&mut self, bits: u16) -> Idx {
        self.intern(TypeData::BuiltinInteger { bits })
    }

    pub fn builtin_float(&mut self, bits: u16) -> Idx {
        self.intern(TypeData::BuiltinFloat { bits })
    }

    pub fn tuple(&mut self, elts: &[TupleElt]) -> Idx {
        self.intern(TypeData::Tuple(elts.into()))
    }

    /// Tuple with no labels.
    pub fn tuple_of(&mut self, tys: &[Idx]) -> Idx {
        let elts: Vec<TupleElt> = tys.iter().copied().map(TupleElt::unlabeled).collect();
        self.intern(TypeData::Tuple(elts.into_boxed_slice()))
    }

    pub fn function(&mut self, input: Idx, result: Idx) -> Idx {
        self.intern(TypeData::Function { input, result })
    }

    pub fn polymorphic_function(
        &mut self,
        input: Idx,
        result: Idx,
        generics: GenericParamListId,
    ) -> Idx {
        self.intern(TypeData::PolymorphicFunction {
            input,
            result,
            generics,
        })
    }

    pub fn metatype(&mut self, instance: Idx) -> Idx {
        self.intern(TypeData::Metatype(instance))
    }

    pub fn lvalue(&mut self, object: Idx) -> Idx {
        self.intern(TypeData::LValue(object))
    }

    pub fn archetype(&mut self, id: ArchetypeId) -> Idx {
        self.intern(TypeData::Archetype(id))
    }

    pub fn bound_generic(&mut self, decl: DeclId, args: &[Idx]) -> Idx {
        self.intern(TypeData::BoundGeneric {
            decl,
            args: args.into(),
        })
    }

    pub fn protocol_composition(&mut self, protocols: &[Idx]) -> Idx {
        self.intern(TypeData::ProtocolComposition(protocols.into()))
    }

    pub fn name_alias(&mut self, decl: DeclId, underlying: Idx) -> Idx {
        self.intern(TypeData::NameAlias { decl, underlying })
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Look through name aliases.
    pub fn desugar(&self, mut idx: Idx) -> Idx {
        while let TypeData::NameAlias { underlying, .. } = self.data(idx) {
            idx = *underlying;
        }
        idx
    }

    pub fn as_archetype(&self, idx: Idx) -> Option<ArchetypeId> {
        match self.data(self.desugar(idx)) {
            TypeData::Archetype(id) => Some(*id),
            _ => None,
        }
    }

    /// `(input, result)` of a function or polymorphic function type.
    pub fn as_function(&self, idx: Idx) -> Option<(Idx, Idx)> {
        match self.data(self.desugar(idx)) {
            TypeData::Function { input, result }
            | TypeData::PolymorphicFunction { input, result, .. } => Some((*input, *result)),
            _ => None,
        }
    }

    pub fn is_lvalue(&self, idx: Idx) -> bool {
        matches!(self.data(self.desugar(idx)), TypeData::LValue(_))
    }

    /// Strip one level of l-value qualification.
    pub fn rvalue(&self, idx: Idx) -> Idx {
        match self.data(self.desugar(idx)) {
            TypeData::LValue(object) => *object,
            _ => idx,
        }
    }

    pub fn is_builtin_integer(&self, idx: Idx) -> bool {
        matches!(
            self.data(self.desugar(idx)),
            TypeData::BuiltinInteger { .. }
        )
    }

    /// Whether `idx` is a protocol or protocol composition.
    pub fn is_existential(&self, idx: Idx) -> bool {
        self.flags(idx).contains(TypeFlags::IS_EXISTENTIAL)
    }

    /// Protocols an existential type is composed of, flattening nested
    /// compositions. Empty for non-existential types.
    pub fn existential_protocols(&self, idx: Idx) -> SmallVec<[DeclId; 4]> {
        let mut out = SmallVec::new();
        self.collect_protocols(idx, &mut out);
        out
    }

    fn collect_protocols(&self, idx: Idx, out: &mut SmallVec<[DeclId; 4]>) {
        match self.data(self.desugar(idx)) {
            TypeData::Protocol(decl) => {
                if !out.contains(decl) {
                    out.push(*decl);
                }
            }
            TypeData::ProtocolComposition(members) => {
                for &member in members.iter() {
                    self.collect_protocols(member, out);
                }
            }
            _ => {}
        }
    }

    /// Components of a compound type, in order.
    pub fn children(&self, idx: Idx) -> SmallVec<[Idx; 4]> {
        match self.data(idx) {
            TypeData::Tuple(elts) => elts.iter().map(|e| e.ty).collect(),
            TypeData::Function { input, result }
            | TypeData::PolymorphicFunction { input, result, .. } => {
                smallvec::smallvec![*input, *result]
            }
            TypeData::Metatype(inner) | TypeData::LValue(inner) => smallvec::smallvec![*inner],
            TypeData::BoundGeneric { args, .. } => args.iter().copied().collect(),
            TypeData::ProtocolComposition(members) => members.iter().copied().collect(),
            TypeData::NameAlias { underlying, .. } => smallvec::smallvec![*underlying],
            TypeData::Error
            | TypeData::BuiltinInteger { .. }
            | TypeData::BuiltinFloat { .. }
            | TypeData::RawPointer
            | TypeData::ObjectPointer
            | TypeData::Nominal(_)
            | TypeData::Protocol(_)
            | TypeData::Archetype(_) => SmallVec::new(),
        }
    }

    /// Strip tuple labels everywhere in `idx`.
    pub fn unlabeled(&mut self, idx: Idx) -> Idx {
        let data = self.data(idx).clone();
        match data {
            TypeData::Tuple(elts) => {
                let stripped: Vec<TupleElt> = elts
                    .iter()
                    .map(|e| TupleElt::unlabeled(self.unlabeled(e.ty)))
                    .collect();
                if stripped.as_slice() == &*elts {
                    return idx;
                }
                self.intern(TypeData::Tuple(stripped.into_boxed_slice()))
            }
            TypeData::Function { input, result } => {
                let (i, r) = (self.unlabeled(input), self.unlabeled(result));
                if (i, r) == (input, result) {
                    return idx;
                }
                self.function(i, r)
            }
            TypeData::PolymorphicFunction {
                input,
                result,
                generics,
            } => {
                let (i, r) = (self.unlabeled(input), self.unlabeled(result));
                if (i, r) == (input, result) {
                    return idx;
                }
                self.polymorphic_function(i, r, generics)
            }
            TypeData::LValue(object) => {
                let o = self.unlabeled(object);
                if o == object {
                    return idx;
                }
                self.lvalue(o)
            }
            TypeData::Metatype(instance) => {
                let i = self.unlabeled(instance);
                if i == instance {
                    return idx;
                }
                self.metatype(i)
            }
            TypeData::NameAlias { underlying, .. } => {
                let u = self.unlabeled(underlying);
                if u == underlying {
                    return idx;
                }
                u
            }
            _ => idx,
        }
    }

    // ── Interning internals ─────────────────────────────────────────

    fn compute_flags(&self, data: &TypeData) -> TypeFlags {
        let mut flags = TypeFlags::empty();
        let absorb = |flags: &mut TypeFlags, child: Idx| {
            *flags |= self.flags(child).propagated();
        };
        match data {
            TypeData::Error => flags |= TypeFlags::HAS_ERROR,
            TypeData::BuiltinInteger { .. }
            | TypeData::BuiltinFloat { .. }
            | TypeData::RawPointer
            | TypeData::ObjectPointer => flags |= TypeFlags::IS_BUILTIN,
            TypeData::Tuple(elts) => {
                for elt in elts.iter() {
                    absorb(&mut flags, elt.ty);
                }
            }
            TypeData::Function { input, result }
            | TypeData::PolymorphicFunction { input, result, .. } => {
                flags |= TypeFlags::IS_FUNCTION;
                absorb(&mut flags, *input);
                absorb(&mut flags, *result);
            }
            TypeData::Metatype(inner) => absorb(&mut flags, *inner),
            TypeData::LValue(inner) => {
                flags |= TypeFlags::HAS_LVALUE;
                absorb(&mut flags, *inner);
            }
            TypeData::Nominal(_) => {}
            TypeData::Protocol(_) => flags |= TypeFlags::IS_EXISTENTIAL,
            TypeData::BoundGeneric { args, .. } => {
                for &arg in args.iter() {
                    absorb(&mut flags, arg);
                }
            }
            TypeData::Archetype(_) => flags |= TypeFlags::HAS_ARCHETYPE,
            TypeData::ProtocolComposition(members) => {
                flags |= TypeFlags::IS_EXISTENTIAL;
                for &member in members.iter() {
                    absorb(&mut flags, member);
                }
            }
            TypeData::NameAlias { underlying, .. } => {
                flags |= TypeFlags::HAS_SUGAR;
                let inner = self.flags(*underlying);
                flags |= inner.propagated();
                flags |= inner & (TypeFlags::IS_EXISTENTIAL | TypeFlags::IS_FUNCTION | TypeFlags::IS_BUILTIN);
            }
        }
        flags
    }

    /// Intern the sugar-free version of `data`.
    fn canonicalize(&mut self, data: &TypeData) -> Idx {
        let canon = |pool: &Self, idx: Idx| pool.canonical(idx);
        let stripped = match data {
            TypeData::NameAlias { underlying, .. } => return self.canonical(*underlying),
            TypeData::Tuple(elts) => TypeData::Tuple(
                elts.iter()
                    .map(|e| TupleElt {
                        label: e.label,
                        ty: canon(self, e.ty),
                    })
                    .collect(),
            ),
            TypeData::Function { input, result } => TypeData::Function {
                input: canon(self, *input),
                result: canon(self, *result),
            },
            TypeData::PolymorphicFunction {
                input,
                result,
                generics,
            } => TypeData::PolymorphicFunction {
                input: canon(self, *input),
                result: canon(self, *result),
                generics: *generics,
            },
            TypeData::Metatype(inner) => TypeData::Metatype(canon(self, *inner)),
            TypeData::LValue(inner) => TypeData::LValue(canon(self, *inner)),
            TypeData::BoundGeneric { decl, args } => TypeData::BoundGeneric {
                decl: *decl,
                args: args.iter().map(|&a| canon(self, a)).collect(),
            },
            TypeData::ProtocolComposition(members) => {
                TypeData::ProtocolComposition(members.iter().map(|&m| canon(self, m)).collect())
            }
            TypeData::Error
            | TypeData::BuiltinInteger { .. }
            | TypeData::BuiltinFloat { .. }
            | TypeData::RawPointer
            | TypeData::ObjectPointer
            | TypeData::Nominal(_)
            | TypeData::Protocol(_)
            | TypeData::Archetype(_) => data.clone(),
        };
        self.intern(stripped)
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

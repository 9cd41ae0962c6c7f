//! The arena that owns every declaration, type and archetype of a
//! compilation.
//!
//! All cross references are handles into this context, so declaration
//! graphs with parent/child cycles (a nominal type and its members, a
//! protocol and its `This` archetype) need no shared ownership.

mod build;
mod display;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tern_ir::{Name, SharedInterner, StringInterner};

use crate::{
    Archetype, ArchetypeId, Decl, DeclContext, DeclId, GenericParamList, GenericParamListId, Idx,
    ModuleScope, NominalKind, Pool, TypeData, ValueDecl, ValueKind,
};

pub use build::GenericParamSpec;

/// Owner of all AST-level data for one compilation.
pub struct AstContext {
    interner: SharedInterner,
    pool: Pool,
    decls: Vec<Decl>,
    archetypes: Vec<Archetype>,
    generics: Vec<GenericParamList>,
    module: ModuleScope,
    /// Extensions by the nominal declaration they extend.
    extensions: FxHashMap<DeclId, Vec<DeclId>>,
    this_name: Name,
}

impl AstContext {
    pub fn new(interner: SharedInterner) -> Self {
        let this_name = interner.intern("This");
        AstContext {
            interner,
            pool: Pool::new(),
            decls: Vec::new(),
            archetypes: Vec::new(),
            generics: Vec::new(),
            module: ModuleScope::default(),
            extensions: FxHashMap::default(),
            this_name,
        }
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn shared_interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Intern an identifier.
    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// The implicit `This` associated type name.
    pub fn this_name(&self) -> Name {
        self.this_name
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        &mut self.pool
    }

    // ── Arena access ────────────────────────────────────────────────

    #[inline]
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    /// The value declaration behind `id`.
    ///
    /// # Panics
    /// Panics if `id` is not a value declaration.
    #[inline]
    pub fn value(&self, id: DeclId) -> &ValueDecl {
        match self.decl(id).as_value() {
            Some(value) => value,
            None => panic!("{id:?} is not a value declaration"),
        }
    }

    #[inline]
    pub fn archetype(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.index()]
    }

    #[inline]
    pub fn generic_param_list(&self, id: GenericParamListId) -> &GenericParamList {
        &self.generics[id.index()]
    }

    pub fn module(&self) -> &ModuleScope {
        &self.module
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    /// Extensions of the nominal declaration `nominal`, in declaration order.
    pub fn extensions_of(&self, nominal: DeclId) -> &[DeclId] {
        self.extensions.get(&nominal).map_or(&[], Vec::as_slice)
    }

    /// The scope `context` names; the module scope for `None`.
    pub fn decl_context(&self, context: Option<DeclId>) -> Option<&dyn DeclContext> {
        match context {
            None => Some(&self.module),
            Some(id) => self.decl(id).as_context(),
        }
    }

    /// Whether `decl` is declared directly inside a type or extension.
    pub fn is_in_type_context(&self, decl: DeclId) -> bool {
        self.decl_context(self.decl(decl).context)
            .is_some_and(DeclContext::is_type_context)
    }

    // ── Nominal and protocol queries ────────────────────────────────

    /// Nominal declaration behind a nominal, protocol or bound-generic type.
    pub fn nominal_decl_of(&self, ty: Idx) -> Option<DeclId> {
        match self.pool.data(self.pool.desugar(ty)) {
            TypeData::Nominal(decl) | TypeData::Protocol(decl) => Some(*decl),
            TypeData::BoundGeneric { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn is_protocol(&self, decl: DeclId) -> bool {
        self.decl(decl).as_protocol().is_some()
    }

    /// The implicit `This` type alias of a protocol.
    pub fn protocol_this(&self, proto: DeclId) -> Option<DeclId> {
        let nominal = self.decl(proto).as_protocol()?;
        nominal.members.iter().copied().find(|&member| {
            matches!(
                self.decl(member).as_value(),
                Some(ValueDecl { name, kind: ValueKind::TypeAlias { .. }, .. }) if *name == self.this_name
            )
        })
    }

    /// The archetype a protocol's `This` stands for.
    pub fn protocol_this_archetype(&self, proto: DeclId) -> Option<ArchetypeId> {
        let this = self.protocol_this(proto)?;
        match &self.value(this).kind {
            ValueKind::TypeAlias { underlying, .. } => self.pool.as_archetype(*underlying),
            _ => None,
        }
    }

    /// Protocols named directly in `proto`'s inheritance clause.
    pub fn inherited_protocols(&self, proto: DeclId) -> SmallVec<[DeclId; 4]> {
        let mut out = SmallVec::new();
        if let Some(nominal) = self.decl(proto).as_protocol() {
            for &inherited in &nominal.inherited {
                for p in self.pool.existential_protocols(inherited) {
                    if !out.contains(&p) {
                        out.push(p);
                    }
                }
            }
        }
        out
    }

    /// Whether `proto` transitively inherits from `target`.
    ///
    /// Terminates on cyclic inheritance.
    pub fn inherits_from(&self, proto: DeclId, target: DeclId) -> bool {
        let mut visited = FxHashSet::default();
        let mut stack: SmallVec<[DeclId; 4]> = self.inherited_protocols(proto);
        while let Some(next) = stack.pop() {
            if next == target {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.inherited_protocols(next));
            }
        }
        false
    }

    /// `proto == target || proto inherits target`.
    pub fn is_or_inherits(&self, proto: DeclId, target: DeclId) -> bool {
        proto == target || self.inherits_from(proto, target)
    }

    /// Base class of a class declaration.
    pub fn superclass(&self, class: DeclId) -> Option<Idx> {
        let nominal = self.decl(class).as_nominal()?;
        if nominal.kind != NominalKind::Class {
            return None;
        }
        nominal
            .inherited
            .iter()
            .copied()
            .find(|&ty| self.nominal_decl_of(ty).is_some() && !self.pool.is_existential(ty))
    }

    /// Whether `name` spells an operator.
    pub fn is_operator_name(&self, name: Name) -> bool {
        let text = self.interner.lookup(name);
        !text.is_empty()
            && text
                .chars()
                .all(|c| !(c.is_alphanumeric() || c == '_' || c == '$'))
    }

    /// The type a member has when used through an instance.
    ///
    /// A function declared in a type context has a curried type taking the
    /// instance first; its usage type is the curried result. Labels are
    /// stripped. `None` if the declaration has no type yet.
    pub fn instance_usage_type(&mut self, decl: DeclId) -> Option<Idx> {
        let value = self.value(decl);
        let ty = value.ty()?;
        let is_func = matches!(value.kind, ValueKind::Func { .. });
        let usage = if is_func && self.is_in_type_context(decl) {
            self.pool.as_function(ty).map_or(ty, |(_, result)| result)
        } else {
            ty
        };
        Some(self.pool.unlabeled(usage))
    }

    /// `T` for `T.metatype`, else `ty` itself.
    pub fn metatype_instance(&self, ty: Idx) -> Idx {
        match self.pool.data(self.pool.desugar(ty)) {
            TypeData::Metatype(instance) => *instance,
            _ => ty,
        }
    }

    /// The type a type declaration introduces.
    pub fn declared_type(&self, decl: DeclId) -> Option<Idx> {
        match &self.value(decl).kind {
            ValueKind::Nominal(nominal) => Some(nominal.declared_type),
            ValueKind::TypeAlias { .. } => self.value(decl).ty().map(|t| self.metatype_instance(t)),
            _ => None,
        }
    }
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new(SharedInterner::new())
    }
}

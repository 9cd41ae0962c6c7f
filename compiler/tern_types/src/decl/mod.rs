//! Declarations.
//!
//! A closed sum type per level: [`DeclKind`] distinguishes the broad kinds,
//! [`ValueKind`] the named value declarations, [`NominalKind`] the nominal
//! types. Declarations that are also scopes implement [`DeclContext`].

use std::cell::OnceCell;

use smallvec::SmallVec;
use tern_ir::{Name, Span};

use crate::{DeclId, GenericParamListId, Idx};

/// A declaration in the arena.
#[derive(Clone, Debug)]
pub struct Decl {
    pub kind: DeclKind,
    /// Enclosing declaration; `None` for module scope. Not an owning edge.
    pub context: Option<DeclId>,
    pub span: Span,
    pub invalid: bool,
}

#[derive(Clone, Debug)]
pub enum DeclKind {
    Import { path: SmallVec<[Name; 2]> },
    Extension(ExtensionDecl),
    /// `var a, b = ...`: the variables it introduces.
    PatternBinding { vars: SmallVec<[DeclId; 2]> },
    TopLevelCode,
    Value(ValueDecl),
}

/// A named declaration with a (set-once) type.
#[derive(Clone, Debug)]
pub struct ValueDecl {
    pub name: Name,
    pub kind: ValueKind,
    ty: OnceCell<Idx>,
}

#[derive(Clone, Debug)]
pub enum ValueKind {
    /// Type alias. Inside a protocol this is an associated type whose
    /// underlying type is one of the protocol's archetypes.
    TypeAlias {
        underlying: Idx,
        /// Protocols the aliased type must conform to (associated types only).
        inherited: SmallVec<[Idx; 2]>,
    },
    Nominal(NominalDecl),
    Var {
        is_static: bool,
        settable: bool,
    },
    Func {
        is_static: bool,
    },
    OneOfElement,
    Subscript {
        settable: bool,
    },
    Constructor,
    Destructor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NominalKind {
    OneOf,
    Struct,
    Class,
    Protocol,
}

/// Struct, class, oneof or protocol. Also a scope.
#[derive(Clone, Debug)]
pub struct NominalDecl {
    pub kind: NominalKind,
    pub members: Vec<DeclId>,
    /// Inheritance clause: protocols, plus a base class for classes.
    pub inherited: SmallVec<[Idx; 2]>,
    /// The type this declaration introduces.
    pub declared_type: Idx,
    pub generics: Option<GenericParamListId>,
}

/// `extension T : P, Q { ... }`.
#[derive(Clone, Debug)]
pub struct ExtensionDecl {
    pub extended: Idx,
    pub inherited: SmallVec<[Idx; 2]>,
    pub members: Vec<DeclId>,
}

/// Declarations that introduce a scope holding member declarations.
pub trait DeclContext {
    fn members(&self) -> &[DeclId];

    /// Whether members of this scope are members of a type.
    fn is_type_context(&self) -> bool;

    /// The type `This` refers to inside the scope, if any.
    fn declared_type_of_context(&self) -> Option<Idx>;

    fn generic_params(&self) -> Option<GenericParamListId> {
        None
    }
}

impl DeclContext for NominalDecl {
    fn members(&self) -> &[DeclId] {
        &self.members
    }

    fn is_type_context(&self) -> bool {
        true
    }

    fn declared_type_of_context(&self) -> Option<Idx> {
        Some(self.declared_type)
    }

    fn generic_params(&self) -> Option<GenericParamListId> {
        self.generics
    }
}

impl DeclContext for ExtensionDecl {
    fn members(&self) -> &[DeclId] {
        &self.members
    }

    fn is_type_context(&self) -> bool {
        true
    }

    fn declared_type_of_context(&self) -> Option<Idx> {
        Some(self.extended)
    }
}

/// The top-level scope of the module being compiled.
#[derive(Clone, Debug, Default)]
pub struct ModuleScope {
    pub name: Name,
    pub decls: Vec<DeclId>,
}

impl DeclContext for ModuleScope {
    fn members(&self) -> &[DeclId] {
        &self.decls
    }

    fn is_type_context(&self) -> bool {
        false
    }

    fn declared_type_of_context(&self) -> Option<Idx> {
        None
    }
}

impl ValueDecl {
    pub fn new(name: Name, kind: ValueKind) -> Self {
        ValueDecl {
            name,
            kind,
            ty: OnceCell::new(),
        }
    }

    /// The type assigned by type checking, if any yet.
    pub fn ty(&self) -> Option<Idx> {
        self.ty.get().copied()
    }

    pub fn has_type(&self) -> bool {
        self.ty.get().is_some()
    }

    /// Assign the declaration's type.
    ///
    /// # Panics
    /// Panics if a type was already assigned. A value declaration has
    /// exactly one type for its whole lifetime.
    pub fn set_type(&self, ty: Idx) {
        if let Err(existing) = self.ty.set(ty) {
            panic!(
                "type of `{:?}` assigned twice (already {existing:?}, new {ty:?})",
                self.name
            );
        }
    }

    pub fn is_type_decl(&self) -> bool {
        matches!(self.kind, ValueKind::TypeAlias { .. } | ValueKind::Nominal(_))
    }

    pub fn is_static(&self) -> bool {
        match self.kind {
            ValueKind::Func { is_static } | ValueKind::Var { is_static, .. } => is_static,
            _ => false,
        }
    }

    /// Discriminant-level kind comparison used by witness matching.
    pub fn same_kind(&self, other: &ValueDecl) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }

    pub fn as_nominal(&self) -> Option<&NominalDecl> {
        match &self.kind {
            ValueKind::Nominal(nominal) => Some(nominal),
            _ => None,
        }
    }
}

impl Decl {
    pub fn as_value(&self) -> Option<&ValueDecl> {
        match &self.kind {
            DeclKind::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_nominal(&self) -> Option<&NominalDecl> {
        self.as_value().and_then(ValueDecl::as_nominal)
    }

    pub fn as_protocol(&self) -> Option<&NominalDecl> {
        self.as_nominal()
            .filter(|nominal| nominal.kind == NominalKind::Protocol)
    }

    pub fn as_extension(&self) -> Option<&ExtensionDecl> {
        match &self.kind {
            DeclKind::Extension(ext) => Some(ext),
            _ => None,
        }
    }

    /// The scope this declaration introduces, if it is one.
    pub fn as_context(&self) -> Option<&dyn DeclContext> {
        match &self.kind {
            DeclKind::Extension(ext) => Some(ext),
            DeclKind::Value(ValueDecl {
                kind: ValueKind::Nominal(nominal),
                ..
            }) => Some(nominal),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<Name> {
        self.as_value().map(|v| v.name)
    }
}

#[cfg(test)]
mod tests;

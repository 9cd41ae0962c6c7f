//! Generic parameter lists, requirements and archetypes.

use smallvec::SmallVec;
use tern_ir::{Name, Span};

use crate::{ArchetypeId, DeclId, GenericParamListId, Idx};

/// Who introduced an archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchetypeOwner {
    /// A generic parameter (or a nested type of one).
    Generics(GenericParamListId),
    /// A protocol's `This` or one of its associated types.
    Protocol(DeclId),
}

/// Abstract stand-in for a generic parameter or associated type.
#[derive(Clone, Debug)]
pub struct Archetype {
    pub name: Name,
    /// For nested archetypes (`T.Element`), the archetype they hang off.
    pub parent: Option<ArchetypeId>,
    /// Protocols any replacement must conform to.
    pub conforms_to: SmallVec<[DeclId; 2]>,
    /// Nested archetypes by name, in declaration order.
    pub nested: Vec<(Name, ArchetypeId)>,
    pub owner: ArchetypeOwner,
    /// Position among the owning list's parameters, for primary archetypes.
    pub primary_index: Option<u32>,
    /// The interned `Archetype` type for this archetype.
    pub ty: Idx,
}

impl Archetype {
    pub fn is_primary(&self) -> bool {
        self.primary_index.is_some()
    }

    pub fn nested_type(&self, name: Name) -> Option<ArchetypeId> {
        self.nested
            .iter()
            .find_map(|&(n, id)| (n == name).then_some(id))
    }
}

/// A single generic parameter: a type alias whose underlying type is the
/// parameter's archetype.
#[derive(Clone, Copy, Debug)]
pub struct GenericParam {
    pub name: Name,
    pub decl: DeclId,
    pub archetype: ArchetypeId,
}

/// Constraint attached to a generic parameter list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// `subject : constraint`, where `constraint` is a protocol or composition.
    Conformance {
        subject: Idx,
        constraint: Idx,
        span: Span,
    },
    /// `first == second`.
    SameType { first: Idx, second: Idx, span: Span },
}

/// Ordered generic parameters plus their requirements.
#[derive(Clone, Debug)]
pub struct GenericParamList {
    pub params: Vec<GenericParam>,
    pub requirements: Vec<Requirement>,
    /// All archetypes derived from the parameters: primary archetypes first,
    /// in parameter order, then nested archetypes.
    pub archetypes: Vec<ArchetypeId>,
    /// Enclosing list for nested generic contexts.
    pub outer: Option<GenericParamListId>,
    pub span: Span,
}

impl GenericParamList {
    pub fn primary_archetypes(&self) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.params.iter().map(|p| p.archetype)
    }
}

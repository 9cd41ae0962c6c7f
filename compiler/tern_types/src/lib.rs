//! Declarations, types and protocol conformance for Tern.
//!
//! Everything lives in an [`AstContext`]: declarations, archetypes and
//! generic parameter lists in index arenas, types in an interning [`Pool`].
//! Cross references are handles, never owning pointers.
//!
//! On top of the model sit the pieces the conformance checker needs:
//! [`NameLookup`] (with the module-backed [`ModuleLookup`]), archetype
//! substitution ([`subst_type`]), the [`ConformanceChecker`] itself, and the
//! witness table layout derived from a protocol ([`ProtocolInfo`]).

mod conformance;
mod context;
mod decl;
mod flags;
mod generics;
mod ids;
mod lookup;
mod pool;
mod subst;
mod witness_table;

#[cfg(test)]
mod test_helpers;

pub use conformance::{
    CacheLookup, ConformanceCache, ConformanceChecker, ConformanceKey, ConformanceMap, ConformsTo,
    ProtocolConformance, SubstitutionFailure,
};
pub use context::{AstContext, GenericParamSpec};
pub use decl::{
    Decl, DeclContext, DeclKind, ExtensionDecl, ModuleScope, NominalDecl, NominalKind, ValueDecl,
    ValueKind,
};
pub use flags::TypeFlags;
pub use generics::{Archetype, ArchetypeOwner, GenericParam, GenericParamList, Requirement};
pub use ids::{ArchetypeId, ConformanceId, DeclId, GenericParamListId};
pub use lookup::{
    MemberLookupKind, MemberLookupResult, MemberResults, ModuleLookup, NameLookup,
    UnqualifiedLookupKind, UnqualifiedLookupResult, UnqualifiedResults,
};
pub use pool::{Idx, Pool, TupleElt, TypeData};
pub use subst::{subst_member_type_with_base, subst_type, SubstitutionMap};
pub use witness_table::{
    ProtocolInfo, ProtocolInfoCache, WitnessIndex, WitnessTableEntry, NUM_VALUE_WITNESSES,
};

// Handles are passed by value everywhere; keep them word-sized.
const _: () = assert!(std::mem::size_of::<Idx>() == 4);
const _: () = assert!(std::mem::size_of::<DeclId>() == 4);
const _: () = assert!(std::mem::size_of::<Option<ArchetypeId>>() == 8);

//! Arena handles.
//!
//! Declarations, archetypes and generic parameter lists live in vectors owned
//! by [`AstContext`](crate::AstContext); everything else refers to them through
//! these 32-bit indices. Handles from different contexts must not be mixed.

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Handle for the next slot of an arena holding `len` entries.
            #[inline]
            pub(crate) fn next(len: usize) -> Self {
                Self(u32::try_from(len).unwrap_or_else(|_| {
                    panic!(concat!($what, " arena exceeded u32::MAX entries"))
                }))
            }
        }
    };
}

arena_id!(
    /// Handle to a [`Decl`](crate::Decl).
    DeclId,
    "declaration"
);
arena_id!(
    /// Handle to an [`Archetype`](crate::Archetype).
    ArchetypeId,
    "archetype"
);
arena_id!(
    /// Handle to a [`GenericParamList`](crate::GenericParamList).
    GenericParamListId,
    "generic parameter list"
);
arena_id!(
    /// Handle to a [`ProtocolConformance`](crate::ProtocolConformance) stored
    /// in a [`ConformanceCache`](crate::ConformanceCache).
    ConformanceId,
    "conformance"
);

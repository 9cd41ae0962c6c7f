//! Per-type property flags computed once at interning time.

use bitflags::bitflags;

bitflags! {
    /// Structural facts about a type, propagated from its components.
    ///
    /// Used to skip substitution on archetype-free types and to answer
    /// "is this canonical?" without walking the type.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeFlags: u16 {
        /// Mentions an archetype somewhere.
        const HAS_ARCHETYPE = 1 << 0;
        /// Mentions an l-value type somewhere.
        const HAS_LVALUE = 1 << 1;
        /// Mentions the error type somewhere.
        const HAS_ERROR = 1 << 2;
        /// Contains sugar (a name alias), so it is not its own canonical form.
        const HAS_SUGAR = 1 << 3;

        /// Protocol or protocol composition.
        const IS_EXISTENTIAL = 1 << 8;
        /// Function or polymorphic function.
        const IS_FUNCTION = 1 << 9;
        /// Builtin scalar or pointer.
        const IS_BUILTIN = 1 << 10;
    }
}

impl TypeFlags {
    /// Flags that a compound type inherits from its components.
    pub const PROPAGATED: TypeFlags = TypeFlags::HAS_ARCHETYPE
        .union(TypeFlags::HAS_LVALUE)
        .union(TypeFlags::HAS_ERROR)
        .union(TypeFlags::HAS_SUGAR);

    #[inline]
    pub fn propagated(self) -> TypeFlags {
        self & Self::PROPAGATED
    }
}

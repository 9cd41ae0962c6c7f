//! Shared leaf types for the Tern compiler.
//!
//! Every other crate in the workspace refers to identifiers through [`Name`]
//! (a 32-bit handle into a [`StringInterner`]) and to source positions through
//! [`Span`]. Neither type owns anything, so both are `Copy` and can be stored
//! freely inside arena-allocated declarations, types and IR nodes.

mod interner;
mod name;
mod span;

pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use name::Name;
pub use span::Span;

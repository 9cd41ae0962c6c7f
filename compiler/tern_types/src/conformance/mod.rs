//! Protocol conformance.
//!
//! # Architecture
//!
//! [`ConformanceChecker`] answers "does type `T` conform to protocol `P`?"
//! and, for nominal types, builds the [`ProtocolConformance`] witnessing it.
//! Results are memoized in a [`ConformanceCache`] owned by the caller and
//! threaded into every checker, keyed by `(canonical T, P)`.
//!
//! The cache has three states per key. `InProgress` is written before a
//! check starts and is what makes mutually inheriting protocols terminate:
//! a query that reaches a key already in progress fails instead of
//! recursing. Finished checks, failed ones included, stay cached for the
//! lifetime of the cache, so a failure is diagnosed once.

mod checker;
mod substitutions;

use rustc_hash::FxHashMap;

use crate::{ArchetypeId, ConformanceId, DeclId, Idx};

pub use checker::ConformanceChecker;
pub use substitutions::{ConformanceMap, SubstitutionFailure};

/// How a successful conformance was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConformsTo {
    /// Archetype or existential whose requirements already include the
    /// protocol. Nothing is recorded.
    Structural,
    /// Nominal conformance with recorded witnesses.
    Witnessed(ConformanceId),
}

impl ConformsTo {
    pub fn conformance(self) -> Option<ConformanceId> {
        match self {
            ConformsTo::Structural => None,
            ConformsTo::Witnessed(id) => Some(id),
        }
    }
}

/// Proof that a concrete type satisfies a protocol.
///
/// Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtocolConformance {
    /// Protocol requirement → declaration satisfying it.
    pub mapping: FxHashMap<DeclId, DeclId>,
    /// Protocol archetype (`This` and associated types) → concrete type.
    pub type_mapping: FxHashMap<ArchetypeId, Idx>,
    /// Directly inherited protocol → its conformance.
    pub inherited_mapping: FxHashMap<DeclId, ConformsTo>,
}

impl ProtocolConformance {
    pub fn witness(&self, requirement: DeclId) -> Option<DeclId> {
        self.mapping.get(&requirement).copied()
    }

    pub fn type_witness(&self, archetype: ArchetypeId) -> Option<Idx> {
        self.type_mapping.get(&archetype).copied()
    }
}

/// Cache key: canonical type and protocol.
pub type ConformanceKey = (Idx, DeclId);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CacheEntry {
    InProgress,
    Computed(Option<ConformanceId>),
}

/// Result of probing the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    NotComputed,
    /// A check for this key is on the stack.
    InProgress,
    /// Finished; `None` records a failure.
    Computed(Option<ConformanceId>),
}

/// Memo table and arena for conformances.
#[derive(Debug, Default)]
pub struct ConformanceCache {
    entries: FxHashMap<ConformanceKey, CacheEntry>,
    conformances: Vec<ProtocolConformance>,
}

impl ConformanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: ConformanceKey) -> CacheLookup {
        match self.entries.get(&key) {
            None => CacheLookup::NotComputed,
            Some(CacheEntry::InProgress) => CacheLookup::InProgress,
            Some(CacheEntry::Computed(result)) => CacheLookup::Computed(*result),
        }
    }

    pub fn get(&self, id: ConformanceId) -> &ProtocolConformance {
        &self.conformances[id.index()]
    }

    /// Number of successful conformances stored.
    pub fn len(&self) -> usize {
        self.conformances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformances.is_empty()
    }

    fn begin(&mut self, key: ConformanceKey) {
        let previous = self.entries.insert(key, CacheEntry::InProgress);
        debug_assert!(previous.is_none(), "conformance check restarted for {key:?}");
    }

    fn finish(&mut self, key: ConformanceKey, result: Option<ProtocolConformance>) -> Option<ConformanceId> {
        let id = result.map(|conformance| {
            let id = ConformanceId::next(self.conformances.len());
            self.conformances.push(conformance);
            id
        });
        self.entries.insert(key, CacheEntry::Computed(id));
        id
    }
}

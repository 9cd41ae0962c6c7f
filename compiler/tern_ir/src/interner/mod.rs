//! String interner for identifiers.
//!
//! Interning happens through `&self` so that the declaration arena, the
//! name-lookup collaborator and the IR builders can all hold a shared
//! reference to one interner. Strings are leaked on insertion and live for
//! the rest of the process, which matches the arena lifetime of everything
//! that refers to them.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::Name;

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternError {
    /// More distinct strings than a `u32` index can address.
    #[error("string interner exceeded capacity at {count} entries (max {max})", max = u32::MAX)]
    Overflow { count: usize },
}

#[derive(Default)]
struct InternTable {
    map: FxHashMap<&'static str, Name>,
    strings: Vec<&'static str>,
}

impl InternTable {
    fn insert(&mut self, s: &'static str) -> Result<Name, InternError> {
        let raw = u32::try_from(self.strings.len()).map_err(|_| InternError::Overflow {
            count: self.strings.len(),
        })?;
        let name = Name::from_raw(raw);
        self.strings.push(s);
        self.map.insert(s, name);
        Ok(name)
    }
}

/// Identifier interner.
///
/// `Name::EMPTY` always maps to `""`. A handful of names the checker and the
/// ARC pass look for are interned up front so their handles are stable across
/// interners.
pub struct StringInterner {
    table: RwLock<InternTable>,
}

/// Identifiers interned at construction, in this order.
const PRE_INTERNED: &[&str] = &[
    "",
    "This",
    "init",
    "destructor",
    "subscript",
    "get",
    "set",
    "tern_retain",
    "tern_retain_noresult",
    "tern_release",
    "tern_alloc_object",
    "tern_retain_and_return_three",
    "objc_retain",
    "objc_release",
];

impl StringInterner {
    pub fn new() -> Self {
        let mut table = InternTable::default();
        for s in PRE_INTERNED {
            // A fresh table cannot overflow on a fixed list of entries.
            if table.insert(s).is_err() {
                unreachable!("pre-interned identifier table overflowed");
            }
        }
        StringInterner {
            table: RwLock::new(table),
        }
    }

    /// Intern `s`, returning an error if the table is full.
    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        if let Some(&name) = self.table.read().map.get(s) {
            return Ok(name);
        }

        let mut table = self.table.write();
        // Another handle may have inserted between the two lock acquisitions.
        if let Some(&name) = table.map.get(s) {
            return Ok(name);
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        table.insert(leaked)
    }

    /// Intern `s`.
    ///
    /// # Panics
    /// Panics if the interner is full. Use [`try_intern`](Self::try_intern)
    /// to handle that case.
    pub fn intern(&self, s: &str) -> Name {
        self.try_intern(s).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Look up the string for a name produced by this interner.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.table.read().strings[name.index()]
    }

    /// Number of interned strings, including the empty string.
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Whether nothing beyond the pre-interned identifiers was added.
    pub fn is_empty(&self) -> bool {
        self.len() <= PRE_INTERNED.len()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to interned strings.
///
/// Printers and diagnostics accept any implementor so they don't need to
/// know whether they were handed a bare or a shared interner.
pub trait StringLookup {
    fn lookup(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn lookup(&self, name: Name) -> &str {
        StringInterner::lookup(self, name)
    }
}

/// Reference-counted interner handle shared between compiler phases.
#[derive(Clone, Default)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        SharedInterner(Arc::new(StringInterner::new()))
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl StringLookup for SharedInterner {
    fn lookup(&self, name: Name) -> &str {
        self.0.lookup(name)
    }
}

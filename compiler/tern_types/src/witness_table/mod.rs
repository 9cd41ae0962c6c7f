//! Abstract witness table layout for protocols.
//!
//! A witness table starts with the fixed value-witness slots every type
//! provides (size, alignment, copy, destroy, ...), followed by one slot per
//! protocol-specific witness. Layout depends only on the protocol, so it is
//! computed once per protocol and cached in a [`ProtocolInfoCache`].

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{AstContext, DeclId, ValueKind};

/// Number of value-witness slots at the start of every witness table.
pub const NUM_VALUE_WITNESSES: u32 = 15;

/// A slot in a witness table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WitnessIndex(u32);

impl WitnessIndex {
    pub const fn new(value: u32) -> Self {
        WitnessIndex(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_value_witness(self) -> bool {
        self.0 < NUM_VALUE_WITNESSES
    }
}

/// What a protocol member occupies in the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WitnessTableEntry {
    /// Pointer to the witness table of an inherited protocol.
    OutOfLineBase { protocol: DeclId, index: WitnessIndex },
    /// A function requirement, static or instance.
    Function { func: DeclId, index: WitnessIndex },
    /// A variable or subscript requirement.
    Accessors {
        member: DeclId,
        getter: WitnessIndex,
        setter: Option<WitnessIndex>,
    },
}

impl WitnessTableEntry {
    pub fn member(&self) -> DeclId {
        match *self {
            WitnessTableEntry::OutOfLineBase { protocol, .. } => protocol,
            WitnessTableEntry::Function { func, .. } => func,
            WitnessTableEntry::Accessors { member, .. } => member,
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, WitnessTableEntry::OutOfLineBase { .. })
    }

    /// First slot the entry occupies.
    pub fn begin_index(&self) -> WitnessIndex {
        match *self {
            WitnessTableEntry::OutOfLineBase { index, .. }
            | WitnessTableEntry::Function { index, .. } => index,
            WitnessTableEntry::Accessors { getter, .. } => getter,
        }
    }
}

/// Witness table layout of one protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolInfo {
    num_witnesses: u32,
    entries: Vec<WitnessTableEntry>,
}

impl ProtocolInfo {
    /// Lay out `proto`: inherited protocols first, then members in
    /// declaration order. Associated types take no slot.
    pub fn layout(ctx: &AstContext, proto: DeclId) -> Self {
        let mut next = NUM_VALUE_WITNESSES;
        let mut take = || {
            let index = WitnessIndex(next);
            next += 1;
            index
        };
        let mut entries = Vec::new();

        for protocol in ctx.inherited_protocols(proto) {
            entries.push(WitnessTableEntry::OutOfLineBase {
                protocol,
                index: take(),
            });
        }

        let members = ctx
            .decl(proto)
            .as_protocol()
            .map_or(&[][..], |nominal| nominal.members.as_slice());
        for &member in members {
            let Some(value) = ctx.decl(member).as_value() else {
                continue;
            };
            match value.kind {
                ValueKind::Func { .. } => entries.push(WitnessTableEntry::Function {
                    func: member,
                    index: take(),
                }),
                ValueKind::Var { settable, .. } | ValueKind::Subscript { settable } => {
                    let getter = take();
                    let setter = settable.then(&mut take);
                    entries.push(WitnessTableEntry::Accessors {
                        member,
                        getter,
                        setter,
                    });
                }
                ValueKind::TypeAlias { .. } => {}
                ValueKind::Nominal(_)
                | ValueKind::OneOfElement
                | ValueKind::Constructor
                | ValueKind::Destructor => {
                    tracing::warn!(member = ctx.decl_name(member), "not a protocol requirement");
                }
            }
        }

        ProtocolInfo {
            num_witnesses: next,
            entries,
        }
    }

    /// Total slots, value witnesses included.
    pub fn num_witnesses(&self) -> u32 {
        self.num_witnesses
    }

    pub fn entries(&self) -> &[WitnessTableEntry] {
        &self.entries
    }

    /// The entry for a requirement or directly inherited protocol.
    pub fn witness_entry(&self, member: DeclId) -> Option<&WitnessTableEntry> {
        self.entries.iter().find(|entry| entry.member() == member)
    }
}

/// Layouts computed so far, by protocol.
#[derive(Debug, Default)]
pub struct ProtocolInfoCache {
    infos: FxHashMap<DeclId, ProtocolInfo>,
}

impl ProtocolInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, ctx: &AstContext, proto: DeclId) -> &ProtocolInfo {
        self.infos
            .entry(proto)
            .or_insert_with(|| ProtocolInfo::layout(ctx, proto))
    }

    /// Shortest chain of out-of-line base slots leading from the witness
    /// table of `origin` to the table of `dest`. Empty when they are the
    /// same protocol; `None` when `origin` does not inherit `dest`.
    pub fn base_path(
        &mut self,
        ctx: &AstContext,
        origin: DeclId,
        dest: DeclId,
    ) -> Option<SmallVec<[WitnessIndex; 4]>> {
        let mut frontier: Vec<(DeclId, SmallVec<[WitnessIndex; 4]>)> =
            vec![(origin, SmallVec::new())];
        let mut visited = FxHashSet::default();
        visited.insert(origin);

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (proto, path) in frontier {
                if proto == dest {
                    return Some(path);
                }
                for entry in self.get(ctx, proto).entries() {
                    if let WitnessTableEntry::OutOfLineBase { protocol, index } = *entry {
                        if visited.insert(protocol) {
                            let mut extended = path.clone();
                            extended.push(index);
                            next.push((protocol, extended));
                        }
                    }
                }
            }
            frontier = next;
        }
        None
    }
}

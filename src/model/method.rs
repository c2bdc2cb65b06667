//! Method handles, method tables and refinement snapshots.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use smol_str::SmolStr;

use crate::base::{Name, RefinementId};

pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// The refinement sets visible at one point of execution, in activation
/// order (oldest first).
///
/// A snapshot is taken whenever a method or block is defined and travels
/// with it; every later call made from that body resolves through it, no
/// matter where the body is invoked from. Cloning is a reference-count bump.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Snapshot(Arc<[RefinementId]>);

impl Snapshot {
    /// A snapshot with nothing activated.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = RefinementId>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Ids in activation order.
    pub fn ids(&self) -> &[RefinementId] {
        &self.0
    }

    /// Ids most-recently-activated first; the order the resolver searches.
    pub fn recent_first(&self) -> impl Iterator<Item = RefinementId> + '_ {
        self.0.iter().rev().copied()
    }

    pub fn contains(&self, id: RefinementId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This snapshot followed by `more`, skipping ids already present.
    pub fn extended(&self, more: &[RefinementId]) -> Self {
        if more.iter().all(|id| self.contains(*id)) {
            return self.clone();
        }
        let mut ids: Vec<RefinementId> = self.0.to_vec();
        for &id in more {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self(ids.into())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// ============================================================================
// METHOD IMPLEMENTATION HANDLE
// ============================================================================

/// Opaque handle to a method body owned by the host interpreter.
///
/// The engine never looks inside a body. It only keeps the label the host
/// gave it and the snapshot recorded where the body was defined.
#[derive(Clone, PartialEq, Eq)]
pub struct MethodImpl {
    label: SmolStr,
    snapshot: Snapshot,
}

impl MethodImpl {
    /// A body defined where no refinement is active.
    pub fn new(label: impl Into<SmolStr>) -> Self {
        Self::with_snapshot(label, Snapshot::empty())
    }

    pub fn with_snapshot(label: impl Into<SmolStr>, snapshot: Snapshot) -> Self {
        Self {
            label: label.into(),
            snapshot,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Refinements captured at the definition site.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl fmt::Debug for MethodImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodImpl({:?} @ {:?})", self.label, self.snapshot)
    }
}

// ============================================================================
// METHOD TABLE
// ============================================================================

/// Selector → body, in definition order.
#[derive(Clone, Debug, Default)]
pub struct MethodTable {
    methods: FxIndexMap<Name, MethodImpl>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine a method, returning the previous body.
    pub fn define(&mut self, selector: Name, body: MethodImpl) -> Option<MethodImpl> {
        self.methods.insert(selector, body)
    }

    pub fn get(&self, selector: Name) -> Option<&MethodImpl> {
        self.methods.get(&selector)
    }

    pub fn contains(&self, selector: Name) -> bool {
        self.methods.contains_key(&selector)
    }

    /// Selectors in definition order.
    pub fn selectors(&self) -> impl Iterator<Item = Name> + '_ {
        self.methods.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

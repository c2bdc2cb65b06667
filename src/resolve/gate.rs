//! Indirect-call gate.
//!
//! Whether refinements apply to reflective invocation is a policy, kept
//! here and nowhere else: the resolver asks the gate for the snapshot to
//! search and never inspects the call kind itself.

use crate::config::IndirectPolicy;
use crate::model::Snapshot;

/// How a call reached the resolver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// A syntactic call site (including `super`).
    #[default]
    Direct,
    /// A reflective or meta dispatch path.
    Indirect,
}

/// The entry point an invocation came through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallEntry {
    /// `recv.m(...)` written in source.
    Syntax,
    /// `super` written in source.
    Super,
    /// Send-by-name (`send`, `__send__`, `public_send`).
    Send,
    /// Method-object construction (`method(:m)`, `instance_method`).
    MethodObject,
    /// Capability queries (`respond_to?`).
    RespondTo,
}

/// Classifies entries and applies the indirect-call policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallGate {
    policy: IndirectPolicy,
}

impl CallGate {
    pub const fn new(policy: IndirectPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> IndirectPolicy {
        self.policy
    }

    pub fn classify(entry: CallEntry) -> CallKind {
        match entry {
            CallEntry::Syntax | CallEntry::Super => CallKind::Direct,
            CallEntry::Send | CallEntry::MethodObject | CallEntry::RespondTo => CallKind::Indirect,
        }
    }

    /// Whether a call of `kind` may see refinements at all.
    pub fn refinements_visible(&self, kind: CallKind) -> bool {
        match kind {
            CallKind::Direct => true,
            CallKind::Indirect => self.policy == IndirectPolicy::HonorRefinements,
        }
    }

    /// The snapshot the resolver should search for a call of `kind`.
    pub fn effective(&self, kind: CallKind, active: &Snapshot) -> Snapshot {
        if self.refinements_visible(kind) {
            active.clone()
        } else {
            Snapshot::empty()
        }
    }
}

//! Per-call resolution input.

use super::gate::{CallGate, CallEntry, CallKind};
use crate::base::{ClassId, Name};
use crate::model::{MethodImpl, Snapshot};

/// Everything the resolver needs to know about one call.
///
/// `active` is the snapshot recorded on the *calling* body, not whatever
/// happens to be active where that body is currently executing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionContext {
    pub receiver: ClassId,
    pub selector: Name,
    pub active: Snapshot,
    pub call_kind: CallKind,
}

impl ResolutionContext {
    pub fn new(receiver: ClassId, selector: Name, active: Snapshot, call_kind: CallKind) -> Self {
        Self {
            receiver,
            selector,
            active,
            call_kind,
        }
    }

    pub fn direct(receiver: ClassId, selector: Name, active: Snapshot) -> Self {
        Self::new(receiver, selector, active, CallKind::Direct)
    }

    pub fn indirect(receiver: ClassId, selector: Name, active: Snapshot) -> Self {
        Self::new(receiver, selector, active, CallKind::Indirect)
    }

    /// A call made from inside `caller` through `entry`.
    pub fn from_caller(
        receiver: ClassId,
        selector: Name,
        caller: &MethodImpl,
        entry: CallEntry,
    ) -> Self {
        Self::new(
            receiver,
            selector,
            caller.snapshot().clone(),
            CallGate::classify(entry),
        )
    }
}

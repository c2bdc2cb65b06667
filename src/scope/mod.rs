//! Activation scopes: which refinement sets are visible where.
//!
//! A [`ScopeStack`] mirrors the lexical structure the host is executing:
//! files, evaluated strings, class bodies and method bodies. Activating a
//! set affects the rest of the current scope and whatever is nested in it
//! afterwards, nothing else.
//!
//! Activation is lexical, not dynamic. A body records a [`Snapshot`] when
//! it is defined and every call made from that body resolves through the
//! recorded snapshot, never through whatever is active at the call site.

mod stack;

pub use crate::model::Snapshot;
pub use stack::{ScopeKind, ScopeStack};

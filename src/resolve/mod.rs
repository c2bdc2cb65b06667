//! Resolution: from (receiver class, selector, snapshot) to a method body.
//!
//! - [`ResolutionContext`] - the per-call input
//! - [`CallGate`] - the indirect-call policy
//! - [`Resolver`] - normal dispatch and `super` dispatch

mod context;
mod gate;
mod resolver;

pub use context::ResolutionContext;
pub use gate::{CallEntry, CallGate, CallKind};
pub use resolver::{Candidate, Layer, MethodOwner, ResolvedMethod, Resolver};

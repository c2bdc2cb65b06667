//! # refine-core
//!
//! Scoped method resolution with lexically-activated overrides
//! ("refinements"): per-scope, reversible redefinition of class behavior
//! without mutating any class's own method table.
//!
//! The crate is the resolution core a language runtime embeds. The host
//! parses and executes code; it tells the engine about class/module
//! definitions, refinement blocks, activation statements and scope
//! boundaries, records a snapshot on every body it defines, and asks the
//! engine where each call goes.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! engine   → Engine host: shared model + per-context scope stacks
//!   ↓
//! resolve  → Resolver, super dispatch, indirect-call gate
//!   ↓
//! scope    → Activation scope stack and snapshots
//!   ↓
//! model    → Class/module registry, refinement sets
//!   ↓
//! base     → Primitives (ids, name interning)
//! ```
//!
//! `error`, `diagnostics` and `config` are used throughout.

/// Foundation types: arena ids, name interning
pub mod base;

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;

/// Classes, modules and refinement sets
pub mod model;

/// Method lookup
pub mod resolve;

/// Activation scopes
pub mod scope;

pub use base::{ClassId, Interner, ModuleId, Name, RefinementId, ScopeId};
pub use config::{EngineConfig, IndirectPolicy};
pub use engine::{Engine, ExecutionContext};
pub use error::{RefineError, Result};
pub use model::{MethodImpl, Model, Snapshot};
pub use resolve::{
    CallEntry, CallKind, Candidate, MethodOwner, ResolutionContext, ResolvedMethod, Resolver,
};
pub use scope::{ScopeKind, ScopeStack};

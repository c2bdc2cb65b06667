//! Foundation types for the refinement engine.
//!
//! - [`ClassId`], [`ModuleId`], [`RefinementId`], [`ScopeId`] - arena handles
//! - [`Name`], [`Interner`] - name interning
//!
//! This module has NO dependencies on other modules of the crate.

mod ids;
mod intern;

pub use ids::{ClassId, ModuleId, RefinementId, ScopeId};
pub use intern::{Interner, Name};

//! Program model: classes, modules and refinement sets.
//!
//! Everything in here is process-wide data: it is written while the host
//! processes definitions and read by every execution context when it
//! resolves a call. [`Engine`](crate::engine::Engine) keeps one `Model`
//! behind a readers-writer lock.

mod method;
mod refinement;
mod registry;

pub use method::{MethodImpl, MethodTable, Snapshot};
pub use refinement::{
    OverlayBuilder, Overlay, RefinementSet, RefinementSetBuilder, RefinementTable,
};
pub use registry::{Ancestor, ClassDef, ModuleDef, Registry};

use smol_str::SmolStr;

use crate::base::RefinementId;
use crate::error::{RefineError, Result};

/// The registry together with every committed refinement set.
#[derive(Debug, Default)]
pub struct Model {
    pub registry: Registry,
    pub refinements: RefinementTable,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin declaring a refinement set named `name`.
    pub fn begin_refinement_set(&mut self, name: &str) -> RefinementSetBuilder<'_> {
        RefinementSetBuilder::new(self, name)
    }

    /// Find a committed refinement set by name.
    pub fn refinement(&self, name: &str) -> Result<RefinementId> {
        self.registry
            .interner()
            .find(name)
            .and_then(|key| self.refinements.find(key))
            .ok_or_else(|| RefineError::UnknownRefinementSet(name.into()))
    }

    pub fn refinement_name(&self, id: RefinementId) -> SmolStr {
        match self.refinements.get(id) {
            Ok(set) => self.registry.display(set.name()),
            Err(_) => id.to_string().into(),
        }
    }

    /// Names of the sets visible through `snapshot`, in activation order.
    pub fn used_refinements(&self, snapshot: &Snapshot) -> Vec<SmolStr> {
        snapshot
            .ids()
            .iter()
            .map(|&id| self.refinement_name(id))
            .collect()
    }
}

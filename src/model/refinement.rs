//! Refinement sets: per-class method overlays that activate together.
//!
//! A refinement set is declared once, through a [`RefinementSetBuilder`],
//! and is immutable after [`commit`](RefinementSetBuilder::commit). The
//! overlays it holds are never merged into the refined class; the resolver
//! consults them only for call sites whose snapshot names the set.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::Model;
use super::method::{FxIndexMap, MethodImpl, MethodTable};
use crate::base::{ClassId, ModuleId, Name, RefinementId};
use crate::error::{RefineError, Result};

/// Refinement of one class inside a set.
#[derive(Clone, Debug)]
pub struct Overlay {
    pub target: ClassId,
    pub methods: MethodTable,
    /// Modules included into this refinement only, in inclusion order.
    pub includes: Vec<ModuleId>,
    /// Modules prepended to this refinement only, in prepend order.
    pub prepends: Vec<ModuleId>,
}

impl Overlay {
    fn new(target: ClassId) -> Self {
        Self {
            target,
            methods: MethodTable::new(),
            includes: Vec::new(),
            prepends: Vec::new(),
        }
    }
}

/// A committed, immutable refinement set.
#[derive(Clone, Debug)]
pub struct RefinementSet {
    id: RefinementId,
    name: Name,
    overlays: FxIndexMap<ClassId, Overlay>,
    imports: Vec<RefinementId>,
}

impl RefinementSet {
    pub fn id(&self) -> RefinementId {
        self.id
    }

    pub fn name(&self) -> Name {
        self.name
    }

    /// Overlay for `class`, if this set refines it.
    pub fn overlay(&self, class: ClassId) -> Option<&Overlay> {
        self.overlays.get(&class)
    }

    /// Classes refined by this set, in declaration order.
    pub fn refined_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.overlays.keys().copied()
    }

    /// Sets activated together with this one (before it).
    pub fn imports(&self) -> &[RefinementId] {
        &self.imports
    }
}

/// Every committed refinement set, addressable by id and by name.
#[derive(Debug, Default)]
pub struct RefinementTable {
    sets: Vec<Arc<RefinementSet>>,
    by_name: FxHashMap<Name, RefinementId>,
}

impl RefinementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: RefinementId) -> Result<&RefinementSet> {
        self.sets
            .get(id.slot())
            .map(|set| set.as_ref())
            .ok_or_else(|| RefineError::UnknownRefinementSet(id.to_string().into()))
    }

    /// Shared handle to a committed set.
    pub fn shared(&self, id: RefinementId) -> Option<Arc<RefinementSet>> {
        self.sets.get(id.slot()).cloned()
    }

    pub fn find(&self, name: Name) -> Option<RefinementId> {
        self.by_name.get(&name).copied()
    }

    /// Ids to activate for `id`: its imports (recursively, depth first)
    /// followed by the set itself, each at most once.
    pub fn activation_order(&self, id: RefinementId) -> Result<Vec<RefinementId>> {
        let mut order = Vec::new();
        self.collect_activation(id, &mut order)?;
        Ok(order)
    }

    fn collect_activation(&self, id: RefinementId, order: &mut Vec<RefinementId>) -> Result<()> {
        if order.contains(&id) {
            return Ok(());
        }
        let set = self.get(id)?;
        for &import in &set.imports {
            self.collect_activation(import, order)?;
        }
        order.push(id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn insert(&mut self, mut set: RefinementSet) -> RefinementId {
        let id = RefinementId::new(self.sets.len() as u32);
        set.id = id;
        self.by_name.insert(set.name, id);
        self.sets.push(Arc::new(set));
        id
    }
}

// ============================================================================
// BUILDERS
// ============================================================================

/// Collects the overlays of one refinement block until it is committed.
#[derive(Debug)]
pub struct RefinementSetBuilder<'m> {
    model: &'m mut Model,
    name: SmolStr,
    overlays: FxIndexMap<ClassId, Overlay>,
    imports: Vec<RefinementId>,
}

impl<'m> RefinementSetBuilder<'m> {
    pub(super) fn new(model: &'m mut Model, name: &str) -> Self {
        Self {
            model,
            name: name.into(),
            overlays: FxIndexMap::default(),
            imports: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start (or continue) refining `target`.
    ///
    /// Only classes can be refined; naming a module fails with
    /// `InvalidRefinementTarget`.
    pub fn refine(&mut self, target: &str) -> Result<OverlayBuilder<'_, 'm>> {
        if self.model.registry.is_module(target) {
            return Err(RefineError::InvalidRefinementTarget {
                name: target.into(),
            });
        }
        let target = self.model.registry.class(target)?;
        self.overlays
            .entry(target)
            .or_insert_with(|| Overlay::new(target));
        Ok(OverlayBuilder {
            builder: self,
            target,
        })
    }

    /// Activate another committed set whenever this one is activated.
    pub fn import_set(&mut self, name: &str) -> Result<&mut Self> {
        let id = self.model.refinement(name)?;
        if !self.imports.contains(&id) {
            self.imports.push(id);
        }
        Ok(self)
    }

    /// Freeze the set and register it under its name.
    pub fn commit(self) -> Result<RefinementId> {
        let name = self.model.registry.intern(&self.name);
        if self.model.refinements.find(name).is_some() {
            return Err(RefineError::DuplicateRefinementSet(self.name));
        }
        let overlays = self.overlays.len();
        let id = self.model.refinements.insert(RefinementSet {
            id: RefinementId::new(0),
            name,
            overlays: self.overlays,
            imports: self.imports,
        });
        tracing::debug!(set = %self.name, %id, overlays, "commit refinement set");
        Ok(id)
    }
}

/// Adds methods and modules to one class's overlay.
#[derive(Debug)]
pub struct OverlayBuilder<'b, 'm> {
    builder: &'b mut RefinementSetBuilder<'m>,
    target: ClassId,
}

impl OverlayBuilder<'_, '_> {
    pub fn target(&self) -> ClassId {
        self.target
    }

    fn overlay(&mut self) -> &mut Overlay {
        let target = self.target;
        self.builder
            .overlays
            .entry(target)
            .or_insert_with(|| Overlay::new(target))
    }

    pub fn add_method(&mut self, selector: &str, body: MethodImpl) -> &mut Self {
        let selector = self.builder.model.registry.intern(selector);
        self.overlay().methods.define(selector, body);
        self
    }

    pub fn include_module(&mut self, module: &str) -> Result<&mut Self> {
        let module = self.builder.model.registry.module(module)?;
        let overlay = self.overlay();
        if !overlay.includes.contains(&module) {
            overlay.includes.push(module);
        }
        Ok(self)
    }

    pub fn prepend_module(&mut self, module: &str) -> Result<&mut Self> {
        let module = self.builder.model.registry.module(module)?;
        let overlay = self.overlay();
        if !overlay.prepends.contains(&module) {
            overlay.prepends.push(module);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_classes() -> Model {
        let mut model = Model::new();
        model.registry.define_class("String", None).unwrap();
        model.registry.define_class("Integer", None).unwrap();
        model.registry.define_module("Comparable").unwrap();
        model
    }

    #[test]
    fn test_refine_module_is_rejected() {
        let mut model = model_with_classes();
        let mut set = model.begin_refinement_set("Bad");
        let err = set.refine("Comparable").unwrap_err();
        assert_eq!(
            err,
            RefineError::InvalidRefinementTarget {
                name: "Comparable".into()
            }
        );
    }

    #[test]
    fn test_refine_unknown_class() {
        let mut model = model_with_classes();
        let mut set = model.begin_refinement_set("Bad");
        assert_eq!(
            set.refine("Float").unwrap_err(),
            RefineError::UnknownClass("Float".into())
        );
    }

    #[test]
    fn test_commit_several_classes_in_one_set() {
        let mut model = model_with_classes();
        let mut set = model.begin_refinement_set("CoreExt");
        set.refine("String")
            .unwrap()
            .add_method("shout", MethodImpl::new("String#shout"))
            .include_module("Comparable")
            .unwrap();
        set.refine("Integer")
            .unwrap()
            .add_method("double", MethodImpl::new("Integer#double"));
        let id = set.commit().unwrap();

        let string = model.registry.class("String").unwrap();
        let integer = model.registry.class("Integer").unwrap();
        let committed = model.refinements.get(id).unwrap();
        assert_eq!(committed.refined_classes().collect::<Vec<_>>(), vec![string, integer]);

        let overlay = committed.overlay(string).unwrap();
        let shout = model.registry.intern("shout");
        assert_eq!(overlay.methods.get(shout).map(MethodImpl::label), Some("String#shout"));
        assert_eq!(overlay.includes.len(), 1);

        // Refinements never touch the class's own table.
        assert!(model.registry.class_def(string).unwrap().methods.is_empty());
    }

    #[test]
    fn test_duplicate_commit_is_rejected() {
        let mut model = model_with_classes();
        model.begin_refinement_set("Once").commit().unwrap();
        let err = model.begin_refinement_set("Once").commit().unwrap_err();
        assert_eq!(err, RefineError::DuplicateRefinementSet("Once".into()));
        assert_eq!(model.refinements.len(), 1);
    }

    #[test]
    fn test_activation_order_follows_imports() {
        let mut model = model_with_classes();
        let a = model.begin_refinement_set("A").commit().unwrap();
        let mut b = model.begin_refinement_set("B");
        b.import_set("A").unwrap();
        let b = b.commit().unwrap();
        let mut c = model.begin_refinement_set("C");
        c.import_set("B").unwrap().import_set("A").unwrap();
        let c = c.commit().unwrap();

        assert_eq!(model.refinements.activation_order(c).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_import_unknown_set() {
        let mut model = model_with_classes();
        let mut set = model.begin_refinement_set("X");
        assert_eq!(
            set.import_set("Nope").unwrap_err(),
            RefineError::UnknownRefinementSet("Nope".into())
        );
    }
}

//! Method resolution with refinements.
//!
//! # Search order
//!
//! For each class `C`, from the receiver's class up the superclass chain:
//!
//! 1. every active refinement set that refines `C`, most recently
//!    activated first: its prepended modules, its own methods, its
//!    included modules (module lists most recent first);
//! 2. `C`'s prepended modules;
//! 3. `C` itself;
//! 4. `C`'s included modules.
//!
//! Refinements are checked per class, so a refinement of a superclass
//! never hides a method the subclass defines itself: the subclass's own
//! layers are exhausted before the walk reaches the superclass.
//!
//! `super` starts somewhere else in the same order; see
//! [`Resolver::resolve_super`].

use super::context::ResolutionContext;
use super::gate::CallGate;
use crate::base::{ClassId, ModuleId, Name, RefinementId};
use crate::error::{RefineError, Result};
use crate::model::{MethodImpl, Model, Snapshot};

// ============================================================================
// CANDIDATES
// ============================================================================

/// Where a method body lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodOwner {
    Class(ClassId),
    Module(ModuleId),
    /// The anonymous method table of `set`'s overlay for `target`.
    Refinement { set: RefinementId, target: ClassId },
}

/// Which layer of a class level contributed a candidate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// An overlay of the given refinement set.
    Refinement(RefinementId),
    /// The class's own prepended modules, table and included modules.
    Class,
}

/// One method table in the search order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Candidate {
    /// The class whose level produced this candidate.
    pub level: ClassId,
    pub layer: Layer,
    pub owner: MethodOwner,
}

impl Candidate {
    /// The position of a class's own method table.
    pub fn class(class: ClassId) -> Self {
        Self {
            level: class,
            layer: Layer::Class,
            owner: MethodOwner::Class(class),
        }
    }

    /// The position of `set`'s overlay for `target`.
    pub fn refinement(set: RefinementId, target: ClassId) -> Self {
        Self {
            level: target,
            layer: Layer::Refinement(set),
            owner: MethodOwner::Refinement { set, target },
        }
    }
}

/// A successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMethod {
    pub body: MethodImpl,
    pub owner: MethodOwner,
    pub level: ClassId,
    pub layer: Layer,
}

impl ResolvedMethod {
    pub fn label(&self) -> &str {
        self.body.label()
    }

    /// True when the hit came from a refinement overlay or a module
    /// attached to one.
    pub fn is_refined(&self) -> bool {
        matches!(self.layer, Layer::Refinement(_))
    }

    /// Where in the search order the body was found; the origin for a
    /// `super` call made from it.
    pub fn candidate(&self) -> Candidate {
        Candidate {
            level: self.level,
            layer: self.layer,
            owner: self.owner,
        }
    }
}

impl From<&ResolvedMethod> for Candidate {
    fn from(hit: &ResolvedMethod) -> Self {
        hit.candidate()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

const DEFAULT_MAX_DEPTH: usize = 1024;

/// Pure lookup over a [`Model`]; holds no state between calls.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'a> {
    model: &'a Model,
    gate: CallGate,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            gate: CallGate::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_gate(mut self, gate: CallGate) -> Self {
        self.gate = gate;
        self
    }

    /// Limit the number of class levels walked per lookup.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// The full search order for `ctx`, after the gate is applied.
    pub fn candidates(&self, ctx: &ResolutionContext) -> Result<Vec<Candidate>> {
        let active = self.gate.effective(ctx.call_kind, &ctx.active);
        let mut out = Vec::new();
        self.walk(Some(ctx.receiver), &active, &mut out)?;
        Ok(out)
    }

    /// Find the body a call resolves to.
    #[tracing::instrument(level = "trace", skip(self, ctx), fields(receiver = %ctx.receiver))]
    pub fn resolve(&self, ctx: &ResolutionContext) -> Result<ResolvedMethod> {
        let candidates = self.candidates(ctx)?;
        self.first_hit(candidates, ctx)
    }

    /// Find the body `super` reaches from the method found at `from`.
    ///
    /// - From a class `D`: `D`'s included modules, then the normal search
    ///   starting at `D`'s superclass.
    /// - From a refinement of `C`: the overlay's included modules, then
    ///   `C`'s own layers (never another refinement of `C`, even one
    ///   activated later), then the normal search above `C`.
    /// - From a module: whatever follows that exact position (level and
    ///   layer) in the receiver's search order. A module can appear at
    ///   several positions, so the position matters, not just the module.
    #[tracing::instrument(level = "trace", skip(self, ctx), fields(receiver = %ctx.receiver))]
    pub fn resolve_super(&self, ctx: &ResolutionContext, from: Candidate) -> Result<ResolvedMethod> {
        let active = self.gate.effective(ctx.call_kind, &ctx.active);
        let mut order = Vec::new();

        match from.owner {
            MethodOwner::Class(class) => {
                let def = self.model.registry.class_def(class)?;
                order.extend(def.includes.iter().rev().map(|&m| Candidate {
                    level: class,
                    layer: Layer::Class,
                    owner: MethodOwner::Module(m),
                }));
                self.walk(def.superclass, &active, &mut order)?;
            }
            MethodOwner::Refinement { set, target } => {
                if let Some(overlay) = self.model.refinements.get(set)?.overlay(target) {
                    order.extend(overlay.includes.iter().rev().map(|&m| Candidate {
                        level: target,
                        layer: Layer::Refinement(set),
                        owner: MethodOwner::Module(m),
                    }));
                }
                let mut rest = Vec::new();
                self.walk(Some(target), &active, &mut rest)?;
                order.extend(rest.into_iter().filter(|c| {
                    !(c.level == target && matches!(c.layer, Layer::Refinement(_)))
                }));
            }
            MethodOwner::Module(_) => {
                let all = self.candidates(ctx)?;
                let Some(pos) = all.iter().position(|c| *c == from) else {
                    return Err(self.not_found(ctx));
                };
                order.extend(all[pos + 1..].iter().copied().filter(|c| {
                    match (from.layer, c.layer) {
                        (Layer::Refinement(own), Layer::Refinement(other)) => {
                            c.level != from.level || own == other
                        }
                        _ => true,
                    }
                }));
            }
        }

        self.first_hit(order, ctx)
    }

    // ------------------------------------------------------------------

    fn walk(&self, start: Option<ClassId>, active: &Snapshot, out: &mut Vec<Candidate>) -> Result<()> {
        let mut current = start;
        let mut depth = 0;
        while let Some(class) = current {
            if depth == self.max_depth {
                tracing::warn!(%class, depth, "ancestor walk exceeded depth limit");
                return Err(RefineError::AncestorDepthExceeded {
                    class: self.model.registry.class_name(class),
                    limit: self.max_depth,
                });
            }
            self.push_level(class, active, out)?;
            current = self.model.registry.class_def(class)?.superclass;
            depth += 1;
        }
        Ok(())
    }

    fn push_level(&self, class: ClassId, active: &Snapshot, out: &mut Vec<Candidate>) -> Result<()> {
        for set in active.recent_first() {
            let Some(overlay) = self.model.refinements.get(set)?.overlay(class) else {
                continue;
            };
            let layer = Layer::Refinement(set);
            out.extend(overlay.prepends.iter().rev().map(|&m| Candidate {
                level: class,
                layer,
                owner: MethodOwner::Module(m),
            }));
            out.push(Candidate {
                level: class,
                layer,
                owner: MethodOwner::Refinement { set, target: class },
            });
            out.extend(overlay.includes.iter().rev().map(|&m| Candidate {
                level: class,
                layer,
                owner: MethodOwner::Module(m),
            }));
        }

        let def = self.model.registry.class_def(class)?;
        let own = |owner| Candidate {
            level: class,
            layer: Layer::Class,
            owner,
        };
        out.extend(def.prepends.iter().rev().map(|&m| own(MethodOwner::Module(m))));
        out.push(own(MethodOwner::Class(class)));
        out.extend(def.includes.iter().rev().map(|&m| own(MethodOwner::Module(m))));
        Ok(())
    }

    fn lookup(&self, owner: MethodOwner, selector: Name) -> Result<Option<&'a MethodImpl>> {
        let model = self.model;
        Ok(match owner {
            MethodOwner::Class(id) => model.registry.class_def(id)?.methods.get(selector),
            MethodOwner::Module(id) => model.registry.module_def(id)?.methods.get(selector),
            MethodOwner::Refinement { set, target } => model
                .refinements
                .get(set)?
                .overlay(target)
                .and_then(|overlay| overlay.methods.get(selector)),
        })
    }

    fn first_hit(
        &self,
        order: impl IntoIterator<Item = Candidate>,
        ctx: &ResolutionContext,
    ) -> Result<ResolvedMethod> {
        for candidate in order {
            if let Some(body) = self.lookup(candidate.owner, ctx.selector)? {
                tracing::trace!(owner = ?candidate.owner, body = body.label(), "resolved");
                return Ok(ResolvedMethod {
                    body: body.clone(),
                    owner: candidate.owner,
                    level: candidate.level,
                    layer: candidate.layer,
                });
            }
        }
        Err(self.not_found(ctx))
    }

    fn not_found(&self, ctx: &ResolutionContext) -> RefineError {
        RefineError::MethodNotFound {
            class: self.model.registry.class_name(ctx.receiver),
            method: self.model.registry.display(ctx.selector),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndirectPolicy;
    use crate::resolve::CallKind;

    struct Fixture {
        model: Model,
    }

    impl Fixture {
        fn new() -> Self {
            Self { model: Model::new() }
        }

        fn class(&mut self, name: &str, superclass: Option<&str>) -> ClassId {
            self.model.registry.define_class(name, superclass).unwrap()
        }

        fn module(&mut self, name: &str) -> ModuleId {
            self.model.registry.define_module(name).unwrap()
        }

        fn method(&mut self, owner: impl Into<crate::model::Ancestor>, selector: &str, label: &str) {
            self.model
                .registry
                .add_method(owner, selector, MethodImpl::new(label))
                .unwrap();
        }

        fn refinement(&mut self, name: &str, target: &str, selector: &str, label: &str) -> RefinementId {
            let mut set = self.model.begin_refinement_set(name);
            set.refine(target)
                .unwrap()
                .add_method(selector, MethodImpl::new(label));
            set.commit().unwrap()
        }

        fn ctx(&self, receiver: ClassId, selector: &str, active: &[RefinementId]) -> ResolutionContext {
            ResolutionContext::direct(
                receiver,
                self.model.registry.intern(selector),
                Snapshot::from_ids(active.iter().copied()),
            )
        }

        fn label(&self, ctx: &ResolutionContext) -> Result<String> {
            Resolver::new(&self.model)
                .resolve(ctx)
                .map(|hit| hit.label().to_string())
        }
    }

    #[test]
    fn test_refinement_visible_only_when_active() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let m = fx.refinement("M", "C", "foo", "M");

        assert_eq!(fx.label(&fx.ctx(c, "foo", &[m])).unwrap(), "M");
        assert_eq!(
            fx.label(&fx.ctx(c, "foo", &[])),
            Err(RefineError::MethodNotFound {
                class: "C".into(),
                method: "foo".into()
            })
        );
    }

    #[test]
    fn test_most_recent_activation_wins() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let a = fx.refinement("A", "C", "foo", "A");
        let b = fx.refinement("B", "C", "foo", "B");

        assert_eq!(fx.label(&fx.ctx(c, "foo", &[a, b])).unwrap(), "B");
        assert_eq!(fx.label(&fx.ctx(c, "foo", &[b, a])).unwrap(), "A");
    }

    #[test]
    fn test_overlay_layer_order() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let pre = fx.module("Pre");
        let inc = fx.module("Inc");
        fx.method(pre, "a", "Pre#a");
        fx.method(inc, "a", "Inc#a");
        fx.method(inc, "b", "Inc#b");
        fx.method(c, "c", "C#c");
        fx.method(inc, "c", "Inc#c");

        let mut set = fx.model.begin_refinement_set("R");
        set.refine("C")
            .unwrap()
            .add_method("a", MethodImpl::new("R#a"))
            .add_method("b", MethodImpl::new("R#b"))
            .prepend_module("Pre")
            .unwrap()
            .include_module("Inc")
            .unwrap();
        let r = set.commit().unwrap();

        assert_eq!(fx.label(&fx.ctx(c, "a", &[r])).unwrap(), "Pre#a");
        assert_eq!(fx.label(&fx.ctx(c, "b", &[r])).unwrap(), "R#b");
        // Modules attached to the refinement still beat the class itself.
        assert_eq!(fx.label(&fx.ctx(c, "c", &[r])).unwrap(), "Inc#c");
    }

    #[test]
    fn test_class_prepend_then_self_then_include() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let p = fx.module("P");
        let i = fx.module("I");
        fx.model.registry.prepend_module(c, p).unwrap();
        fx.model.registry.include_module(c, i).unwrap();
        fx.method(p, "x", "P#x");
        fx.method(c, "x", "C#x");
        fx.method(c, "y", "C#y");
        fx.method(i, "y", "I#y");
        fx.method(i, "z", "I#z");

        assert_eq!(fx.label(&fx.ctx(c, "x", &[])).unwrap(), "P#x");
        assert_eq!(fx.label(&fx.ctx(c, "y", &[])).unwrap(), "C#y");
        assert_eq!(fx.label(&fx.ctx(c, "z", &[])).unwrap(), "I#z");
    }

    #[test]
    fn test_subclass_method_beats_superclass_refinement() {
        let mut fx = Fixture::new();
        let base = fx.class("Base", None);
        let derived = fx.class("Derived", Some("Base"));
        let other = fx.class("Other", Some("Base"));
        fx.method(base, "m", "Base#m");
        fx.method(derived, "m", "Derived#m");
        let r = fx.refinement("R", "Base", "m", "R#m");

        assert_eq!(fx.label(&fx.ctx(derived, "m", &[r])).unwrap(), "Derived#m");
        assert_eq!(fx.label(&fx.ctx(other, "m", &[r])).unwrap(), "R#m");
        assert_eq!(fx.label(&fx.ctx(base, "m", &[r])).unwrap(), "R#m");
    }

    #[test]
    fn test_indirect_call_bypasses_refinements() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        fx.method(c, "foo", "C#foo");
        fx.method(c, "bar", "C#bar");
        let r = fx.refinement("R", "C", "foo", "R#foo");

        let mut ctx = fx.ctx(c, "foo", &[r]);
        ctx.call_kind = CallKind::Indirect;
        assert_eq!(fx.label(&ctx).unwrap(), "C#foo");

        let honoring = Resolver::new(&fx.model)
            .with_gate(CallGate::new(IndirectPolicy::HonorRefinements));
        assert_eq!(honoring.resolve(&ctx).unwrap().label(), "R#foo");

        let mut bar = fx.ctx(c, "bar", &[r]);
        let direct = fx.label(&bar).unwrap();
        bar.call_kind = CallKind::Indirect;
        assert_eq!(fx.label(&bar).unwrap(), direct);
    }

    #[test]
    fn test_super_from_refinement_reaches_class() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        fx.method(c, "m", "C#m");
        let first = fx.refinement("First", "C", "m", "First#m");
        let second = fx.refinement("Second", "C", "m", "Second#m");
        let resolver = Resolver::new(&fx.model);

        let ctx = fx.ctx(c, "m", &[first, second]);
        let hit = resolver
            .resolve_super(&ctx, Candidate::refinement(second, c))
            .unwrap();
        assert_eq!(hit.label(), "C#m");

        let hit = resolver
            .resolve_super(&ctx, Candidate::refinement(first, c))
            .unwrap();
        assert_eq!(hit.label(), "C#m");
        assert!(!hit.is_refined());
    }

    #[test]
    fn test_super_from_refinement_checks_its_includes_first() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let helper = fx.module("Helper");
        fx.method(c, "m", "C#m");
        fx.method(helper, "m", "Helper#m");
        let mut set = fx.model.begin_refinement_set("R");
        set.refine("C")
            .unwrap()
            .add_method("m", MethodImpl::new("R#m"))
            .include_module("Helper")
            .unwrap();
        let r = set.commit().unwrap();

        let hit = Resolver::new(&fx.model)
            .resolve_super(&fx.ctx(c, "m", &[r]), Candidate::refinement(r, c))
            .unwrap();
        assert_eq!(hit.label(), "Helper#m");
        assert_eq!(hit.owner, MethodOwner::Module(helper));
    }

    #[test]
    fn test_super_from_class_goes_to_includes_then_superclass() {
        let mut fx = Fixture::new();
        let base = fx.class("Base", None);
        let derived = fx.class("Derived", Some("Base"));
        let mixin = fx.module("Mixin");
        fx.method(base, "m", "Base#m");
        fx.method(derived, "m", "Derived#m");
        fx.method(derived, "n", "Derived#n");
        fx.method(mixin, "n", "Mixin#n");
        fx.model.registry.include_module(derived, mixin).unwrap();
        let r = fx.refinement("R", "Base", "m", "R#m");
        let resolver = Resolver::new(&fx.model);

        let hit = resolver
            .resolve_super(&fx.ctx(derived, "n", &[]), Candidate::class(derived))
            .unwrap();
        assert_eq!(hit.label(), "Mixin#n");

        // The superclass level is searched normally, refinements included.
        let hit = resolver
            .resolve_super(&fx.ctx(derived, "m", &[r]), Candidate::class(derived))
            .unwrap();
        assert_eq!(hit.label(), "R#m");

        let err = resolver
            .resolve_super(&fx.ctx(base, "m", &[]), Candidate::class(base))
            .unwrap_err();
        assert!(err.is_method_missing());
    }

    #[test]
    fn test_super_from_prepended_module() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let logging = fx.module("Logging");
        fx.model.registry.prepend_module(c, logging).unwrap();
        fx.method(logging, "save", "Logging#save");
        fx.method(c, "save", "C#save");

        let resolver = Resolver::new(&fx.model);
        let ctx = fx.ctx(c, "save", &[]);
        let first = resolver.resolve(&ctx).unwrap();
        assert_eq!(first.label(), "Logging#save");
        assert_eq!(first.owner, MethodOwner::Module(logging));
        let hit = resolver.resolve_super(&ctx, first.candidate()).unwrap();
        assert_eq!(hit.label(), "C#save");
    }

    #[test]
    fn test_super_from_module_uses_its_exact_position() {
        // Helper sits both in R's overlay for C and in C's own includes.
        let mut fx = Fixture::new();
        let base = fx.class("Base", None);
        let c = fx.class("C", Some("Base"));
        let helper = fx.module("Helper");
        fx.model.registry.include_module(c, helper).unwrap();
        fx.method(base, "m", "Base#m");
        fx.method(c, "m", "C#m");
        fx.method(helper, "m", "Helper#m");
        let mut set = fx.model.begin_refinement_set("R");
        set.refine("C").unwrap().include_module("Helper").unwrap();
        let r = set.commit().unwrap();

        let resolver = Resolver::new(&fx.model);
        let ctx = fx.ctx(c, "m", &[r]);

        // Through the overlay: Helper, then C's own layers.
        let via_overlay = resolver.resolve(&ctx).unwrap();
        assert_eq!(via_overlay.layer, Layer::Refinement(r));
        let hit = resolver.resolve_super(&ctx, via_overlay.candidate()).unwrap();
        assert_eq!(hit.label(), "C#m");

        // Through C#m's super: Helper again, but as C's include.
        let from_class = resolver.resolve_super(&ctx, hit.candidate()).unwrap();
        assert_eq!(from_class.label(), "Helper#m");
        assert_eq!(from_class.layer, Layer::Class);
        let hit = resolver.resolve_super(&ctx, (&from_class).into()).unwrap();
        assert_eq!(hit.label(), "Base#m");
    }

    #[test]
    fn test_candidates_list() {
        let mut fx = Fixture::new();
        let base = fx.class("Base", None);
        let derived = fx.class("Derived", Some("Base"));
        let r = fx.refinement("R", "Base", "m", "R#m");

        let order = Resolver::new(&fx.model)
            .candidates(&fx.ctx(derived, "m", &[r]))
            .unwrap();
        let owners: Vec<_> = order.iter().map(|c| c.owner).collect();
        assert_eq!(
            owners,
            vec![
                MethodOwner::Class(derived),
                MethodOwner::Refinement { set: r, target: base },
                MethodOwner::Class(base),
            ]
        );
    }

    #[test]
    fn test_unknown_refinement_in_snapshot() {
        let mut fx = Fixture::new();
        let c = fx.class("C", None);
        let ctx = fx.ctx(c, "foo", &[RefinementId::new(42)]);
        assert!(matches!(
            fx.label(&ctx),
            Err(RefineError::UnknownRefinementSet(_))
        ));
    }

    #[test]
    fn test_depth_limit_is_an_error_not_a_miss() {
        let mut fx = Fixture::new();
        let a = fx.class("A", None);
        fx.class("B", Some("A"));
        let c = fx.class("C", Some("B"));
        fx.method(a, "top", "A#top");

        let resolver = Resolver::new(&fx.model).with_max_depth(2);
        let err = resolver.resolve(&fx.ctx(c, "top", &[])).unwrap_err();
        assert_eq!(
            err,
            RefineError::AncestorDepthExceeded {
                class: "A".into(),
                limit: 2
            }
        );
        assert!(!err.is_method_missing());
        assert_eq!(Resolver::new(&fx.model).resolve(&fx.ctx(c, "top", &[])).unwrap().label(), "A#top");
    }
}

//! Engine host: the API a host interpreter talks to.
//!
//! An [`Engine`] owns the process-wide [`Model`] behind a readers-writer
//! lock: definitions and commits take the write side, resolution takes the
//! read side. Each logical execution context (thread, fiber) gets its own
//! [`ExecutionContext`] with a private [`ScopeStack`].
//!
//! ```ignore
//! use refine::engine::Engine;
//! use refine::model::MethodImpl;
//! use refine::scope::ScopeKind;
//!
//! let engine = Engine::new();
//! engine.define(|model| model.registry.define_class("C", None))?;
//! engine.refinement_set("M", |set| {
//!     set.refine("C")?.add_method("foo", MethodImpl::new("M#foo"));
//!     Ok(())
//! })?;
//!
//! let mut cx = engine.context();
//! cx.enter_scope(ScopeKind::TopLevel);
//! cx.activate("M")?;
//! let caller = cx.define_method("main");
//! let hit = cx.call("C", "foo", &caller)?;
//! assert_eq!(hit.label(), "M#foo");
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::base::{RefinementId, ScopeId};
use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCollector, EXPERIMENTAL_REFINEMENTS, WarningOnce};
use crate::error::{RefineError, Result};
use crate::model::{MethodImpl, Model, RefinementSetBuilder, Snapshot};
use crate::resolve::{CallEntry, CallGate, Candidate, ResolutionContext, ResolvedMethod, Resolver};
use crate::scope::{ScopeKind, ScopeStack};

/// Shared handle to a program's classes, modules and refinements.
///
/// Cloning is cheap and every clone sees the same model.
#[derive(Clone)]
pub struct Engine {
    model: Arc<RwLock<Model>>,
    config: EngineConfig,
    diagnostics: Arc<Mutex<DiagnosticCollector>>,
    experimental: &'static WarningOnce,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            model: Arc::new(RwLock::new(Model::new())),
            config,
            diagnostics: Arc::new(Mutex::new(DiagnosticCollector::new())),
            experimental: &EXPERIMENTAL_REFINEMENTS,
        }
    }

    /// Report the experimental-feature warning through `warning` instead
    /// of the process-wide one.
    pub fn with_warning(mut self, warning: &'static WarningOnce) -> Self {
        self.experimental = warning;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn call_gate(&self) -> CallGate {
        CallGate::new(self.config.indirect_calls)
    }

    /// Mutate the model under the write lock.
    ///
    /// Every refinement commit goes through here, so this is where the
    /// experimental warning for commits is raised.
    pub fn define<R>(&self, f: impl FnOnce(&mut Model) -> Result<R>) -> Result<R> {
        let (result, committed) = {
            let mut model = self.model.write();
            let before = model.refinements.len();
            let result = f(&mut model);
            (result, model.refinements.len() > before)
        };
        if committed {
            self.raise_experimental();
        }
        result
    }

    /// Read the model under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Model) -> R) -> R {
        let model = self.model.read();
        f(&model)
    }

    /// Declare and commit a refinement set in one step.
    pub fn refinement_set(
        &self,
        name: &str,
        f: impl FnOnce(&mut RefinementSetBuilder<'_>) -> Result<()>,
    ) -> Result<RefinementId> {
        self.define(|model| {
            let mut builder = model.begin_refinement_set(name);
            f(&mut builder)?;
            builder.commit()
        })
    }

    /// A fresh execution context with an empty scope stack.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            engine: self.clone(),
            stack: ScopeStack::new(),
        }
    }

    fn resolver<'m>(&self, model: &'m Model) -> Resolver<'m> {
        Resolver::new(model)
            .with_gate(self.call_gate())
            .with_max_depth(self.config.max_ancestor_depth)
    }

    pub fn resolve(&self, ctx: &ResolutionContext) -> Result<ResolvedMethod> {
        let model = self.model.read();
        self.resolver(&model).resolve(ctx)
    }

    /// `super` from the body found at `from`.
    pub fn resolve_super(&self, ctx: &ResolutionContext, from: Candidate) -> Result<ResolvedMethod> {
        let model = self.model.read();
        self.resolver(&model).resolve_super(ctx, from)
    }

    /// Resolve many call sites in parallel against one consistent model.
    pub fn resolve_batch(&self, contexts: &[ResolutionContext]) -> Vec<Result<ResolvedMethod>> {
        let model = self.model.read();
        let resolver = self.resolver(&model);
        contexts.par_iter().map(|ctx| resolver.resolve(ctx)).collect()
    }

    /// Build a context for calling `selector` on an instance of `receiver`
    /// from inside `caller`.
    pub fn call_context(
        &self,
        receiver: &str,
        selector: &str,
        caller: &MethodImpl,
        entry: CallEntry,
    ) -> Result<ResolutionContext> {
        let model = self.model.read();
        let class = model.registry.class(receiver)?;
        // A selector nobody ever defined cannot resolve; don't grow the
        // interner for it.
        let Some(name) = model.registry.interner().find(selector) else {
            return Err(RefineError::MethodNotFound {
                class: model.registry.class_name(class),
                method: selector.into(),
            });
        };
        Ok(ResolutionContext::from_caller(class, name, caller, entry))
    }

    /// Names of the sets visible through `snapshot`.
    pub fn used_refinements(&self, snapshot: &Snapshot) -> Vec<String> {
        self.read(|model| {
            model
                .used_refinements(snapshot)
                .into_iter()
                .map(|name| name.to_string())
                .collect()
        })
    }

    /// Record an error for the host's log.
    pub fn report(&self, err: &RefineError) {
        self.diagnostics.lock().error(err);
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().diagnostics().to_vec()
    }

    fn raise_experimental(&self) {
        if self.config.experimental_warning {
            self.diagnostics.lock().raise_once(self.experimental);
        }
    }
}

/// One logical thread of execution: a private scope stack over a shared
/// engine.
#[derive(Debug)]
pub struct ExecutionContext {
    engine: Engine,
    stack: ScopeStack,
}

impl ExecutionContext {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.stack
    }

    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        self.stack.enter_scope(kind)
    }

    pub fn enter_method_body(&mut self, body: &MethodImpl) -> ScopeId {
        self.stack.enter_method_body(body)
    }

    pub fn exit_scope(&mut self, scope: ScopeId) -> Result<()> {
        self.stack.exit_scope(scope)
    }

    /// Run `f` in a scope of `kind` that is closed when `f` returns.
    pub fn with_scope<R>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let scope = self.stack.enter_scope(kind);
        let result = f(self);
        self.stack.unwind_to(scope)?;
        result
    }

    /// Execute an activation statement for the set named `name`.
    pub fn activate(&mut self, name: &str) -> Result<Vec<RefinementId>> {
        let added = {
            let model = self.engine.model.read();
            let id = model.refinement(name)?;
            self.stack.activate(&model.refinements, id)?
        };
        self.engine.raise_experimental();
        Ok(added)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.stack.snapshot()
    }

    /// Define a body at the current point, capturing the snapshot.
    pub fn define_method(&self, label: &str) -> MethodImpl {
        self.stack.define_method(label)
    }

    /// Define a method on a class at the current point.
    pub fn def(&self, class: &str, selector: &str, label: &str) -> Result<MethodImpl> {
        let body = self.define_method(label);
        self.engine.define(|model| {
            let class = model.registry.class(class)?;
            model.registry.add_method(class, selector, body.clone())
        })?;
        Ok(body)
    }

    /// A direct call from `caller`.
    pub fn call(&self, receiver: &str, selector: &str, caller: &MethodImpl) -> Result<ResolvedMethod> {
        self.call_via(receiver, selector, caller, CallEntry::Syntax)
    }

    /// A call from `caller` through `entry`.
    pub fn call_via(
        &self,
        receiver: &str,
        selector: &str,
        caller: &MethodImpl,
        entry: CallEntry,
    ) -> Result<ResolvedMethod> {
        let ctx = self.engine.call_context(receiver, selector, caller, entry)?;
        self.engine.resolve(&ctx)
    }

    /// `super` from inside `current`, the method a previous call reached.
    pub fn call_super(
        &self,
        receiver: &str,
        selector: &str,
        current: &ResolvedMethod,
    ) -> Result<ResolvedMethod> {
        let ctx = self.engine.call_context(receiver, selector, &current.body, CallEntry::Super)?;
        self.engine.resolve_super(&ctx, current.candidate())
    }

    /// Names of the sets active at the current point.
    pub fn used_refinements(&self) -> Vec<String> {
        self.engine.used_refinements(&self.stack.snapshot())
    }
}

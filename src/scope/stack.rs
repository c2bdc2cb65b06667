//! Lexical activation scopes of one execution context.

use crate::base::{RefinementId, ScopeId};
use crate::error::{RefineError, Result};
use crate::model::{MethodImpl, RefinementTable, Snapshot};

/// What opened a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A loaded file. Starts with nothing active: activations in the file
    /// that loads it are not lexically visible here.
    TopLevel,
    /// Code evaluated from a string. Inherits the enclosing scope and ends
    /// with the string.
    StringEval,
    /// A class or module body. Inherits the enclosing scope and ends with
    /// the body.
    ClassBody,
    /// A method or block body executing. Starts from the snapshot recorded
    /// where the body was defined; activation is not allowed inside it.
    MethodBody,
}

impl ScopeKind {
    pub fn permits_activation(self) -> bool {
        !matches!(self, ScopeKind::MethodBody)
    }
}

#[derive(Clone, Debug)]
struct ScopeData {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    /// Visible at entry.
    inherited: Snapshot,
    /// Activated inside this scope so far, oldest first.
    activated: Vec<RefinementId>,
    open: bool,
}

impl ScopeData {
    fn snapshot(&self) -> Snapshot {
        self.inherited.extended(&self.activated)
    }
}

/// Stack of open scopes for a single logical execution context.
///
/// Every context owns its own stack; nothing here is shared between
/// threads. Closed scopes stay in the arena so their final snapshot can
/// still be inspected through their `ScopeId`.
#[derive(Clone, Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<ScopeData>,
    open: Vec<ScopeId>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost open scope.
    pub fn current(&self) -> Option<ScopeId> {
        self.open.last().copied()
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn kind(&self, scope: ScopeId) -> Option<ScopeKind> {
        self.scopes.get(scope.slot()).map(|s| s.kind)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.slot()).and_then(|s| s.parent)
    }

    pub fn is_open(&self, scope: ScopeId) -> bool {
        self.scopes.get(scope.slot()).is_some_and(|s| s.open)
    }

    /// Open a scope nested in the current one.
    ///
    /// `MethodBody` opened this way inherits the current state, which is
    /// right for a block run where it is written; bodies defined elsewhere
    /// go through [`enter_method_body`](Self::enter_method_body).
    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let inherited = match kind {
            ScopeKind::TopLevel => Snapshot::empty(),
            _ => self.snapshot(),
        };
        self.push(kind, inherited)
    }

    /// Open the scope a method body runs in, seeded from its definition.
    pub fn enter_method_body(&mut self, body: &MethodImpl) -> ScopeId {
        self.push(ScopeKind::MethodBody, body.snapshot().clone())
    }

    fn push(&mut self, kind: ScopeKind, inherited: Snapshot) -> ScopeId {
        let id = ScopeId::new(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            kind,
            parent: self.current(),
            inherited,
            activated: Vec::new(),
            open: true,
        });
        self.open.push(id);
        tracing::trace!(scope = %id, ?kind, "enter scope");
        id
    }

    /// Close `scope`, which must be the innermost open scope.
    pub fn exit_scope(&mut self, scope: ScopeId) -> Result<()> {
        let current = self.current().ok_or(RefineError::NoOpenScope)?;
        if current != scope {
            return Err(RefineError::ScopeMismatch {
                given: scope,
                current,
            });
        }
        self.open.pop();
        if let Some(data) = self.scopes.get_mut(scope.slot()) {
            data.open = false;
        }
        tracing::trace!(scope = %scope, "exit scope");
        Ok(())
    }

    /// Run `f` inside a fresh scope of `kind`, closing it afterwards even
    /// when `f` fails.
    pub fn with_scope<R>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let scope = self.enter_scope(kind);
        let result = f(self);
        self.unwind_to(scope)?;
        result
    }

    /// Close every scope opened since `scope`, then `scope` itself.
    ///
    /// A no-op when `scope` is already closed.
    pub fn unwind_to(&mut self, scope: ScopeId) -> Result<()> {
        while self.is_open(scope) {
            let Some(top) = self.current() else { break };
            self.exit_scope(top)?;
        }
        Ok(())
    }

    /// Activate the set with id `set` (and the sets it imports) from this
    /// point of the current scope onward.
    ///
    /// Returns the ids that became visible; sets already visible keep their
    /// original position and are not returned.
    pub fn activate(
        &mut self,
        table: &RefinementTable,
        set: RefinementId,
    ) -> Result<Vec<RefinementId>> {
        let current = self.current().ok_or(RefineError::NoOpenScope)?;
        let order = table.activation_order(set)?;
        let data = &mut self.scopes[current.slot()];
        if !data.kind.permits_activation() {
            return Err(RefineError::ActivationNotPermitted);
        }

        let mut added = Vec::new();
        for id in order {
            if data.inherited.contains(id) || data.activated.contains(&id) {
                continue;
            }
            data.activated.push(id);
            added.push(id);
        }
        tracing::debug!(scope = %current, set = %set, ?added, "activate refinements");
        Ok(added)
    }

    /// Refinements visible at the current point of execution.
    pub fn snapshot(&self) -> Snapshot {
        match self.current() {
            Some(scope) => self.scopes[scope.slot()].snapshot(),
            None => Snapshot::empty(),
        }
    }

    /// Refinements visible in `scope`: now if it is open, at its end if it
    /// has been closed.
    pub fn snapshot_at(&self, scope: ScopeId) -> Option<Snapshot> {
        self.scopes.get(scope.slot()).map(ScopeData::snapshot)
    }

    /// Define a method or block body here, recording the current snapshot.
    pub fn define_method(&self, label: &str) -> MethodImpl {
        MethodImpl::with_snapshot(label, self.snapshot())
    }
}

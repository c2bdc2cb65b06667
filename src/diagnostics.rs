//! Diagnostics: warnings and errors surfaced to the host.
//!
//! The engine itself only ever warns about one thing: that refinements are
//! an experimental feature. That warning is process-wide and fires exactly
//! once, on the first commit or the first activation, whichever comes
//! first. Errors are returned as [`RefineError`](crate::error::RefineError)
//! values; hosts that keep a log of them can convert each one into a
//! [`Diagnostic`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::base::ScopeId;
use crate::error::RefineError;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A diagnostic message, optionally tied to the scope that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Error/warning code (e.g., "E0101").
    pub code: Option<Arc<str>>,
    pub message: Arc<str>,
    /// Scope that was innermost when the diagnostic was raised.
    pub scope: Option<ScopeId>,
}

impl Diagnostic {
    pub fn error(message: impl Into<Arc<str>>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            scope: None,
        }
    }

    pub fn warning(message: impl Into<Arc<str>>) -> Self {
        Self {
            severity: Severity::Warning,
            code: None,
            message: message.into(),
            scope: None,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<Arc<str>>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the scope the diagnostic belongs to.
    pub fn in_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl From<&RefineError> for Diagnostic {
    fn from(err: &RefineError) -> Self {
        Diagnostic::error(err.to_string()).with_code(err.code())
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Stable codes for every condition the engine reports.
pub mod codes {
    pub const INVALID_REFINEMENT_TARGET: &str = "E0101";
    pub const UNKNOWN_CLASS: &str = "E0102";
    pub const UNKNOWN_MODULE: &str = "E0103";
    pub const UNKNOWN_REFINEMENT_SET: &str = "E0104";
    pub const METHOD_NOT_FOUND: &str = "E0105";
    pub const SUPERCLASS_MISMATCH: &str = "E0106";
    pub const KIND_MISMATCH: &str = "E0107";
    pub const DUPLICATE_REFINEMENT_SET: &str = "E0108";
    pub const ACTIVATION_NOT_PERMITTED: &str = "E0109";
    pub const SCOPE_MISMATCH: &str = "E0110";
    pub const ANCESTOR_DEPTH_EXCEEDED: &str = "E0111";

    /// Refinements are experimental.
    pub const EXPERIMENTAL_FEATURE: &str = "W0101";
}

// ============================================================================
// ONE-SHOT WARNINGS
// ============================================================================

/// A warning that may be raised many times but is emitted at most once.
///
/// Safe to share between threads: the first caller to flip the flag wins
/// and every other caller, concurrent or later, sees it already set.
#[derive(Debug)]
pub struct WarningOnce {
    code: &'static str,
    message: &'static str,
    emitted: AtomicBool,
    raised: AtomicUsize,
}

impl WarningOnce {
    pub const fn new(code: &'static str, message: &'static str) -> Self {
        Self {
            code,
            message,
            emitted: AtomicBool::new(false),
            raised: AtomicUsize::new(0),
        }
    }

    /// Raise the warning. Returns the diagnostic only for the first raise.
    pub fn raise(&self) -> Option<Diagnostic> {
        self.raised.fetch_add(1, Ordering::Relaxed);
        if self.emitted.swap(true, Ordering::AcqRel) {
            return None;
        }
        tracing::warn!(code = self.code, "{}", self.message);
        Some(Diagnostic::warning(self.message).with_code(self.code))
    }

    /// Whether the warning has been emitted.
    pub fn has_fired(&self) -> bool {
        self.emitted.load(Ordering::Acquire)
    }

    /// How many times the warning was raised, emitted or not.
    pub fn times_raised(&self) -> usize {
        self.raised.load(Ordering::Relaxed)
    }
}

/// The process-wide experimental-feature warning for refinements.
pub static EXPERIMENTAL_REFINEMENTS: WarningOnce = WarningOnce::new(
    codes::EXPERIMENTAL_FEATURE,
    "Refinements are experimental, and the behavior may change in future versions",
);

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics produced while an engine runs.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record an error returned by the engine.
    pub fn error(&mut self, err: &RefineError) {
        self.add(Diagnostic::from(err));
    }

    /// Raise a one-shot warning, recording it if this is its first emission.
    pub fn raise_once(&mut self, warning: &WarningOnce) {
        if let Some(diag) = warning.raise() {
            self.add(diag);
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics carrying a given code.
    pub fn with_code(&self, code: &str) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.code.as_deref() == Some(code))
            .collect()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

//! Error taxonomy shared by every layer of the engine.

use smol_str::SmolStr;
use thiserror::Error;

use crate::base::ScopeId;
use crate::diagnostics::codes;

/// Errors reported to the invocation evaluator.
///
/// All variants are local and recoverable. The resolver never swallows one;
/// `MethodNotFound` in particular is meant to be routed into the host's own
/// missing-method hook.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RefineError {
    #[error("wrong argument type {name} (expected class): modules cannot be refined")]
    InvalidRefinementTarget { name: SmolStr },

    #[error("uninitialized constant {0} (expected a class)")]
    UnknownClass(SmolStr),

    #[error("uninitialized constant {0} (expected a module)")]
    UnknownModule(SmolStr),

    #[error("unknown refinement set `{0}`")]
    UnknownRefinementSet(SmolStr),

    #[error("undefined method `{method}` for class {class}")]
    MethodNotFound { class: SmolStr, method: SmolStr },

    #[error("superclass mismatch for class {class}: was {existing}, given {given}")]
    SuperclassMismatch {
        class: SmolStr,
        existing: SmolStr,
        given: SmolStr,
    },

    #[error("{name} is not a {expected}")]
    KindMismatch {
        name: SmolStr,
        expected: &'static str,
    },

    #[error("refinement set `{0}` is already committed")]
    DuplicateRefinementSet(SmolStr),

    #[error("refinements cannot be activated inside a method body")]
    ActivationNotPermitted,

    #[error("cannot exit {given}: innermost open scope is {current}")]
    ScopeMismatch { given: ScopeId, current: ScopeId },

    #[error("no scope is open")]
    NoOpenScope,

    /// The ancestor walk from `class` passed the configured depth limit.
    #[error("ancestor chain of {class} is deeper than {limit} levels")]
    AncestorDepthExceeded { class: SmolStr, limit: usize },
}

impl RefineError {
    /// Stable diagnostic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RefineError::InvalidRefinementTarget { .. } => codes::INVALID_REFINEMENT_TARGET,
            RefineError::UnknownClass(_) => codes::UNKNOWN_CLASS,
            RefineError::UnknownModule(_) => codes::UNKNOWN_MODULE,
            RefineError::UnknownRefinementSet(_) => codes::UNKNOWN_REFINEMENT_SET,
            RefineError::MethodNotFound { .. } => codes::METHOD_NOT_FOUND,
            RefineError::SuperclassMismatch { .. } => codes::SUPERCLASS_MISMATCH,
            RefineError::KindMismatch { .. } => codes::KIND_MISMATCH,
            RefineError::DuplicateRefinementSet(_) => codes::DUPLICATE_REFINEMENT_SET,
            RefineError::ActivationNotPermitted => codes::ACTIVATION_NOT_PERMITTED,
            RefineError::ScopeMismatch { .. } | RefineError::NoOpenScope => codes::SCOPE_MISMATCH,
            RefineError::AncestorDepthExceeded { .. } => codes::ANCESTOR_DEPTH_EXCEEDED,
        }
    }

    /// True for the condition the host should hand to its missing-method hook.
    pub fn is_method_missing(&self) -> bool {
        matches!(self, RefineError::MethodNotFound { .. })
    }
}

pub type Result<T, E = RefineError> = std::result::Result<T, E>;

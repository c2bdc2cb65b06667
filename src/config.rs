//! Engine configuration.

/// How indirect invocations (send-by-name, method objects, capability
/// queries) treat active refinements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IndirectPolicy {
    /// Indirect calls resolve as if no refinement were ever activated.
    #[default]
    BypassRefinements,
    /// Indirect calls use the caller's snapshot like direct calls do.
    HonorRefinements,
}

/// Options for an [`Engine`](crate::engine::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Emit the one-shot experimental-feature warning.
    pub experimental_warning: bool,
    /// Policy for the indirect-call gate.
    pub indirect_calls: IndirectPolicy,
    /// Upper bound on the number of classes walked for one lookup. A lookup
    /// that needs more fails with `AncestorDepthExceeded`.
    pub max_ancestor_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            experimental_warning: true,
            indirect_calls: IndirectPolicy::default(),
            max_ancestor_depth: 1024,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_experimental_warning(mut self, enabled: bool) -> Self {
        self.experimental_warning = enabled;
        self
    }

    pub fn with_indirect_calls(mut self, policy: IndirectPolicy) -> Self {
        self.indirect_calls = policy;
        self
    }

    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth.max(1);
        self
    }
}

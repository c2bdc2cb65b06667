//! Arena identifiers for definitions and scopes.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $display:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            /// Get the raw index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) const fn slot(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($display, "#{}"), self.0)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

arena_id!(
    /// A class in the [`Registry`](crate::model::Registry).
    ///
    /// Classes are never deleted during a session, so ids stay valid for the
    /// life of the registry that issued them.
    ClassId,
    "class"
);

arena_id!(
    /// A module in the [`Registry`](crate::model::Registry).
    ModuleId,
    "module"
);

arena_id!(
    /// A committed refinement set.
    ///
    /// Ids are handed out in commit order.
    RefinementId,
    "refinement"
);

arena_id!(
    /// A node of an execution context's [`ScopeStack`](crate::scope::ScopeStack).
    ScopeId,
    "scope"
);

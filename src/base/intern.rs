//! String interning for class, module, method and refinement names.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;

/// An interned identifier.
///
/// `Name` is a lightweight handle (just a u32) standing for a constant name
/// (`Integer`, `Comparable`, `StringRefinements`) or a method selector
/// (`to_s`, `+`). The text lives in the [`Interner`] that produced it.
///
/// Method tables are keyed by `Name`, so every lookup step of the resolver
/// is a hash of a `u32` instead of a string.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub(crate) const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Deduplicating store of every name the engine has seen.
///
/// Interning takes `&self` so that call sites holding only a read guard on
/// the registry can still produce selectors.
#[derive(Default)]
pub struct Interner {
    inner: RwLock<InternerInner>,
}

#[derive(Default)]
struct InternerInner {
    map: FxHashMap<SmolStr, u32>,
    strings: Vec<SmolStr>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its `Name`.
    pub fn intern(&self, s: &str) -> Name {
        if let Some(name) = self.find(s) {
            return name;
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race between the two locks.
        if let Some(&index) = inner.map.get(s) {
            return Name::from_raw(index);
        }

        let text = SmolStr::new(s);
        let index = inner.strings.len() as u32;
        inner.strings.push(text.clone());
        inner.map.insert(text, index);
        Name::from_raw(index)
    }

    /// Find the `Name` of a string without interning it.
    ///
    /// A string that was never interned cannot name any method, so callers
    /// use this to fail a lookup early.
    pub fn find(&self, s: &str) -> Option<Name> {
        self.inner.read().map.get(s).copied().map(Name::from_raw)
    }

    /// Look up the text of a `Name`.
    ///
    /// Returns `None` if the `Name` came from a different interner.
    pub fn lookup(&self, name: Name) -> Option<SmolStr> {
        self.inner.read().strings.get(name.0 as usize).cloned()
    }

    /// Text of a `Name` for messages; foreign names render as `#<index>`.
    pub fn display(&self, name: Name) -> SmolStr {
        self.lookup(name)
            .unwrap_or_else(|| SmolStr::new(format!("#{}", name.0)))
    }

    pub fn len(&self) -> usize {
        self.inner.read().strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner")
            .field("count", &self.len())
            .finish()
    }
}

//! Class/module registry: structural bookkeeping only.
//!
//! The registry knows which classes and modules exist, what they define
//! and how they are linked (superclass, included modules, prepended
//! modules). It knows nothing about refinements; those are overlays kept in
//! [`RefinementTable`](super::RefinementTable) and only combined with the
//! registry by the resolver.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::method::{MethodImpl, MethodTable};
use crate::base::{ClassId, Interner, ModuleId, Name};
use crate::error::{RefineError, Result};

/// A class: optional superclass, module lists and its own methods.
#[derive(Clone, Debug)]
pub struct ClassDef {
    pub id: ClassId,
    pub name: Name,
    pub superclass: Option<ClassId>,
    /// Included modules in inclusion order (searched last-first).
    pub includes: Vec<ModuleId>,
    /// Prepended modules in prepend order (searched last-first).
    pub prepends: Vec<ModuleId>,
    pub methods: MethodTable,
}

/// A module. Modules carry methods but cannot be refined.
#[derive(Clone, Debug)]
pub struct ModuleDef {
    pub id: ModuleId,
    pub name: Name,
    pub methods: MethodTable,
}

/// Something that owns a method table in an ancestor chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ancestor {
    Class(ClassId),
    Module(ModuleId),
}

impl From<ClassId> for Ancestor {
    fn from(id: ClassId) -> Self {
        Ancestor::Class(id)
    }
}

impl From<ModuleId> for Ancestor {
    fn from(id: ModuleId) -> Self {
        Ancestor::Module(id)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Constant {
    Class(ClassId),
    Module(ModuleId),
}

/// All classes and modules of a program, plus the names they use.
#[derive(Debug, Default)]
pub struct Registry {
    interner: Interner,
    classes: Vec<ClassDef>,
    modules: Vec<ModuleDef>,
    constants: FxHashMap<Name, Constant>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Intern a method selector or constant name.
    pub fn intern(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    /// Text of a name, for messages.
    pub fn display(&self, name: Name) -> SmolStr {
        self.interner.display(name)
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    /// Define a class, or reopen it if it already exists.
    ///
    /// Reopening with a superclass different from the original one fails
    /// with `SuperclassMismatch`; reopening without naming a superclass
    /// keeps the existing one. A superclass must already be defined, so
    /// the superclass graph can never contain a cycle.
    pub fn define_class(&mut self, name: &str, superclass: Option<&str>) -> Result<ClassId> {
        let superclass = superclass.map(|s| self.class(s)).transpose()?;
        let key = self.intern(name);

        match self.constants.get(&key).copied() {
            Some(Constant::Class(existing)) => {
                let current = self.classes[existing.slot()].superclass;
                if let Some(given) = superclass
                    && current != Some(given)
                {
                    return Err(RefineError::SuperclassMismatch {
                        class: name.into(),
                        existing: current
                            .map(|c| self.class_name(c))
                            .unwrap_or_else(|| SmolStr::new_static("(none)")),
                        given: self.class_name(given),
                    });
                }
                tracing::debug!(class = name, "reopen class");
                Ok(existing)
            }
            Some(Constant::Module(_)) => Err(RefineError::KindMismatch {
                name: name.into(),
                expected: "class",
            }),
            None => {
                let id = ClassId::new(self.classes.len() as u32);
                self.classes.push(ClassDef {
                    id,
                    name: key,
                    superclass,
                    includes: Vec::new(),
                    prepends: Vec::new(),
                    methods: MethodTable::new(),
                });
                self.constants.insert(key, Constant::Class(id));
                tracing::debug!(class = name, %id, ?superclass, "define class");
                Ok(id)
            }
        }
    }

    /// Define a module, or reopen it if it already exists.
    pub fn define_module(&mut self, name: &str) -> Result<ModuleId> {
        let key = self.intern(name);
        match self.constants.get(&key).copied() {
            Some(Constant::Module(existing)) => Ok(existing),
            Some(Constant::Class(_)) => Err(RefineError::KindMismatch {
                name: name.into(),
                expected: "module",
            }),
            None => {
                let id = ModuleId::new(self.modules.len() as u32);
                self.modules.push(ModuleDef {
                    id,
                    name: key,
                    methods: MethodTable::new(),
                });
                self.constants.insert(key, Constant::Module(id));
                tracing::debug!(module = name, %id, "define module");
                Ok(id)
            }
        }
    }

    /// Define (or redefine) a method on a class or module.
    pub fn add_method(
        &mut self,
        owner: impl Into<Ancestor>,
        selector: &str,
        body: MethodImpl,
    ) -> Result<()> {
        let selector = self.intern(selector);
        let table = match owner.into() {
            Ancestor::Class(id) => &mut self.class_def_mut(id)?.methods,
            Ancestor::Module(id) => &mut self.module_def_mut(id)?.methods,
        };
        table.define(selector, body);
        Ok(())
    }

    /// Include a module into a class. Including it twice is a no-op.
    pub fn include_module(&mut self, class: ClassId, module: ModuleId) -> Result<()> {
        self.module_def(module)?;
        let def = self.class_def_mut(class)?;
        if !def.includes.contains(&module) {
            def.includes.push(module);
        }
        Ok(())
    }

    /// Prepend a module to a class. Prepending it twice is a no-op.
    pub fn prepend_module(&mut self, class: ClassId, module: ModuleId) -> Result<()> {
        self.module_def(module)?;
        let def = self.class_def_mut(class)?;
        if !def.prepends.contains(&module) {
            def.prepends.push(module);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Find a class by name.
    pub fn class(&self, name: &str) -> Result<ClassId> {
        match self.constant(name) {
            Some(Constant::Class(id)) => Ok(id),
            Some(Constant::Module(_)) => Err(RefineError::KindMismatch {
                name: name.into(),
                expected: "class",
            }),
            None => Err(RefineError::UnknownClass(name.into())),
        }
    }

    /// Find a module by name.
    pub fn module(&self, name: &str) -> Result<ModuleId> {
        match self.constant(name) {
            Some(Constant::Module(id)) => Ok(id),
            Some(Constant::Class(_)) => Err(RefineError::KindMismatch {
                name: name.into(),
                expected: "module",
            }),
            None => Err(RefineError::UnknownModule(name.into())),
        }
    }

    /// Whether `name` is bound to a module (not a class).
    pub fn is_module(&self, name: &str) -> bool {
        matches!(self.constant(name), Some(Constant::Module(_)))
    }

    fn constant(&self, name: &str) -> Option<Constant> {
        let key = self.interner.find(name)?;
        self.constants.get(&key).copied()
    }

    pub fn class_def(&self, id: ClassId) -> Result<&ClassDef> {
        self.classes
            .get(id.slot())
            .ok_or_else(|| RefineError::UnknownClass(id.to_string().into()))
    }

    fn class_def_mut(&mut self, id: ClassId) -> Result<&mut ClassDef> {
        self.classes
            .get_mut(id.slot())
            .ok_or_else(|| RefineError::UnknownClass(id.to_string().into()))
    }

    pub fn module_def(&self, id: ModuleId) -> Result<&ModuleDef> {
        self.modules
            .get(id.slot())
            .ok_or_else(|| RefineError::UnknownModule(id.to_string().into()))
    }

    fn module_def_mut(&mut self, id: ModuleId) -> Result<&mut ModuleDef> {
        self.modules
            .get_mut(id.slot())
            .ok_or_else(|| RefineError::UnknownModule(id.to_string().into()))
    }

    /// Method table of a class or module.
    pub fn methods_of(&self, owner: Ancestor) -> Result<&MethodTable> {
        match owner {
            Ancestor::Class(id) => Ok(&self.class_def(id)?.methods),
            Ancestor::Module(id) => Ok(&self.module_def(id)?.methods),
        }
    }

    pub fn class_name(&self, id: ClassId) -> SmolStr {
        match self.classes.get(id.slot()) {
            Some(def) => self.display(def.name),
            None => id.to_string().into(),
        }
    }

    pub fn module_name(&self, id: ModuleId) -> SmolStr {
        match self.modules.get(id.slot()) {
            Some(def) => self.display(def.name),
            None => id.to_string().into(),
        }
    }

    pub fn ancestor_name(&self, ancestor: Ancestor) -> SmolStr {
        match ancestor {
            Ancestor::Class(id) => self.class_name(id),
            Ancestor::Module(id) => self.module_name(id),
        }
    }

    /// The class followed by its superclasses, nearest first.
    pub fn superclass_chain(&self, class: ClassId) -> Result<Vec<ClassId>> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            chain.push(id);
            current = self.class_def(id)?.superclass;
        }
        Ok(chain)
    }

    /// Linearized ancestors of a class, ignoring refinements.
    ///
    /// For each class from `class` up: its prepended modules (most recent
    /// first), the class itself, its included modules (most recent first).
    pub fn ancestor_chain(&self, class: ClassId) -> Result<Vec<Ancestor>> {
        let mut chain = Vec::new();
        for id in self.superclass_chain(class)? {
            let def = self.class_def(id)?;
            chain.extend(def.prepends.iter().rev().copied().map(Ancestor::Module));
            chain.push(Ancestor::Class(id));
            chain.extend(def.includes.iter().rev().copied().map(Ancestor::Module));
        }
        Ok(chain)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(registry: &Registry, chain: &[Ancestor]) -> Vec<String> {
        chain
            .iter()
            .map(|a| registry.ancestor_name(*a).to_string())
            .collect()
    }

    #[test]
    fn test_define_and_reopen_class() {
        let mut registry = Registry::new();
        let base = registry.define_class("Base", None).unwrap();
        let derived = registry.define_class("Derived", Some("Base")).unwrap();

        assert_eq!(registry.define_class("Derived", None).unwrap(), derived);
        assert_eq!(registry.define_class("Derived", Some("Base")).unwrap(), derived);
        assert_eq!(registry.class_def(derived).unwrap().superclass, Some(base));
        assert_eq!(registry.class_count(), 2);
    }

    #[test]
    fn test_superclass_mismatch() {
        let mut registry = Registry::new();
        registry.define_class("A", None).unwrap();
        registry.define_class("B", None).unwrap();
        registry.define_class("C", Some("A")).unwrap();

        let err = registry.define_class("C", Some("B")).unwrap_err();
        assert!(matches!(err, RefineError::SuperclassMismatch { .. }));
    }

    #[test]
    fn test_unknown_superclass() {
        let mut registry = Registry::new();
        let err = registry.define_class("C", Some("Nope")).unwrap_err();
        assert_eq!(err, RefineError::UnknownClass("Nope".into()));
        assert_eq!(registry.class_count(), 0);
    }

    #[test]
    fn test_class_module_kind_mismatch() {
        let mut registry = Registry::new();
        registry.define_module("Enumerable").unwrap();
        registry.define_class("Array", None).unwrap();

        assert!(matches!(
            registry.define_class("Enumerable", None),
            Err(RefineError::KindMismatch { expected: "class", .. })
        ));
        assert!(matches!(
            registry.module("Array"),
            Err(RefineError::KindMismatch { expected: "module", .. })
        ));
        assert_eq!(
            registry.module("Missing"),
            Err(RefineError::UnknownModule("Missing".into()))
        );
        assert!(registry.is_module("Enumerable"));
    }

    #[test]
    fn test_ancestor_chain_order() {
        let mut registry = Registry::new();
        let object = registry.define_class("Object", None).unwrap();
        let kernel = registry.define_module("Kernel").unwrap();
        registry.include_module(object, kernel).unwrap();

        let c = registry.define_class("C", Some("Object")).unwrap();
        let i1 = registry.define_module("I1").unwrap();
        let i2 = registry.define_module("I2").unwrap();
        let p1 = registry.define_module("P1").unwrap();
        let p2 = registry.define_module("P2").unwrap();
        registry.include_module(c, i1).unwrap();
        registry.include_module(c, i2).unwrap();
        registry.include_module(c, i1).unwrap();
        registry.prepend_module(c, p1).unwrap();
        registry.prepend_module(c, p2).unwrap();

        let chain = registry.ancestor_chain(c).unwrap();
        assert_eq!(
            names(&registry, &chain),
            vec!["P2", "P1", "C", "I2", "I1", "Object", "Kernel"]
        );
    }

    #[test]
    fn test_add_method_to_unknown_owner() {
        let mut registry = Registry::new();
        let err = registry
            .add_method(ClassId::new(9), "foo", MethodImpl::new("x"))
            .unwrap_err();
        assert!(matches!(err, RefineError::UnknownClass(_)));
    }
}

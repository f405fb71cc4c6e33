use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::Value;

/// One link of the scope chain. Closures keep their defining link alive
/// through the shared parent handle.
#[derive(Clone, Default)]
pub struct Environment {
    bindings: FxHashMap<String, Value>,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn boxed(parent: Option<Rc<RefCell<Environment>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Environment>>>) -> Self {
        Self {
            bindings: FxHashMap::default(),
            parent,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Binds `name` in this scope, overwriting an existing binding here.
    pub fn declare(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Rebinds the innermost existing `name`. Returns false when no scope in
    /// the chain declares it.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.bindings.get_mut(name) {
            *slot = value;
            true
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    pub fn parent(&self) -> Option<&Rc<RefCell<Environment>>> {
        self.parent.as_ref()
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(format!("Environment<{:?}>", std::ptr::from_ref(self)).as_str())
            .field(
                "bindings",
                &self
                    .bindings
                    .iter()
                    .map(|(name, value)| (name.clone(), value.type_name()))
                    .collect::<Vec<_>>(),
            )
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}

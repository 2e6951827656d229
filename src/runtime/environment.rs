use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::error::RuntimeError;
use super::value::Value;

struct Scope {
    values: FxHashMap<String, Value>,
    parent: Option<Environment>,
}

/// A chain of lexical scopes.
///
/// Cloning shares the scope. Function calls create a child of the callee's
/// defining environment, so a closure keeps its defining scope alive for as
/// long as the function value is reachable.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Scope {
            values: FxHashMap::default(),
            parent: None,
        })))
    }

    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            values: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    /// Binds in this scope, replacing any same-scope binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if let Some(value) = scope.values.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = next?;
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Rebinds at the nearest scope owning `name`; never creates a binding.
    pub fn set(&self, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.rebind(name, value)
            .map_err(|_| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    /// Assignment statement semantics: update the nearest binding, otherwise
    /// define in this scope.
    pub fn assign(&self, name: &str, value: Value) {
        if let Err(value) = self.rebind(name, value) {
            self.define(name, value);
        }
    }

    /// Single outward walk. Hands `value` back when no scope owns `name`.
    fn rebind(&self, name: &str, value: Value) -> Result<(), Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let mut scope = current.0.borrow_mut();
                if let Some(slot) = scope.values.get_mut(name) {
                    *slot = value;
                    return Ok(());
                }
                scope.parent.clone()
            };
            match next {
                Some(parent) => current = parent,
                None => return Err(value),
            }
        }
    }

    /// Bindings owned by this scope alone, sorted by name.
    pub fn bindings(&self) -> Vec<(String, Value)> {
        let mut bindings: Vec<_> = self
            .0
            .borrow()
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        bindings.sort_by(|(a, _), (b, _)| a.cmp(b));
        bindings
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        f.debug_struct("Environment")
            .field("names", &scope.values.len())
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let globals = Environment::new();
        globals.define("x", Value::Integer(1));
        let local = globals.child();
        local.define("y", Value::Integer(2));

        assert_eq!(local.get("x"), Ok(Value::Integer(1)));
        assert_eq!(local.get("y"), Ok(Value::Integer(2)));
        assert_eq!(
            globals.get("y"),
            Err(RuntimeError::UndefinedVariable {
                name: "y".to_string()
            })
        );
    }

    #[test]
    fn set_updates_owner_scope_and_rejects_unbound() {
        let globals = Environment::new();
        globals.define("count", Value::Integer(0));
        let local = globals.child();

        local.set("count", Value::Integer(5)).expect("set outer");
        assert_eq!(globals.get("count"), Ok(Value::Integer(5)));
        assert!(local.bindings().is_empty());

        assert!(matches!(
            local.set("missing", Value::Null),
            Err(RuntimeError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn define_shadows_and_assign_prefers_existing_binding() {
        let globals = Environment::new();
        globals.define("x", Value::Integer(1));
        let local = globals.child();

        local.assign("x", Value::Integer(2));
        local.assign("fresh", Value::Integer(3));
        assert_eq!(globals.get("x"), Ok(Value::Integer(2)));
        assert!(globals.lookup("fresh").is_none());
        assert_eq!(local.get("fresh"), Ok(Value::Integer(3)));

        local.define("x", Value::Integer(9));
        assert_eq!(local.get("x"), Ok(Value::Integer(9)));
        assert_eq!(globals.get("x"), Ok(Value::Integer(2)));
    }

    #[test]
    fn child_keeps_parent_alive() {
        let child = {
            let parent = Environment::new();
            parent.define("captured", Value::Integer(42));
            parent.child()
        };
        assert_eq!(child.get("captured"), Ok(Value::Integer(42)));
    }
}

// registry.rs — Imported function registry
//
// Programs may declare imported functions: externally supplied pure
// functions with a fixed typed signature, no context, no persistent state.
// The host registers implementations by name before binding a machine;
// binding fails if a declared import has no implementation.

use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// A host implementation of an imported function. Must behave as a pure
/// function of its arguments and return one value per declared result.
pub type HostFn = Box<dyn Fn(&[Value]) -> Vec<Value> + Send + Sync>;

/// Errors that can occur while populating the registry.
#[derive(Debug)]
pub enum RegistryError {
    DuplicateFunction { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateFunction { name } => {
                write!(f, "duplicate imported function '{}'", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Imported function implementations, keyed by declared name.
#[derive(Default)]
pub struct Registry {
    funcs: HashMap<String, HostFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one implementation. Registering the same name twice is an
    /// error: the binding would be ambiguous.
    pub fn register(
        &mut self,
        name: &str,
        f: impl Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        if self.funcs.contains_key(name) {
            return Err(RegistryError::DuplicateFunction { name: name.into() });
        }
        self.funcs.insert(name.to_string(), Box::new(f));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&HostFn> {
        self.funcs.get(name)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = Registry::new();
        registry.register("f", |args| vec![args[0].clone()]).unwrap();
        let err = registry
            .register("f", |args| vec![args[0].clone()])
            .unwrap_err();
        assert_eq!(format!("{}", err), "duplicate imported function 'f'");
    }

    #[test]
    fn registered_functions_are_callable_by_name() {
        let mut registry = Registry::new();
        registry
            .register("succ", |args| match args {
                [Value::I32(x)] => vec![Value::I32(x + 1)],
                other => panic!("bad arguments {:?}", other),
            })
            .unwrap();
        let f = registry.get("succ").unwrap();
        assert_eq!(f(&[Value::I32(4)]), vec![Value::I32(5)]);
    }
}

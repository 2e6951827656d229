use rustc_hash::FxHashMap;
use thiserror::Error;

use super::value::Value;

/// Namespaces the evaluator routes to the library registry.
pub const NAMESPACES: [&str; 7] = ["math", "string", "time", "system", "file", "json", "random"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Unknown library namespace '{namespace}'")]
    UnknownNamespace { namespace: String },
    #[error("Library '{namespace}' is not available")]
    Unavailable { namespace: String },
    #[error("Library '{namespace}' has no function '{name}'")]
    UnknownFunction { namespace: String, name: String },
    #[error("{namespace}.{name}: {message}")]
    Failed {
        namespace: String,
        name: String,
        message: String,
    },
}

/// One standard-library namespace, such as `math`.
pub trait Library {
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, LibraryError>;
}

#[derive(Default)]
pub struct LibraryRegistry {
    libraries: FxHashMap<String, Box<dyn Library>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        namespace: &str,
        library: Box<dyn Library>,
    ) -> Result<(), LibraryError> {
        if !is_namespace(namespace) {
            return Err(LibraryError::UnknownNamespace {
                namespace: namespace.to_string(),
            });
        }
        self.libraries.insert(namespace.to_string(), library);
        Ok(())
    }

    pub fn call(&self, namespace: &str, name: &str, args: &[Value]) -> Result<Value, LibraryError> {
        let library = self
            .libraries
            .get(namespace)
            .ok_or_else(|| LibraryError::Unavailable {
                namespace: namespace.to_string(),
            })?;
        library.call(name, args)
    }
}

pub fn is_namespace(name: &str) -> bool {
    NAMESPACES.contains(&name)
}

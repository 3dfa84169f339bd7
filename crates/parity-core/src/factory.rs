//! Registry of data handler constructors keyed by type tag
//!
//! Configuration files name handlers by type tag. Every compiled-in variant
//! registers a constructor at startup; unknown tags yield
//! [`Error::UnknownType`] rather than an empty handler.

use crate::error::{Error, Result};
use crate::handler::{is_of_family, DataHandler};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Constructor taking the instance name
pub type HandlerConstructor = fn(&str) -> Box<dyn DataHandler>;

/// Factory creating handlers from `(type_tag, name)` pairs
#[derive(Clone, Default)]
pub struct HandlerFactory {
    constructors: BTreeMap<String, HandlerConstructor>,
}

impl HandlerFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a type tag
    ///
    /// Registering a tag twice replaces the earlier constructor.
    pub fn register(&mut self, type_tag: impl Into<String>, constructor: HandlerConstructor) {
        let type_tag = type_tag.into();
        if self.constructors.insert(type_tag.clone(), constructor).is_some() {
            warn!(handler_type = %type_tag, "Replacing registered data handler constructor");
        } else {
            debug!(handler_type = %type_tag, "Registered data handler type");
        }
    }

    /// Builder-style registration
    pub fn with(mut self, type_tag: impl Into<String>, constructor: HandlerConstructor) -> Self {
        self.register(type_tag, constructor);
        self
    }

    /// Create a handler of the given type
    pub fn create(&self, type_tag: &str, name: &str) -> Result<Box<dyn DataHandler>> {
        let constructor = self
            .constructors
            .get(type_tag)
            .ok_or_else(|| Error::UnknownType(type_tag.to_string()))?;
        Ok(constructor(name))
    }

    /// Whether a type tag is registered
    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.constructors.contains_key(type_tag)
    }

    /// Registered type tags in sorted order
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Whether `handler` belongs to the runtime family `type_tag`
    pub fn inherits_from(handler: &dyn DataHandler, type_tag: &str) -> bool {
        is_of_family(handler, type_tag)
    }
}

impl std::fmt::Debug for HandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFactory")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! Controller lookup by identifier.
//!
//! Controllers are registered at startup under an identifier relative to
//! [`CONTROLLER_NAMESPACE`], e.g. `Admin::Users::Edit`. Lookups ignore ASCII
//! case, so `admin::users::edit` finds the same entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::routing::controller::Controller;
use crate::routing::matcher::NAMESPACE_SEPARATOR;

/// Namespace every controller identifier lives under.
pub const CONTROLLER_NAMESPACE: &str = "App::Controller";

/// Suffix tried when the plain identifier is not registered.
pub const CONTROLLER_SUFFIX: &str = "Controller";

/// Builds one controller instance.
pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    identifier: String,
    factory: ControllerFactory,
}

/// Identifier → controller factory map.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    entries: HashMap<String, Entry>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller under `name`, relative to the namespace.
    pub fn register<F, C>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        let identifier = qualify(name);
        let factory: ControllerFactory =
            Arc::new(move || Box::new(factory()) as Box<dyn Controller>);
        self.entries.insert(
            identifier.to_ascii_lowercase(),
            Entry {
                identifier,
                factory,
            },
        );
        self
    }

    /// Find a controller by fully qualified identifier.
    pub fn get(&self, identifier: &str) -> Option<(&str, &ControllerFactory)> {
        self.entries
            .get(&identifier.to_ascii_lowercase())
            .map(|entry| (entry.identifier.as_str(), &entry.factory))
    }

    /// Resolve a normalized route path: `<path>` first, then `<path>Controller`.
    pub fn lookup(&self, path: &str) -> Option<(&str, &ControllerFactory)> {
        let candidate = qualify(path);
        self.get(&candidate)
            .or_else(|| self.get(&format!("{candidate}{CONTROLLER_SUFFIX}")))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.entries.values().map(|e| e.identifier.as_str()).collect();
        ids.sort_unstable();
        f.debug_struct("ControllerRegistry").field("controllers", &ids).finish()
    }
}

/// Prefix `name` with the controller namespace.
pub fn qualify(name: &str) -> String {
    format!("{CONTROLLER_NAMESPACE}{NAMESPACE_SEPARATOR}{name}")
}

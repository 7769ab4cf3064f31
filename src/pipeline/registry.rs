//! Middleware lookup by identifier.
//!
//! Configuration names middleware by identifier (`middleware.global`,
//! `middleware.groups.<group>`). The registry maps each identifier to a
//! factory, and a fresh instance is built for every request.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::Middleware;

/// Builds one middleware instance.
pub type MiddlewareFactory = Arc<dyn Fn() -> Box<dyn Middleware> + Send + Sync>;

/// Identifier → factory map.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    factories: BTreeMap<String, MiddlewareFactory>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `id`, replacing any earlier registration.
    pub fn register<F, M>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: Middleware + 'static,
    {
        let factory: MiddlewareFactory =
            Arc::new(move || Box::new(factory()) as Box<dyn Middleware>);
        self.factories.insert(id.into(), factory);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Instantiate the middleware registered as `id`.
    pub fn create(&self, id: &str) -> Option<Box<dyn Middleware>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Instantiate every resolvable identifier, in order.
    ///
    /// Unknown identifiers are skipped with a warning.
    pub fn create_all<'a, I>(&self, ids: I) -> Vec<Box<dyn Middleware>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter_map(|id| {
                let created = self.create(id);
                if created.is_none() {
                    tracing::warn!(middleware = id, "Unknown middleware identifier, skipping");
                }
                created
            })
            .collect()
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("identifiers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

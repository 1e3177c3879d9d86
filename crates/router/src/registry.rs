use std::sync::Arc;

use crate::handler::DomainHandler;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Two domains claim overlapping state-key namespaces; dispatch would
    /// be ambiguous.
    #[error("state prefix '{prefix}' of domain '{domain}' overlaps '{other}'")]
    OverlappingPrefix {
        domain: String,
        prefix: String,
        other: String,
    },

    #[error("duplicate domain name: {0}")]
    DuplicateName(String),
}

/// Registry of all domain handlers, constructed once at process start and
/// passed by reference into the dispatch path. No implicit singletons.
#[derive(Default)]
pub struct DomainRegistry {
    handlers: Vec<Arc<dyn DomainHandler>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain. State-key namespaces must stay disjoint; an
    /// overlap is a startup configuration error, not a runtime condition.
    pub fn register(&mut self, handler: Arc<dyn DomainHandler>) -> Result<(), RegistryError> {
        if self.handlers.iter().any(|h| h.name() == handler.name()) {
            return Err(RegistryError::DuplicateName(handler.name().to_string()));
        }
        for existing in &self.handlers {
            for prefix in handler.state_prefixes() {
                for other in existing.state_prefixes() {
                    if prefix.starts_with(other) || other.starts_with(prefix) {
                        return Err(RegistryError::OverlappingPrefix {
                            domain: handler.name().to_string(),
                            prefix: (*prefix).to_string(),
                            other: existing.name().to_string(),
                        });
                    }
                }
            }
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Domain owning a state key, by prefix match.
    pub fn by_state_key(&self, key: &str) -> Option<&Arc<dyn DomainHandler>> {
        self.handlers
            .iter()
            .find(|h| h.state_prefixes().iter().any(|p| key.starts_with(p)))
    }

    /// Domain claiming a top-level menu keyword.
    pub fn by_keyword(&self, keyword: &str) -> Option<&Arc<dyn DomainHandler>> {
        self.handlers
            .iter()
            .find(|h| h.menu_keywords().contains(&keyword))
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

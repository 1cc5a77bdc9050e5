//! Route-name → adapter registry.
//!
//! The gateway resolves `POST /api/<protocol>/<action>` to a spec through
//! this map; the engine never needs compile-time knowledge of concrete
//! adapters, so new protocols are a `register` call away.

use crate::protocol::adapter::ProbeSpec;
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable-after-build map of protocol names to strategy records.
#[derive(Default)]
pub struct Registry {
    specs: HashMap<&'static str, Arc<ProbeSpec>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its own name. Re-registering replaces.
    pub fn register(&mut self, spec: ProbeSpec) {
        self.specs.insert(spec.name, Arc::new(spec));
    }

    /// Look up a protocol by route name.
    pub fn get(&self, name: &str) -> Option<Arc<ProbeSpec>> {
        self.specs.get(name).cloned()
    }

    /// Registered route names, sorted for stable listings.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.specs.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters;

    #[test]
    fn builtin_registry_exposes_known_protocols() {
        let registry = adapters::builtin();
        for name in ["smtp", "pop3", "stun", "ldap", "rdp", "echo", "daytime", "time", "finger"] {
            assert!(registry.get(name).is_some(), "missing adapter: {name}");
        }
        assert!(registry.get("nosuch").is_none());
        assert_eq!(registry.names().len(), registry.len());
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::definition::{HandlerDefinition, HandlerKind};

pub type SharedRegistry = Arc<RwLock<Registry>>;

/// Loaded definitions, keyed by kind and then by name.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<HandlerKind, HashMap<String, HandlerDefinition>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn get(&self, kind: HandlerKind, name: &str) -> Option<&HandlerDefinition> {
        self.entries.get(&kind)?.get(name)
    }

    pub fn contains(&self, kind: HandlerKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Inserts or overwrites; a later definition with the same name wins.
    pub fn insert(&mut self, definition: HandlerDefinition) -> Option<HandlerDefinition> {
        self.entries
            .entry(definition.kind)
            .or_default()
            .insert(definition.name.clone(), definition)
    }

    /// Drops entries of `kind` whose name is not in `present`. Returns the
    /// names removed.
    pub fn sweep(&mut self, kind: HandlerKind, present: &HashSet<&str>) -> Vec<String> {
        let Some(by_name) = self.entries.get_mut(&kind) else {
            return Vec::new();
        };
        let gone: Vec<String> = by_name
            .keys()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &gone {
            by_name.remove(name);
        }
        gone
    }

    pub fn iter(&self, kind: HandlerKind) -> impl Iterator<Item = &HandlerDefinition> {
        self.entries.get(&kind).into_iter().flat_map(|m| m.values())
    }

    pub fn len(&self, kind: HandlerKind) -> usize {
        self.entries.get(&kind).map_or(0, HashMap::len)
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_insert_wins() {
        let mut registry = Registry::new();
        registry.insert(HandlerDefinition::new(HandlerKind::ChatCommand, "ping").with_handler("a"));
        let previous = registry
            .insert(HandlerDefinition::new(HandlerKind::ChatCommand, "ping").with_handler("b"));

        assert_eq!(previous.unwrap().handler_id(), "a");
        assert_eq!(
            registry.get(HandlerKind::ChatCommand, "ping").unwrap().handler_id(),
            "b"
        );
        assert_eq!(registry.total(), 1);
    }

    #[test]
    fn test_names_are_scoped_by_kind() {
        let mut registry = Registry::new();
        registry.insert(HandlerDefinition::new(HandlerKind::ChatCommand, "report"));
        registry.insert(HandlerDefinition::new(HandlerKind::Modal, "report"));

        assert_eq!(registry.total(), 2);
        registry.sweep(HandlerKind::Modal, &HashSet::new());
        assert!(registry.contains(HandlerKind::ChatCommand, "report"));
        assert!(!registry.contains(HandlerKind::Modal, "report"));
    }

    #[test]
    fn test_sweep_removes_absent_names() {
        let mut registry = Registry::new();
        registry.insert(HandlerDefinition::new(HandlerKind::Event, "ready"));
        registry.insert(HandlerDefinition::new(HandlerKind::Event, "message"));
        registry.insert(HandlerDefinition::new(HandlerKind::Modal, "ready"));

        let gone = registry.sweep(HandlerKind::Event, &HashSet::from(["ready"]));
        assert_eq!(gone, vec!["message".to_string()]);
        assert_eq!(registry.len(HandlerKind::Event), 1);
        assert_eq!(registry.len(HandlerKind::Modal), 1);
    }
}

//! Node-type registry port.
//!
//! Everything that needs a node type's schema (parameter defaults, declared
//! outputs, credential kinds) asks a `NodeTypeRegistry`. The editor loads
//! descriptions from the backend; the CLI loads them from a snapshot file.

use std::collections::HashMap;

use flowpad_types::node_type::NodeTypeDescription;

/// Lookup of node-type descriptions by name and version.
pub trait NodeTypeRegistry: Send + Sync {
    /// Description for `name` supporting `version`.
    ///
    /// With `version = None` the description with the highest version wins.
    fn get_by_name_and_version(
        &self,
        name: &str,
        version: Option<f64>,
    ) -> Option<&NodeTypeDescription>;

    /// Every registered description.
    fn all(&self) -> Vec<&NodeTypeDescription>;
}

/// Registry backed by an in-memory list of descriptions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNodeTypes {
    by_name: HashMap<String, Vec<NodeTypeDescription>>,
}

impl InMemoryNodeTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptions(descriptions: impl IntoIterator<Item = NodeTypeDescription>) -> Self {
        let mut registry = Self::new();
        for description in descriptions {
            registry.register(description);
        }
        registry
    }

    pub fn register(&mut self, description: NodeTypeDescription) {
        self.by_name
            .entry(description.name.clone())
            .or_default()
            .push(description);
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl NodeTypeRegistry for InMemoryNodeTypes {
    fn get_by_name_and_version(
        &self,
        name: &str,
        version: Option<f64>,
    ) -> Option<&NodeTypeDescription> {
        let candidates = self.by_name.get(name)?;
        match version {
            Some(v) => candidates.iter().find(|d| d.supports_version(v)),
            None => candidates
                .iter()
                .max_by(|a, b| a.version.latest().total_cmp(&b.version.latest())),
        }
    }

    fn all(&self) -> Vec<&NodeTypeDescription> {
        self.by_name.values().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description(name: &str, version: serde_json::Value) -> NodeTypeDescription {
        serde_json::from_value(json!({ "name": name, "version": version })).unwrap()
    }

    #[test]
    fn test_lookup_by_version() {
        let registry = InMemoryNodeTypes::from_descriptions(vec![
            description("flowpad.set", json!([1, 2])),
            description("flowpad.set", json!(3)),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get_by_name_and_version("flowpad.set", Some(2.0)).is_some());
        assert!(registry.get_by_name_and_version("flowpad.set", Some(4.0)).is_none());
        assert!(registry.get_by_name_and_version("flowpad.other", None).is_none());
    }

    #[test]
    fn test_latest_when_version_unspecified() {
        let registry = InMemoryNodeTypes::from_descriptions(vec![
            description("flowpad.set", json!(3)),
            description("flowpad.set", json!([1, 2])),
        ]);
        let latest = registry.get_by_name_and_version("flowpad.set", None).unwrap();
        assert_eq!(latest.version.latest(), 3.0);
    }
}

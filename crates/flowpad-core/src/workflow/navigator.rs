//! Main-input ancestor lookup.
//!
//! Sub-nodes (language models, tools, memories) hang off their consumer
//! through non-main connections and never receive main items themselves.
//! Expressions on such a node are evaluated against the data of the node
//! they ultimately feed, so resolution first walks down the non-main chain
//! to that node.

use std::collections::HashSet;

use tracing::debug;

use flowpad_types::error::GraphError;
use flowpad_types::workflow::Node;

use crate::node_types::NodeTypeRegistry;
use crate::workflow::graph::{ConnectionFilter, Workflow};

/// Follow non-main outputs from `node` until reaching a node that has none
/// connected.
///
/// Nodes whose type is unknown, or that declare only main outputs, are
/// their own ancestor.
pub fn find_main_input_ancestor<'w>(
    workflow: &'w Workflow,
    registry: &dyn NodeTypeRegistry,
    node: &'w Node,
) -> Result<&'w Node, GraphError> {
    let mut current = node;
    let mut visited: HashSet<&str> = HashSet::from([node.name.as_str()]);

    loop {
        let outputs = workflow.node_outputs(current, registry);
        if outputs.iter().all(|kind| kind.is_main()) {
            return Ok(current);
        }

        let connected: Vec<String> = outputs
            .into_iter()
            .flat_map(|kind| {
                workflow.get_child_nodes(&current.name, &ConnectionFilter::Kind(kind), None)
            })
            .collect();

        let Some(next_name) = connected.first() else {
            return Ok(current);
        };

        let next = workflow
            .get_node(next_name)
            .ok_or_else(|| GraphError::NodeNotFound {
                missing: next_name.clone(),
                from: current.name.clone(),
            })?;

        if !visited.insert(next.name.as_str()) {
            return Err(GraphError::Cycle(next.name.clone()));
        }

        debug!(from = %current.name, to = %next.name, "following non-main output");
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_types::InMemoryNodeTypes;
    use flowpad_types::workflow::{Connection, ConnectionType, Connections};
    use serde_json::json;

    fn registry() -> InMemoryNodeTypes {
        InMemoryNodeTypes::from_descriptions(vec![
            serde_json::from_value(json!({ "name": "flowpad.agent" })).unwrap(),
            serde_json::from_value(json!({
                "name": "flowpad.model",
                "outputs": ["ai_languageModel"]
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "name": "flowpad.tool",
                "outputs": ["ai_tool"]
            }))
            .unwrap(),
        ])
    }

    fn connect(connections: &mut Connections, from: &str, kind: &str, to: &str) {
        connections
            .entry(from.to_string())
            .or_default()
            .entry(ConnectionType::new(kind))
            .or_default()
            .push(vec![Connection {
                node: to.to_string(),
                kind: ConnectionType::new(kind),
                index: 0,
            }]);
    }

    #[test]
    fn test_main_only_node_is_its_own_ancestor() {
        let wf = Workflow::new("t", vec![Node::new("Agent", "flowpad.agent")], Connections::new());
        let node = wf.get_node("Agent").unwrap();
        let ancestor = find_main_input_ancestor(&wf, &registry(), node).unwrap();
        assert_eq!(ancestor.name, "Agent");
    }

    #[test]
    fn test_unknown_type_is_its_own_ancestor() {
        let wf = Workflow::new("t", vec![Node::new("X", "flowpad.unknown")], Connections::new());
        let node = wf.get_node("X").unwrap();
        assert_eq!(find_main_input_ancestor(&wf, &registry(), node).unwrap().name, "X");
    }

    #[test]
    fn test_single_non_main_hop() {
        let mut connections = Connections::new();
        connect(&mut connections, "Model", "ai_languageModel", "Agent");
        let wf = Workflow::new(
            "t",
            vec![Node::new("Agent", "flowpad.agent"), Node::new("Model", "flowpad.model")],
            connections,
        );
        let node = wf.get_node("Model").unwrap();
        assert_eq!(find_main_input_ancestor(&wf, &registry(), node).unwrap().name, "Agent");
    }

    #[test]
    fn test_unconnected_sub_node_stays() {
        let wf = Workflow::new("t", vec![Node::new("Model", "flowpad.model")], Connections::new());
        let node = wf.get_node("Model").unwrap();
        assert_eq!(find_main_input_ancestor(&wf, &registry(), node).unwrap().name, "Model");
    }

    #[test]
    fn test_missing_connected_node() {
        let mut connections = Connections::new();
        connect(&mut connections, "Model", "ai_languageModel", "Ghost");
        let wf = Workflow::new("t", vec![Node::new("Model", "flowpad.model")], connections);
        let node = wf.get_node("Model").unwrap();

        let err = find_main_input_ancestor(&wf, &registry(), node).unwrap_err();
        assert_eq!(
            err,
            GraphError::NodeNotFound {
                missing: "Ghost".to_string(),
                from: "Model".to_string()
            }
        );
    }

    #[test]
    fn test_non_main_loop_is_an_error() {
        let mut connections = Connections::new();
        connect(&mut connections, "ToolA", "ai_tool", "ToolB");
        connect(&mut connections, "ToolB", "ai_tool", "ToolA");
        let wf = Workflow::new(
            "t",
            vec![Node::new("ToolA", "flowpad.tool"), Node::new("ToolB", "flowpad.tool")],
            connections,
        );
        let node = wf.get_node("ToolA").unwrap();
        assert!(matches!(
            find_main_input_ancestor(&wf, &registry(), node),
            Err(GraphError::Cycle(_))
        ));
    }
}

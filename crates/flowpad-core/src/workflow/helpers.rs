//! Editor helpers over the current workflow: node-count limits, readiness
//! checks, connected-node lookup, and document touch-ups before import or
//! sharing.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use flowpad_types::node_type::{NodeTypeDescription, WEBHOOK_NODE_TYPE};
use flowpad_types::workflow::{Node, WorkflowDocument, XyPosition};

use crate::node_types::NodeTypeRegistry;
use crate::workflow::graph::{ConnectionFilter, Workflow};
use crate::workflow::parameters::{display_parameter, get_node_parameters};

// ---------------------------------------------------------------------------
// Node counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeMaxCount {
    pub exist: usize,
    pub max: u32,
    pub node_names: Vec<String>,
}

/// Usage of every node type that limits how many instances a workflow may
/// hold.
pub fn node_types_max_count(
    nodes: &[Node],
    registry: &dyn NodeTypeRegistry,
) -> BTreeMap<String, NodeTypeMaxCount> {
    let mut counts: BTreeMap<String, NodeTypeMaxCount> = registry
        .all()
        .into_iter()
        .filter_map(|t| {
            t.max_nodes.map(|max| {
                (
                    t.name.clone(),
                    NodeTypeMaxCount {
                        exist: 0,
                        max,
                        node_names: Vec::new(),
                    },
                )
            })
        })
        .collect();

    for node in nodes {
        if let Some(count) = counts.get_mut(&node.node_type) {
            count.exist += 1;
            count.node_names.push(node.name.clone());
        }
    }

    counts
}

pub fn node_type_count(nodes: &[Node], node_type: &str) -> usize {
    nodes.iter().filter(|n| n.node_type == node_type).count()
}

// ---------------------------------------------------------------------------
// Connected nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upstream,
    Downstream,
}

/// Main-connected nodes in `direction`, each followed by the sub-nodes
/// attached to it through non-main inputs. Duplicates are dropped.
pub fn get_connected_nodes(direction: Direction, workflow: &Workflow, node_name: &str) -> Vec<String> {
    let main = ConnectionFilter::main();
    let check_nodes = match direction {
        Direction::Downstream => workflow.get_child_nodes(node_name, &main, None),
        Direction::Upstream => workflow.get_parent_nodes(node_name, &main, None),
    };

    let mut seen = BTreeSet::new();
    let mut connected = Vec::new();
    for check_node in check_nodes {
        let sub_nodes = workflow.get_parent_nodes(&check_node, &ConnectionFilter::AllNonMain, None);
        for name in std::iter::once(check_node).chain(sub_nodes) {
            if seen.insert(name.clone()) {
                connected.push(name);
            }
        }
    }
    connected
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Problems that keep a node from executing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIssues {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub type_unknown: bool,
    /// Parameter name -> messages.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Vec<String>>,
    /// Credential kind -> messages.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, Vec<String>>,
}

impl NodeIssues {
    pub fn is_empty(&self) -> bool {
        !self.type_unknown && self.parameters.is_empty() && self.credentials.is_empty()
    }
}

/// Issues of every node an execution would touch, or `None` when there are
/// none.
///
/// With `last_node` the node and all its ancestors are checked. Otherwise
/// enabled webhook nodes and their descendants are checked, or failing
/// that, the start node, its descendants and their sub-nodes. Disabled
/// nodes are skipped.
pub fn check_ready_for_execution(
    workflow: &Workflow,
    registry: &dyn NodeTypeRegistry,
    last_node: Option<&str>,
) -> Option<BTreeMap<String, NodeIssues>> {
    let main = ConnectionFilter::main();

    let check_nodes: Vec<String> = if let Some(last) = last_node {
        let mut nodes = workflow.get_parent_nodes(last, &main, None);
        nodes.push(last.to_string());
        nodes
    } else {
        let mut webhooks: Vec<String> = Vec::new();
        for node in workflow.nodes() {
            if !node.is_disabled() && node.node_type == WEBHOOK_NODE_TYPE {
                let mut next = vec![node.name.clone()];
                next.append(&mut webhooks);
                next.extend(workflow.get_child_nodes(&node.name, &main, None));
                webhooks = next;
            }
        }

        if !webhooks.is_empty() {
            webhooks
        } else if let Some(start) = workflow.get_start_node(registry) {
            let mut nodes = workflow.get_child_nodes(&start.name, &main, None);
            nodes.push(start.name.clone());
            let sub_nodes: Vec<String> = nodes
                .iter()
                .flat_map(|n| workflow.get_parent_nodes(n, &ConnectionFilter::AllNonMain, None))
                .collect();
            nodes.extend(sub_nodes);
            nodes
        } else {
            workflow.nodes().map(|n| n.name.clone()).collect()
        }
    };

    let mut issues = BTreeMap::new();
    for name in check_nodes {
        let Some(node) = workflow.get_node(&name) else {
            continue;
        };
        if node.is_disabled() {
            continue;
        }

        let node_issues = match registry.get_by_name_and_version(&node.node_type, Some(node.type_version)) {
            None => NodeIssues {
                type_unknown: true,
                ..NodeIssues::default()
            },
            Some(description) => node_issues(description, node),
        };

        if !node_issues.is_empty() {
            issues.insert(name, node_issues);
        }
    }

    (!issues.is_empty()).then_some(issues)
}

/// Missing required parameters and credentials of one node.
pub fn node_issues(description: &NodeTypeDescription, node: &Node) -> NodeIssues {
    let mut issues = NodeIssues::default();
    let values = get_node_parameters(&description.properties, &node.parameters, node, true);

    for property in description.properties.iter().filter(|p| p.required) {
        let Some(value) = values.get(&property.name) else {
            continue;
        };
        if is_empty_value(value) {
            let label = if property.display_name.is_empty() {
                &property.name
            } else {
                &property.display_name
            };
            issues
                .parameters
                .entry(property.name.clone())
                .or_default()
                .push(format!("Parameter \"{label}\" is required."));
        }
    }

    for credential in description.credentials.iter().filter(|c| c.required) {
        if !display_parameter(&node.parameters, credential.display_options.as_ref(), node, None) {
            continue;
        }
        let is_set = node
            .credentials
            .as_ref()
            .is_some_and(|c| c.contains_key(&credential.name));
        if !is_set {
            issues
                .credentials
                .entry(credential.name.clone())
                .or_default()
                .push(format!("Credentials for \"{}\" are not set.", credential.name));
        }
    }

    issues
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Document touch-ups
// ---------------------------------------------------------------------------

/// Shift every node so the top-most (then left-most) one lands on
/// `position`.
pub fn update_node_positions(document: &mut WorkflowDocument, position: XyPosition) {
    let Some(anchor) = document
        .nodes
        .iter()
        .map(|n| n.position)
        .min_by(|a, b| a[1].total_cmp(&b[1]).then(a[0].total_cmp(&b[0])))
    else {
        return;
    };

    let offset = [position[0] - anchor[0], position[1] - anchor[1]];
    for node in &mut document.nodes {
        node.position[0] += offset[0];
        node.position[1] += offset[1];
    }
}

/// Drop credentials the current user cannot use.
///
/// Credentials without an id are always dropped.
pub fn remove_foreign_credentials(document: &mut WorkflowDocument, usable_credential_ids: &[String]) {
    for node in &mut document.nodes {
        if let Some(credentials) = node.credentials.as_mut() {
            credentials.retain(|_, credential| {
                credential
                    .id
                    .as_ref()
                    .is_some_and(|id| usable_credential_ids.contains(id))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_types::InMemoryNodeTypes;
    use flowpad_types::workflow::{Connection, ConnectionType, Connections, NodeCredential, NodeCredentials};
    use serde_json::json;

    fn registry() -> InMemoryNodeTypes {
        InMemoryNodeTypes::from_descriptions(vec![
            serde_json::from_value(json!({
                "name": "flowpad.trigger",
                "group": ["trigger"],
                "maxNodes": 1
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "name": "flowpad.http",
                "properties": [
                    { "name": "url", "displayName": "URL", "type": "string", "default": "", "required": true }
                ],
                "credentials": [{ "name": "httpBasicAuth", "required": true }]
            }))
            .unwrap(),
            serde_json::from_value(json!({ "name": "flowpad.model", "outputs": ["ai_languageModel"] }))
                .unwrap(),
            serde_json::from_value(json!({ "name": WEBHOOK_NODE_TYPE })).unwrap(),
        ])
    }

    fn link(connections: &mut Connections, from: &str, kind: &str, to: &str) {
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

    /// Start -> Fetch <- Model (ai_languageModel); Orphan unconnected.
    fn workflow(extra: Vec<Node>) -> Workflow {
        let mut connections = Connections::new();
        link(&mut connections, "Start", "main", "Fetch");
        link(&mut connections, "Model", "ai_languageModel", "Fetch");

        let mut nodes = vec![
            Node::new("Start", "flowpad.trigger"),
            Node::new("Fetch", "flowpad.http"),
            Node::new("Model", "flowpad.mystery"),
            Node::new("Orphan", "flowpad.http"),
        ];
        nodes.extend(extra);
        Workflow::new("t", nodes, connections)
    }

    #[test]
    fn test_max_counts() {
        let wf = workflow(vec![Node::new("Start 2", "flowpad.trigger")]);
        let nodes: Vec<Node> = wf.nodes().cloned().collect();
        let counts = node_types_max_count(&nodes, &registry());

        assert_eq!(counts.len(), 1);
        let trigger = &counts["flowpad.trigger"];
        assert_eq!(trigger.exist, 2);
        assert_eq!(trigger.max, 1);
        assert_eq!(trigger.node_names, vec!["Start", "Start 2"]);
        assert_eq!(node_type_count(&nodes, "flowpad.http"), 2);
    }

    #[test]
    fn test_connected_nodes_include_sub_nodes() {
        let wf = workflow(vec![]);
        assert_eq!(
            get_connected_nodes(Direction::Downstream, &wf, "Start"),
            vec!["Fetch", "Model"]
        );
        assert_eq!(get_connected_nodes(Direction::Upstream, &wf, "Fetch"), vec!["Start"]);
    }

    #[test]
    fn test_ready_check_from_start_node() {
        let wf = workflow(vec![]);
        let issues = check_ready_for_execution(&wf, &registry(), None).unwrap();

        assert_eq!(issues.len(), 2);
        let fetch = &issues["Fetch"];
        assert_eq!(fetch.parameters["url"], vec!["Parameter \"URL\" is required."]);
        assert!(fetch.credentials.contains_key("httpBasicAuth"));
        assert!(issues["Model"].type_unknown);
        assert!(!issues.contains_key("Orphan"));
    }

    #[test]
    fn test_ready_check_from_last_node_and_clean_workflow() {
        let mut fetch = Node::new("Fetch", "flowpad.http");
        fetch.parameters.insert("url".to_string(), json!("https://example.com"));
        fetch.credentials = Some(NodeCredentials::from([(
            "httpBasicAuth".to_string(),
            NodeCredential {
                id: Some("1".to_string()),
                name: "basic".to_string(),
            },
        )]));
        let mut connections = Connections::new();
        link(&mut connections, "Start", "main", "Fetch");
        let wf = Workflow::new(
            "t",
            vec![Node::new("Start", "flowpad.trigger"), fetch, Node::new("Orphan", "flowpad.http")],
            connections,
        );

        assert!(check_ready_for_execution(&wf, &registry(), Some("Fetch")).is_none());
        let orphan = check_ready_for_execution(&wf, &registry(), Some("Orphan")).unwrap();
        assert_eq!(orphan.keys().collect::<Vec<_>>(), vec!["Orphan"]);
    }

    #[test]
    fn test_ready_check_prefers_webhooks_and_skips_disabled() {
        let mut disabled = Node::new("Disabled hook", WEBHOOK_NODE_TYPE);
        disabled.disabled = Some(true);
        let wf = workflow(vec![Node::new("Hook", WEBHOOK_NODE_TYPE), disabled]);

        assert!(check_ready_for_execution(&wf, &registry(), None).is_none());
    }

    #[test]
    fn test_update_node_positions() {
        let mut document: WorkflowDocument = serde_json::from_value(json!({
            "name": "t",
            "nodes": [
                { "name": "A", "type": "x", "position": [300, 100] },
                { "name": "B", "type": "x", "position": [200, 100] },
                { "name": "C", "type": "x", "position": [0, 400] }
            ],
            "connections": {},
            "active": false
        }))
        .unwrap();

        update_node_positions(&mut document, [0.0, 0.0]);
        assert_eq!(document.nodes[0].position, [100.0, 0.0]);
        assert_eq!(document.nodes[1].position, [0.0, 0.0]);
        assert_eq!(document.nodes[2].position, [-200.0, 300.0]);
    }

    #[test]
    fn test_remove_foreign_credentials() {
        let mut document: WorkflowDocument = serde_json::from_value(json!({
            "name": "t",
            "nodes": [{
                "name": "A",
                "type": "x",
                "credentials": {
                    "mine": { "id": "1", "name": "mine" },
                    "theirs": { "id": "2", "name": "theirs" },
                    "legacy": { "name": "no id" }
                }
            }],
            "connections": {},
            "active": false
        }))
        .unwrap();

        remove_foreign_credentials(&mut document, &["1".to_string()]);
        let credentials = document.nodes[0].credentials.as_ref().unwrap();
        assert_eq!(credentials.keys().collect::<Vec<_>>(), vec!["mine"]);
    }
}

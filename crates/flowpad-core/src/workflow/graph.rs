//! Read-only graph queries over a workflow's nodes and connections.
//!
//! `Workflow` indexes connections both by source and by destination node so
//! parent and child lookups are symmetric. Traversal order follows the
//! editor's conventions: the farthest node is reported first, and a node
//! reachable along several paths is reported only once.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use flowpad_types::node_type::NodeTypeDescription;
use flowpad_types::workflow::{
    Connection, ConnectionType, Connections, EditorWorkflow, Node, NodeConnectionIndexes,
};

use crate::node_types::NodeTypeRegistry;

/// Which connection kinds a traversal follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionFilter {
    Kind(ConnectionType),
    AllNonMain,
    All,
}

impl ConnectionFilter {
    pub fn main() -> Self {
        ConnectionFilter::Kind(ConnectionType::main())
    }

    pub fn matches(&self, kind: &ConnectionType) -> bool {
        match self {
            ConnectionFilter::Kind(k) => k == kind,
            ConnectionFilter::AllNonMain => !kind.is_main(),
            ConnectionFilter::All => true,
        }
    }
}

/// A workflow graph snapshot with connection indexes in both directions.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: Option<String>,
    pub name: String,
    pub active: bool,
    nodes: IndexMap<String, Node>,
    connections_by_source: Connections,
    connections_by_destination: Connections,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, connections: Connections) -> Self {
        let connections_by_destination = invert_connections(&connections);
        Self {
            id: None,
            name: name.into(),
            active: false,
            nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
            connections_by_source: connections,
            connections_by_destination,
        }
    }

    /// Snapshot the editor's working copy.
    pub fn from_editor(editor: &EditorWorkflow) -> Self {
        let mut workflow = Self::new(
            editor.name.clone(),
            editor.nodes.clone(),
            editor.connections.clone(),
        );
        workflow.id = editor.is_saved().then(|| editor.id.clone());
        workflow.active = editor.active;
        workflow
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn connections_by_source(&self) -> &Connections {
        &self.connections_by_source
    }

    pub fn connections_by_destination(&self) -> &Connections {
        &self.connections_by_destination
    }

    /// Nodes fed by `node_name`, up to `depth` hops (`None` = unlimited).
    pub fn get_child_nodes(
        &self,
        node_name: &str,
        filter: &ConnectionFilter,
        depth: Option<usize>,
    ) -> Vec<String> {
        connected_nodes(&self.connections_by_source, node_name, filter, depth, &[])
    }

    /// Nodes feeding `node_name`, up to `depth` hops (`None` = unlimited).
    pub fn get_parent_nodes(
        &self,
        node_name: &str,
        filter: &ConnectionFilter,
        depth: Option<usize>,
    ) -> Vec<String> {
        connected_nodes(&self.connections_by_destination, node_name, filter, depth, &[])
    }

    /// Indexes of the edge through which `parent_name` (possibly several
    /// hops up) feeds the path to `node_name`.
    ///
    /// Walks upstream breadth-first and returns the first edge whose source
    /// is the parent.
    pub fn get_node_connection_indexes(
        &self,
        node_name: &str,
        parent_name: &str,
        kind: &ConnectionType,
    ) -> Option<NodeConnectionIndexes> {
        self.get_node(parent_name)?;

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([node_name]);

        while let Some(current) = queue.pop_front() {
            visited.insert(current);
            let Some(inputs) = self
                .connections_by_destination
                .get(current)
                .and_then(|c| c.get(kind))
            else {
                continue;
            };

            for (destination_index, connections) in inputs.iter().enumerate() {
                for connection in connections {
                    if connection.node == parent_name {
                        return Some(NodeConnectionIndexes {
                            source_index: connection.index,
                            destination_index,
                        });
                    }
                    if !visited.contains(connection.node.as_str()) {
                        queue.push_back(connection.node.as_str());
                    }
                }
            }
        }

        None
    }

    /// Output kinds a node declares according to its type.
    ///
    /// Unknown node types declare no outputs.
    pub fn node_outputs(&self, node: &Node, registry: &dyn NodeTypeRegistry) -> Vec<ConnectionType> {
        registry
            .get_by_name_and_version(&node.node_type, Some(node.type_version))
            .map(|t| t.outputs.clone())
            .unwrap_or_default()
    }

    /// First enabled node that can start an execution.
    pub fn get_start_node(&self, registry: &dyn NodeTypeRegistry) -> Option<&Node> {
        self.nodes().filter(|n| !n.is_disabled()).find(|n| {
            registry
                .get_by_name_and_version(&n.node_type, Some(n.type_version))
                .is_some_and(is_start_type)
        })
    }
}

fn is_start_type(description: &NodeTypeDescription) -> bool {
    description.is_trigger() || !description.webhooks.is_empty()
}

/// Build the destination-keyed index from the source-keyed one.
fn invert_connections(by_source: &Connections) -> Connections {
    let mut by_destination = Connections::new();

    for (source, kinds) in by_source {
        for (kind, outputs) in kinds {
            for (output_index, targets) in outputs.iter().enumerate() {
                for target in targets {
                    let inputs = by_destination
                        .entry(target.node.clone())
                        .or_default()
                        .entry(target.kind.clone())
                        .or_default();
                    if inputs.len() <= target.index {
                        inputs.resize_with(target.index + 1, Vec::new);
                    }
                    inputs[target.index].push(Connection {
                        node: source.clone(),
                        kind: kind.clone(),
                        index: output_index,
                    });
                }
            }
        }
    }

    by_destination
}

/// Depth-limited walk over one connection index.
///
/// `checked` holds the nodes on the current path only, so diamonds are
/// revisited but cycles terminate.
fn connected_nodes(
    connections: &Connections,
    node_name: &str,
    filter: &ConnectionFilter,
    depth: Option<usize>,
    checked: &[String],
) -> Vec<String> {
    if depth == Some(0) {
        return Vec::new();
    }
    let Some(kinds) = connections.get(node_name) else {
        return Vec::new();
    };
    if checked.iter().any(|c| c == node_name) {
        return Vec::new();
    }

    let mut checked = checked.to_vec();
    checked.push(node_name.to_string());
    let next_depth = depth.map(|d| d - 1);

    let mut found: VecDeque<String> = VecDeque::new();
    for (kind, by_index) in kinds {
        if !filter.matches(kind) {
            continue;
        }
        for connection in by_index.iter().flatten() {
            if checked.contains(&connection.node) {
                continue;
            }
            found.push_front(connection.node.clone());

            let further = connected_nodes(connections, &connection.node, filter, next_depth, &checked);
            for name in further.into_iter().rev() {
                if let Some(pos) = found.iter().position(|f| *f == name) {
                    found.remove(pos);
                }
                found.push_front(name);
            }
        }
    }

    found.into()
}

//! Workflow graph and persistence document types for Flowpad.
//!
//! `Node` and `Connections` mirror the JSON shape the editor canvas and the
//! workflow backend exchange. `EditorWorkflow` is the editor's working copy
//! of a workflow; `WorkflowDocument` is what gets sent on save, and
//! `WorkflowRecord` is what the backend answers with.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::PinData;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Workflow id used by the editor before the workflow was ever saved.
pub const PLACEHOLDER_EMPTY_WORKFLOW_ID: &str = "__EMPTY__";

/// Route name used for a freshly opened, unsaved workflow.
pub const NEW_WORKFLOW_ROUTE_ID: &str = "new";

/// Free-form node parameters (always a JSON object).
pub type NodeParameters = serde_json::Map<String, Value>;

/// Canvas position `[x, y]`.
pub type XyPosition = [f64; 2];

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single node on the canvas.
///
/// Fields the editor adds that Flowpad does not model explicitly are kept in
/// `extra`, so a load/save cycle never silently drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    /// Unique within a workflow; connections reference nodes by name.
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_type_version")]
    pub type_version: f64,
    #[serde(default)]
    pub position: XyPosition,
    #[serde(default)]
    pub parameters: NodeParameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<NodeCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_fail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Editor-computed validation issues. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Value>,
    /// Editor-computed execution status. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends_credential: Option<String>,
    /// Any further fields. Keys starting with `_` are editor-internal.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn default_type_version() -> f64 {
    1.0
}

impl Node {
    /// Create a node with the given name and type at the origin.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            node_type: node_type.into(),
            type_version: default_type_version(),
            position: [0.0, 0.0],
            parameters: NodeParameters::new(),
            credentials: None,
            disabled: None,
            notes: None,
            continue_on_fail: None,
            on_error: None,
            color: None,
            issues: None,
            status: None,
            webhook_id: None,
            extends_credential: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled == Some(true)
    }
}

/// Credentials attached to a node, keyed by credential type name.
pub type NodeCredentials = BTreeMap<String, NodeCredential>;

/// Reference to a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

/// What the engine does when a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnError {
    #[default]
    StopWorkflow,
    ContinueRegularOutput,
    ContinueErrorOutput,
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Kind of a connection between two nodes.
///
/// `main` carries the primary item flow. Every other kind (`ai_tool`,
/// `ai_languageModel`, ...) is auxiliary and feeds configuration-time data
/// into the node it connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionType(String);

impl ConnectionType {
    pub const MAIN: &'static str = "main";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionType {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionType {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// One end of an edge: the node it points at, the kind, and that node's
/// input (or output) index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub node: String,
    #[serde(rename = "type")]
    pub kind: ConnectionType,
    pub index: usize,
}

/// Per-kind edges of one node: outer index is the node's own output (or
/// input) index, inner list the nodes on the other side.
pub type NodeConnections = BTreeMap<ConnectionType, Vec<Vec<Connection>>>;

/// All edges of a workflow keyed by source node name.
pub type Connections = BTreeMap<String, NodeConnections>;

/// Output index on the parent and input index on the child of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConnectionIndexes {
    pub source_index: usize,
    pub destination_index: usize,
}

// ---------------------------------------------------------------------------
// Editor state
// ---------------------------------------------------------------------------

/// The workflow currently open in the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorWorkflow {
    #[serde(default = "placeholder_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<PinData>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Unsaved local changes.
    #[serde(default)]
    pub dirty: bool,
}

fn placeholder_id() -> String {
    PLACEHOLDER_EMPTY_WORKFLOW_ID.to_string()
}

impl EditorWorkflow {
    /// An empty, never-saved workflow.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: placeholder_id(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Connections::new(),
            pin_data: None,
            active: false,
            settings: serde_json::Map::new(),
            tag_ids: Vec::new(),
            version_id: None,
            dirty: false,
        }
    }

    /// Whether the backend has ever assigned this workflow an id.
    pub fn is_saved(&self) -> bool {
        !is_unsaved_id(&self.id)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }
}

/// `true` for ids that mean "not saved yet".
pub fn is_unsaved_id(id: &str) -> bool {
    id.is_empty() || id == PLACEHOLDER_EMPTY_WORKFLOW_ID || id == NEW_WORKFLOW_ROUTE_ID
}

// ---------------------------------------------------------------------------
// Persistence documents
// ---------------------------------------------------------------------------

/// Full, persistence-ready workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: Connections,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<PinData>,
    pub active: bool,
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// Payload for create/update calls. Every field is optional so a partial
/// update can carry just the version stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Connections>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_data: Option<PinData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl From<WorkflowDocument> for WorkflowUpdate {
    fn from(doc: WorkflowDocument) -> Self {
        Self {
            id: doc.id,
            name: Some(doc.name),
            nodes: Some(doc.nodes),
            connections: Some(doc.connections),
            pin_data: doc.pin_data,
            active: Some(doc.active),
            settings: Some(doc.settings),
            tags: Some(doc.tags),
            version_id: doc.version_id,
        }
    }
}

/// A tag as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// A workflow as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Connections,
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_keeps_unknown_fields() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "name": "Fetch",
            "type": "flowpad.httpRequest",
            "typeVersion": 4.1,
            "position": [100, 200],
            "parameters": { "url": "https://example.com" },
            "alwaysOutputData": true,
            "_hovered": true
        }))
        .unwrap();

        assert_eq!(node.type_version, 4.1);
        assert_eq!(node.position, [100.0, 200.0]);
        assert_eq!(node.extra.get("alwaysOutputData"), Some(&json!(true)));
        assert_eq!(node.extra.get("_hovered"), Some(&json!(true)));

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["alwaysOutputData"], json!(true));
        assert!(back.get("disabled").is_none());
    }

    #[test]
    fn test_connection_type_main() {
        assert!(ConnectionType::main().is_main());
        assert!(!ConnectionType::new("ai_tool").is_main());
        assert_eq!(ConnectionType::default().as_str(), "main");
    }

    #[test]
    fn test_connections_deserialize() {
        let connections: Connections = serde_json::from_value(json!({
            "Trigger": { "main": [[{ "node": "Set", "type": "main", "index": 0 }]] }
        }))
        .unwrap();
        let main = &connections["Trigger"][&ConnectionType::main()];
        assert_eq!(main[0][0].node, "Set");
    }

    #[test]
    fn test_unsaved_ids() {
        assert!(is_unsaved_id(PLACEHOLDER_EMPTY_WORKFLOW_ID));
        assert!(is_unsaved_id("new"));
        assert!(is_unsaved_id(""));
        assert!(!is_unsaved_id("42"));
        assert!(!EditorWorkflow::new("My workflow").is_saved());
    }

    #[test]
    fn test_on_error_serde() {
        assert_eq!(
            serde_json::to_value(OnError::ContinueErrorOutput).unwrap(),
            json!("continueErrorOutput")
        );
        assert_eq!(OnError::default(), OnError::StopWorkflow);
    }
}

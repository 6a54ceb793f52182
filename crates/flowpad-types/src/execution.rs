//! Run data, pin data, and execution-context types.
//!
//! These describe what a (test) execution recorded per node: ordered runs,
//! each run's output batches, and the paired-item provenance tags that link
//! an output item back to the input item it was produced from.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::{ConnectionType, Node};

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One data item flowing between nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionItem {
    #[serde(default)]
    pub json: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired_item: Option<PairedItem>,
    /// Binary payloads and other engine-specific fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ExecutionItem {
    pub fn new(json: serde_json::Map<String, Value>) -> Self {
        Self {
            json,
            paired_item: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Build an item from any JSON value; non-objects yield an empty item.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::default(),
        }
    }
}

/// Provenance of an item: which input item(s) produced it.
///
/// Engines record it as a bare item index, a single object, or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PairedItem {
    Index(usize),
    Single(PairedItemData),
    Multiple(Vec<PairedItemData>),
}

impl PairedItem {
    /// Normalize to a list of `{item, input}` entries.
    pub fn entries(&self) -> Vec<PairedItemData> {
        match self {
            PairedItem::Index(item) => vec![PairedItemData {
                item: *item,
                input: None,
            }],
            PairedItem::Single(data) => vec![*data],
            PairedItem::Multiple(list) => list.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItemData {
    pub item: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<usize>,
}

// ---------------------------------------------------------------------------
// Run data
// ---------------------------------------------------------------------------

/// Where one input of a node run got its data from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceData {
    pub previous_node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_node_output: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_node_run: Option<usize>,
}

impl SourceData {
    pub fn from_node(previous_node: impl Into<String>) -> Self {
        Self {
            previous_node: previous_node.into(),
            previous_node_output: None,
            previous_node_run: None,
        }
    }
}

/// Output batches of a run, per connection kind and output index.
pub type TaskDataConnections = BTreeMap<ConnectionType, Vec<Option<Vec<ExecutionItem>>>>;

/// Sources of a run, per connection kind and input index.
pub type TaskDataConnectionsSource = BTreeMap<ConnectionType, Vec<Option<SourceData>>>;

/// One run attempt of a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    /// One entry per main input of the node.
    #[serde(default)]
    pub source: Vec<Option<SourceData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskDataConnections>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Ordered runs per node name.
pub type RunData = HashMap<String, Vec<TaskData>>;

/// Static output overrides per node name.
pub type PinData = HashMap<String, Vec<ExecutionItem>>;

/// Result section of an execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    #[serde(default)]
    pub run_data: RunData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_node_executed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Engine-side bookkeeping kept alongside the results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    /// Per-node context (e.g. `node:HTTP Request` -> `{ response }`).
    #[serde(default)]
    pub context_data: serde_json::Map<String, Value>,
}

/// Everything an execution recorded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunExecutionData {
    #[serde(default)]
    pub result_data: ResultData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_data: Option<ExecutionState>,
}

/// The latest execution loaded into the editor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RunExecutionData>,
}

impl ExecutionRecord {
    pub fn run_data(&self) -> Option<&RunData> {
        self.data.as_ref().map(|d| &d.result_data.run_data)
    }

    /// Context data stored for one node, if any.
    pub fn node_context(&self, node_name: &str) -> Option<&Value> {
        self.data
            .as_ref()?
            .execution_data
            .as_ref()?
            .context_data
            .get(&format!("node:{node_name}"))
    }
}

// ---------------------------------------------------------------------------
// Resolution inputs
// ---------------------------------------------------------------------------

/// One concrete output item whose provenance is traced backward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetItem {
    pub node_name: String,
    pub run_index: usize,
    pub item_index: usize,
    pub output_index: usize,
}

/// Data and sources a node would have received at execution time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecuteData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    #[serde(default)]
    pub data: TaskDataConnections,
    #[serde(default)]
    pub source: Option<TaskDataConnectionsSource>,
}

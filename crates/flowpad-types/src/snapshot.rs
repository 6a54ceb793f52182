//! Editor snapshot: everything the editor holds for one open workflow.
//!
//! The CLI reads and writes snapshots as JSON files; library callers can
//! build them in memory.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionRecord;
use crate::node_type::NodeTypeDescription;
use crate::workflow::EditorWorkflow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub workflow: EditorWorkflow,
    #[serde(default)]
    pub node_types: Vec<NodeTypeDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionRecord>,
    /// Node whose parameter panel is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_node: Option<String>,
}

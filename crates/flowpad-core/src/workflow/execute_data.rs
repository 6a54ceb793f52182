//! Execution-context reconstruction.
//!
//! Rebuilds what a node would receive as input if it ran now: the parent's
//! recorded output batches (or pinned items), and where those batches came
//! from. Expressions are evaluated against this reconstructed context.

use tracing::debug;

use flowpad_types::config::PinMergePolicy;
use flowpad_types::execution::{
    ExecuteData, ExecutionItem, PairedItem, PairedItemData, PinData, RunData, SourceData,
    TaskDataConnectionsSource,
};
use flowpad_types::workflow::{ConnectionType, NodeConnectionIndexes};

use crate::workflow::graph::Workflow;

/// Builds `ExecuteData` and connection input items from a workflow and its
/// recorded run data.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContextBuilder<'a> {
    workflow: &'a Workflow,
    run_data: Option<&'a RunData>,
    pin_data: Option<&'a PinData>,
    pin_substitution: bool,
    merge_policy: PinMergePolicy,
}

impl<'a> ExecutionContextBuilder<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        Self {
            workflow,
            run_data: None,
            pin_data: None,
            pin_substitution: false,
            merge_policy: PinMergePolicy::default(),
        }
    }

    pub fn with_run_data(mut self, run_data: Option<&'a RunData>) -> Self {
        self.run_data = run_data;
        self
    }

    /// Pinned items are only used when `substitute` is on.
    pub fn with_pin_data(
        mut self,
        pin_data: Option<&'a PinData>,
        substitute: bool,
        merge_policy: PinMergePolicy,
    ) -> Self {
        self.pin_data = pin_data;
        self.pin_substitution = substitute;
        self.merge_policy = merge_policy;
        self
    }

    fn pinned(&self, node_name: &str) -> Option<&'a Vec<ExecutionItem>> {
        if !self.pin_substitution {
            return None;
        }
        self.pin_data?.get(node_name)
    }

    /// Execution context of `current_node` at `run_index`, taken from the
    /// first parent that has pinned items or recorded output of
    /// `input_kind`.
    pub fn build_execute_data(
        &self,
        parent_nodes: &[String],
        current_node: &str,
        input_kind: &ConnectionType,
        run_index: usize,
    ) -> ExecuteData {
        let mut execute_data = ExecuteData {
            node: self.workflow.get_node(current_node).cloned(),
            ..ExecuteData::default()
        };

        for parent in parent_nodes {
            if let Some(pinned) = self.pinned(parent) {
                debug!(parent = %parent, "using pinned items as execution input");
                execute_data.data = [(ConnectionType::main(), vec![Some(pinned.clone())])]
                    .into_iter()
                    .collect();
                execute_data.source = Some(
                    [(ConnectionType::main(), vec![Some(SourceData::from_node(parent))])]
                        .into_iter()
                        .collect(),
                );
                return execute_data;
            }

            let Some(run_data) = self.run_data else {
                return execute_data;
            };

            let parent_data = run_data
                .get(parent)
                .and_then(|runs| runs.get(run_index))
                .and_then(|run| run.data.as_ref())
                .filter(|data| data.contains_key(input_kind));

            let Some(parent_data) = parent_data else {
                execute_data.data.clear();
                continue;
            };

            execute_data.data = parent_data.clone();
            execute_data.source = Some(self.source_of(parent, current_node, input_kind, run_index));
            return execute_data;
        }

        execute_data
    }

    /// Where `current_node` got its input from: its own recorded sources when
    /// it already ran, otherwise the first matching main connection.
    fn source_of(
        &self,
        parent: &str,
        current_node: &str,
        input_kind: &ConnectionType,
        run_index: usize,
    ) -> TaskDataConnectionsSource {
        let recorded = self
            .run_data
            .and_then(|run_data| run_data.get(current_node))
            .and_then(|runs| runs.get(run_index));

        if let Some(run) = recorded {
            return [(input_kind.clone(), run.source.clone())].into_iter().collect();
        }

        let previous_node_output = self
            .workflow
            .connections_by_destination()
            .get(current_node)
            .and_then(|kinds| kinds.get(&ConnectionType::main()))
            .and_then(|inputs| {
                inputs
                    .iter()
                    .flatten()
                    .find(|c| c.kind.is_main() && c.node == parent)
                    .map(|c| c.index)
            });

        let source = SourceData {
            previous_node: parent.to_string(),
            previous_node_output,
            previous_node_run: None,
        };
        [(input_kind.clone(), vec![Some(source)])].into_iter().collect()
    }

    /// Items arriving at `current_node` over one connection, re-tagged with
    /// their position and the destination input.
    pub fn connection_input_data(
        &self,
        parent_nodes: &[String],
        current_node: &str,
        input_kind: &ConnectionType,
        run_index: usize,
        connection: Option<NodeConnectionIndexes>,
    ) -> Vec<ExecutionItem> {
        let connection = connection.unwrap_or_default();
        let execute_data = self.build_execute_data(parent_nodes, current_node, input_kind, run_index);

        let mut items: Vec<ExecutionItem> = if parent_nodes.is_empty() {
            Vec::new()
        } else {
            execute_data
                .data
                .get(input_kind)
                .and_then(|batches| batches.get(connection.source_index))
                .cloned()
                .flatten()
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(index, item)| ExecutionItem {
                    paired_item: Some(PairedItem::Single(PairedItemData {
                        item: index,
                        input: Some(connection.destination_index),
                    })),
                    ..item
                })
                .collect()
        };

        if !self.pin_substitution {
            return items;
        }

        let parent_pins: Vec<ExecutionItem> = parent_nodes
            .iter()
            .enumerate()
            .filter_map(|(index, parent)| {
                let first = self.pinned(parent)?.first()?;
                Some(ExecutionItem {
                    paired_item: Some(PairedItem::Single(PairedItemData {
                        item: index,
                        input: Some(1),
                    })),
                    ..ExecutionItem::new(first.json.clone())
                })
            })
            .collect();

        if parent_pins.is_empty() {
            return items;
        }

        match (self.merge_policy, items.first_mut()) {
            (PinMergePolicy::MergeFirstItem, Some(first)) => {
                for pin in parent_pins {
                    first.json.extend(pin.json);
                }
                items
            }
            _ => parent_pins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpad_types::execution::{TaskData, TaskDataConnections};
    use flowpad_types::workflow::{Connection, Connections, Node};
    use serde_json::json;

    fn item(value: serde_json::Value) -> ExecutionItem {
        ExecutionItem::from_value(value)
    }

    fn run(outputs: Vec<Option<Vec<ExecutionItem>>>) -> TaskData {
        let mut data = TaskDataConnections::new();
        data.insert(ConnectionType::main(), outputs);
        TaskData {
            data: Some(data),
            ..TaskData::default()
        }
    }

    fn workflow() -> Workflow {
        let mut connections = Connections::new();
        connections.entry("If".to_string()).or_default().insert(
            ConnectionType::main(),
            vec![
                vec![],
                vec![Connection {
                    node: "Set".to_string(),
                    kind: ConnectionType::main(),
                    index: 0,
                }],
            ],
        );
        Workflow::new(
            "t",
            vec![Node::new("If", "flowpad.if"), Node::new("Set", "flowpad.set")],
            connections,
        )
    }

    fn parents() -> Vec<String> {
        vec!["If".to_string()]
    }

    #[test]
    fn test_no_run_data_yields_empty_record() {
        let wf = workflow();
        let builder = ExecutionContextBuilder::new(&wf);
        let data = builder.build_execute_data(&parents(), "Set", &ConnectionType::main(), 0);
        assert!(data.data.is_empty());
        assert!(data.source.is_none());
        assert_eq!(data.node.unwrap().name, "Set");
    }

    #[test]
    fn test_source_reconstructed_from_connections() {
        let wf = workflow();
        let mut run_data = RunData::new();
        run_data.insert(
            "If".to_string(),
            vec![run(vec![None, Some(vec![item(json!({ "a": 1 }))])])],
        );
        let builder = ExecutionContextBuilder::new(&wf).with_run_data(Some(&run_data));

        let data = builder.build_execute_data(&parents(), "Set", &ConnectionType::main(), 0);
        let source = &data.source.unwrap()[&ConnectionType::main()];
        assert_eq!(source[0].as_ref().unwrap().previous_node, "If");
        assert_eq!(source[0].as_ref().unwrap().previous_node_output, Some(1));
    }

    #[test]
    fn test_recorded_source_wins() {
        let wf = workflow();
        let mut run_data = RunData::new();
        run_data.insert("If".to_string(), vec![run(vec![Some(vec![])])]);
        run_data.insert(
            "Set".to_string(),
            vec![TaskData {
                source: vec![Some(SourceData {
                    previous_node: "If".to_string(),
                    previous_node_output: Some(0),
                    previous_node_run: Some(0),
                })],
                ..TaskData::default()
            }],
        );
        let builder = ExecutionContextBuilder::new(&wf).with_run_data(Some(&run_data));

        let data = builder.build_execute_data(&parents(), "Set", &ConnectionType::main(), 0);
        let source = &data.source.unwrap()[&ConnectionType::main()];
        assert_eq!(source[0].as_ref().unwrap().previous_node_run, Some(0));
    }

    #[test]
    fn test_missing_run_falls_through_to_next_parent() {
        let wf = workflow();
        let mut run_data = RunData::new();
        run_data.insert("Other".to_string(), vec![run(vec![Some(vec![item(json!({ "b": 2 }))])])]);
        let builder = ExecutionContextBuilder::new(&wf).with_run_data(Some(&run_data));

        let parents = vec!["If".to_string(), "Other".to_string()];
        let data = builder.build_execute_data(&parents, "Set", &ConnectionType::main(), 0);
        assert_eq!(data.source.unwrap()[&ConnectionType::main()][0].as_ref().unwrap().previous_node, "Other");

        let data = builder.build_execute_data(&parents, "Set", &ConnectionType::main(), 3);
        assert!(data.data.is_empty());
        assert!(data.source.is_none());
    }

    #[test]
    fn test_pinned_parent_short_circuits() {
        let wf = workflow();
        let mut pin_data = PinData::new();
        pin_data.insert("If".to_string(), vec![item(json!({ "pinned": true }))]);
        let builder = ExecutionContextBuilder::new(&wf).with_pin_data(
            Some(&pin_data),
            true,
            PinMergePolicy::MergeFirstItem,
        );

        let data = builder.build_execute_data(&parents(), "Set", &ConnectionType::main(), 0);
        let batch = data.data[&ConnectionType::main()][0].as_ref().unwrap();
        assert_eq!(batch[0].json["pinned"], json!(true));
    }

    #[test]
    fn test_connection_input_data_retags_items() {
        let wf = workflow();
        let mut run_data = RunData::new();
        run_data.insert(
            "If".to_string(),
            vec![run(vec![None, Some(vec![item(json!({ "a": 1 })), item(json!({ "a": 2 }))])])],
        );
        let builder = ExecutionContextBuilder::new(&wf).with_run_data(Some(&run_data));

        let items = builder.connection_input_data(
            &parents(),
            "Set",
            &ConnectionType::main(),
            0,
            Some(NodeConnectionIndexes {
                source_index: 1,
                destination_index: 0,
            }),
        );
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1].paired_item,
            Some(PairedItem::Single(PairedItemData {
                item: 1,
                input: Some(0)
            }))
        );

        let empty = builder.connection_input_data(&parents(), "Set", &ConnectionType::main(), 0, None);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_pin_merge_policies() {
        let wf = workflow();
        let mut run_data = RunData::new();
        run_data.insert(
            "If".to_string(),
            vec![run(vec![Some(vec![item(json!({ "a": 1, "b": 1 }))])])],
        );
        let mut pin_data = PinData::new();
        pin_data.insert("Other".to_string(), vec![item(json!({ "b": 2 }))]);
        let parents = vec!["If".to_string(), "Other".to_string()];

        let merged = ExecutionContextBuilder::new(&wf)
            .with_run_data(Some(&run_data))
            .with_pin_data(Some(&pin_data), true, PinMergePolicy::MergeFirstItem)
            .connection_input_data(&parents, "Set", &ConnectionType::main(), 0, None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].json["a"], json!(1));
        assert_eq!(merged[0].json["b"], json!(2));

        let replaced = ExecutionContextBuilder::new(&wf)
            .with_run_data(Some(&run_data))
            .with_pin_data(Some(&pin_data), true, PinMergePolicy::Replace)
            .connection_input_data(&parents, "Set", &ConnectionType::main(), 0, None);
        assert_eq!(replaced.len(), 1);
        assert!(replaced[0].json.get("a").is_none());
        assert_eq!(
            replaced[0].paired_item,
            Some(PairedItem::Single(PairedItemData {
                item: 1,
                input: Some(1)
            }))
        );
    }
}

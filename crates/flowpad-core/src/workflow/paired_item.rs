//! Item lineage lookup through paired-item tags.

use flowpad_types::execution::{ExecutionRecord, TargetItem};
use flowpad_types::workflow::ConnectionType;

/// Items one step upstream that produced `target`.
///
/// Returns an empty list when the execution has no run data, the target run
/// recorded no sources, or the target item carries no paired-item tag.
/// Tags pointing at an input without a recorded source are dropped.
pub fn get_source_items(execution: &ExecutionRecord, target: &TargetItem) -> Vec<TargetItem> {
    let Some(run_data) = execution.run_data() else {
        return Vec::new();
    };
    let Some(task) = run_data
        .get(&target.node_name)
        .and_then(|runs| runs.get(target.run_index))
    else {
        return Vec::new();
    };
    if task.source.is_empty() {
        return Vec::new();
    }

    let paired_item = task
        .data
        .as_ref()
        .and_then(|data| data.get(&ConnectionType::main()))
        .and_then(|outputs| outputs.get(target.output_index))
        .and_then(|batch| batch.as_ref())
        .and_then(|items| items.get(target.item_index))
        .and_then(|item| item.paired_item.as_ref());

    let Some(paired_item) = paired_item else {
        return Vec::new();
    };

    paired_item
        .entries()
        .into_iter()
        .filter_map(|entry| {
            let source = task.source.get(entry.input.unwrap_or(0))?.as_ref()?;
            Some(TargetItem {
                node_name: source.previous_node.clone(),
                run_index: source.previous_node_run.unwrap_or(0),
                item_index: entry.item,
                output_index: source.previous_node_output.unwrap_or(0),
            })
        })
        .collect()
}

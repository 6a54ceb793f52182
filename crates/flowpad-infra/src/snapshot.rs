//! Editor snapshot files.
//!
//! A snapshot is the JSON form of [`EditorSnapshot`]: the open workflow,
//! the node types it uses, and optionally the last execution.

use std::path::Path;

use flowpad_types::error::ConfigError;
use flowpad_types::snapshot::EditorSnapshot;

pub async fn load_snapshot(path: &Path) -> Result<EditorSnapshot, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let snapshot: EditorSnapshot = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!(
        path = %path.display(),
        nodes = snapshot.workflow.nodes.len(),
        node_types = snapshot.node_types.len(),
        "loaded editor snapshot"
    );
    Ok(snapshot)
}

/// Write `snapshot` as pretty JSON, creating parent directories.
pub async fn save_snapshot(path: &Path, snapshot: &EditorSnapshot) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };

    let content = serde_json::to_string_pretty(snapshot).map_err(|e| ConfigError::Serialize {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, content).await.map_err(io_err)?;

    tracing::debug!(path = %path.display(), "saved editor snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowpad_types::workflow::{EditorWorkflow, Node};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_then_load_keeps_workflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        let mut workflow = EditorWorkflow::new("Onboarding");
        workflow.id = "wf-1".to_string();
        workflow.nodes.push(Node::new("Start", "flowpad.manualTrigger"));
        let snapshot = EditorSnapshot {
            workflow,
            node_types: Vec::new(),
            execution: None,
            active_node: Some("Start".to_string()),
        };

        save_snapshot(&path, &snapshot).await.unwrap();
        let loaded = load_snapshot(&path).await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_snapshot(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        tokio::fs::write(&path, "{\"workflow\": 42}").await.unwrap();

        let err = load_snapshot(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}

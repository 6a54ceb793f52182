use thiserror::Error;

/// Error code the backend reports when a save carries a stale version id.
pub const VERSION_CONFLICT_ERROR_CODE: u32 = 100;

/// Graph-integrity errors. These are not recoverable by the editor layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node '{missing}' which is a connection of '{from}' could not be found")]
    NodeNotFound { missing: String, from: String },

    #[error("node '{0}' does not exist in the workflow")]
    UnknownNode(String),

    #[error("non-main connections loop back to node '{0}'")]
    Cycle(String),
}

/// Errors from the workflow persistence backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("workflow was changed by someone else (code {code}): {message}")]
    Conflict { code: u32, message: String },

    #[error("workflow not found")]
    NotFound,

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

/// Errors reading or writing configuration and snapshot files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("failed to serialize {path}: {message}")]
    Serialize { path: String, message: String },
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::NodeNotFound {
            missing: "Model".to_string(),
            from: "Agent".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "node 'Model' which is a connection of 'Agent' could not be found"
        );
    }

    #[test]
    fn test_api_error_conflict() {
        let err = ApiError::Conflict {
            code: VERSION_CONFLICT_ERROR_CODE,
            message: "stale".to_string(),
        };
        assert!(err.is_conflict());
        assert!(err.to_string().contains("code 100"));
        assert!(!ApiError::NotFound.is_conflict());
    }
}

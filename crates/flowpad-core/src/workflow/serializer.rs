//! Persistence-ready workflow documents.
//!
//! Editor nodes carry UI state and every parameter the user ever touched.
//! Saved nodes carry only what the node type declares and displays, with
//! defaults stripped, and only the credentials the node can actually use.

use tracing::debug;

use flowpad_types::node_type::{
    HTTP_REQUEST_NODE_TYPE, credential_type_name, is_credential_only_node_type,
};
use flowpad_types::workflow::{EditorWorkflow, Node, NodeCredentials, NodeParameters, OnError, WorkflowDocument};

use crate::node_types::NodeTypeRegistry;
use crate::workflow::parameters::{display_parameter, get_node_parameters};

/// Parameters that make a node pass all of its credentials through.
const CREDENTIAL_PASSTHROUGH_PARAMETERS: [&str; 2] = ["nodeCredentialType", "genericAuthType"];

/// The saved form of one editor node.
pub fn node_data_to_save(node: &Node, registry: &dyn NodeTypeRegistry) -> Node {
    let mut saved = Node {
        parameters: NodeParameters::new(),
        credentials: None,
        disabled: None,
        notes: None,
        continue_on_fail: None,
        on_error: None,
        color: None,
        issues: None,
        status: None,
        extra: node
            .extra
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        ..node.clone()
    };

    match registry.get_by_name_and_version(&node.node_type, Some(node.type_version)) {
        Some(description) => {
            let credential_only = is_credential_only_node_type(&description.name);
            if credential_only {
                saved.node_type = HTTP_REQUEST_NODE_TYPE.to_string();
                saved.extends_credential = Some(credential_type_name(&description.name).to_string());
            }

            saved.parameters =
                get_node_parameters(&description.properties, &node.parameters, node, credential_only);

            if let Some(credentials) = &node.credentials {
                let kept: NodeCredentials = if passes_all_credentials(node) {
                    credentials.clone()
                } else {
                    credentials
                        .iter()
                        .filter(|(kind, _)| {
                            description.credentials.iter().any(|c| {
                                &c.name == *kind
                                    && display_parameter(&node.parameters, c.display_options.as_ref(), node, None)
                            })
                        })
                        .map(|(kind, credential)| (kind.clone(), credential.clone()))
                        .collect()
                };

                if !kept.is_empty() {
                    saved.credentials = Some(kept);
                }
            }
        }
        None => {
            debug!(node = %node.name, node_type = %node.node_type, "unknown node type, saving as is");
            saved.parameters = node.parameters.clone();
            saved.credentials = node.credentials.clone();
            saved.color = node.color.clone();
        }
    }

    if node.disabled == Some(true) {
        saved.disabled = Some(true);
    }
    if node.continue_on_fail == Some(true) {
        saved.continue_on_fail = Some(true);
    }
    if let Some(on_error) = node.on_error.filter(|e| *e != OnError::StopWorkflow) {
        saved.on_error = Some(on_error);
    }
    if let Some(notes) = node.notes.as_ref().filter(|n| !n.is_empty()) {
        saved.notes = Some(notes.clone());
    }

    saved
}

fn passes_all_credentials(node: &Node) -> bool {
    CREDENTIAL_PASSTHROUGH_PARAMETERS
        .iter()
        .any(|key| node.parameters.contains_key(*key))
}

/// The editor's workflow as the document sent to the backend.
pub fn workflow_data_to_save(editor: &EditorWorkflow, registry: &dyn NodeTypeRegistry) -> WorkflowDocument {
    WorkflowDocument {
        id: editor.is_saved().then(|| editor.id.clone()),
        name: editor.name.clone(),
        nodes: editor
            .nodes
            .iter()
            .map(|node| node_data_to_save(node, registry))
            .collect(),
        connections: editor.connections.clone(),
        pin_data: editor.pin_data.clone(),
        active: editor.active,
        settings: editor.settings.clone(),
        tags: editor.tag_ids.clone(),
        version_id: editor.version_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_types::InMemoryNodeTypes;
    use flowpad_types::workflow::NodeCredential;
    use serde_json::json;

    fn registry() -> InMemoryNodeTypes {
        InMemoryNodeTypes::from_descriptions(vec![
            serde_json::from_value(json!({
                "name": "flowpad.http",
                "properties": [
                    { "name": "method", "type": "options", "default": "GET" },
                    { "name": "url", "type": "string", "default": "" },
                    { "name": "authentication", "type": "options", "default": "none" }
                ],
                "credentials": [
                    {
                        "name": "httpBasicAuth",
                        "displayOptions": { "show": { "authentication": ["basic"] } }
                    },
                    { "name": "oAuth2Api" }
                ]
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "name": "flowpad.request",
                "properties": [
                    { "name": "url", "type": "string", "default": "" },
                    {
                        "name": "options", "type": "collection", "default": {},
                        "options": [{ "name": "timeout", "type": "number", "default": 1000 }]
                    }
                ],
                "credentials": []
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "name": "n8n-creds-base.githubApi",
                "properties": [
                    { "name": "method", "type": "options", "default": "GET" }
                ]
            }))
            .unwrap(),
        ])
    }

    fn credential(name: &str) -> NodeCredential {
        NodeCredential {
            id: Some("1".to_string()),
            name: name.to_string(),
        }
    }

    fn http_node() -> Node {
        let mut node: Node = serde_json::from_value(json!({
            "id": "abc",
            "name": "Fetch",
            "type": "flowpad.http",
            "position": [10, 20],
            "parameters": { "method": "GET", "url": "https://example.com" },
            "issues": { "parameters": {} },
            "status": "success",
            "notes": "",
            "color": "#ff0000",
            "continueOnFail": false,
            "onError": "stopWorkflow",
            "_hovered": true,
            "alwaysOutputData": true
        }))
        .unwrap();
        node.credentials = Some(NodeCredentials::from([
            ("httpBasicAuth".to_string(), credential("basic")),
            ("oAuth2Api".to_string(), credential("oauth")),
            ("slackApi".to_string(), credential("slack")),
        ]));
        node
    }

    #[test]
    fn test_known_type_strips_defaults_and_ui_state() {
        let saved = node_data_to_save(&http_node(), &registry());

        assert_eq!(saved.id, "abc");
        assert_eq!(saved.position, [10.0, 20.0]);
        assert_eq!(saved.parameters, json!({ "url": "https://example.com" }).as_object().unwrap().clone());
        assert!(saved.issues.is_none());
        assert!(saved.status.is_none());
        assert!(saved.notes.is_none());
        assert!(saved.color.is_none());
        assert!(saved.continue_on_fail.is_none());
        assert!(saved.on_error.is_none());
        assert!(saved.extra.get("_hovered").is_none());
        assert_eq!(saved.extra.get("alwaysOutputData"), Some(&json!(true)));
    }

    #[test]
    fn test_credentials_filtered_by_type_and_display() {
        let saved = node_data_to_save(&http_node(), &registry());
        let credentials = saved.credentials.unwrap();
        assert_eq!(credentials.keys().collect::<Vec<_>>(), vec!["oAuth2Api"]);

        let mut basic = http_node();
        basic.parameters.insert("authentication".to_string(), json!("basic"));
        let credentials = node_data_to_save(&basic, &registry()).credentials.unwrap();
        assert!(credentials.contains_key("httpBasicAuth"));
        assert!(!credentials.contains_key("slackApi"));

        let mut generic = http_node();
        generic.parameters.insert("genericAuthType".to_string(), json!("httpHeaderAuth"));
        assert_eq!(node_data_to_save(&generic, &registry()).credentials.unwrap().len(), 3);
    }

    #[test]
    fn test_collection_values_normalized() {
        let mut node = Node::new("Request", "flowpad.request");
        node.parameters = json!({
            "url": "https://example.com",
            "options": { "timeout": 1000, "legacy": true }
        })
        .as_object()
        .unwrap()
        .clone();

        let saved = node_data_to_save(&node, &registry());
        assert_eq!(saved.parameters, json!({ "url": "https://example.com" }).as_object().unwrap().clone());

        node.parameters.insert("options".to_string(), json!({ "timeout": 5, "legacy": true }));
        let saved = node_data_to_save(&node, &registry());
        assert_eq!(saved.parameters["options"], json!({ "timeout": 5 }));
    }

    #[test]
    fn test_generic_auth_keeps_credentials_without_declared_kinds() {
        let mut node = Node::new("Request", "flowpad.request");
        node.credentials = Some(NodeCredentials::from([("slackApi".to_string(), credential("slack"))]));

        assert!(node_data_to_save(&node, &registry()).credentials.is_none());

        node.parameters.insert("genericAuthType".to_string(), json!("httpHeaderAuth"));
        let credentials = node_data_to_save(&node, &registry()).credentials.unwrap();
        assert_eq!(credentials.keys().collect::<Vec<_>>(), vec!["slackApi"]);
    }

    #[test]
    fn test_unknown_type_saved_verbatim() {
        let mut node = http_node();
        node.node_type = "community.mystery".to_string();
        node.parameters.insert("anything".to_string(), json!({ "x": 1 }));

        let saved = node_data_to_save(&node, &registry());
        assert_eq!(saved.parameters, node.parameters);
        assert_eq!(saved.credentials, node.credentials);
        assert_eq!(saved.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_flags_saved_only_when_set() {
        let mut node = http_node();
        node.disabled = Some(true);
        node.continue_on_fail = Some(true);
        node.on_error = Some(OnError::ContinueErrorOutput);
        node.notes = Some("check limits".to_string());

        let saved = node_data_to_save(&node, &registry());
        assert_eq!(saved.disabled, Some(true));
        assert_eq!(saved.continue_on_fail, Some(true));
        assert_eq!(saved.on_error, Some(OnError::ContinueErrorOutput));
        assert_eq!(saved.notes.as_deref(), Some("check limits"));
    }

    #[test]
    fn test_credential_only_type_saved_as_http_request() {
        let node = Node::new("GitHub", "n8n-creds-base.githubApi");
        let saved = node_data_to_save(&node, &registry());
        assert_eq!(saved.node_type, HTTP_REQUEST_NODE_TYPE);
        assert_eq!(saved.extends_credential.as_deref(), Some("githubApi"));
        assert_eq!(saved.parameters["method"], json!("GET"));
    }

    #[test]
    fn test_document_id_only_when_saved() {
        let mut editor = EditorWorkflow::new("Draft");
        editor.nodes.push(http_node());
        editor.tag_ids = vec!["t1".to_string()];

        let doc = workflow_data_to_save(&editor, &registry());
        assert!(doc.id.is_none());
        assert_eq!(doc.tags, vec!["t1"]);
        assert_eq!(doc.nodes.len(), 1);

        editor.id = "42".to_string();
        assert_eq!(workflow_data_to_save(&editor, &registry()).id.as_deref(), Some("42"));
    }
}

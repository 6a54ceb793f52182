//! Webhook and form URLs shown for trigger nodes.

use serde_json::Value;
use url::form_urlencoded;

use flowpad_types::config::WebhookUrls;
use flowpad_types::node_type::WebhookDescription;
use flowpad_types::workflow::{Node, NodeParameters};

use crate::workflow::expression::value_to_string;
use crate::workflow::resolver::{ParameterResolver, ResolveOptions};

/// Shown when a webhook property is not set.
pub const EMPTY_WEBHOOK_VALUE: &str = "empty";

/// Shown when a webhook property's expression fails to resolve.
pub const INVALID_EXPRESSION: &str = "[INVALID EXPRESSION]";

/// Resolve one webhook description property (`path`, `isFullPath`, ...).
pub fn webhook_expression_value(resolver: &ParameterResolver<'_>, value: Option<&Value>) -> Value {
    let Some(value) = value else {
        return Value::String(EMPTY_WEBHOOK_VALUE.to_string());
    };
    let Value::String(expression) = value else {
        return value.clone();
    };

    match resolver.resolve_expression(expression, &NodeParameters::new(), &ResolveOptions::default()) {
        Ok(resolved) => resolved.unwrap_or(Value::Null),
        Err(err) => {
            tracing::debug!(error = %err, "webhook expression did not resolve");
            Value::String(INVALID_EXPRESSION.to_string())
        }
    }
}

/// Production or test URL of one webhook of `node`.
///
/// Restart webhooks have no fixed URL; their expression is returned instead.
pub fn webhook_url(
    webhook: &WebhookDescription,
    node: &Node,
    workflow_id: &str,
    urls: &WebhookUrls,
    show_for_test: bool,
    resolver: &ParameterResolver<'_>,
) -> String {
    if webhook.restart_webhook {
        return if webhook.is_form {
            "$execution.resumeFormUrl".to_string()
        } else {
            "$execution.resumeUrl".to_string()
        };
    }

    let base_url = match (show_for_test, webhook.is_form) {
        (true, true) => &urls.form_test,
        (true, false) => &urls.webhook_test,
        (false, true) => &urls.form,
        (false, false) => &urls.webhook,
    };

    let path = value_to_string(&webhook_expression_value(resolver, webhook.path.as_ref()));
    let is_full_path = webhook_expression_value(resolver, webhook.is_full_path.as_ref()) == Value::Bool(true);

    node_webhook_url(base_url, workflow_id, node, &path, is_full_path)
}

/// `base_url` joined with the node's webhook path.
pub fn node_webhook_url(base_url: &str, workflow_id: &str, node: &Node, path: &str, is_full_path: bool) -> String {
    let has_path_parameters = path.starts_with(':') || path.contains("/:");
    let is_full_path = is_full_path && !(has_path_parameters && node.webhook_id.is_some());
    let path = path.strip_prefix('/').unwrap_or(path);

    format!("{base_url}/{}", node_webhook_path(workflow_id, node, path, is_full_path))
}

/// Path below the webhook base URL.
///
/// Nodes without a webhook id are addressed by workflow id and lower-cased,
/// URL-encoded node name.
pub fn node_webhook_path(workflow_id: &str, node: &Node, path: &str, is_full_path: bool) -> String {
    match &node.webhook_id {
        None => format!("{workflow_id}/{}/{path}", encode_component(&node.name.to_lowercase())),
        Some(_) if is_full_path => path.to_string(),
        Some(webhook_id) => format!("{webhook_id}/{path}"),
    }
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

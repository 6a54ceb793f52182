//! Editor configuration types.
//!
//! `EditorConfig` represents the `config.toml` in the Flowpad data directory.
//! Every section has defaults, so an empty file is a valid configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub expressions: ExpressionConfig,
    #[serde(default)]
    pub pin_data: PinDataConfig,
    #[serde(default)]
    pub webhooks: WebhookUrls,
    /// Environment variables exposed to expressions as `$vars`.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Read-only environments (e.g. protected source-control branches)
    /// never save.
    #[serde(default)]
    pub read_only: bool,
}

/// Workflow backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5678/rest".to_string()
}

fn default_api_key_env() -> String {
    "FLOWPAD_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which expression engine resolves `=`-prefixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    #[default]
    Jexl,
    Template,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionConfig {
    #[serde(default)]
    pub evaluator: EvaluatorKind,
}

/// How pinned parent items combine with live connection input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMergePolicy {
    /// Shallow-merge each pinned parent's first item into the first input
    /// item; pinned items become the input only when there is none.
    #[default]
    MergeFirstItem,
    /// Pinned parent items always replace the connection input.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDataConfig {
    /// Substitute pinned data for live run data during resolution.
    #[serde(default = "default_substitute")]
    pub substitute: bool,
    #[serde(default)]
    pub merge: PinMergePolicy,
}

fn default_substitute() -> bool {
    true
}

impl Default for PinDataConfig {
    fn default() -> Self {
        Self {
            substitute: default_substitute(),
            merge: PinMergePolicy::default(),
        }
    }
}

/// Base URLs webhook and form URLs are built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookUrls {
    #[serde(default = "default_webhook_url")]
    pub webhook: String,
    #[serde(default = "default_webhook_test_url")]
    pub webhook_test: String,
    #[serde(default = "default_form_url")]
    pub form: String,
    #[serde(default = "default_form_test_url")]
    pub form_test: String,
}

fn default_webhook_url() -> String {
    "http://localhost:5678/webhook".to_string()
}

fn default_webhook_test_url() -> String {
    "http://localhost:5678/webhook-test".to_string()
}

fn default_form_url() -> String {
    "http://localhost:5678/form".to_string()
}

fn default_form_test_url() -> String {
    "http://localhost:5678/form-test".to_string()
}

impl Default for WebhookUrls {
    fn default() -> Self {
        Self {
            webhook: default_webhook_url(),
            webhook_test: default_webhook_test_url(),
            form: default_form_url(),
            form_test: default_form_test_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_config_deserialize_with_defaults() {
        let config: EditorConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5678/rest");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.expressions.evaluator, EvaluatorKind::Jexl);
        assert!(config.pin_data.substitute);
        assert_eq!(config.pin_data.merge, PinMergePolicy::MergeFirstItem);
        assert!(config.environment.is_empty());
        assert!(!config.read_only);
    }

    #[test]
    fn test_editor_config_deserialize_with_values() {
        let toml_str = r#"
read_only = true

[api]
base_url = "https://flows.example.com/rest"
timeout_secs = 5

[expressions]
evaluator = "template"

[pin_data]
substitute = false
merge = "replace"

[webhooks]
webhook = "https://hooks.example.com/webhook"

[environment]
REGION = "eu-west-1"
"#;
        let config: EditorConfig = toml::from_str(toml_str).unwrap();
        assert!(config.read_only);
        assert_eq!(config.api.base_url, "https://flows.example.com/rest");
        assert_eq!(config.api.api_key_env, "FLOWPAD_API_KEY");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.expressions.evaluator, EvaluatorKind::Template);
        assert!(!config.pin_data.substitute);
        assert_eq!(config.pin_data.merge, PinMergePolicy::Replace);
        assert_eq!(config.webhooks.webhook, "https://hooks.example.com/webhook");
        assert_eq!(config.webhooks.form, "http://localhost:5678/form");
        assert_eq!(config.environment["REGION"], "eu-west-1");
    }
}

//! Node-type schema types.
//!
//! A `NodeTypeDescription` declares which parameters a node type accepts
//! (with defaults and display conditions), which credential kinds it can
//! use, which connection kinds it outputs, and how many instances a
//! workflow may contain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflow::ConnectionType;

/// Type name of the generic HTTP request node.
pub const HTTP_REQUEST_NODE_TYPE: &str = "n8n-nodes-base.httpRequest";

/// Type name of the webhook trigger node.
pub const WEBHOOK_NODE_TYPE: &str = "n8n-nodes-base.webhook";

/// Prefix of synthetic node types that wrap a single credential around the
/// HTTP request node.
pub const CREDENTIAL_ONLY_NODE_PREFIX: &str = "n8n-creds-base";

/// Returns `true` for credential-only node types.
pub fn is_credential_only_node_type(node_type: &str) -> bool {
    node_type.starts_with(&format!("{CREDENTIAL_ONLY_NODE_PREFIX}."))
}

/// Credential type wrapped by a credential-only node type.
pub fn credential_type_name(node_type: &str) -> &str {
    node_type
        .strip_prefix(CREDENTIAL_ONLY_NODE_PREFIX)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(node_type)
}

// ---------------------------------------------------------------------------
// Description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDescription {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub version: NodeTypeVersion,
    /// `trigger`, `transform`, ...
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub properties: Vec<NodeProperty>,
    #[serde(default)]
    pub credentials: Vec<CredentialDescription>,
    #[serde(default = "default_ports")]
    pub inputs: Vec<ConnectionType>,
    #[serde(default = "default_ports")]
    pub outputs: Vec<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u32>,
    #[serde(default)]
    pub webhooks: Vec<WebhookDescription>,
}

fn default_ports() -> Vec<ConnectionType> {
    vec![ConnectionType::main()]
}

impl NodeTypeDescription {
    pub fn supports_version(&self, version: f64) -> bool {
        self.version.contains(version)
    }

    pub fn is_trigger(&self) -> bool {
        self.group.iter().any(|g| g == "trigger")
    }
}

/// A node type supports one version or a list of versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeTypeVersion {
    Single(f64),
    Many(Vec<f64>),
}

impl Default for NodeTypeVersion {
    fn default() -> Self {
        NodeTypeVersion::Single(1.0)
    }
}

impl NodeTypeVersion {
    pub fn contains(&self, version: f64) -> bool {
        match self {
            NodeTypeVersion::Single(v) => (*v - version).abs() < f64::EPSILON,
            NodeTypeVersion::Many(vs) => vs.iter().any(|v| (*v - version).abs() < f64::EPSILON),
        }
    }

    pub fn latest(&self) -> f64 {
        match self {
            NodeTypeVersion::Single(v) => *v,
            NodeTypeVersion::Many(vs) => vs.iter().copied().fold(f64::MIN, f64::max),
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// One declared parameter of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_options: Option<PropertyTypeOptions>,
    /// Choices of `options` properties, nested properties of a
    /// `collection`, or value groups of a `fixedCollection`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertyOption>,
}

impl NodeProperty {
    /// Names of sibling parameters this one needs to load its options.
    pub fn load_options_depends_on(&self) -> &[String] {
        self.type_options
            .as_ref()
            .map(|o| o.load_options_depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a `fixedCollection` holds a list of entries per group.
    pub fn multiple_values(&self) -> bool {
        self.type_options.as_ref().is_some_and(|o| o.multiple_values)
    }

    /// Nested properties declared by a `collection`.
    pub fn collection_properties(&self) -> Vec<&NodeProperty> {
        self.options
            .iter()
            .filter_map(|option| match option {
                PropertyOption::Property(property) => Some(property.as_ref()),
                _ => None,
            })
            .collect()
    }

    /// Value groups declared by a `fixedCollection`.
    pub fn option_groups(&self) -> impl Iterator<Item = &PropertyOptionGroup> {
        self.options.iter().filter_map(|option| match option {
            PropertyOption::Group(group) => Some(group),
            _ => None,
        })
    }
}

/// One entry of a property's `options` list.
///
/// The shape depends on the owning property's type, so entries are told
/// apart by their fields: groups carry `values`, nested properties carry
/// `type`, plain choices carry `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyOption {
    Group(PropertyOptionGroup),
    Property(Box<NodeProperty>),
    Choice(PropertyChoice),
}

/// A named group of nested properties inside a `fixedCollection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyOptionGroup {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub values: Vec<NodeProperty>,
}

/// A selectable value of an `options` or `multiOptions` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChoice {
    pub name: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    Collection,
    FixedCollection,
    Json,
    Color,
    DateTime,
    Hidden,
    Notice,
    Credentials,
    ResourceLocator,
    #[serde(other)]
    Other,
}

impl PropertyType {
    /// Purely presentational properties never carry a value.
    pub fn is_presentational(self) -> bool {
        matches!(self, PropertyType::Notice)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTypeOptions {
    #[serde(default)]
    pub load_options_depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_options_method: Option<String>,
    #[serde(default)]
    pub multiple_values: bool,
}

/// Show/hide conditions keyed by parameter name.
///
/// `show`: every listed parameter must hold one of the listed values.
/// `hide`: any listed parameter holding one of the listed values hides it.
/// Keys starting with `/` address root parameters; `@version` matches the
/// node's type version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<BTreeMap<String, Vec<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<BTreeMap<String, Vec<Value>>>,
}

/// A credential kind a node type can use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescription {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

/// A webhook a node type registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDescription {
    #[serde(default = "default_webhook_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<Value>,
    /// Literal path or `=`-prefixed expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_full_path: Option<Value>,
    #[serde(default)]
    pub is_form: bool,
    #[serde(default)]
    pub restart_webhook: bool,
}

fn default_webhook_name() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_description_defaults() {
        let desc: NodeTypeDescription = serde_json::from_value(json!({
            "name": "flowpad.set",
            "properties": [
                { "name": "value", "type": "string", "default": "" },
                { "name": "info", "type": "notice", "default": "" },
                { "name": "mystery", "type": "brandNewType", "default": null }
            ]
        }))
        .unwrap();

        assert!(desc.supports_version(1.0));
        assert_eq!(desc.outputs, vec![ConnectionType::main()]);
        assert_eq!(desc.properties[1].kind, PropertyType::Notice);
        assert_eq!(desc.properties[2].kind, PropertyType::Other);
        assert!(desc.max_nodes.is_none());
    }

    #[test]
    fn test_version_list() {
        let version: NodeTypeVersion = serde_json::from_value(json!([1, 2, 2.1])).unwrap();
        assert!(version.contains(2.1));
        assert!(!version.contains(3.0));
        assert_eq!(version.latest(), 2.1);
    }

    #[test]
    fn test_option_shapes() {
        let props: Vec<NodeProperty> = serde_json::from_value(json!([
            {
                "name": "method", "type": "options", "default": "GET",
                "options": [{ "name": "GET", "value": "GET" }, { "name": "POST", "value": "POST" }]
            },
            {
                "name": "options", "type": "collection", "default": {},
                "options": [{ "name": "timeout", "type": "number", "default": 1000 }]
            },
            {
                "name": "headers", "type": "fixedCollection", "default": {},
                "typeOptions": { "multipleValues": true },
                "options": [{
                    "name": "header", "displayName": "Header",
                    "values": [{ "name": "key", "type": "string", "default": "" }]
                }]
            }
        ]))
        .unwrap();

        assert!(matches!(props[0].options[1], PropertyOption::Choice(ref c) if c.value == json!("POST")));
        assert!(props[0].collection_properties().is_empty());

        let nested = props[1].collection_properties();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].default, json!(1000));

        assert!(props[2].multiple_values());
        let groups: Vec<_> = props[2].option_groups().collect();
        assert_eq!(groups[0].name, "header");
        assert_eq!(groups[0].values[0].name, "key");
    }

    #[test]
    fn test_credential_only_types() {
        assert!(is_credential_only_node_type("n8n-creds-base.githubApi"));
        assert!(!is_credential_only_node_type(HTTP_REQUEST_NODE_TYPE));
        assert_eq!(credential_type_name("n8n-creds-base.githubApi"), "githubApi");
    }

    #[test]
    fn test_load_options_depends_on() {
        let prop: NodeProperty = serde_json::from_value(json!({
            "name": "channel",
            "type": "options",
            "typeOptions": { "loadOptionsDependsOn": ["workspace"] }
        }))
        .unwrap();
        assert_eq!(prop.load_options_depends_on(), ["workspace".to_string()]);
    }
}

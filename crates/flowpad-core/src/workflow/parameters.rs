//! Parameter normalization against a node type's declared properties.
//!
//! `display_parameter` evaluates a property's show/hide conditions and
//! `get_node_parameters` reduces a node's raw parameters to the declared,
//! displayed ones, recursing into collections.

use std::collections::BTreeSet;

use serde_json::Value;

use flowpad_types::node_type::{DisplayOptions, NodeProperty, PropertyType};
use flowpad_types::workflow::{Node, NodeParameters};

/// Key addressing the node's type version in display conditions.
const VERSION_KEY: &str = "@version";

/// Whether a property (or credential) with `display_options` is shown for
/// the given parameter values.
///
/// `root` is the top-level parameter object that `/`-prefixed keys address;
/// for top-level properties it is `values` itself. Conditions on a value
/// that is an expression always pass, since its result is unknown until
/// execution.
pub fn display_parameter(
    values: &NodeParameters,
    display_options: Option<&DisplayOptions>,
    node: &Node,
    root: Option<&NodeParameters>,
) -> bool {
    let Some(options) = display_options else {
        return true;
    };
    let root = root.unwrap_or(values);

    if let Some(show) = &options.show {
        for (key, expected) in show {
            let actual = condition_values(key, values, root, node);
            if actual.iter().any(is_expression) {
                return true;
            }
            if actual.is_empty() || !expected.iter().any(|e| contains_value(&actual, e)) {
                return false;
            }
        }
    }

    if let Some(hide) = &options.hide {
        for (key, hidden) in hide {
            let actual = condition_values(key, values, root, node);
            if !actual.is_empty() && hidden.iter().any(|h| contains_value(&actual, h)) {
                return false;
            }
        }
    }

    true
}

fn condition_values(key: &str, values: &NodeParameters, root: &NodeParameters, node: &Node) -> Vec<Value> {
    let found = if key == VERSION_KEY {
        Some(Value::from(node.type_version))
    } else if let Some(root_key) = key.strip_prefix('/') {
        get_path(root, root_key).cloned()
    } else {
        get_path(values, key).cloned()
    };

    match found {
        None => Vec::new(),
        Some(Value::Array(list)) => list,
        Some(value) => vec![value],
    }
}

/// Look up a dotted path (`options.mode`, `rules.0.value`) in a parameter
/// object.
pub fn get_path<'v>(values: &'v NodeParameters, path: &str) -> Option<&'v Value> {
    let mut segments = path.split('.');
    let mut current = values.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(list) => list.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn is_expression(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with('='))
}

fn contains_value(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|v| values_equal(v, needle))
}

/// JSON equality where `1` and `1.0` compare equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// Declared, displayed parameters of a node.
///
/// Presentational properties are dropped, as are values for undeclared
/// names. Display conditions are checked against the defaults overlaid with
/// the node's values. When several properties share a name, the first one
/// displayed wins. Without `return_defaults`, values equal to their default
/// are omitted.
///
/// `collection` and `fixedCollection` values are normalized the same way
/// one level down: only declared nested names survive, and nested defaults
/// are stripped. A collection only keeps the nested values actually set.
pub fn get_node_parameters(
    properties: &[NodeProperty],
    values: &NodeParameters,
    node: &Node,
    return_defaults: bool,
) -> NodeParameters {
    let properties: Vec<&NodeProperty> = properties.iter().collect();
    normalize(&properties, values, node, None, return_defaults, false)
}

fn normalize(
    properties: &[&NodeProperty],
    values: &NodeParameters,
    node: &Node,
    root: Option<&NodeParameters>,
    return_defaults: bool,
    set_only: bool,
) -> NodeParameters {
    let display_values = with_defaults(properties, values, node, root);
    let nested_root = root.unwrap_or(&display_values);

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut result = NodeParameters::new();

    for property in properties {
        if property.kind.is_presentational() {
            continue;
        }
        if seen.contains(property.name.as_str()) {
            continue;
        }
        if !display_parameter(&display_values, property.display_options.as_ref(), node, root) {
            continue;
        }
        seen.insert(property.name.as_str());

        if set_only && !values.contains_key(&property.name) {
            continue;
        }
        let value = values.get(&property.name).unwrap_or(&property.default);
        let value = normalize_nested(property, value, node, nested_root, return_defaults);
        if return_defaults || !values_equal(&value, &property.default) {
            result.insert(property.name.clone(), value);
        }
    }

    result
}

fn normalize_nested(
    property: &NodeProperty,
    value: &Value,
    node: &Node,
    root: &NodeParameters,
    return_defaults: bool,
) -> Value {
    let Value::Object(entries) = value else {
        return value.clone();
    };

    match property.kind {
        PropertyType::Collection => Value::Object(normalize(
            &property.collection_properties(),
            entries,
            node,
            Some(root),
            return_defaults,
            true,
        )),
        PropertyType::FixedCollection => {
            let multiple = property.multiple_values();
            let mut groups = NodeParameters::new();
            for group in property.option_groups() {
                let Some(group_value) = entries.get(&group.name) else {
                    continue;
                };
                let group_properties: Vec<&NodeProperty> = group.values.iter().collect();
                let normalize_entry = |entry: &Value| match entry {
                    Value::Object(fields) => Value::Object(normalize(
                        &group_properties,
                        fields,
                        node,
                        Some(root),
                        return_defaults,
                        false,
                    )),
                    other => other.clone(),
                };
                let normalized = match group_value {
                    Value::Array(list) if multiple => Value::Array(list.iter().map(normalize_entry).collect()),
                    other => normalize_entry(other),
                };
                groups.insert(group.name.clone(), normalized);
            }
            Value::Object(groups)
        }
        _ => value.clone(),
    }
}

/// Defaults of every displayed property, overlaid with the node's values.
///
/// Display conditions may depend on other properties' defaults, so this
/// runs to a fixed point.
fn with_defaults(
    properties: &[&NodeProperty],
    values: &NodeParameters,
    node: &Node,
    root: Option<&NodeParameters>,
) -> NodeParameters {
    let mut merged = values.clone();
    for _ in 0..properties.len().max(1) {
        let mut changed = false;
        for property in properties {
            if property.kind.is_presentational() || merged.contains_key(&property.name) {
                continue;
            }
            if display_parameter(&merged, property.display_options.as_ref(), node, root) {
                merged.insert(property.name.clone(), property.default.clone());
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    merged
}

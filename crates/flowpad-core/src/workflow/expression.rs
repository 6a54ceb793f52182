//! Expression engines and parameter-value evaluation.
//!
//! A parameter value that is a string starting with `=` is an expression.
//! Its `{{ ... }}` segments are handed to an `ExpressionEngine` together
//! with a JSON context exposing `$json`, `$input`, `$node`, `$runIndex`,
//! `$itemIndex`, `$prevNode`, `$workflow`, `$mode`, `$parameter` and any
//! additional keys (`$execution`, `$vars`, ...).
//!
//! **Security note:** item data is always passed as context, never
//! interpolated into expression strings.

use serde_json::{Map, Value, json};

use flowpad_types::config::EvaluatorKind;
use flowpad_types::execution::{ExecuteData, ExecutionItem, PinData, RunData};
use flowpad_types::workflow::{ConnectionType, NodeParameters};

use crate::workflow::graph::Workflow;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Unsupported expression: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

/// Evaluates the inside of one `{{ ... }}` segment against a context object.
pub trait ExpressionEngine {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError>;
}

/// Engine selected by the `expressions.evaluator` setting.
pub fn engine_for(kind: EvaluatorKind) -> Box<dyn ExpressionEngine> {
    match kind {
        EvaluatorKind::Jexl => Box::new(JexlEngine::new()),
        EvaluatorKind::Template => Box::new(TemplateEngine),
    }
}

/// Prefix `$name` identifiers are rewritten to before JEXL sees them.
const DOLLAR_PREFIX: &str = "__";

/// JEXL engine with standard transforms pre-registered.
///
/// `$json.name|upper`, `$input.all|length > 1`,
/// `$node["Fetch"].json.id`, `$vars.region == 'eu'`.
pub struct JexlEngine {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl JexlEngine {
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            // String transforms
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            .with_transform("split", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let parts: Vec<&str> = s.split(delimiter).collect();
                Ok(json!(parts))
            })
            .with_transform("not", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(!is_truthy(&val)))
            })
            .with_transform("contains", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let search = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.contains(search)))
            })
            .with_transform("startsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let prefix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.starts_with(prefix)))
            })
            .with_transform("endsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let suffix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.ends_with(suffix)))
            })
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            .with_transform("json", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(serde_json::to_string(&val).unwrap_or_default()))
            });

        Self { evaluator }
    }
}

impl Default for JexlEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEngine for JexlEngine {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        let Value::Object(context) = context else {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        };

        let context: Map<String, Value> = context
            .iter()
            .map(|(key, value)| match key.strip_prefix('$') {
                Some(rest) => (format!("{DOLLAR_PREFIX}{rest}"), value.clone()),
                None => (key.clone(), value.clone()),
            })
            .collect();

        self.evaluator
            .eval_in_context(&mangle_dollar_identifiers(expression), &Value::Object(context))
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }
}

/// Rewrite `$name` to `__name` outside string literals.
fn mangle_dollar_identifiers(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len() + 8);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                '$' if chars.peek().is_some_and(|n| n.is_alphanumeric() || *n == '_') => {
                    out.push_str(DOLLAR_PREFIX);
                }
                _ => out.push(c),
            },
        }
    }

    out
}

/// Path-only engine: `$json.a.b`, `$input.all[0].json.id`, `$vars.region`.
///
/// Anything beyond property and numeric index access is rejected.
pub struct TemplateEngine;

impl ExpressionEngine for TemplateEngine {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }

        let path = expression.trim();
        if path.is_empty() {
            return Ok(Value::Null);
        }

        let mut current = context;
        for segment in path.split('.') {
            let (name, indexes) = parse_segment(segment)
                .ok_or_else(|| ExpressionError::Unsupported(expression.trim().to_string()))?;

            current = match current.get(name) {
                Some(v) => v,
                None => return Ok(Value::Null),
            };
            for index in indexes {
                current = match current.get(index) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                };
            }
        }

        Ok(current.clone())
    }
}

/// Split `name[0][1]` into its name and indexes.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    let (name, mut rest) = match segment.find('[') {
        Some(pos) => segment.split_at(pos),
        None => (segment, ""),
    };

    let valid_name = !name.is_empty()
        && name
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_alphanumeric() || c == '_' || (i == 0 && c == '$'));
    if !valid_name {
        return None;
    }

    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indexes.push(inner[..close].trim().parse::<usize>().ok()?);
        rest = &inner[close + 1..];
    }

    Some((name, indexes))
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Everything an expression can see while one parameter is resolved.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationRequest<'a> {
    pub workflow: &'a Workflow,
    pub run_data: Option<&'a RunData>,
    pub pin_data: Option<&'a PinData>,
    pub run_index: usize,
    pub item_index: usize,
    pub active_node: &'a str,
    pub connection_input: &'a [ExecutionItem],
    pub execute_data: &'a ExecuteData,
    pub mode: &'a str,
    pub additional_keys: &'a Map<String, Value>,
    /// Overlaid on the active node's parameters as `$parameter`.
    pub parameters: Option<&'a NodeParameters>,
}

impl EvaluationRequest<'_> {
    /// Build the JSON context object expressions evaluate against.
    pub fn to_context(&self) -> Value {
        let items: Vec<Value> = self.connection_input.iter().map(item_to_value).collect();
        let current = items.get(self.item_index).cloned().unwrap_or(Value::Null);
        let json = self
            .connection_input
            .get(self.item_index)
            .map(|i| Value::Object(i.json.clone()))
            .unwrap_or_else(|| json!({}));

        let prev_node = self
            .execute_data
            .source
            .as_ref()
            .and_then(|s| s.get(&ConnectionType::main()))
            .and_then(|sources| sources.first().cloned().flatten())
            .map(|s| {
                json!({
                    "name": s.previous_node,
                    "outputIndex": s.previous_node_output.unwrap_or(0),
                    "runIndex": s.previous_node_run.unwrap_or(0),
                })
            })
            .unwrap_or_else(|| json!({}));

        let mut parameters = self
            .workflow
            .get_node(self.active_node)
            .map(|n| n.parameters.clone())
            .unwrap_or_default();
        if let Some(siblings) = self.parameters {
            parameters.extend(siblings.clone());
        }

        let first = items.first().cloned().unwrap_or(Value::Null);
        let last = items.last().cloned().unwrap_or(Value::Null);

        let mut context = Map::new();
        context.insert("$json".to_string(), json);
        context.insert(
            "$input".to_string(),
            json!({ "item": current, "first": first, "last": last, "all": items }),
        );
        context.insert("$node".to_string(), Value::Object(self.node_outputs()));
        context.insert("$runIndex".to_string(), json!(self.run_index));
        context.insert("$itemIndex".to_string(), json!(self.item_index));
        context.insert("$prevNode".to_string(), prev_node);
        context.insert(
            "$workflow".to_string(),
            json!({
                "id": self.workflow.id,
                "name": self.workflow.name,
                "active": self.workflow.active,
            }),
        );
        context.insert("$mode".to_string(), json!(self.mode));
        context.insert("$parameter".to_string(), Value::Object(parameters));

        for (key, value) in self.additional_keys {
            context.insert(key.clone(), value.clone());
        }

        Value::Object(context)
    }

    /// `{name: {json, runIndex}}` for every node with output, pinned items
    /// first.
    fn node_outputs(&self) -> Map<String, Value> {
        let mut outputs = Map::new();

        if let Some(run_data) = self.run_data {
            for (name, runs) in run_data {
                let Some((run_index, run)) = runs.iter().enumerate().next_back() else {
                    continue;
                };
                let batch = run
                    .data
                    .as_ref()
                    .and_then(|d| d.get(&ConnectionType::main()))
                    .and_then(|outputs| outputs.first().cloned().flatten())
                    .unwrap_or_default();
                outputs.insert(name.clone(), node_entry(&batch, self.item_index, run_index));
            }
        }

        if let Some(pin_data) = self.pin_data {
            for (name, items) in pin_data {
                outputs.insert(name.clone(), node_entry(items, self.item_index, 0));
            }
        }

        outputs
    }
}

fn node_entry(items: &[ExecutionItem], item_index: usize, run_index: usize) -> Value {
    let json = items
        .get(item_index)
        .or_else(|| items.first())
        .map(|i| Value::Object(i.json.clone()))
        .unwrap_or_else(|| json!({}));
    json!({ "json": json, "runIndex": run_index })
}

fn item_to_value(item: &ExecutionItem) -> Value {
    json!({ "json": item.json })
}

// ---------------------------------------------------------------------------
// Parameter values
// ---------------------------------------------------------------------------

/// Resolve every expression inside `parameter`, walking objects and arrays.
pub fn get_parameter_value(
    engine: &dyn ExpressionEngine,
    parameter: &Value,
    context: &Value,
) -> Result<Value, ExpressionError> {
    match parameter {
        Value::String(s) => match s.strip_prefix('=') {
            Some(body) => evaluate_template(engine, body, context),
            None => Ok(parameter.clone()),
        },
        Value::Array(list) => list
            .iter()
            .map(|v| get_parameter_value(engine, v, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), get_parameter_value(engine, v, context)?)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        _ => Ok(parameter.clone()),
    }
}

enum Part<'s> {
    Text(&'s str),
    Code(&'s str),
}

fn split_template(body: &str) -> Vec<Part<'_>> {
    let mut parts = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        if start > 0 {
            parts.push(Part::Text(&rest[..start]));
        }
        parts.push(Part::Code(&rest[start + 2..start + 2 + len]));
        rest = &rest[start + 2 + len + 2..];
    }
    if !rest.is_empty() {
        parts.push(Part::Text(rest));
    }

    parts
}

/// A lone `{{ }}` segment yields its raw value; mixed text concatenates
/// the stringified segment results.
fn evaluate_template(
    engine: &dyn ExpressionEngine,
    body: &str,
    context: &Value,
) -> Result<Value, ExpressionError> {
    let parts = split_template(body);

    if let [Part::Code(code)] = parts.as_slice() {
        return engine.evaluate(code.trim(), context);
    }

    let mut out = String::new();
    for part in parts {
        match part {
            Part::Text(text) => out.push_str(text),
            Part::Code(code) => out.push_str(&value_to_string(&engine.evaluate(code.trim(), context)?)),
        }
    }
    Ok(Value::String(out))
}

/// Convert a JSON value to a display string for template concatenation.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        // For objects/arrays, return compact JSON
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// JavaScript-like truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Value {
        json!({
            "$json": { "name": "Alice", "tags": ["a", "b"], "count": 2 },
            "$vars": { "region": "eu" },
            "$node": { "Fetch": { "json": { "id": 7 } } },
            "plain": "value"
        })
    }

    #[test]
    fn test_mangle_skips_string_literals() {
        assert_eq!(mangle_dollar_identifiers("$json.a"), "__json.a");
        assert_eq!(mangle_dollar_identifiers("'$json' + $vars.x"), "'$json' + __vars.x");
        assert_eq!(mangle_dollar_identifiers(r#""a\"$b" == $c"#), r#""a\"$b" == __c"#);
        assert_eq!(mangle_dollar_identifiers("5 $ 3"), "5 $ 3");
    }

    #[test]
    fn test_jexl_dollar_paths() {
        let engine = JexlEngine::new();
        let ctx = context();
        assert_eq!(engine.evaluate("$json.name", &ctx).unwrap(), json!("Alice"));
        assert_eq!(engine.evaluate("$json.tags[1]", &ctx).unwrap(), json!("b"));
        assert_eq!(engine.evaluate("$vars.region == 'eu'", &ctx).unwrap(), json!(true));
        assert_eq!(engine.evaluate("plain", &ctx).unwrap(), json!("value"));
    }

    #[test]
    fn test_jexl_transforms() {
        let engine = JexlEngine::new();
        let ctx = context();
        assert_eq!(engine.evaluate("$json.name|upper", &ctx).unwrap(), json!("ALICE"));
        assert_eq!(
            engine.evaluate("$json.tags|length", &ctx).unwrap().as_f64(),
            Some(2.0)
        );
        assert_eq!(engine.evaluate("$json.tags|json", &ctx).unwrap(), json!(r#"["a","b"]"#));
    }

    #[test]
    fn test_jexl_requires_object_context() {
        let engine = JexlEngine::new();
        assert!(matches!(
            engine.evaluate("1", &json!([1])),
            Err(ExpressionError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_template_paths() {
        let engine = TemplateEngine;
        let ctx = context();
        assert_eq!(engine.evaluate(" $json.name ", &ctx).unwrap(), json!("Alice"));
        assert_eq!(engine.evaluate("$json.tags[0]", &ctx).unwrap(), json!("a"));
        assert_eq!(engine.evaluate("$json.missing.deeper", &ctx).unwrap(), Value::Null);
        assert!(matches!(
            engine.evaluate("$json.count + 1", &ctx),
            Err(ExpressionError::Unsupported(_))
        ));
        assert!(matches!(
            engine.evaluate(r#"$node["Fetch"].json.id"#, &ctx),
            Err(ExpressionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_parameter_value_walk() {
        let engine = TemplateEngine;
        let ctx = context();

        let parameter = json!({
            "literal": "no expression",
            "whole": "={{ $json.tags }}",
            "mixed": "=Hello {{ $json.name }}, you have {{ $json.count }}",
            "plain_expression": "=just text",
            "list": ["={{ $vars.region }}", 3]
        });

        let resolved = get_parameter_value(&engine, &parameter, &ctx).unwrap();
        assert_eq!(resolved["literal"], json!("no expression"));
        assert_eq!(resolved["whole"], json!(["a", "b"]));
        assert_eq!(resolved["mixed"], json!("Hello Alice, you have 2"));
        assert_eq!(resolved["plain_expression"], json!("just text"));
        assert_eq!(resolved["list"], json!(["eu", 3]));
    }

    #[test]
    fn test_unclosed_segment_is_text() {
        let engine = TemplateEngine;
        let resolved = get_parameter_value(&engine, &json!("=a {{ b"), &context()).unwrap();
        assert_eq!(resolved, json!("a {{ b"));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!(2.0)), "2");
        assert_eq!(value_to_string(&json!(2.5)), "2.5");
        assert_eq!(value_to_string(&Value::Null), "");
        assert_eq!(value_to_string(&json!({ "a": 1 })), r#"{"a":1}"#);
    }

    #[test]
    fn test_engine_selection() {
        let engine = engine_for(EvaluatorKind::Template);
        assert_eq!(engine.evaluate("$vars.region", &context()).unwrap(), json!("eu"));
    }
}

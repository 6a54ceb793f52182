//! Parameter resolution against the editor's current workflow snapshot.
//!
//! Resolution anchors on the main-input ancestor of the active node, picks
//! the parent node and run whose output the expression should see, rebuilds
//! that node's input items, and evaluates the parameter with the configured
//! engine.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::debug;

use flowpad_types::config::{EditorConfig, EvaluatorKind, PinMergePolicy};
use flowpad_types::error::GraphError;
use flowpad_types::execution::{ExecutionRecord, PinData, RunData, TargetItem};
use flowpad_types::node_type::{HTTP_REQUEST_NODE_TYPE, NodeProperty};
use flowpad_types::workflow::{ConnectionType, NodeParameters};

use crate::node_types::NodeTypeRegistry;
use crate::workflow::execute_data::ExecutionContextBuilder;
use crate::workflow::expression::{
    EvaluationRequest, ExpressionEngine, ExpressionError, engine_for, get_parameter_value,
};
use crate::workflow::graph::{ConnectionFilter, Workflow};
use crate::workflow::navigator::find_main_input_ancestor;
use crate::workflow::paired_item::get_source_items;

/// Stand-in for values only known once a real execution runs.
pub const PLACEHOLDER_FILLED_AT_EXECUTION_TIME: &str = "[filled at execution time]";

/// Key a lone expression is resolved under by `resolve_expression`.
const EXPRESSION_KEY: &str = "__xxxxxxx__";

/// Mode reported as `$mode`; `$execution.mode` reports `test`.
const EVALUATION_MODE: &str = "manual";

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no active node to resolve parameters for")]
    NoActiveNode,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

/// Outcome for one parameter of `resolve_required_parameters`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterResolution {
    /// `None` when the target item has no traceable source.
    Resolved(Option<Value>),
    /// Optional parameter whose expression failed.
    Skipped { reason: String },
}

impl ParameterResolution {
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParameterResolution::Resolved(value) => value.as_ref(),
            ParameterResolution::Skipped { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverSettings {
    pub pin_substitution: bool,
    pub pin_merge: PinMergePolicy,
    pub evaluator: EvaluatorKind,
}

impl From<&EditorConfig> for ResolverSettings {
    fn from(config: &EditorConfig) -> Self {
        Self {
            pin_substitution: config.pin_data.substitute,
            pin_merge: config.pin_data.merge,
            evaluator: config.expressions.evaluator,
        }
    }
}

/// Everything resolution reads, borrowed from the editor's state.
#[derive(Clone, Copy)]
pub struct ResolutionEnv<'a> {
    pub workflow: &'a Workflow,
    pub node_types: &'a dyn NodeTypeRegistry,
    pub execution: Option<&'a ExecutionRecord>,
    pub pin_data: Option<&'a PinData>,
    pub active_node: Option<&'a str>,
    pub settings: ResolverSettings,
    /// Exposed to expressions as `$vars`.
    pub variables: &'a BTreeMap<String, String>,
}

impl<'a> ResolutionEnv<'a> {
    fn run_data(&self) -> Option<&'a RunData> {
        self.execution.and_then(|e| e.run_data())
    }
}

/// Which item and input a resolution should evaluate against.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub target_item: Option<TargetItem>,
    pub input_node_name: Option<String>,
    pub input_run_index: Option<usize>,
    pub input_branch_index: Option<usize>,
    /// Extra `$`-keys; they override the built-in ones.
    pub additional_keys: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct ParameterResolver<'a> {
    env: ResolutionEnv<'a>,
    engine: Box<dyn ExpressionEngine>,
}

impl<'a> ParameterResolver<'a> {
    /// Resolver using the engine the settings select.
    pub fn new(env: ResolutionEnv<'a>) -> Self {
        let engine = engine_for(env.settings.evaluator);
        Self { env, engine }
    }

    pub fn with_engine(env: ResolutionEnv<'a>, engine: Box<dyn ExpressionEngine>) -> Self {
        Self { env, engine }
    }

    /// Resolve every expression inside `parameter` for the active node.
    ///
    /// Returns `Ok(None)` when a target item was given but its source item
    /// cannot be traced.
    pub fn resolve_parameter(
        &self,
        parameter: &Value,
        options: &ResolveOptions,
    ) -> Result<Option<Value>, ResolveError> {
        self.resolve_with(parameter, options, None)
    }

    fn resolve_with(
        &self,
        parameter: &Value,
        options: &ResolveOptions,
        siblings: Option<&NodeParameters>,
    ) -> Result<Option<Value>, ResolveError> {
        let workflow = self.env.workflow;
        let main = ConnectionType::main();

        let active_name = self.env.active_node.ok_or(ResolveError::NoActiveNode)?;
        let active_node = workflow
            .get_node(active_name)
            .ok_or_else(|| GraphError::UnknownNode(active_name.to_string()))?;
        let anchor = find_main_input_ancestor(workflow, self.env.node_types, active_node)?;

        let run_data = self.env.run_data();
        let mut item_index = options.target_item.as_ref().map_or(0, |t| t.item_index);
        let mut parent_nodes = workflow.get_parent_nodes(&anchor.name, &ConnectionFilter::main(), Some(1));
        let mut run_index_parent = options.input_run_index.unwrap_or(0);
        let mut connection = parent_nodes
            .first()
            .and_then(|parent| workflow.get_node_connection_indexes(&anchor.name, parent, &main));

        match (&options.target_item, self.env.execution) {
            (Some(target), Some(execution)) if target.node_name == anchor.name => {
                let sources = get_source_items(execution, target);
                let Some(source) = sources.first() else {
                    debug!(node = %anchor.name, "target item has no traceable source");
                    return Ok(None);
                };
                parent_nodes = vec![source.node_name.clone()];
                run_index_parent = source.run_index;
                item_index = source.item_index;
                if let Some(c) = connection.as_mut() {
                    c.source_index = source.output_index;
                }
            }
            _ => {
                if let Some(input) = &options.input_node_name {
                    parent_nodes = vec![input.clone()];
                }
                if let Some(c) = connection.as_mut() {
                    c.source_index = options.input_branch_index.unwrap_or(c.source_index);
                }
                if options.input_run_index.is_none() {
                    let last_parent_run = run_data.and_then(|rd| {
                        parent_nodes
                            .iter()
                            .find_map(|p| rd.get(p))
                            .map(|runs| runs.len().saturating_sub(1))
                    });
                    if let Some(run) = last_parent_run {
                        run_index_parent = run;
                    }
                }
            }
        }

        let builder = ExecutionContextBuilder::new(workflow)
            .with_run_data(run_data)
            .with_pin_data(
                self.env.pin_data,
                self.env.settings.pin_substitution,
                self.env.settings.pin_merge,
            );

        let connection_input =
            builder.connection_input_data(&parent_nodes, &anchor.name, &main, run_index_parent, connection);

        let additional_keys = self.additional_keys(active_node.node_type.as_str(), active_name, options);

        let run_index_current = match (&options.target_item, run_data.and_then(|rd| rd.get(&anchor.name))) {
            (Some(target), _) => target.run_index,
            (None, Some(runs)) => runs.len().saturating_sub(1),
            (None, None) => 0,
        };
        let execute_data = builder.build_execute_data(&parent_nodes, &anchor.name, &main, run_index_current);

        debug!(
            active = %active_name,
            anchor = %anchor.name,
            parents = ?parent_nodes,
            run_index_parent,
            run_index_current,
            item_index,
            "resolving parameter"
        );

        let request = EvaluationRequest {
            workflow,
            run_data,
            pin_data: self.env.settings.pin_substitution.then_some(self.env.pin_data).flatten(),
            run_index: run_index_current,
            item_index,
            active_node: active_name,
            connection_input: &connection_input,
            execute_data: &execute_data,
            mode: EVALUATION_MODE,
            additional_keys: &additional_keys,
            parameters: siblings,
        };

        let value = get_parameter_value(self.engine.as_ref(), parameter, &request.to_context())?;
        Ok(Some(value))
    }

    fn additional_keys(
        &self,
        active_type: &str,
        active_name: &str,
        options: &ResolveOptions,
    ) -> Map<String, Value> {
        let mut keys = Map::new();
        keys.insert(
            "$execution".to_string(),
            json!({
                "id": PLACEHOLDER_FILLED_AT_EXECUTION_TIME,
                "mode": "test",
                "resumeUrl": PLACEHOLDER_FILLED_AT_EXECUTION_TIME,
                "resumeFormUrl": PLACEHOLDER_FILLED_AT_EXECUTION_TIME,
            }),
        );
        keys.insert("$vars".to_string(), json!(self.env.variables));
        // deprecated
        keys.insert("$executionId".to_string(), json!(PLACEHOLDER_FILLED_AT_EXECUTION_TIME));
        keys.insert("$resumeWebhookUrl".to_string(), json!(PLACEHOLDER_FILLED_AT_EXECUTION_TIME));

        for (key, value) in &options.additional_keys {
            keys.insert(key.clone(), value.clone());
        }

        if active_type == HTTP_REQUEST_NODE_TYPE {
            let response = self
                .env
                .execution
                .and_then(|e| e.node_context(active_name))
                .and_then(|ctx| ctx.get("response"))
                .cloned()
                .unwrap_or_else(|| json!({}));
            keys.insert("$response".to_string(), response);
        }

        keys
    }

    /// Resolve a node's parameters for loading `property`'s options.
    ///
    /// Parameters `property` depends on must resolve; failures on the
    /// others are reported as skipped.
    pub fn resolve_required_parameters(
        &self,
        property: &NodeProperty,
        parameters: &NodeParameters,
        options: &ResolveOptions,
    ) -> Result<BTreeMap<String, ParameterResolution>, ResolveError> {
        let depends_on = property.load_options_depends_on();
        let mut resolved = BTreeMap::new();

        for (name, value) in parameters {
            let resolution = match self.resolve_parameter(value, options) {
                Ok(value) => ParameterResolution::Resolved(value),
                Err(err) if depends_on.contains(name) => return Err(err),
                Err(err) => {
                    debug!(parameter = %name, error = %err, "skipping optional parameter");
                    ParameterResolution::Skipped {
                        reason: err.to_string(),
                    }
                }
            };
            resolved.insert(name.clone(), resolution);
        }

        Ok(resolved)
    }

    /// Resolve a single expression as if it were one of `siblings`.
    ///
    /// Object and array results are rendered as `[Object: {...}]` and
    /// `[Array: [...]]`.
    pub fn resolve_expression(
        &self,
        expression: &str,
        siblings: &NodeParameters,
        options: &ResolveOptions,
    ) -> Result<Option<Value>, ResolveError> {
        let mut parameters = siblings.clone();
        parameters.insert(EXPRESSION_KEY.to_string(), Value::String(expression.to_string()));

        let Some(resolved) = self.resolve_with(&Value::Object(parameters), options, Some(siblings))? else {
            return Ok(None);
        };

        let value = resolved.get(EXPRESSION_KEY).cloned().unwrap_or(Value::Null);
        Ok(Some(match value {
            Value::Object(_) => Value::String(format!("[Object: {}]", compact_json(&value))),
            Value::Array(_) => Value::String(format!("[Array: {}]", compact_json(&value))),
            other => other,
        }))
    }
}

fn compact_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

//! # Pipeline Compilation
//!
//! Compiles chains of Operation nodes into an ordered pipeline of
//! `{id, functionId, arguments}` steps, injecting the implicit
//! serializer/deserializer steps around schema-bound transforms.

use crate::graph::{FunctionData, GraphSnapshot, Handle, Node, NodeData, OperationData, SchemaData};
use crate::policy::{
    PipelineStep, FUNCTION_ID_PREFIX, LATEST_VERSION, SERDES_DESERIALIZE, SERDES_SERIALIZE,
    TRANSFORM_FUNCTION,
};
use crate::report::{messages, NodeRef, PolicyCheckError, ValidationResult};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Compile the operation chain hanging off `anchor`'s `handle` port.
///
/// Walks the chain in edge order and delegates each Operation node to
/// [`process_operation`]. An empty result is not an error: a transition with
/// no operations is a valid, empty pipeline.
pub fn check_pipeline(
    anchor: &Node,
    handle: Handle,
    snapshot: &GraphSnapshot,
) -> Vec<ValidationResult<PipelineStep>> {
    let mut results = Vec::new();
    for node in snapshot.outgoing_chain(&anchor.id, handle) {
        match &node.data {
            NodeData::Operation(data) => process_operation(&mut results, node, data, snapshot),
            _ => tracing::debug!("[PGC] Ignoring non-operation node in chain: {}", node.id),
        }
    }
    results
}

/// Compile a single Operation node onto the accumulator.
fn process_operation(
    acc: &mut Vec<ValidationResult<PipelineStep>>,
    node: &Node,
    data: &OperationData,
    snapshot: &GraphSnapshot,
) {
    let Some(function_id) = data.function_id.as_deref() else {
        acc.push(ValidationResult::failure(
            node,
            PolicyCheckError::not_configured(node, &["functionId"]),
        ));
        return;
    };

    // A step id must be unique across the whole pipeline tree. Surfaced on
    // the id field, not thrown.
    let step_id = data.id.clone().unwrap_or_else(|| node.id.clone());
    if used_operation_ids(snapshot, node).contains(&step_id) {
        acc.push(ValidationResult::failure(
            node,
            PolicyCheckError::misconfigured(node, messages::duplicate_operation_id(&step_id)),
        ));
        return;
    }

    if function_id == TRANSFORM_FUNCTION {
        // The one operation that expands to multiple backend steps.
        acc.extend(check_transform(node, data, snapshot));
    } else {
        acc.push(ValidationResult::ok(
            node,
            PipelineStep {
                id: step_id,
                function_id: function_id.to_string(),
                arguments: data.form_data.clone(),
            },
        ));
    }
}

/// Step ids already claimed by ancestor operations of `node`.
fn used_operation_ids(snapshot: &GraphSnapshot, node: &Node) -> HashSet<String> {
    snapshot
        .ancestors(&node.id)
        .into_iter()
        .filter_map(|n| match &n.data {
            NodeData::Operation(d) => Some(d.id.clone().unwrap_or_else(|| n.id.clone())),
            _ => None,
        })
        .collect()
}

/// Compile a `DataHub.transform` operation.
///
/// Requires a Function node on the `function` handle and Schema nodes on the
/// `serialiser` and `deserialiser` handles. Expands to exactly three steps,
/// deserialize then function then serialize; the backend assumes that order.
/// Only the serialize step reports the consumed function/schema nodes as
/// resources.
fn check_transform(
    node: &Node,
    data: &OperationData,
    snapshot: &GraphSnapshot,
) -> Vec<ValidationResult<PipelineStep>> {
    let function = find_incomer(snapshot, node, Handle::Function, |n| {
        matches!(n.data, NodeData::Function(_))
    });
    let serialiser = find_incomer(snapshot, node, Handle::Serialiser, |n| {
        matches!(n.data, NodeData::Schema(_))
    });
    let deserialiser = find_incomer(snapshot, node, Handle::Deserialiser, |n| {
        matches!(n.data, NodeData::Schema(_))
    });

    let mut errors = Vec::new();
    if function.is_none() {
        errors.push(ValidationResult::failure(
            node,
            PolicyCheckError::not_connected(node, messages::NO_FUNCTION),
        ));
    }
    if serialiser.is_none() {
        errors.push(ValidationResult::failure(
            node,
            PolicyCheckError::not_connected(node, messages::no_schema("serialiser")),
        ));
    }
    if deserialiser.is_none() {
        errors.push(ValidationResult::failure(
            node,
            PolicyCheckError::not_connected(node, messages::no_schema("deserialiser")),
        ));
    }
    if !errors.is_empty() {
        return errors;
    }

    // Connections verified above; re-borrow the typed payloads.
    let (Some(function_node), Some(serialiser_node), Some(deserialiser_node)) =
        (function, serialiser, deserialiser)
    else {
        return errors;
    };
    let (NodeData::Function(function_data), NodeData::Schema(ser), NodeData::Schema(deser)) = (
        &function_node.data,
        &serialiser_node.data,
        &deserialiser_node.data,
    ) else {
        return errors;
    };

    let base_id = data.id.clone().unwrap_or_else(|| node.id.clone());
    vec![
        ValidationResult::ok(
            node,
            PipelineStep {
                id: format!("{base_id}-deserializer"),
                function_id: SERDES_DESERIALIZE.to_string(),
                arguments: schema_arguments(deser),
            },
        ),
        ValidationResult::ok(
            node,
            PipelineStep {
                id: function_data.name.clone(),
                function_id: function_id_of(function_data),
                arguments: Map::new(),
            },
        ),
        ValidationResult::ok_with_resources(
            node,
            PipelineStep {
                id: format!("{base_id}-serializer"),
                function_id: SERDES_SERIALIZE.to_string(),
                arguments: schema_arguments(ser),
            },
            vec![NodeRef::from(function_node), NodeRef::from(serialiser_node)],
        ),
    ]
}

fn find_incomer<'a>(
    snapshot: &'a GraphSnapshot,
    node: &Node,
    handle: Handle,
    accept: impl Fn(&Node) -> bool,
) -> Option<&'a Node> {
    snapshot
        .incomers(&node.id, handle)
        .into_iter()
        .find(|n| accept(n))
}

/// `fn:<name>:<version-or-latest>` identity of a script function.
pub fn function_id_of(function: &FunctionData) -> String {
    let version = function
        .version
        .map(|v| v.to_string())
        .unwrap_or_else(|| LATEST_VERSION.to_string());
    format!("{FUNCTION_ID_PREFIX}{}:{}", function.name, version)
}

/// `{schemaId, schemaVersion}` arguments of a serdes step.
pub fn schema_arguments(schema: &SchemaData) -> Map<String, Value> {
    let mut arguments = Map::new();
    arguments.insert("schemaId".to_string(), Value::String(schema.name.clone()));
    arguments.insert(
        "schemaVersion".to_string(),
        Value::String(
            schema
                .version
                .clone()
                .unwrap_or_else(|| LATEST_VERSION.to_string()),
        ),
    );
    arguments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, TransitionData};
    use crate::report::PolicyCheckError;

    fn transition(id: &str) -> Node {
        Node::new(id, NodeData::Transition(TransitionData::default()))
    }

    fn operation(id: &str, step_id: Option<&str>, function_id: Option<&str>) -> Node {
        Node::new(
            id,
            NodeData::Operation(OperationData {
                id: step_id.map(str::to_string),
                function_id: function_id.map(str::to_string),
                form_data: Map::new(),
            }),
        )
    }

    fn schema(id: &str, name: &str) -> Node {
        Node::new(
            id,
            NodeData::Schema(SchemaData {
                name: name.to_string(),
                version: None,
                title: None,
            }),
        )
    }

    fn function(id: &str, name: &str, version: Option<u64>) -> Node {
        Node::new(
            id,
            NodeData::Function(FunctionData {
                name: name.to_string(),
                version,
                title: None,
            }),
        )
    }

    fn transform_snapshot(with_function: bool, with_serialiser: bool) -> GraphSnapshot {
        let mut nodes = vec![
            transition("t"),
            operation("op", Some("transform-1"), Some(TRANSFORM_FUNCTION)),
            schema("deser", "sensor-raw"),
        ];
        let mut edges = vec![
            Edge::new("e1", "t", Handle::Source, "op", Handle::Input),
            Edge::new("e2", "deser", Handle::Source, "op", Handle::Deserialiser),
        ];
        if with_function {
            nodes.push(function("fn", "normalize", Some(3)));
            edges.push(Edge::new("e3", "fn", Handle::Source, "op", Handle::Function));
        }
        if with_serialiser {
            nodes.push(schema("ser", "sensor-clean"));
            edges.push(Edge::new("e4", "ser", Handle::Source, "op", Handle::Serialiser));
        }
        GraphSnapshot::new(nodes, edges)
    }

    #[test]
    fn empty_chain_is_a_valid_empty_pipeline() {
        let snapshot = GraphSnapshot::new(vec![transition("t")], vec![]);
        let anchor = snapshot.node("t").unwrap();
        assert!(check_pipeline(anchor, Handle::Source, &snapshot).is_empty());
    }

    #[test]
    fn plain_operation_compiles_directly() {
        let mut form_data = Map::new();
        form_data.insert("level".to_string(), Value::String("WARN".to_string()));
        let snapshot = GraphSnapshot::new(
            vec![
                transition("t"),
                Node::new(
                    "op",
                    NodeData::Operation(OperationData {
                        id: Some("log-1".into()),
                        function_id: Some("System.log".into()),
                        form_data: form_data.clone(),
                    }),
                ),
            ],
            vec![Edge::new("e1", "t", Handle::Source, "op", Handle::Input)],
        );
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 1);
        let step = results[0].data.as_ref().unwrap();
        assert_eq!(step.id, "log-1");
        assert_eq!(step.function_id, "System.log");
        assert_eq!(step.arguments, form_data);
        assert!(results[0].resources.is_empty());
    }

    #[test]
    fn missing_function_id_is_not_configured() {
        let snapshot = GraphSnapshot::new(
            vec![transition("t"), operation("op", None, None)],
            vec![Edge::new("e1", "t", Handle::Source, "op", Handle::Input)],
        );
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 1);
        let error = results[0].error.as_ref().unwrap();
        assert!(error.detail().ends_with("missing: functionId"));
        assert_eq!(error.status(), Some(404));
    }

    #[test]
    fn transform_expands_to_three_steps_in_fixed_order() {
        let snapshot = transform_snapshot(true, true);
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(ValidationResult::is_ok));

        let steps: Vec<&PipelineStep> = results.iter().map(|r| r.data.as_ref().unwrap()).collect();
        assert_eq!(steps[0].id, "transform-1-deserializer");
        assert_eq!(steps[0].function_id, SERDES_DESERIALIZE);
        assert_eq!(steps[0].arguments["schemaId"], "sensor-raw");
        assert_eq!(steps[0].arguments["schemaVersion"], "latest");

        assert_eq!(steps[1].id, "normalize");
        assert_eq!(steps[1].function_id, "fn:normalize:3");
        assert!(steps[1].arguments.is_empty());

        assert_eq!(steps[2].id, "transform-1-serializer");
        assert_eq!(steps[2].function_id, SERDES_SERIALIZE);
        assert_eq!(steps[2].arguments["schemaId"], "sensor-clean");

        // only the serialize step carries the consumed nodes
        assert!(results[0].resources.is_empty());
        assert!(results[1].resources.is_empty());
        assert_eq!(results[2].resources.len(), 2);
        assert_eq!(results[2].resources[0].id, "fn");
        assert_eq!(results[2].resources[1].id, "ser");
    }

    #[test]
    fn transform_without_function_is_not_connected() {
        let snapshot = transform_snapshot(false, true);
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 1);
        let error = results[0].error.as_ref().unwrap();
        assert_eq!(error.detail(), messages::NO_FUNCTION);
        assert!(matches!(error, PolicyCheckError::NotConnected { .. }));
    }

    #[test]
    fn transform_without_serialiser_names_the_handle() {
        let snapshot = transform_snapshot(true, false);
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].error.as_ref().unwrap().detail(),
            "No Schema connected to the \"serialiser\" handle of Operation"
        );
    }

    #[test]
    fn duplicate_step_id_is_rejected_on_the_id_field() {
        let snapshot = GraphSnapshot::new(
            vec![
                transition("t"),
                operation("op-a", Some("dup"), Some("System.log")),
                operation("op-b", Some("dup"), Some("Mqtt.drop")),
            ],
            vec![
                Edge::new("e1", "t", Handle::Source, "op-a", Handle::Input),
                Edge::new("e2", "op-a", Handle::Source, "op-b", Handle::Input),
            ],
        );
        let anchor = snapshot.node("t").unwrap();
        let results = check_pipeline(anchor, Handle::Source, &snapshot);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        let error = results[1].error.as_ref().unwrap();
        assert_eq!(error.detail(), messages::duplicate_operation_id("dup"));
        assert_eq!(results[1].node.id, "op-b");
    }
}

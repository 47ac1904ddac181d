//! # Policy Hydration
//!
//! The inverse transform: regenerates Transition, Operation, Function, and
//! Schema nodes (plus connecting edges and non-overlapping layout positions)
//! from a stored policy document.
//!
//! The output is a batch of [`GraphChange`]s for the rendering collaborator;
//! nothing here touches an existing snapshot. Node ids come from the
//! injected [`IdGenerator`], the only non-deterministic input.

use crate::fsm::FsmRegistry;
use crate::graph::{
    Connection, FunctionData, GraphChange, Handle, IdGenerator, Node, NodeData, OperationData,
    Position, SchemaData, TransitionData,
};
use crate::policy::{
    get_active_transition, BehaviorPolicy, PipelineStep, FUNCTION_ID_PREFIX, LATEST_VERSION,
    SERDES_DESERIALIZE, SERDES_SERIALIZE, TRANSFORM_FUNCTION,
};
use crate::report::PolicyGraphError;
use serde_json::{Map, Value};

/// Horizontal gap between the policy node and its transitions.
const TRANSITION_X_OFFSET: f64 = 350.0;
/// Vertical gap between sibling transitions, monotonic by entry index so
/// synthesized transitions never overlap.
const TRANSITION_Y_SPACING: f64 = 200.0;
/// Horizontal gap between chained operations.
const OPERATION_X_SPACING: f64 = 250.0;
/// Vertical gap between an operation and its function/schema resources.
const RESOURCE_Y_OFFSET: f64 = 110.0;

/// A known schema or script, used to resolve display titles on the
/// synthesized resource nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub title: Option<String>,
}

/// Rebuild the graph around `anchor` from a stored behavior policy.
///
/// Synthesizes one Transition node per `onTransitions` entry, connected via
/// `behaviorPolicy --transitions--> transition:target`, then hydrates each
/// entry's pipeline behind it. A `Serdes.deserialize / fn / Serdes.serialize`
/// triple folds back into the single `DataHub.transform` operation it was
/// compiled from, with its Function and Schema nodes reattached.
///
/// # Errors
///
/// [`PolicyGraphError::UnknownBehaviorModel`] if `behavior_model_id` is not
/// registered. This is a data contract violation, not a per-node validation
/// condition: without a model there is no state/event vocabulary to
/// interpret the rest of the document.
pub fn load_transitions(
    policy: &BehaviorPolicy,
    schemas: &[CatalogEntry],
    scripts: &[CatalogEntry],
    anchor: &Node,
    registry: &FsmRegistry,
    ids: &mut dyn IdGenerator,
) -> Result<Vec<GraphChange>, PolicyGraphError> {
    if registry.definition_for(&policy.behavior_model_id).is_none() {
        return Err(PolicyGraphError::UnknownBehaviorModel(
            policy.behavior_model_id.clone(),
        ));
    }

    tracing::debug!(
        "[PGC] Hydrating {} transition(s) of policy {}",
        policy.on_transitions.len(),
        policy.id
    );

    let mut changes = Vec::new();
    for (index, entry) in policy.on_transitions.iter().enumerate() {
        let event = get_active_transition(entry);
        let node = Node::new(
            ids.next_id(),
            NodeData::Transition(TransitionData {
                model: Some(policy.behavior_model_id.clone()),
                event,
                from: Some(entry.from_state.clone()),
                to: Some(entry.to_state.clone()),
            }),
        )
        .at(
            anchor.position.x + TRANSITION_X_OFFSET,
            anchor.position.y + index as f64 * TRANSITION_Y_SPACING,
        );

        changes.push(GraphChange::AddNode(node.clone()));
        changes.push(GraphChange::Connect(Connection {
            source: anchor.id.clone(),
            source_handle: Handle::Transitions,
            target: node.id.clone(),
            target_handle: Handle::Target,
        }));

        if let Some(pipeline) = event.and_then(|e| entry.events.get(e.as_key())) {
            load_pipeline(&pipeline.pipeline, &node, schemas, scripts, ids, &mut changes);
        }
    }
    Ok(changes)
}

/// Hydrate a stored pipeline into an operation chain behind `parent`.
fn load_pipeline(
    steps: &[PipelineStep],
    parent: &Node,
    schemas: &[CatalogEntry],
    scripts: &[CatalogEntry],
    ids: &mut dyn IdGenerator,
    changes: &mut Vec<GraphChange>,
) {
    let mut previous = parent.id.clone();
    let mut column = 0usize;
    let mut i = 0;

    while i < steps.len() {
        let position = Position {
            x: parent.position.x + (column as f64 + 1.0) * OPERATION_X_SPACING,
            y: parent.position.y,
        };

        let node = if is_transform_triple(&steps[i..]) {
            let node = load_transform(&steps[i..i + 3], position, schemas, scripts, ids, changes);
            i += 3;
            node
        } else {
            let step = &steps[i];
            i += 1;
            Node::new(
                ids.next_id(),
                NodeData::Operation(OperationData {
                    id: Some(step.id.clone()),
                    function_id: Some(step.function_id.clone()),
                    form_data: step.arguments.clone(),
                }),
            )
            .at(position.x, position.y)
        };

        changes.push(GraphChange::AddNode(node.clone()));
        changes.push(GraphChange::Connect(Connection {
            source: previous,
            source_handle: Handle::Source,
            target: node.id.clone(),
            target_handle: Handle::Input,
        }));
        previous = node.id;
        column += 1;
    }
}

/// Does the stored pipeline start with a compiled transform expansion?
fn is_transform_triple(steps: &[PipelineStep]) -> bool {
    steps.len() >= 3
        && steps[0].function_id == SERDES_DESERIALIZE
        && steps[1].function_id.starts_with(FUNCTION_ID_PREFIX)
        && steps[2].function_id == SERDES_SERIALIZE
}

/// Fold a deserialize/function/serialize triple back into one
/// `DataHub.transform` operation with its resource nodes and edges.
fn load_transform(
    steps: &[PipelineStep],
    position: Position,
    schemas: &[CatalogEntry],
    scripts: &[CatalogEntry],
    ids: &mut dyn IdGenerator,
    changes: &mut Vec<GraphChange>,
) -> Node {
    let base_id = steps[0]
        .id
        .strip_suffix("-deserializer")
        .unwrap_or(&steps[0].id)
        .to_string();

    let operation = Node::new(
        ids.next_id(),
        NodeData::Operation(OperationData {
            id: Some(base_id),
            function_id: Some(TRANSFORM_FUNCTION.to_string()),
            form_data: Map::new(),
        }),
    )
    .at(position.x, position.y);

    let (name, version) = parse_function_id(&steps[1].function_id);
    let function_node = Node::new(
        ids.next_id(),
        NodeData::Function(FunctionData {
            title: title_of(scripts, &name),
            name,
            version,
        }),
    )
    .at(position.x, position.y - RESOURCE_Y_OFFSET);
    attach_resource(&function_node, &operation, Handle::Function, changes);

    let deserialiser = schema_node(&steps[0].arguments, schemas, ids).at(
        position.x - OPERATION_X_SPACING / 2.0,
        position.y + RESOURCE_Y_OFFSET,
    );
    attach_resource(&deserialiser, &operation, Handle::Deserialiser, changes);

    let serialiser = schema_node(&steps[2].arguments, schemas, ids).at(
        position.x + OPERATION_X_SPACING / 2.0,
        position.y + RESOURCE_Y_OFFSET,
    );
    attach_resource(&serialiser, &operation, Handle::Serialiser, changes);

    operation
}

fn attach_resource(resource: &Node, operation: &Node, handle: Handle, changes: &mut Vec<GraphChange>) {
    changes.push(GraphChange::AddNode(resource.clone()));
    changes.push(GraphChange::Connect(Connection {
        source: resource.id.clone(),
        source_handle: Handle::Source,
        target: operation.id.clone(),
        target_handle: handle,
    }));
}

/// Split `fn:<name>:<version>` into its parts; `latest` maps to no pinned
/// version.
fn parse_function_id(function_id: &str) -> (String, Option<u64>) {
    let trimmed = function_id.strip_prefix(FUNCTION_ID_PREFIX).unwrap_or(function_id);
    match trimmed.rsplit_once(':') {
        Some((name, version)) if version != LATEST_VERSION => {
            (name.to_string(), version.parse().ok())
        }
        Some((name, _)) => (name.to_string(), None),
        None => (trimmed.to_string(), None),
    }
}

fn schema_node(
    arguments: &Map<String, Value>,
    schemas: &[CatalogEntry],
    ids: &mut dyn IdGenerator,
) -> Node {
    let name = arguments
        .get("schemaId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let version = arguments
        .get("schemaVersion")
        .and_then(Value::as_str)
        .filter(|v| *v != LATEST_VERSION)
        .map(str::to_string);
    Node::new(
        ids.next_id(),
        NodeData::Schema(SchemaData {
            title: title_of(schemas, &name),
            name,
            version,
        }),
    )
}

fn title_of(catalog: &[CatalogEntry], id: &str) -> Option<String> {
    catalog.iter().find(|e| e.id == id).and_then(|e| e.title.clone())
}

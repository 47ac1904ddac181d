//! # Policy Graph Model
//!
//! The immutable graph snapshot the compiler reads, plus the typed node,
//! edge, and handle vocabulary shared by every compilation pass.
//!
//! A snapshot is a value captured from the workspace store at compile time.
//! The compiler never mutates it; hydration returns a batch of
//! [`GraphChange`]s for the rendering collaborator to apply instead.

use crate::policy::TransitionEvent;
use crate::report::PolicyGraphError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Canvas coordinates of a node. Owned by the rendering layer; the compiler
/// only writes positions when synthesizing nodes during hydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// The closed set of node kinds a policy graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    BehaviorPolicy,
    DataPolicy,
    Transition,
    Operation,
    Function,
    Schema,
    TopicFilter,
    Validator,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::BehaviorPolicy => "Behavior Policy",
            NodeKind::DataPolicy => "Data Policy",
            NodeKind::Transition => "Transition",
            NodeKind::Operation => "Operation",
            NodeKind::Function => "Function",
            NodeKind::Schema => "Schema",
            NodeKind::TopicFilter => "Topic Filter",
            NodeKind::Validator => "Validator",
        };
        f.write_str(name)
    }
}

/// A named connection port on a node.
///
/// Handles are a closed vocabulary; unknown handle strings are rejected when
/// the edge is parsed rather than silently ignored during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handle {
    Source,
    Input,
    Function,
    Serialiser,
    Deserialiser,
    Transitions,
    Target,
    TopicFilter,
    Validation,
    Schema,
    OnSuccess,
    OnError,
}

impl Handle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handle::Source => "source",
            Handle::Input => "input",
            Handle::Function => "function",
            Handle::Serialiser => "serialiser",
            Handle::Deserialiser => "deserialiser",
            Handle::Transitions => "transitions",
            Handle::Target => "target",
            Handle::TopicFilter => "topicFilter",
            Handle::Validation => "validation",
            Handle::Schema => "schema",
            Handle::OnSuccess => "onSuccess",
            Handle::OnError => "onError",
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Handle {
    type Err = PolicyGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Handle::Source),
            "input" => Ok(Handle::Input),
            "function" => Ok(Handle::Function),
            "serialiser" => Ok(Handle::Serialiser),
            "deserialiser" => Ok(Handle::Deserialiser),
            "transitions" => Ok(Handle::Transitions),
            "target" => Ok(Handle::Target),
            "topicFilter" => Ok(Handle::TopicFilter),
            "validation" => Ok(Handle::Validation),
            "schema" => Ok(Handle::Schema),
            "onSuccess" => Ok(Handle::OnSuccess),
            "onError" => Ok(Handle::OnError),
            other => Err(PolicyGraphError::UnknownHandle(other.to_string())),
        }
    }
}

/// Form data of a Behavior Policy node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPolicyData {
    #[serde(default)]
    pub id: Option<String>,
    /// Registered FSM model identifier, e.g. `Publish.quota`.
    #[serde(default)]
    pub model: Option<String>,
    /// Model arguments; required for models whose FSM declares them.
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
    /// Client id regex the policy matches on.
    #[serde(default)]
    pub matching: Option<String>,
}

/// Form data of a Data Policy node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPolicyData {
    #[serde(default)]
    pub id: Option<String>,
}

/// Form data of a Transition node. All fields start unset and are filled by
/// the inspector form; compilation flags the missing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionData {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub event: Option<TransitionEvent>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

/// Form data of an Operation node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationData {
    /// Author-chosen pipeline step id; falls back to the node id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function_id: Option<String>,
    #[serde(default)]
    pub form_data: Map<String, Value>,
}

/// Form data of a JS Function node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionData {
    pub name: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Form data of a Schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaData {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Form data of a Topic Filter node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicFilterData {
    #[serde(default)]
    pub filters: Vec<String>,
}

/// Form data of a Validator node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorData {
    /// Combination strategy over the attached schemas, e.g. `ALL_OF`.
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Kind-tagged node payload. The variant is the node kind; there is no
/// separate `kind` field to drift out of sync with the data shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum NodeData {
    BehaviorPolicy(BehaviorPolicyData),
    DataPolicy(DataPolicyData),
    Transition(TransitionData),
    Operation(OperationData),
    Function(FunctionData),
    Schema(SchemaData),
    TopicFilter(TopicFilterData),
    Validator(ValidatorData),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::BehaviorPolicy(_) => NodeKind::BehaviorPolicy,
            NodeData::DataPolicy(_) => NodeKind::DataPolicy,
            NodeData::Transition(_) => NodeKind::Transition,
            NodeData::Operation(_) => NodeKind::Operation,
            NodeData::Function(_) => NodeKind::Function,
            NodeData::Schema(_) => NodeKind::Schema,
            NodeData::TopicFilter(_) => NodeKind::TopicFilter,
            NodeData::Validator(_) => NodeKind::Validator,
        }
    }
}

/// A node in the policy graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub data: NodeData,
}

impl Node {
    pub fn new(id: impl Into<String>, data: NodeData) -> Self {
        Self {
            id: id.into(),
            position: Position::default(),
            data,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// A directed edge between two node handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_handle: Handle,
    pub target: String,
    pub target_handle: Handle,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        source_handle: Handle,
        target: impl Into<String>,
        target_handle: Handle,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            source_handle,
            target: target.into(),
            target_handle,
        }
    }
}

/// An edge-to-be produced by hydration. The rendering collaborator (or
/// [`GraphSnapshot::apply_changes`]) assigns the edge id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub source_handle: Handle,
    pub target: String,
    pub target_handle: Handle,
}

/// One element of the mutation batch hydration hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    AddNode(Node),
    Connect(Connection),
}

/// Source of fresh node/edge identifiers.
///
/// Hydration is pure apart from id generation, so the generator is injected:
/// production wires [`UuidIdGenerator`], tests wire [`SequentialIdGenerator`]
/// for reproducible output.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Production id source backed by random v4 UUIDs.
#[derive(Debug, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic id source for tests: `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: u64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{}-{}", self.prefix, self.next)
    }
}

/// Immutable view over `{nodes, edges}` captured from the workspace store.
///
/// Every compiler entry point takes a snapshot by reference and never holds
/// onto it past the call. Node and edge order is the caller's insertion
/// order, which makes traversal (and therefore output) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Look up a node by id. Missing nodes (e.g. a dangling edge endpoint)
    /// resolve to `None`, never a panic.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Materialize a new snapshot with a mutation batch applied. Edge ids
    /// for connections come from the supplied generator.
    pub fn apply_changes(&self, changes: &[GraphChange], ids: &mut dyn IdGenerator) -> Self {
        let mut next = self.clone();
        for change in changes {
            match change {
                GraphChange::AddNode(node) => next.nodes.push(node.clone()),
                GraphChange::Connect(conn) => next.edges.push(Edge::new(
                    ids.next_id(),
                    conn.source.clone(),
                    conn.source_handle,
                    conn.target.clone(),
                    conn.target_handle,
                )),
            }
        }
        next
    }
}

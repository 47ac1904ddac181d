//! # Validation Reporting
//!
//! The uniform per-node result shape shared by the transition and pipeline
//! compilers, and the error taxonomy.
//!
//! Recoverable validation outcomes are values carried inside
//! [`ValidationResult`], never `Err`: one malformed sub-graph must not abort
//! compilation of its siblings. The only fatal conditions are caller
//! contract violations, modeled by [`PolicyGraphError`].

use crate::graph::{Node, NodeKind};
use serde::Serialize;
use thiserror::Error;

/// Fatal compiler errors. These indicate a broken caller contract (or broken
/// stored data), not a fixable spot on the canvas.
#[derive(Debug, Error)]
pub enum PolicyGraphError {
    #[error("Node not found in snapshot: {0}")]
    NodeNotFound(String),

    #[error("Expected a {expected} node, found {actual}: {id}")]
    UnexpectedNodeKind {
        id: String,
        expected: NodeKind,
        actual: NodeKind,
    },

    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// Raised during hydration: without a registered FSM model there is no
    /// state/event vocabulary to interpret the stored document with.
    #[error("Unknown behavior model: {0}")]
    UnknownBehaviorModel(String),
}

/// Recoverable, per-node validation errors. Exactly two kinds.
///
/// The rendered `detail` is produced by the constructor catalog below; the
/// variant itself is locale-free so a UI layer can re-render it from the
/// kind and parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum PolicyCheckError {
    /// A required edge is absent.
    NotConnected {
        title: NodeKind,
        id: String,
        detail: String,
    },
    /// The node is connected but required fields are unset; `detail` names
    /// the missing fields.
    NotConfigured {
        title: NodeKind,
        id: String,
        detail: String,
        status: u16,
    },
}

impl PolicyCheckError {
    pub fn not_connected(node: &Node, detail: impl Into<String>) -> Self {
        PolicyCheckError::NotConnected {
            title: node.kind(),
            id: node.id.clone(),
            detail: detail.into(),
        }
    }

    /// Missing required properties, reported in the caller's field order.
    pub fn not_configured(node: &Node, missing: &[&str]) -> Self {
        PolicyCheckError::NotConfigured {
            title: node.kind(),
            id: node.id.clone(),
            detail: format!(
                "The {} is not completely defined. The following properties are missing: {}",
                node.kind(),
                missing.join(", ")
            ),
            status: 404,
        }
    }

    /// A misconfigured field with a bespoke message, e.g. a duplicate id.
    pub fn misconfigured(node: &Node, detail: impl Into<String>) -> Self {
        PolicyCheckError::NotConfigured {
            title: node.kind(),
            id: node.id.clone(),
            detail: detail.into(),
            status: 404,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            PolicyCheckError::NotConnected { detail, .. } => detail,
            PolicyCheckError::NotConfigured { detail, .. } => detail,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            PolicyCheckError::NotConnected { .. } => None,
            PolicyCheckError::NotConfigured { status, .. } => Some(*status),
        }
    }
}

// Message catalog. Detail strings live here, apart from the error kinds, so
// the compiler core never formats locale-dependent text inline.
pub(crate) mod messages {
    pub const NO_TRANSITION: &str = "No Transition connected to Behavior Policy";
    pub const NO_FUNCTION: &str = "No JS Function connected to Operation";
    pub const NO_TOPIC_FILTER: &str = "No Topic Filter connected to Data Policy";
    pub const NO_VALIDATOR_SCHEMA: &str = "No Schema connected to Validator";

    pub fn no_schema(handle: &str) -> String {
        format!("No Schema connected to the \"{handle}\" handle of Operation")
    }

    pub fn duplicate_operation_id(id: &str) -> String {
        format!("The operation id \"{id}\" is already used in this pipeline")
    }
}

/// Reference to a graph node inside a validation result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRef {
    pub id: String,
    pub kind: NodeKind,
}

impl From<&Node> for NodeRef {
    fn from(node: &Node) -> Self {
        NodeRef {
            id: node.id.clone(),
            kind: node.kind(),
        }
    }
}

/// Uniform per-node compilation outcome: either `data` or `error` is set.
///
/// `resources` lists additional nodes consumed to produce `data`, for UI
/// highlighting (e.g. the function and schema nodes folded into a serialize
/// step).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult<T> {
    pub node: NodeRef,
    pub data: Option<T>,
    pub error: Option<PolicyCheckError>,
    pub resources: Vec<NodeRef>,
}

impl<T> ValidationResult<T> {
    pub fn ok(node: &Node, data: T) -> Self {
        Self {
            node: node.into(),
            data: Some(data),
            error: None,
            resources: Vec::new(),
        }
    }

    pub fn ok_with_resources(node: &Node, data: T, resources: Vec<NodeRef>) -> Self {
        Self {
            node: node.into(),
            data: Some(data),
            error: None,
            resources,
        }
    }

    pub fn failure(node: &Node, error: PolicyCheckError) -> Self {
        Self {
            node: node.into(),
            data: None,
            error: Some(error),
            resources: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Re-shape an error-carrying result for a different data type. The
    /// payload (if any) is dropped; node, error, and resources survive.
    pub fn into_error_of<U>(self) -> ValidationResult<U> {
        ValidationResult {
            node: self.node,
            data: None,
            error: self.error,
            resources: self.resources,
        }
    }
}

//! # Policy Compiler
//!
//! Main entry points for compiling a policy graph into the backend's
//! declarative policy documents.

use crate::check::{check_data_policy, check_transitions};
use crate::fsm::FsmRegistry;
use crate::graph::{GraphSnapshot, NodeData, NodeKind};
use crate::policy::{
    BehaviorPolicy, DataPolicy, Matching, OnTransitionEntry, PipelineStep, PolicyOperations,
    PolicyValidation,
};
use crate::report::{PolicyCheckError, PolicyGraphError, ValidationResult};

/// Outcome of [`compile_behavior_policy`].
///
/// `policy` is the assembled document when every validation result is clean,
/// `None` otherwise; the per-node results are always returned so callers can
/// render errors next to the offending nodes.
#[derive(Debug, Clone)]
pub struct PolicyCompilation {
    pub policy: Option<BehaviorPolicy>,
    pub transitions: Vec<ValidationResult<OnTransitionEntry>>,
    pub pipelines: Option<Vec<Vec<PipelineStep>>>,
}

/// Compile the Behavior Policy node `node_id` and everything attached to it.
///
/// This is the main entry point of the compiler. It validates the policy
/// node's own configuration, compiles every connected Transition with its
/// operation pipeline, and assembles the persisted document when the graph
/// is clean.
///
/// # Errors
///
/// Only caller contract violations are fatal: the node id is missing from
/// the snapshot, or names a node of a different kind. Everything else is
/// reported per node inside the returned [`PolicyCompilation`].
pub fn compile_behavior_policy(
    node_id: &str,
    snapshot: &GraphSnapshot,
    registry: &FsmRegistry,
) -> Result<PolicyCompilation, PolicyGraphError> {
    let node = snapshot
        .node(node_id)
        .ok_or_else(|| PolicyGraphError::NodeNotFound(node_id.to_string()))?;
    let NodeData::BehaviorPolicy(data) = &node.data else {
        return Err(PolicyGraphError::UnexpectedNodeKind {
            id: node.id.clone(),
            expected: NodeKind::BehaviorPolicy,
            actual: node.kind(),
        });
    };

    tracing::info!("[PGC] Starting behavior policy compilation");
    tracing::info!(
        "[PGC] Graph: {} nodes, {} edges",
        snapshot.nodes.len(),
        snapshot.edges.len()
    );

    // Phase 1: validate the policy node's own configuration
    tracing::info!("[PGC] Phase 1: Validating policy node...");
    let mut results: Vec<ValidationResult<OnTransitionEntry>> = Vec::new();
    let mut missing = Vec::new();
    if data.model.is_none() {
        missing.push("model");
    }
    if data.matching.is_none() {
        missing.push("matching");
    }
    if !missing.is_empty() {
        results.push(ValidationResult::failure(
            node,
            PolicyCheckError::not_configured(node, &missing),
        ));
    }
    if let Some(model) = data.model.as_deref() {
        match registry.metadata_for(model) {
            None => results.push(ValidationResult::failure(
                node,
                PolicyCheckError::misconfigured(node, format!("Unknown behavior model: {model}")),
            )),
            Some(meta)
                if meta.requires_arguments
                    && data.arguments.as_ref().map_or(true, |a| a.is_empty()) =>
            {
                results.push(ValidationResult::failure(
                    node,
                    PolicyCheckError::not_configured(node, &["arguments"]),
                ));
            }
            Some(_) => {}
        }
    }

    // Phase 2: compile the connected transitions
    tracing::info!("[PGC] Phase 2: Compiling transitions...");
    let validation = check_transitions(node, snapshot);
    tracing::info!(
        "[PGC]   - {} transition result(s), {} pipeline(s)",
        validation.transitions.len(),
        validation.pipelines.as_ref().map_or(0, Vec::len)
    );

    // Phase 3: assemble the document when everything is clean
    let clean =
        results.is_empty() && validation.transitions.iter().all(ValidationResult::is_ok);
    let policy = if clean {
        match (&data.model, &data.matching) {
            (Some(model), Some(matching)) => {
                tracing::info!("[PGC] Phase 3: Assembling policy document...");
                Some(BehaviorPolicy {
                    id: data.id.clone().unwrap_or_else(|| node.id.clone()),
                    behavior_model_id: model.clone(),
                    matching: Matching {
                        client_id_regex: matching.clone(),
                    },
                    arguments: data.arguments.clone(),
                    on_transitions: validation
                        .transitions
                        .iter()
                        .filter_map(|r| r.data.clone())
                        .collect(),
                })
            }
            _ => None,
        }
    } else {
        tracing::info!("[PGC] Compilation finished with validation errors");
        None
    };

    results.extend(validation.transitions);
    Ok(PolicyCompilation {
        policy,
        transitions: results,
        pipelines: validation.pipelines,
    })
}

/// Outcome of [`compile_data_policy`].
#[derive(Debug, Clone)]
pub struct DataPolicyCompilation {
    pub policy: Option<DataPolicy>,
    pub validation: crate::check::DataPolicyValidation,
}

/// Compile the Data Policy node `node_id`: topic matching, validators, and
/// the success/failure pipelines.
///
/// # Errors
///
/// Same fatal conditions as [`compile_behavior_policy`].
pub fn compile_data_policy(
    node_id: &str,
    snapshot: &GraphSnapshot,
) -> Result<DataPolicyCompilation, PolicyGraphError> {
    let node = snapshot
        .node(node_id)
        .ok_or_else(|| PolicyGraphError::NodeNotFound(node_id.to_string()))?;
    let NodeData::DataPolicy(data) = &node.data else {
        return Err(PolicyGraphError::UnexpectedNodeKind {
            id: node.id.clone(),
            expected: NodeKind::DataPolicy,
            actual: node.kind(),
        });
    };

    tracing::info!("[PGC] Starting data policy compilation");
    let validation = check_data_policy(node, snapshot);

    let policy = if validation.is_ok() {
        let validators: Vec<_> = validation
            .validators
            .iter()
            .filter_map(|r| r.data.clone())
            .collect();
        let on_success: Vec<PipelineStep> = validation
            .on_success
            .iter()
            .filter_map(|r| r.data.clone())
            .collect();
        let on_failure: Vec<PipelineStep> = validation
            .on_failure
            .iter()
            .filter_map(|r| r.data.clone())
            .collect();
        Some(DataPolicy {
            id: data.id.clone().unwrap_or_else(|| node.id.clone()),
            matching: validation.matching.data.clone().unwrap_or_default(),
            validation: (!validators.is_empty()).then_some(PolicyValidation { validators }),
            on_success: (!on_success.is_empty())
                .then_some(PolicyOperations { pipeline: on_success }),
            on_failure: (!on_failure.is_empty())
                .then_some(PolicyOperations { pipeline: on_failure }),
        })
    } else {
        tracing::info!("[PGC] Data policy compilation finished with validation errors");
        None
    };

    Ok(DataPolicyCompilation { policy, validation })
}

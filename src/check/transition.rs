//! # Transition Compilation
//!
//! Compiles the Transition nodes attached to a Behavior Policy node into
//! `onTransitions` entries, one operation pipeline per transition.

use crate::check::check_pipeline;
use crate::graph::{GraphSnapshot, Handle, Node, NodeData};
use crate::policy::{OnTransitionEntry, PipelineStep};
use crate::report::{messages, PolicyCheckError, ValidationResult};

/// Outcome of [`check_transitions`].
///
/// `pipelines` is deliberately three-state: `None` when no Transition is
/// connected at all (nothing was attempted), `Some` but empty when
/// transitions exist yet none compiled, populated otherwise. Downstream UI
/// branches on the distinction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionValidation {
    pub transitions: Vec<ValidationResult<OnTransitionEntry>>,
    pub pipelines: Option<Vec<Vec<PipelineStep>>>,
}

/// Validate and compile every Transition node attached to `policy_node`.
///
/// Transitions are resolved by following all outgoing edges of the policy
/// node, in edge order. A misconfigured transition (or a broken operation in
/// its pipeline) yields error results for the offending nodes; sibling
/// transitions still compile.
pub fn check_transitions(policy_node: &Node, snapshot: &GraphSnapshot) -> TransitionValidation {
    let transitions: Vec<&Node> = snapshot
        .outgoers_any(&policy_node.id)
        .into_iter()
        .filter(|n| matches!(n.data, NodeData::Transition(_)))
        .collect();

    if transitions.is_empty() {
        return TransitionValidation {
            transitions: vec![ValidationResult::failure(
                policy_node,
                PolicyCheckError::not_connected(policy_node, messages::NO_TRANSITION),
            )],
            pipelines: None,
        };
    }

    let mut results = Vec::new();
    let mut pipelines = Vec::new();

    for node in transitions {
        let NodeData::Transition(data) = &node.data else {
            continue;
        };

        // Missing fields are reported in fixed order: event, from, to.
        let mut missing = Vec::new();
        if data.event.is_none() {
            missing.push("event");
        }
        if data.from.is_none() {
            missing.push("from");
        }
        if data.to.is_none() {
            missing.push("to");
        }
        let (Some(event), Some(from), Some(to)) =
            (data.event, data.from.clone(), data.to.clone())
        else {
            results.push(ValidationResult::failure(
                node,
                PolicyCheckError::not_configured(node, &missing),
            ));
            continue;
        };

        let step_results = check_pipeline(node, Handle::Source, snapshot);
        if step_results.iter().any(|r| !r.is_ok()) {
            results.extend(
                step_results
                    .into_iter()
                    .filter(|r| !r.is_ok())
                    .map(ValidationResult::into_error_of),
            );
            continue;
        }

        let steps: Vec<PipelineStep> = step_results.into_iter().filter_map(|r| r.data).collect();
        tracing::debug!(
            "[PGC] Transition {} ({} -> {}) compiled {} pipeline step(s)",
            node.id,
            from,
            to,
            steps.len()
        );
        results.push(ValidationResult::ok(
            node,
            OnTransitionEntry::new(from, to, event, steps.clone()),
        ));
        pipelines.push(steps);
    }

    TransitionValidation {
        transitions: results,
        pipelines: Some(pipelines),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        BehaviorPolicyData, Edge, NodeKind, OperationData, TransitionData,
    };
    use crate::policy::{get_active_transition, TransitionEvent};
    use crate::report::PolicyCheckError;
    use serde_json::Map;

    fn policy_node() -> Node {
        Node::new(
            "bp",
            NodeData::BehaviorPolicy(BehaviorPolicyData {
                id: Some("policy-1".into()),
                model: Some("Mqtt.events".into()),
                arguments: None,
                matching: Some("client-.*".into()),
            }),
        )
    }

    fn configured_transition(id: &str) -> Node {
        Node::new(
            id,
            NodeData::Transition(TransitionData {
                model: Some("Mqtt.events".into()),
                event: Some(TransitionEvent::OnInboundConnect),
                from: Some("Initial".into()),
                to: Some("Connected".into()),
            }),
        )
    }

    fn log_operation(id: &str) -> Node {
        let mut form_data = Map::new();
        form_data.insert("message".to_string(), "client connected".into());
        Node::new(
            id,
            NodeData::Operation(OperationData {
                id: Some(format!("{id}-step")),
                function_id: Some("System.log".into()),
                form_data,
            }),
        )
    }

    #[test]
    fn unconnected_policy_reports_not_connected_without_pipelines() {
        let snapshot = GraphSnapshot::new(vec![policy_node()], vec![]);
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);

        assert_eq!(result.transitions.len(), 1);
        let error = result.transitions[0].error.as_ref().unwrap();
        assert!(matches!(error, PolicyCheckError::NotConnected { .. }));
        assert_eq!(error.detail(), "No Transition connected to Behavior Policy");
        assert_eq!(result.transitions[0].node.kind, NodeKind::BehaviorPolicy);
        assert_eq!(result.pipelines, None);
    }

    #[test]
    fn unconfigured_transition_lists_missing_fields_with_empty_pipelines() {
        let snapshot = GraphSnapshot::new(
            vec![
                policy_node(),
                Node::new("t", NodeData::Transition(TransitionData::default())),
            ],
            vec![Edge::new("e1", "bp", Handle::Transitions, "t", Handle::Target)],
        );
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);

        assert_eq!(result.transitions.len(), 1);
        let error = result.transitions[0].error.as_ref().unwrap();
        assert!(error.detail().ends_with("missing: event, from, to"));
        assert_eq!(result.pipelines, Some(vec![]));
    }

    #[test]
    fn partially_configured_transition_lists_only_missing_fields() {
        let snapshot = GraphSnapshot::new(
            vec![
                policy_node(),
                Node::new(
                    "t",
                    NodeData::Transition(TransitionData {
                        model: Some("Mqtt.events".into()),
                        event: Some(TransitionEvent::OnInboundConnect),
                        from: None,
                        to: None,
                    }),
                ),
            ],
            vec![Edge::new("e1", "bp", Handle::Transitions, "t", Handle::Target)],
        );
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);
        let error = result.transitions[0].error.as_ref().unwrap();
        assert!(error.detail().ends_with("missing: from, to"));
    }

    #[test]
    fn configured_transition_with_log_operation_compiles() {
        let snapshot = GraphSnapshot::new(
            vec![policy_node(), configured_transition("t"), log_operation("op")],
            vec![
                Edge::new("e1", "bp", Handle::Transitions, "t", Handle::Target),
                Edge::new("e2", "t", Handle::Source, "op", Handle::Input),
            ],
        );
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);

        assert_eq!(result.transitions.len(), 1);
        assert!(result.transitions[0].is_ok());
        let entry = result.transitions[0].data.as_ref().unwrap();
        assert_eq!(entry.from_state, "Initial");
        assert_eq!(entry.to_state, "Connected");
        assert_eq!(
            get_active_transition(entry),
            Some(TransitionEvent::OnInboundConnect)
        );
        let pipeline = &entry.events["Mqtt.OnInboundConnect"].pipeline;
        assert_eq!(pipeline.len(), 1);
        assert_eq!(pipeline[0].id, "op-step");
        assert_eq!(pipeline[0].function_id, "System.log");
        assert_eq!(result.pipelines, Some(vec![pipeline.clone()]));
    }

    #[test]
    fn sibling_transitions_survive_a_misconfigured_one() {
        let snapshot = GraphSnapshot::new(
            vec![
                policy_node(),
                Node::new("bad", NodeData::Transition(TransitionData::default())),
                configured_transition("good"),
            ],
            vec![
                Edge::new("e1", "bp", Handle::Transitions, "bad", Handle::Target),
                Edge::new("e2", "bp", Handle::Transitions, "good", Handle::Target),
            ],
        );
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);

        assert_eq!(result.transitions.len(), 2);
        assert!(!result.transitions[0].is_ok());
        assert!(result.transitions[1].is_ok());
        // only the compiled transition contributes a pipeline
        assert_eq!(result.pipelines.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn broken_operation_surfaces_on_the_operation_node() {
        let snapshot = GraphSnapshot::new(
            vec![
                policy_node(),
                configured_transition("t"),
                Node::new("op", NodeData::Operation(OperationData::default())),
            ],
            vec![
                Edge::new("e1", "bp", Handle::Transitions, "t", Handle::Target),
                Edge::new("e2", "t", Handle::Source, "op", Handle::Input),
            ],
        );
        let result = check_transitions(snapshot.node("bp").unwrap(), &snapshot);

        assert_eq!(result.transitions.len(), 1);
        assert_eq!(result.transitions[0].node.id, "op");
        assert_eq!(result.transitions[0].node.kind, NodeKind::Operation);
        assert!(!result.transitions[0].is_ok());
        assert_eq!(result.pipelines, Some(vec![]));
    }
}

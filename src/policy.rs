//! # Policy Documents
//!
//! The declarative, backend-consumable policy document shapes the compiler
//! produces and hydration consumes, plus the transition event vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Function id of the schema-bound transform operation. The only operation
/// that expands to more than one pipeline step.
pub const TRANSFORM_FUNCTION: &str = "DataHub.transform";

/// Function id of the implicit deserialize step injected before a transform.
pub const SERDES_DESERIALIZE: &str = "Serdes.deserialize";

/// Function id of the implicit serialize step injected after a transform.
pub const SERDES_SERIALIZE: &str = "Serdes.serialize";

/// Prefix of a script function id, `fn:<name>:<version>`.
pub const FUNCTION_ID_PREFIX: &str = "fn:";

/// Version label used when a schema or script pins no explicit version.
pub const LATEST_VERSION: &str = "latest";

/// FSM transition events a behavior policy can react to.
///
/// Declaration order is the resolution priority for
/// [`get_active_transition`]: when a stored entry carries several event keys,
/// the first one in this order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionEvent {
    #[serde(rename = "Event.OnAny")]
    OnAny,
    #[serde(rename = "Connection.OnDisconnect")]
    OnDisconnect,
    #[serde(rename = "Mqtt.OnInboundConnect")]
    OnInboundConnect,
    #[serde(rename = "Mqtt.OnInboundDisconnect")]
    OnInboundDisconnect,
    #[serde(rename = "Mqtt.OnInboundPublish")]
    OnInboundPublish,
    #[serde(rename = "Mqtt.OnInboundSubscribe")]
    OnInboundSubscribe,
}

impl TransitionEvent {
    /// All events, highest resolution priority first.
    pub const PRIORITY: [TransitionEvent; 6] = [
        TransitionEvent::OnAny,
        TransitionEvent::OnDisconnect,
        TransitionEvent::OnInboundConnect,
        TransitionEvent::OnInboundDisconnect,
        TransitionEvent::OnInboundPublish,
        TransitionEvent::OnInboundSubscribe,
    ];

    /// The canonical event key used in the policy document.
    pub fn as_key(&self) -> &'static str {
        match self {
            TransitionEvent::OnAny => "Event.OnAny",
            TransitionEvent::OnDisconnect => "Connection.OnDisconnect",
            TransitionEvent::OnInboundConnect => "Mqtt.OnInboundConnect",
            TransitionEvent::OnInboundDisconnect => "Mqtt.OnInboundDisconnect",
            TransitionEvent::OnInboundPublish => "Mqtt.OnInboundPublish",
            TransitionEvent::OnInboundSubscribe => "Mqtt.OnInboundSubscribe",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::PRIORITY.iter().copied().find(|e| e.as_key() == key)
    }
}

/// One executable step of a compiled pipeline. Order within the pipeline is
/// graph traversal order and is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub id: String,
    pub function_id: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Pipeline attached to one event key of a transition entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPipeline {
    pub pipeline: Vec<PipelineStep>,
}

/// One element of `BehaviorPolicy.onTransitions`.
///
/// The event keys live in a flattened map because the persisted document
/// keys each pipeline by its event string; `BTreeMap` keeps serialization
/// deterministic. [`get_active_transition`] picks the entry's effective
/// event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnTransitionEntry {
    pub from_state: String,
    pub to_state: String,
    #[serde(flatten)]
    pub events: BTreeMap<String, EventPipeline>,
}

impl OnTransitionEntry {
    pub fn new(
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        event: TransitionEvent,
        pipeline: Vec<PipelineStep>,
    ) -> Self {
        let mut events = BTreeMap::new();
        events.insert(event.as_key().to_string(), EventPipeline { pipeline });
        Self {
            from_state: from_state.into(),
            to_state: to_state.into(),
            events,
        }
    }
}

/// Resolve the active transition event of a stored entry.
///
/// A well-formed entry carries exactly one event key, but the document shape
/// admits several; resolution walks [`TransitionEvent::PRIORITY`] and the
/// first key present wins. `None` when no known key is present.
pub fn get_active_transition(entry: &OnTransitionEntry) -> Option<TransitionEvent> {
    TransitionEvent::PRIORITY
        .iter()
        .copied()
        .find(|event| entry.events.contains_key(event.as_key()))
}

/// Client matching clause of a behavior policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matching {
    pub client_id_regex: String,
}

/// Compiled behavior policy document, as persisted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorPolicy {
    pub id: String,
    pub behavior_model_id: String,
    pub matching: Matching,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
    #[serde(default)]
    pub on_transitions: Vec<OnTransitionEntry>,
}

/// Topic matching clause of a data policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMatching {
    pub topic_filter: String,
}

/// One schema validator of a data policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyValidator {
    #[serde(rename = "type")]
    pub validator_type: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// Validation clause of a data policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyValidation {
    pub validators: Vec<PolicyValidator>,
}

/// Success/failure action clause of a data policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyOperations {
    pub pipeline: Vec<PipelineStep>,
}

/// Compiled data policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPolicy {
    pub id: String,
    pub matching: TopicMatching,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PolicyValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<PolicyOperations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<PolicyOperations>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with(keys: &[TransitionEvent]) -> OnTransitionEntry {
        let mut entry = OnTransitionEntry {
            from_state: "Initial".into(),
            to_state: "Connected".into(),
            events: BTreeMap::new(),
        };
        for key in keys {
            entry
                .events
                .insert(key.as_key().to_string(), EventPipeline::default());
        }
        entry
    }

    #[test]
    fn active_transition_of_empty_entry_is_none() {
        assert_eq!(get_active_transition(&entry_with(&[])), None);
    }

    #[test]
    fn active_transition_honors_priority_for_adjacent_pairs() {
        let order = TransitionEvent::PRIORITY;
        for pair in order.windows(2) {
            let entry = entry_with(&[pair[1], pair[0]]);
            assert_eq!(get_active_transition(&entry), Some(pair[0]));
        }
    }

    #[test]
    fn on_any_beats_on_disconnect() {
        let entry = entry_with(&[TransitionEvent::OnDisconnect, TransitionEvent::OnAny]);
        assert_eq!(get_active_transition(&entry), Some(TransitionEvent::OnAny));
    }

    #[test]
    fn single_key_resolves_to_itself() {
        let entry = entry_with(&[TransitionEvent::OnInboundSubscribe]);
        assert_eq!(
            get_active_transition(&entry),
            Some(TransitionEvent::OnInboundSubscribe)
        );
    }

    #[test]
    fn entry_serializes_event_key_at_top_level() {
        let entry = OnTransitionEntry::new(
            "Initial",
            "Connected",
            TransitionEvent::OnInboundConnect,
            vec![],
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["fromState"], "Initial");
        assert!(value["Mqtt.OnInboundConnect"]["pipeline"].is_array());
    }

    #[test]
    fn event_round_trips_through_key() {
        for event in TransitionEvent::PRIORITY {
            assert_eq!(TransitionEvent::from_key(event.as_key()), Some(event));
        }
        assert_eq!(TransitionEvent::from_key("Mqtt.OnOutboundPublish"), None);
    }
}

//! # FSM Model Registry
//!
//! Per-behavior-model catalogs of states, transitions, and argument
//! requirements, with derived metadata queries. The registry is a static
//! lookup table; nothing here has side effects.
//!
//! Definitions are plain serde data so a registry can also be loaded from
//! the backend-shared JSON document instead of the built-in table.

use crate::policy::TransitionEvent;
use serde::{Deserialize, Serialize};

/// Classification of an FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FsmStateType {
    Initial,
    Success,
    Failed,
    Intermediate,
}

/// One state of a behavior model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmState {
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: FsmStateType,
}

/// One transition of a behavior model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsmTransition {
    pub from_state: String,
    pub to_state: String,
    pub event: TransitionEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guards: Option<String>,
}

/// Argument requirements of a behavior model, mirroring the backend's JSON
/// Schema fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentsSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Complete definition of one behavior model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsmDefinition {
    pub model_id: String,
    /// Never empty for a registered model.
    pub states: Vec<FsmState>,
    pub transitions: Vec<FsmTransition>,
    #[serde(default)]
    pub arguments: ArgumentsSpec,
}

/// Derived, display-ready metadata of one behavior model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub requires_arguments: bool,
    pub state_count: usize,
    pub transition_count: usize,
    pub has_success_state: bool,
    pub has_failed_state: bool,
}

impl ModelMetadata {
    fn derive(def: &FsmDefinition) -> Self {
        ModelMetadata {
            id: def.model_id.clone(),
            title: def
                .arguments
                .title
                .clone()
                .unwrap_or_else(|| def.model_id.clone()),
            description: def.arguments.description.clone().unwrap_or_default(),
            requires_arguments: !def.arguments.required.is_empty(),
            state_count: def.states.len(),
            transition_count: def.transitions.len(),
            has_success_state: def
                .states
                .iter()
                .any(|s| s.state_type == FsmStateType::Success),
            has_failed_state: def
                .states
                .iter()
                .any(|s| s.state_type == FsmStateType::Failed),
        }
    }
}

/// Registry of behavior models, keyed by model id.
#[derive(Debug, Clone)]
pub struct FsmRegistry {
    models: Vec<FsmDefinition>,
}

impl FsmRegistry {
    /// The built-in model catalog: `Mqtt.events`, `Publish.duplicate`, and
    /// `Publish.quota`.
    pub fn builtin() -> Self {
        Self {
            models: vec![mqtt_events(), publish_duplicate(), publish_quota()],
        }
    }

    /// Build a registry from externally loaded definitions.
    pub fn from_definitions(models: Vec<FsmDefinition>) -> Self {
        Self { models }
    }

    pub fn definition_for(&self, model_id: &str) -> Option<&FsmDefinition> {
        self.models.iter().find(|m| m.model_id == model_id)
    }

    pub fn metadata_for(&self, model_id: &str) -> Option<ModelMetadata> {
        self.definition_for(model_id).map(ModelMetadata::derive)
    }

    pub fn all_models(&self) -> Vec<ModelMetadata> {
        self.models.iter().map(ModelMetadata::derive).collect()
    }
}

impl Default for FsmRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn state(name: &str, state_type: FsmStateType) -> FsmState {
    FsmState {
        name: name.to_string(),
        state_type,
    }
}

fn transition(from: &str, to: &str, event: TransitionEvent) -> FsmTransition {
    FsmTransition {
        from_state: from.to_string(),
        to_state: to.to_string(),
        event,
        guards: None,
    }
}

fn mqtt_events() -> FsmDefinition {
    use TransitionEvent::*;
    FsmDefinition {
        model_id: "Mqtt.events".to_string(),
        states: vec![
            state("Initial", FsmStateType::Initial),
            state("Connected", FsmStateType::Intermediate),
            state("Disconnected", FsmStateType::Success),
        ],
        transitions: vec![
            transition("Initial", "Connected", OnInboundConnect),
            transition("Connected", "Connected", OnInboundPublish),
            transition("Connected", "Connected", OnInboundSubscribe),
            transition("Connected", "Disconnected", OnInboundDisconnect),
            transition("Connected", "Disconnected", OnDisconnect),
        ],
        arguments: ArgumentsSpec {
            title: Some("MQTT Events".to_string()),
            description: Some("Reacts to the lifecycle events of an MQTT client.".to_string()),
            required: vec![],
        },
    }
}

fn publish_duplicate() -> FsmDefinition {
    use TransitionEvent::*;
    FsmDefinition {
        model_id: "Publish.duplicate".to_string(),
        states: vec![
            state("Initial", FsmStateType::Initial),
            state("Connected", FsmStateType::Intermediate),
            state("NotDuplicated", FsmStateType::Intermediate),
            state("Duplicated", FsmStateType::Intermediate),
            state("Violated", FsmStateType::Failed),
            state("Disconnected", FsmStateType::Success),
        ],
        transitions: vec![
            transition("Initial", "Connected", OnInboundConnect),
            transition("Connected", "NotDuplicated", OnInboundPublish),
            transition("NotDuplicated", "NotDuplicated", OnInboundPublish),
            transition("NotDuplicated", "Duplicated", OnInboundPublish),
            transition("Duplicated", "Duplicated", OnInboundPublish),
            transition("Duplicated", "Violated", OnInboundPublish),
            transition("Connected", "Disconnected", OnDisconnect),
            transition("NotDuplicated", "Disconnected", OnDisconnect),
            transition("Duplicated", "Disconnected", OnDisconnect),
            transition("Violated", "Disconnected", OnDisconnect),
        ],
        arguments: ArgumentsSpec {
            title: Some("Publish Duplicate".to_string()),
            description: Some(
                "Detects clients republishing the same payload consecutively.".to_string(),
            ),
            required: vec![],
        },
    }
}

fn publish_quota() -> FsmDefinition {
    use TransitionEvent::*;
    FsmDefinition {
        model_id: "Publish.quota".to_string(),
        states: vec![
            state("Initial", FsmStateType::Initial),
            state("Connected", FsmStateType::Intermediate),
            state("Publishing", FsmStateType::Intermediate),
            state("Violated", FsmStateType::Failed),
            state("Disconnected", FsmStateType::Success),
        ],
        transitions: vec![
            transition("Initial", "Connected", OnInboundConnect),
            transition("Connected", "Publishing", OnInboundPublish),
            transition("Publishing", "Publishing", OnInboundPublish),
            transition("Publishing", "Violated", OnInboundPublish),
            transition("Connected", "Disconnected", OnDisconnect),
            transition("Publishing", "Disconnected", OnDisconnect),
            transition("Violated", "Disconnected", OnDisconnect),
        ],
        arguments: ArgumentsSpec {
            title: Some("Publish Quota".to_string()),
            description: Some(
                "Enforces a minimum and maximum number of publishes per client session."
                    .to_string(),
            ),
            required: vec!["minPublishes".to_string(), "maxPublishes".to_string()],
        },
    }
}

//! # Data Policy Compilation
//!
//! Compiles a Data Policy node: topic matching from the attached Topic
//! Filter, schema validators, and the success/failure operation pipelines.

use crate::check::check_pipeline;
use crate::graph::{GraphSnapshot, Handle, Node, NodeData};
use crate::policy::{PipelineStep, PolicyValidator, TopicMatching, LATEST_VERSION};
use crate::report::{messages, NodeRef, PolicyCheckError, ValidationResult};
use serde_json::{Map, Value};

/// Outcome of [`check_data_policy`], one result group per policy clause.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPolicyValidation {
    pub matching: ValidationResult<TopicMatching>,
    pub validators: Vec<ValidationResult<PolicyValidator>>,
    pub on_success: Vec<ValidationResult<PipelineStep>>,
    pub on_failure: Vec<ValidationResult<PipelineStep>>,
}

impl DataPolicyValidation {
    pub fn is_ok(&self) -> bool {
        self.matching.is_ok()
            && self.validators.iter().all(ValidationResult::is_ok)
            && self.on_success.iter().all(ValidationResult::is_ok)
            && self.on_failure.iter().all(ValidationResult::is_ok)
    }
}

/// Validate and compile the clauses of `policy_node`.
pub fn check_data_policy(policy_node: &Node, snapshot: &GraphSnapshot) -> DataPolicyValidation {
    DataPolicyValidation {
        matching: check_matching(policy_node, snapshot),
        validators: check_validators(policy_node, snapshot),
        on_success: check_pipeline(policy_node, Handle::OnSuccess, snapshot),
        on_failure: check_pipeline(policy_node, Handle::OnError, snapshot),
    }
}

fn check_matching(policy_node: &Node, snapshot: &GraphSnapshot) -> ValidationResult<TopicMatching> {
    let topic_filter = snapshot
        .incomers(&policy_node.id, Handle::TopicFilter)
        .into_iter()
        .find(|n| matches!(n.data, NodeData::TopicFilter(_)));

    let Some(node) = topic_filter else {
        return ValidationResult::failure(
            policy_node,
            PolicyCheckError::not_connected(policy_node, messages::NO_TOPIC_FILTER),
        );
    };
    let NodeData::TopicFilter(data) = &node.data else {
        return ValidationResult::failure(
            policy_node,
            PolicyCheckError::not_connected(policy_node, messages::NO_TOPIC_FILTER),
        );
    };

    match data.filters.first() {
        Some(filter) => ValidationResult::ok(
            node,
            TopicMatching {
                topic_filter: filter.clone(),
            },
        ),
        None => ValidationResult::failure(node, PolicyCheckError::not_configured(node, &["filters"])),
    }
}

fn check_validators(
    policy_node: &Node,
    snapshot: &GraphSnapshot,
) -> Vec<ValidationResult<PolicyValidator>> {
    let mut results = Vec::new();

    for validator in snapshot
        .incomers(&policy_node.id, Handle::Validation)
        .into_iter()
        .filter(|n| matches!(n.data, NodeData::Validator(_)))
    {
        let NodeData::Validator(data) = &validator.data else {
            continue;
        };

        let schemas: Vec<&Node> = snapshot
            .incomers(&validator.id, Handle::Schema)
            .into_iter()
            .filter(|n| matches!(n.data, NodeData::Schema(_)))
            .collect();

        if schemas.is_empty() {
            results.push(ValidationResult::failure(
                validator,
                PolicyCheckError::not_connected(validator, messages::NO_VALIDATOR_SCHEMA),
            ));
            continue;
        }

        let schema_refs: Vec<Value> = schemas
            .iter()
            .filter_map(|n| match &n.data {
                NodeData::Schema(s) => {
                    let mut entry = Map::new();
                    entry.insert("schemaId".to_string(), Value::String(s.name.clone()));
                    entry.insert(
                        "version".to_string(),
                        Value::String(
                            s.version.clone().unwrap_or_else(|| LATEST_VERSION.to_string()),
                        ),
                    );
                    Some(Value::Object(entry))
                }
                _ => None,
            })
            .collect();

        let mut arguments = Map::new();
        arguments.insert("schemas".to_string(), Value::Array(schema_refs));
        arguments.insert(
            "strategy".to_string(),
            Value::String(data.strategy.clone().unwrap_or_else(|| "ALL_OF".to_string())),
        );

        results.push(ValidationResult::ok_with_resources(
            validator,
            PolicyValidator {
                validator_type: "schema".to_string(),
                arguments,
            },
            schemas.iter().map(|n| NodeRef::from(*n)).collect(),
        ));
    }

    results
}

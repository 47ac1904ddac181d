//! # Policy Graph Compiler (PGC)
//!
//! Compiler for translating visual, node-and-edge MQTT policy graphs into
//! the declarative, backend-consumable policy documents, and back again.
//!
//! The compiler reads an immutable [`GraphSnapshot`] captured from the
//! workspace store, validates the graph against a registered
//! finite-state-machine definition per behavior model, and either assembles a
//! [`BehaviorPolicy`]/[`DataPolicy`] document or returns per-node validation
//! results. A malformed sub-graph never aborts compilation of the rest of
//! the policy. Hydration reverses the flow: a stored document becomes a
//! batch of graph mutations with non-overlapping layout positions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pgc::{compile_behavior_policy, FsmRegistry, GraphSnapshot};
//!
//! let registry = FsmRegistry::builtin();
//! let snapshot = GraphSnapshot::default();
//! // ... capture nodes and edges from the workspace store
//!
//! match compile_behavior_policy("policy-node-id", &snapshot, &registry) {
//!     Ok(compilation) => {
//!         if let Some(policy) = compilation.policy {
//!             println!("{}", serde_json::to_string_pretty(&policy)?);
//!         }
//!     }
//!     Err(e) => eprintln!("Compilation failed: {}", e),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Compilation is a pure, synchronous fold over the snapshot:
//!
//! 1. **Policy Validation** - Check the policy node's own configuration
//!    against the FSM registry
//! 2. **Transition Resolution** - Resolve the Transition nodes attached to
//!    the policy
//! 3. **Pipeline Compilation** - Compile each transition's operation chain,
//!    expanding schema-bound transforms into deserialize/function/serialize
//!    steps
//! 4. **Document Assembly** - Fold clean results into the persisted document
//!
//! Hydration inverts steps 2-4, synthesizing nodes, edges, and positions
//! from a stored document.

pub mod check;
pub mod compiler;
pub mod fsm;
pub mod graph;
pub mod hydrate;
pub mod policy;
pub mod report;

mod resolver;

// Re-export the main compilation API
pub use compiler::{
    compile_behavior_policy, compile_data_policy, DataPolicyCompilation, PolicyCompilation,
};

pub use check::{
    check_data_policy, check_pipeline, check_transitions, DataPolicyValidation,
    TransitionValidation,
};

// Re-export the graph and document vocabulary for convenience
pub use graph::{
    BehaviorPolicyData, Connection, DataPolicyData, Edge, FunctionData, GraphChange,
    GraphSnapshot, Handle, IdGenerator, Node, NodeData, NodeKind, OperationData, Position,
    SchemaData, SequentialIdGenerator, TopicFilterData, TransitionData, UuidIdGenerator,
    ValidatorData,
};
pub use policy::{
    get_active_transition, BehaviorPolicy, DataPolicy, EventPipeline, Matching, OnTransitionEntry,
    PipelineStep, TransitionEvent,
};

pub use fsm::{FsmDefinition, FsmRegistry, FsmState, FsmStateType, FsmTransition, ModelMetadata};
pub use hydrate::{load_transitions, CatalogEntry};
pub use report::{NodeRef, PolicyCheckError, PolicyGraphError, ValidationResult};

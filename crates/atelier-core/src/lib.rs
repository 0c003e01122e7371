//! `atelier-core`: the decision-and-pipeline core for specialized
//! software-generation agents.
//!
//! An agent declares what it can do ([`capability::CapabilityDescriptor`]),
//! scores competing strategies against a request's requirements
//! ([`select`]), runs an ordered sequence of generation stages that each
//! consume the prior stages' output ([`pipeline`]), and can re-enter on an
//! existing artifact to detect issues and propose traceable fixes
//! ([`optimize`]). [`dispatch`] maps inbound task types onto the agent's
//! handlers, and [`registry`] keys composed agents by specialization for an
//! orchestrator to route to.
//!
//! Content generation itself is external: the core only asks for it through
//! `gen_client::Generate` and treats every call as slow and fallible.

pub mod agent;
pub mod agents;
pub mod capability;
pub mod dispatch;
pub mod error;
pub mod optimize;
pub mod pipeline;
pub mod registry;
pub mod select;
pub mod task;

pub use agent::Agent;
pub use capability::CapabilityDescriptor;
pub use error::{AtelierError, Result};
pub use registry::AgentRegistry;
pub use task::{Task, TaskContext, TaskResult};

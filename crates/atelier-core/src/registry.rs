use std::collections::BTreeMap;

use crate::agent::Agent;
use crate::task::{Task, TaskContext, TaskResult};

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

/// Agents keyed by specialization: the orchestrator's calling contract.
///
/// The registry holds no shared mutable state: descriptors are read-only
/// after load and every Task/Context/Result is per-call, so routing to
/// different agents concurrently needs no coordination as long as the shared
/// context stays read-only.
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under its declared specialization. A later
    /// registration for the same specialization replaces the earlier one.
    pub fn register(&mut self, agent: Agent) {
        self.agents
            .insert(agent.specialization().to_string(), agent);
    }

    pub fn get(&self, specialization: &str) -> Option<&Agent> {
        self.agents.get(specialization)
    }

    pub fn specializations(&self) -> Vec<&str> {
        self.agents.keys().map(|k| k.as_str()).collect()
    }

    /// Route a task to the agent owning `specialization`. An unknown
    /// specialization is a routine negative response, not a crash.
    pub async fn route(
        &self,
        specialization: &str,
        task: &Task,
        context: &TaskContext,
    ) -> TaskResult {
        match self.agents.get(specialization) {
            Some(agent) => agent.execute(task, context).await,
            None => TaskResult::error(format!("no agent for specialization: {specialization}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use serde_json::{json, Value};

use crate::capability::CapabilityDescriptor;
use crate::dispatch::TaskDispatcher;
use crate::error::Result;
use crate::pipeline::PipelineResult;
use crate::task::{JsonMap, Task, TaskContext, TaskResult};

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// One specialization: a capability descriptor composed with the task
/// handlers, stage functions, and detectors the concrete agent supplied at
/// construction.
///
/// The descriptor is read-only after load; Task, Context, and Result values
/// are per-call, so independent agents can run concurrently against a shared
/// read-only context with no coordination.
pub struct Agent {
    descriptor: CapabilityDescriptor,
    dispatcher: TaskDispatcher,
}

impl Agent {
    pub fn new(descriptor: CapabilityDescriptor, dispatcher: TaskDispatcher) -> Self {
        Self {
            descriptor,
            dispatcher,
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn specialization(&self) -> &str {
        &self.descriptor.specialization
    }

    pub fn task_types(&self) -> Vec<&str> {
        self.dispatcher.task_types()
    }

    /// Validate the composed agent and log its identity. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        if self.dispatcher.is_empty() {
            return Err(crate::error::AtelierError::MalformedConfig(format!(
                "agent '{}' declares no task handlers",
                self.descriptor.agent_id
            )));
        }
        tracing::info!(
            agent_id = %self.descriptor.agent_id,
            specialization = %self.descriptor.specialization,
            model = %self.descriptor.model,
            task_types = ?self.dispatcher.task_types(),
            "agent initialized"
        );
        Ok(())
    }

    /// Execute one task. Every routine condition comes back inside the
    /// `TaskResult`; the only abnormal exits left in the system happen
    /// before an agent exists (`MalformedConfig`) or inside selection
    /// (`NoCandidatesAvailable`), and the latter is recovered by the
    /// dispatcher before it reaches here.
    pub async fn execute(&self, task: &Task, context: &TaskContext) -> TaskResult {
        let invocation = uuid::Uuid::new_v4();
        tracing::debug!(
            %invocation,
            agent_id = %self.descriptor.agent_id,
            task_type = %task.task_type,
            "executing task"
        );

        match self.dispatcher.dispatch(task, context).await {
            TaskResult::Ok { data, .. } => {
                // The required-output contract is judged at pipeline end;
                // non-pipeline tasks (reports, optimization passes) are not
                // expected to produce the generation artifacts.
                let incomplete_outputs = if data.contains_key("stages") {
                    self.missing_required_outputs(&data)
                } else {
                    Vec::new()
                };
                if !incomplete_outputs.is_empty() {
                    tracing::warn!(
                        %invocation,
                        missing = ?incomplete_outputs,
                        "run completed without all required outputs"
                    );
                }
                TaskResult::Ok {
                    data,
                    incomplete_outputs,
                }
            }
            err => err,
        }
    }

    /// Required output names absent from the result's `artifacts` mapping,
    /// in declaration order.
    fn missing_required_outputs(&self, data: &JsonMap) -> Vec<String> {
        let produced = data.get("artifacts").and_then(Value::as_object);
        self.descriptor
            .outputs
            .required
            .iter()
            .filter(|name| produced.map_or(true, |a| !a.contains_key(*name)))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Pipeline → result data convention
// ---------------------------------------------------------------------------

/// Fold a pipeline result into task-result data.
///
/// Stage outputs land under `stages` (ordered); any stage value carrying an
/// `artifacts` object has those entries merged into a top-level `artifacts`
/// mapping, which is what the required-output check reads. A stage failure
/// is recorded under `stage_failure`; the result stays a success so callers
/// can inspect what completed.
pub fn pipeline_to_data(result: &PipelineResult) -> JsonMap {
    let mut artifacts = JsonMap::new();
    for output in &result.outputs {
        if let Some(produced) = output.value.get("artifacts").and_then(Value::as_object) {
            for (name, content) in produced {
                artifacts.insert(name.clone(), content.clone());
            }
        }
    }

    let mut data = JsonMap::new();
    data.insert(
        "stages".to_string(),
        Value::Array(
            result
                .outputs
                .iter()
                .map(|o| json!({ "stage": o.stage, "value": o.value }))
                .collect(),
        ),
    );
    data.insert("artifacts".to_string(), Value::Object(artifacts));
    if let Some(failure) = &result.failure {
        data.insert(
            "stage_failure".to_string(),
            json!({ "stage": failure.stage, "cause": failure.cause }),
        );
    }
    if result.cancelled {
        data.insert("cancelled".to_string(), Value::Bool(true));
    }
    data
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque named-parameter mapping used for payloads, contexts, and result data.
pub type JsonMap = Map<String, Value>;

/// Ambient read-only data passed alongside a task (existing artifacts, prior
/// results). Agents never write back into it.
pub type TaskContext = JsonMap;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One unit of work for an agent. Created per invocation, consumed once,
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub payload: JsonMap,
}

impl Task {
    pub fn new(task_type: impl Into<String>, payload: JsonMap) -> Self {
        Self {
            task_type: task_type.into(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// The uniform return value of `execute`: owned solely by the caller.
///
/// Routine negative conditions (unsupported task type, a failed stage) are
/// `Error`/partial-`Ok` values, never raised failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskResult {
    Ok {
        data: JsonMap,
        /// Required output artifacts the run did not produce. Reportable but
        /// non-fatal: the result is still a success.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        incomplete_outputs: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl TaskResult {
    pub fn ok(data: JsonMap) -> Self {
        TaskResult::Ok {
            data,
            incomplete_outputs: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TaskResult::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TaskResult::Ok { .. })
    }

    pub fn data(&self) -> Option<&JsonMap> {
        match self {
            TaskResult::Ok { data, .. } => Some(data),
            TaskResult::Error { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::future::Future;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::task::{JsonMap, Task, TaskContext, TaskResult};

pub type Handler =
    Box<dyn Fn(JsonMap, TaskContext) -> BoxFuture<'static, Result<JsonMap>> + Send + Sync>;

// ---------------------------------------------------------------------------
// TaskDispatcher
// ---------------------------------------------------------------------------

/// Maps a task's declared type to a handler supplied by the concrete agent.
///
/// Unsupported types and handler failures are routine negative responses:
/// both come back as `TaskResult::Error` values, never as raised failures,
/// so a single bad task cannot terminate the dispatcher.
#[derive(Default)]
pub struct TaskDispatcher {
    handlers: BTreeMap<String, Handler>,
}

impl TaskDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(mut self, task_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(JsonMap, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonMap>> + Send + 'static,
    {
        self.handlers
            .insert(task_type.into(), Box::new(move |p, c| Box::pin(f(p, c))));
        self
    }

    pub fn supports(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    pub fn task_types(&self) -> Vec<&str> {
        self.handlers.keys().map(|k| k.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub async fn dispatch(&self, task: &Task, context: &TaskContext) -> TaskResult {
        let Some(handler) = self.handlers.get(&task.task_type) else {
            return TaskResult::error(format!("unsupported task type: {}", task.task_type));
        };

        match handler(task.payload.clone(), context.clone()).await {
            Ok(data) => TaskResult::ok(data),
            Err(e) => {
                let payload_keys: Vec<&str> = task.payload.keys().map(|k| k.as_str()).collect();
                tracing::warn!(
                    task_type = %task.task_type,
                    payload_keys = ?payload_keys,
                    error = %e,
                    "task handler failed"
                );
                TaskResult::error(e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::task::JsonMap;

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag for a pipeline run.
///
/// Checked before each undispatched stage; a stage that has already started
/// runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Stage / StageInput / StageOutput
// ---------------------------------------------------------------------------

pub type StageFn = Box<dyn Fn(StageInput) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// One step of a pipeline: a named async computation over the initial
/// context plus all prior stage outputs.
pub struct Stage {
    pub name: String,
    pub run: StageFn,
}

impl Stage {
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(StageInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Stage {
            name: name.into(),
            run: Box::new(move |input| Box::pin(f(input))),
        }
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

/// What stage *i* sees: the pipeline's initial context plus the outputs of
/// stages `0..i-1`, in order.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub initial: JsonMap,
    pub prior: Vec<StageOutput>,
}

impl StageInput {
    pub fn output(&self, stage: &str) -> Option<&Value> {
        self.prior.iter().find(|o| o.stage == stage).map(|o| &o.value)
    }

    pub fn initial_value(&self, key: &str) -> Option<&Value> {
        self.initial.get(key)
    }
}

/// Output of one completed stage. Once written it is never mutated by a
/// later stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: String,
    pub value: Value,
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailureRecord {
    pub stage: String,
    pub cause: String,
}

/// Result of a pipeline run. Partial results are always returned, never
/// discarded: `outputs` holds every completed stage even when a later stage
/// failed or the run was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub outputs: Vec<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailureRecord>,
    #[serde(default)]
    pub cancelled: bool,
}

impl PipelineResult {
    pub fn output(&self, stage: &str) -> Option<&Value> {
        self.outputs.iter().find(|o| o.stage == stage).map(|o| &o.value)
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && !self.cancelled
    }
}

// ---------------------------------------------------------------------------
// run_pipeline
// ---------------------------------------------------------------------------

/// Execute stages strictly in declaration order.
///
/// Stage *i* receives `initial` plus the outputs of stages `0..i-1`. On the
/// first stage error, execution stops and the failure is recorded alongside
/// all completed outputs. Cancellation stops before starting the next
/// undispatched stage. No retry happens at this level; a caller wanting one
/// wraps a single stage, never an already-failed downstream stage.
pub async fn run_pipeline(
    stages: &[Stage],
    initial: &JsonMap,
    cancel: &CancelToken,
) -> PipelineResult {
    let mut outputs: Vec<StageOutput> = Vec::with_capacity(stages.len());

    for stage in stages {
        if cancel.is_cancelled() {
            tracing::info!(stage = %stage.name, "pipeline cancelled before stage");
            return PipelineResult {
                outputs,
                failure: None,
                cancelled: true,
            };
        }

        let input = StageInput {
            initial: initial.clone(),
            prior: outputs.clone(),
        };

        let started = Instant::now();
        tracing::debug!(stage = %stage.name, "stage starting");
        match (stage.run)(input).await {
            Ok(value) => {
                tracing::debug!(
                    stage = %stage.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "stage complete"
                );
                outputs.push(StageOutput {
                    stage: stage.name.clone(),
                    value,
                });
            }
            Err(e) => {
                tracing::warn!(stage = %stage.name, error = %e, "stage failed");
                return PipelineResult {
                    outputs,
                    failure: Some(StageFailureRecord {
                        stage: stage.name.clone(),
                        cause: e.to_string(),
                    }),
                    cancelled: false,
                };
            }
        }
    }

    PipelineResult {
        outputs,
        failure: None,
        cancelled: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AtelierError;
    use serde_json::json;

    fn ok_stage(name: &str) -> Stage {
        let tag = name.to_string();
        Stage::new(name, move |_input| {
            let tag = tag.clone();
            async move { Ok(json!({ "ran": tag })) }
        })
    }

    fn failing_stage(name: &str) -> Stage {
        let tag = name.to_string();
        Stage::new(name, move |_input| {
            let tag = tag.clone();
            async move {
                Err(AtelierError::StageFailure {
                    stage: tag,
                    cause: "boom".to_string(),
                })
            }
        })
    }

    #[tokio::test]
    async fn stages_run_in_declaration_order() {
        let stages = vec![ok_stage("first"), ok_stage("second"), ok_stage("third")];
        let result = run_pipeline(&stages, &JsonMap::new(), &CancelToken::new()).await;
        assert!(result.is_complete());
        let names: Vec<&str> = result.outputs.iter().map(|o| o.stage.as_str()).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn stage_sees_prior_outputs_and_initial_context() {
        let mut initial = JsonMap::new();
        initial.insert("budget".to_string(), json!(500));

        let echo = Stage::new("echo", |input: StageInput| async move {
            let budget = input.initial_value("budget").cloned().unwrap_or(Value::Null);
            let prior = input.output("first").cloned().unwrap_or(Value::Null);
            Ok(json!({ "budget": budget, "saw_first": prior }))
        });

        let stages = vec![ok_stage("first"), echo];
        let result = run_pipeline(&stages, &initial, &CancelToken::new()).await;
        let echoed = result.output("echo").unwrap();
        assert_eq!(echoed["budget"], json!(500));
        assert_eq!(echoed["saw_first"]["ran"], "first");
    }

    #[tokio::test]
    async fn partial_result_on_mid_pipeline_failure() {
        // 5 stages, stage 3 fails: outputs for 1-2, failure names stage 3,
        // no outputs for 4-5.
        let stages = vec![
            ok_stage("s1"),
            ok_stage("s2"),
            failing_stage("s3"),
            ok_stage("s4"),
            ok_stage("s5"),
        ];
        let result = run_pipeline(&stages, &JsonMap::new(), &CancelToken::new()).await;
        assert_eq!(result.outputs.len(), 2);
        assert!(result.output("s1").is_some());
        assert!(result.output("s2").is_some());
        assert!(result.output("s4").is_none());
        assert!(result.output("s5").is_none());
        let failure = result.failure.unwrap();
        assert_eq!(failure.stage, "s3");
        assert!(failure.cause.contains("boom"));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_stage() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        let cancelling = Stage::new("cancelling", move |_input| {
            let trip = trip.clone();
            async move {
                trip.cancel();
                Ok(json!("done"))
            }
        });

        let stages = vec![ok_stage("s1"), cancelling, ok_stage("never")];
        let result = run_pipeline(&stages, &JsonMap::new(), &cancel).await;
        assert!(result.cancelled);
        assert!(result.failure.is_none());
        // the in-flight stage completed; the undispatched one did not start
        assert_eq!(result.outputs.len(), 2);
        assert!(result.output("never").is_none());
    }

    #[tokio::test]
    async fn already_cancelled_pipeline_runs_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let stages = vec![ok_stage("s1")];
        let result = run_pipeline(&stages, &JsonMap::new(), &cancel).await;
        assert!(result.cancelled);
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn pipeline_result_json_roundtrip() {
        let result = PipelineResult {
            outputs: vec![StageOutput {
                stage: "analyze".to_string(),
                value: json!({"ok": true}),
            }],
            failure: Some(StageFailureRecord {
                stage: "design".to_string(),
                cause: "generation unavailable".to_string(),
            }),
            cancelled: false,
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: PipelineResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}

//! Backend-coder agent: five-stage service generation pipeline and a code
//! optimization pass.
//!
//! Pipeline shape: select stack → generate code → generate tests → generate
//! docs → emit deployment config. Stack selection generalizes the usual
//! priority chain (high performance first, then rapid development, else the
//! default stack) into explicit score rules; with no flags set, the first
//! declared stack wins at score zero.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use gen_client::{generate_with_policy, GenPolicy, Generate};

use crate::agent::{pipeline_to_data, Agent};
use crate::capability::CapabilityDescriptor;
use crate::dispatch::TaskDispatcher;
use crate::error::{AtelierError, Result};
use crate::optimize::{optimize, Fix, FixPlan, Issue, IssueKind, Metrics, OptimizeDomain, Severity};
use crate::pipeline::{run_pipeline, CancelToken, Stage, StageInput};
use crate::select::{select, ScoreRule};
use crate::task::JsonMap;

pub const SPECIALIZATION: &str = "backend_coding";

// ---------------------------------------------------------------------------
// Stack catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TechStack {
    pub name: &'static str,
    pub language: &'static str,
    pub framework: &'static str,
    pub high_performance: bool,
    pub rapid_development: bool,
}

const CATALOG: &[TechStack] = &[
    TechStack {
        name: "node-express",
        language: "javascript",
        framework: "express",
        high_performance: false,
        rapid_development: true,
    },
    TechStack {
        name: "rust-actix",
        language: "rust",
        framework: "actix-web",
        high_performance: true,
        rapid_development: false,
    },
    TechStack {
        name: "python-fastapi",
        language: "python",
        framework: "fastapi",
        high_performance: false,
        rapid_development: true,
    },
    TechStack {
        name: "go-gin",
        language: "go",
        framework: "gin",
        high_performance: true,
        rapid_development: false,
    },
];

fn declared_stacks(descriptor: &CapabilityDescriptor) -> Vec<TechStack> {
    descriptor
        .options("stacks")
        .iter()
        .filter_map(|name| CATALOG.iter().find(|s| s.name == name.as_str()).cloned())
        .collect()
}

// ---------------------------------------------------------------------------
// Requirements and score rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceRequirements {
    pub service_name: String,
    pub high_performance: bool,
    pub needs_rapid_development: bool,
    pub endpoints: Vec<String>,
}

fn stack_rules() -> Vec<ScoreRule<ServiceRequirements, TechStack>> {
    vec![
        ScoreRule {
            id: "high_performance",
            when: |r| r.high_performance,
            applies_to: |s| s.high_performance,
            weight: 3,
        },
        ScoreRule {
            id: "needs_rapid_development",
            when: |r| r.needs_rapid_development,
            applies_to: |s| s.rapid_development,
            weight: 2,
        },
    ]
}

// ---------------------------------------------------------------------------
// Generation pipeline
// ---------------------------------------------------------------------------

fn service_stages(
    requirements: ServiceRequirements,
    stacks: Vec<TechStack>,
    generator: Arc<dyn Generate>,
    policy: GenPolicy,
) -> Vec<Stage> {
    let service_name = if requirements.service_name.is_empty() {
        "service".to_string()
    } else {
        requirements.service_name.clone()
    };

    let select_stack = {
        let requirements = requirements.clone();
        Stage::new("select_stack", move |_input: StageInput| {
            let requirements = requirements.clone();
            let stacks = stacks.clone();
            async move {
                let selection = select(&requirements, &stacks, &stack_rules())?;
                Ok(json!({
                    "stack": selection.candidate.name,
                    "language": selection.candidate.language,
                    "framework": selection.candidate.framework,
                    "score": selection.score,
                    "scores": selection.scores,
                }))
            }
        })
    };

    let generate_code = {
        let generator = generator.clone();
        let requirements = requirements.clone();
        let service_name = service_name.clone();
        Stage::new("generate_code", move |input: StageInput| {
            let generator = generator.clone();
            let endpoints = requirements.endpoints.clone();
            let service_name = service_name.clone();
            async move {
                let language = stack_field(&input, "language")?;
                let framework = stack_field(&input, "framework")?;
                let prompt = format!(
                    "Implement the '{service_name}' service in {language} with {framework}. \
                     Endpoints: {}.",
                    if endpoints.is_empty() {
                        "health check only".to_string()
                    } else {
                        endpoints.join(", ")
                    }
                );
                let ctx = json!({ "prior": input.prior });
                let code = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "artifacts": { "service-code": code } }))
            }
        })
    };

    let generate_tests = {
        let generator = generator.clone();
        let service_name = service_name.clone();
        Stage::new("generate_tests", move |input: StageInput| {
            let generator = generator.clone();
            let service_name = service_name.clone();
            async move {
                let framework = stack_field(&input, "framework")?;
                let prompt = format!(
                    "Write an integration test suite for the '{service_name}' {framework} service."
                );
                let ctx = json!({ "prior": input.prior });
                let tests = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "artifacts": { "tests": tests } }))
            }
        })
    };

    let generate_docs = {
        let generator = generator.clone();
        let service_name = service_name.clone();
        Stage::new("generate_docs", move |input: StageInput| {
            let generator = generator.clone();
            let service_name = service_name.clone();
            async move {
                let prompt = format!(
                    "Write a README for the '{service_name}' service: endpoints, setup, deployment."
                );
                let ctx = json!({ "prior": input.prior });
                let docs = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "artifacts": { "README.md": docs } }))
            }
        })
    };

    // Deployment config is deterministic boilerplate; no collaborator call.
    let emit_deployment = {
        Stage::new("emit_deployment", move |input: StageInput| {
            let service_name = service_name.clone();
            async move {
                let stack = stack_field(&input, "stack")?;
                let manifest = format!(
                    "service: {service_name}\nstack: {stack}\nreplicas: 2\nport: 8080\n"
                );
                Ok(json!({ "artifacts": { "deploy.yaml": manifest } }))
            }
        })
    };

    vec![
        select_stack,
        generate_code,
        generate_tests,
        generate_docs,
        emit_deployment,
    ]
}

fn stack_field(input: &StageInput, key: &str) -> Result<String> {
    input
        .output("select_stack")
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AtelierError::StageFailure {
            stage: "select_stack".to_string(),
            cause: format!("prior stage output missing '{key}'"),
        })
}

// ---------------------------------------------------------------------------
// Optimization domain
// ---------------------------------------------------------------------------

static UNBOUNDED_QUERY_RE: OnceLock<Regex> = OnceLock::new();

fn unbounded_query_re() -> &'static Regex {
    UNBOUNDED_QUERY_RE.get_or_init(|| Regex::new(r"(?i)select \* from").unwrap())
}

/// Zero-based line index from a `line N` issue reference.
fn line_number(reference: &str) -> Option<usize> {
    reference
        .strip_prefix("line ")?
        .parse::<usize>()
        .ok()?
        .checked_sub(1)
}

/// Detectors and fixes for generated service code.
///
/// Bottlenecks: unbounded `select *` queries, queries issued inside a loop,
/// and blocking sleeps. Smells: leftover debug prints and `unwrap()` on the
/// happy path.
pub struct CodeOptimizeDomain;

impl CodeOptimizeDomain {
    fn is_debug_print(line: &str) -> bool {
        line.contains("console.log") || line.contains("println!(") || line.contains("print(")
    }
}

impl OptimizeDomain for CodeOptimizeDomain {
    type Artifact = String;

    fn detect_bottlenecks(&self, artifact: &String) -> Vec<Issue> {
        let lines: Vec<&str> = artifact.lines().collect();
        let mut issues = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let lineno = i + 1;
            if unbounded_query_re().is_match(line) {
                issues.push(Issue {
                    kind: IssueKind::Performance,
                    reference: format!("line {lineno}"),
                    description: "unbounded select * query".to_string(),
                    severity: Severity::High,
                });
            }
            if line.contains(".query(") && lines[i.saturating_sub(2)..i].iter().any(|l| l.contains("for ")) {
                issues.push(Issue {
                    kind: IssueKind::Performance,
                    reference: format!("line {lineno}"),
                    description: "query issued inside a loop".to_string(),
                    severity: Severity::High,
                });
            }
            if line.contains("sleep(") {
                issues.push(Issue {
                    kind: IssueKind::Performance,
                    reference: format!("line {lineno}"),
                    description: "blocking sleep on the request path".to_string(),
                    severity: Severity::Medium,
                });
            }
        }
        issues
    }

    fn detect_smells(&self, artifact: &String) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (i, line) in artifact.lines().enumerate() {
            let lineno = i + 1;
            if Self::is_debug_print(line) {
                issues.push(Issue {
                    kind: IssueKind::Quality,
                    reference: format!("line {lineno}"),
                    description: "leftover debug print".to_string(),
                    severity: Severity::Low,
                });
            }
            if line.contains(".unwrap()") {
                issues.push(Issue {
                    kind: IssueKind::Quality,
                    reference: format!("line {lineno}"),
                    description: "unwrap on the happy path".to_string(),
                    severity: Severity::Medium,
                });
            }
        }
        issues
    }

    fn fix_for(&self, issue: &Issue, _artifact: &String) -> FixPlan {
        match issue.description.as_str() {
            "unbounded select * query" => FixPlan {
                action: format!("select explicit columns ({})", issue.reference),
                estimated_impact: "estimated: 40-60% less data transferred".to_string(),
            },
            "query issued inside a loop" => FixPlan {
                action: format!("batch the per-item queries into one ({})", issue.reference),
                estimated_impact: "estimated: removes N round trips per request".to_string(),
            },
            "blocking sleep on the request path" => FixPlan {
                action: format!("replace the sleep with an async wait ({})", issue.reference),
                estimated_impact: "estimated: frees a worker per in-flight request".to_string(),
            },
            "leftover debug print" => FixPlan {
                action: format!("drop the debug print ({})", issue.reference),
                estimated_impact: "estimated: quieter logs, no functional change".to_string(),
            },
            _ => FixPlan {
                action: format!("propagate the error instead of unwrapping ({})", issue.reference),
                estimated_impact: "estimated: no more panics on bad input".to_string(),
            },
        }
    }

    fn apply(&self, artifact: String, issues: &[Issue], fixes: &[Fix]) -> String {
        let mut lines: Vec<Option<String>> = artifact.lines().map(|l| Some(l.to_string())).collect();

        for fix in fixes {
            let issue = &issues[fix.issue_index];
            let Some(slot) = line_number(&issue.reference).and_then(|i| lines.get_mut(i)) else {
                continue;
            };
            let Some(line) = slot.take() else { continue };
            *slot = match issue.description.as_str() {
                "unbounded select * query" => Some(
                    unbounded_query_re()
                        .replace_all(&line, "select need_listed_columns from")
                        .into_owned(),
                ),
                "query issued inside a loop" => Some(line.replace(".query(", ".query_batched(")),
                "blocking sleep on the request path" => Some(line.replace("sleep(", "yield_for(")),
                "leftover debug print" => None,
                "unwrap on the happy path" => Some(line.replace(".unwrap()", "?")),
                _ => Some(line),
            };
        }

        lines.into_iter().flatten().collect::<Vec<_>>().join("\n")
    }

    fn metrics(&self, artifact: &String) -> Metrics {
        let bottlenecks = self.detect_bottlenecks(artifact).len() as u32;
        let smells = self.detect_smells(artifact).len() as u32;
        Metrics {
            quality: 100u32.saturating_sub(smells * 10),
            performance: 100u32.saturating_sub(bottlenecks * 15),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent assembly
// ---------------------------------------------------------------------------

pub struct BackendCoderAgent;

impl BackendCoderAgent {
    pub fn build(
        descriptor: CapabilityDescriptor,
        generator: Arc<dyn Generate>,
        policy: GenPolicy,
    ) -> Agent {
        let stacks = declared_stacks(&descriptor);

        let generate_service = {
            let generator = generator.clone();
            move |payload: JsonMap, context: JsonMap| {
                let generator = generator.clone();
                let stacks = stacks.clone();
                async move {
                    let requirements: ServiceRequirements =
                        serde_json::from_value(Value::Object(payload))?;
                    let stages = service_stages(requirements, stacks, generator, policy);
                    let result = run_pipeline(&stages, &context, &CancelToken::new()).await;
                    Ok(pipeline_to_data(&result))
                }
            }
        };

        let optimize_code = move |payload: JsonMap, context: JsonMap| async move {
            let artifact = payload
                .get("code")
                .or_else(|| context.get("code"))
                .and_then(Value::as_str)
                .ok_or_else(|| AtelierError::HandlerFailure {
                    task_type: "optimize_code".to_string(),
                    message: "no 'code' artifact in payload or context".to_string(),
                })?
                .to_string();
            let report = optimize(&CodeOptimizeDomain, artifact);
            let mut data = JsonMap::new();
            data.insert("issues".to_string(), serde_json::to_value(&report.issues)?);
            data.insert("fixes".to_string(), serde_json::to_value(&report.fixes)?);
            data.insert(
                "metrics_before".to_string(),
                serde_json::to_value(report.metrics_before)?,
            );
            data.insert(
                "metrics_after".to_string(),
                serde_json::to_value(report.metrics_after)?,
            );
            data.insert("code".to_string(), Value::String(report.artifact));
            Ok(data)
        };

        let dispatcher = TaskDispatcher::new()
            .register("generate_service", generate_service)
            .register("optimize_code", optimize_code);

        Agent::new(descriptor, dispatcher)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testgen::{CannedGenerator, DownGenerator};
    use crate::task::{Task, TaskContext, TaskResult};

    fn descriptor() -> CapabilityDescriptor {
        CapabilityDescriptor::from_yaml(
            r#"
agent_id: backend-coder-01
specialization: backend_coding
capabilities:
  stacks: [node-express, rust-actix, python-fastapi]
outputs:
  required: [service-code, deploy.yaml]
  optional: [tests, README.md]
"#,
        )
        .unwrap()
    }

    fn agent(generator: Arc<dyn Generate>) -> Agent {
        BackendCoderAgent::build(descriptor(), generator, GenPolicy::default())
    }

    #[tokio::test]
    async fn five_stage_pipeline_completes() {
        let agent = agent(Arc::new(CannedGenerator));
        let task = Task::new(
            "generate_service",
            serde_json::from_str(r#"{"service_name":"billing","endpoints":["/invoices"]}"#).unwrap(),
        );
        let result = agent.execute(&task, &TaskContext::new()).await;
        match result {
            TaskResult::Ok {
                data,
                incomplete_outputs,
            } => {
                assert!(incomplete_outputs.is_empty());
                let stages = data["stages"].as_array().unwrap();
                let names: Vec<&str> = stages
                    .iter()
                    .map(|s| s["stage"].as_str().unwrap())
                    .collect();
                assert_eq!(
                    names,
                    [
                        "select_stack",
                        "generate_code",
                        "generate_tests",
                        "generate_docs",
                        "emit_deployment"
                    ]
                );
                assert!(data["artifacts"]["deploy.yaml"]
                    .as_str()
                    .unwrap()
                    .contains("service: billing"));
            }
            TaskResult::Error { message } => panic!("unexpected error: {message}"),
        }
    }

    #[tokio::test]
    async fn high_performance_selects_performance_stack() {
        let agent = agent(Arc::new(CannedGenerator));
        let task = Task::new(
            "generate_service",
            serde_json::from_str(r#"{"high_performance":true}"#).unwrap(),
        );
        let result = agent.execute(&task, &TaskContext::new()).await;
        let data = result.data().unwrap().clone();
        assert_eq!(data["stages"][0]["value"]["stack"], "rust-actix");
        assert_eq!(data["stages"][0]["value"]["score"], 3);
    }

    #[tokio::test]
    async fn rapid_development_prefers_first_rapid_stack() {
        let agent = agent(Arc::new(CannedGenerator));
        let task = Task::new(
            "generate_service",
            serde_json::from_str(r#"{"needs_rapid_development":true}"#).unwrap(),
        );
        let result = agent.execute(&task, &TaskContext::new()).await;
        let data = result.data().unwrap().clone();
        // node-express and python-fastapi tie at 2; first declared wins
        assert_eq!(data["stages"][0]["value"]["stack"], "node-express");
        assert_eq!(data["stages"][0]["value"]["score"], 2);
    }

    #[tokio::test]
    async fn no_flags_default_stack_wins_at_zero() {
        let agent = agent(Arc::new(CannedGenerator));
        let task = Task::new("generate_service", JsonMap::new());
        let result = agent.execute(&task, &TaskContext::new()).await;
        let data = result.data().unwrap().clone();
        assert_eq!(data["stages"][0]["value"]["stack"], "node-express");
        assert_eq!(data["stages"][0]["value"]["score"], 0);
    }

    #[tokio::test]
    async fn generator_outage_still_reports_selected_stack() {
        let agent = BackendCoderAgent::build(
            descriptor(),
            Arc::new(DownGenerator),
            GenPolicy {
                timeout_ms: 1_000,
                max_retries: 0,
            },
        );
        let task = Task::new("generate_service", JsonMap::new());
        let result = agent.execute(&task, &TaskContext::new()).await;
        match result {
            TaskResult::Ok {
                data,
                incomplete_outputs,
            } => {
                assert_eq!(data["stage_failure"]["stage"], "generate_code");
                assert_eq!(data["stages"].as_array().unwrap().len(), 1);
                assert_eq!(
                    incomplete_outputs,
                    vec!["service-code".to_string(), "deploy.yaml".to_string()]
                );
            }
            TaskResult::Error { message } => panic!("outage must stay a partial success: {message}"),
        }
    }

    #[tokio::test]
    async fn optimize_code_fixes_are_one_to_one() {
        let agent = agent(Arc::new(CannedGenerator));
        let code = "for user in users:\n    db.query(user)\nselect * from accounts\nprint(debug)\nvalue.unwrap()\n";
        let mut payload = JsonMap::new();
        payload.insert("code".to_string(), Value::String(code.to_string()));
        let task = Task::new("optimize_code", payload);
        let result = agent.execute(&task, &TaskContext::new()).await;
        let data = result.data().unwrap().clone();
        let issues = data["issues"].as_array().unwrap();
        let fixes = data["fixes"].as_array().unwrap();
        assert_eq!(issues.len(), fixes.len());
        let mut refs: Vec<u64> = fixes
            .iter()
            .map(|f| f["issue_index"].as_u64().unwrap())
            .collect();
        refs.sort_unstable();
        refs.dedup();
        assert_eq!(refs.len(), fixes.len());

        let improved = data["code"].as_str().unwrap();
        assert!(!improved.contains("print(debug)"));
        assert!(!improved.contains(".unwrap()"));
        assert!(!improved.to_lowercase().contains("select * from"));
    }

    #[tokio::test]
    async fn optimize_metrics_improve() {
        let agent = agent(Arc::new(CannedGenerator));
        let mut payload = JsonMap::new();
        payload.insert(
            "code".to_string(),
            Value::String("select * from t\nx.unwrap()\n".to_string()),
        );
        let task = Task::new("optimize_code", payload);
        let result = agent.execute(&task, &TaskContext::new()).await;
        let data = result.data().unwrap().clone();
        assert!(
            data["metrics_after"]["performance"].as_u64().unwrap()
                > data["metrics_before"]["performance"].as_u64().unwrap()
        );
        assert!(
            data["metrics_after"]["quality"].as_u64().unwrap()
                > data["metrics_before"]["quality"].as_u64().unwrap()
        );
    }

    #[test]
    fn applied_fixes_clear_their_issues() {
        let domain = CodeOptimizeDomain;
        let code = "for user in users:\n    db.query(user)\nselect * from accounts\ntime.sleep(2)\nprint(debug)\nvalue.unwrap()\n".to_string();
        let report = optimize(&domain, code);
        assert!(!report.issues.is_empty());
        assert!(domain.detect_bottlenecks(&report.artifact).is_empty());
        assert!(domain.detect_smells(&report.artifact).is_empty());
    }

    #[test]
    fn stack_catalog_subset_preserves_declared_order() {
        let stacks = declared_stacks(&descriptor());
        let names: Vec<&str> = stacks.iter().map(|s| s.name).collect();
        assert_eq!(names, ["node-express", "rust-actix", "python-fastapi"]);
    }
}

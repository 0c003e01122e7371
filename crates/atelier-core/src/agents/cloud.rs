//! Cloud-architecture agent: six-stage design pipeline plus an optimization
//! pass over existing infrastructure documents.
//!
//! Pipeline shape: analyze requirements → select provider → design layers →
//! estimate cost → write documentation → emit infrastructure-as-code. The
//! three generation stages go through the external collaborator; the rest
//! are local computation.

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

pub const SPECIALIZATION: &str = "cloud_architecture";

// ---------------------------------------------------------------------------
// Provider catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Provider {
    pub name: &'static str,
    pub cheap_tier: bool,
    pub global_tier: bool,
    pub blockchain_capable: bool,
    /// Baseline monthly cost for a small deployment, used by the cost stage.
    pub base_monthly_usd: u32,
    pub regions: u32,
}

const CATALOG: &[Provider] = &[
    Provider {
        name: "aws",
        cheap_tier: false,
        global_tier: true,
        blockchain_capable: true,
        base_monthly_usd: 320,
        regions: 32,
    },
    Provider {
        name: "gcp",
        cheap_tier: false,
        global_tier: true,
        blockchain_capable: false,
        base_monthly_usd: 300,
        regions: 40,
    },
    Provider {
        name: "azure",
        cheap_tier: false,
        global_tier: true,
        blockchain_capable: true,
        base_monthly_usd: 340,
        regions: 60,
    },
    Provider {
        name: "digitalocean",
        cheap_tier: true,
        global_tier: false,
        blockchain_capable: false,
        base_monthly_usd: 48,
        regions: 14,
    },
    Provider {
        name: "hetzner",
        cheap_tier: true,
        global_tier: false,
        blockchain_capable: false,
        base_monthly_usd: 30,
        regions: 6,
    },
];

/// Catalog entries for the providers the descriptor declares, in declared
/// order. Unknown names are skipped (the descriptor may be ahead of the
/// catalog).
fn declared_providers(descriptor: &CapabilityDescriptor) -> Vec<Provider> {
    descriptor
        .options("providers")
        .iter()
        .filter_map(|name| CATALOG.iter().find(|p| p.name == name.as_str()).cloned())
        .collect()
}

// ---------------------------------------------------------------------------
// Requirements and score rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DesignRequirements {
    pub budget_constrained: bool,
    pub needs_global_presence: bool,
    pub blockchain_integration: bool,
    pub expected_monthly_users: u64,
}

fn provider_rules() -> Vec<ScoreRule<DesignRequirements, Provider>> {
    vec![
        ScoreRule {
            id: "budget_constrained",
            when: |r| r.budget_constrained,
            applies_to: |p| p.cheap_tier,
            weight: 3,
        },
        ScoreRule {
            id: "needs_global_presence",
            when: |r| r.needs_global_presence,
            applies_to: |p| p.global_tier,
            weight: 2,
        },
        ScoreRule {
            id: "blockchain_integration",
            when: |r| r.blockchain_integration,
            applies_to: |p| p.blockchain_capable,
            weight: 2,
        },
    ]
}

fn workload_tier(expected_monthly_users: u64) -> (&'static str, u32) {
    match expected_monthly_users {
        0..=10_000 => ("light", 1),
        10_001..=1_000_000 => ("moderate", 3),
        _ => ("heavy", 8),
    }
}

// ---------------------------------------------------------------------------
// Design pipeline
// ---------------------------------------------------------------------------

fn design_stages(
    requirements: DesignRequirements,
    providers: Vec<Provider>,
    generator: Arc<dyn Generate>,
    policy: GenPolicy,
) -> Vec<Stage> {
    let analyze = {
        let requirements = requirements.clone();
        Stage::new("analyze_requirements", move |_input: StageInput| {
            let requirements = requirements.clone();
            async move {
                let (tier, multiplier) = workload_tier(requirements.expected_monthly_users);
                let mut flags = Vec::new();
                if requirements.budget_constrained {
                    flags.push("budget_constrained");
                }
                if requirements.needs_global_presence {
                    flags.push("needs_global_presence");
                }
                if requirements.blockchain_integration {
                    flags.push("blockchain_integration");
                }
                Ok(json!({
                    "workload_tier": tier,
                    "cost_multiplier": multiplier,
                    "flags": flags,
                    "expected_monthly_users": requirements.expected_monthly_users,
                }))
            }
        })
    };

    let select_provider = {
        let requirements = requirements.clone();
        let providers = providers.clone();
        Stage::new("select_provider", move |_input: StageInput| {
            let requirements = requirements.clone();
            let providers = providers.clone();
            async move {
                let selection = select(&requirements, &providers, &provider_rules())?;
                Ok(json!({
                    "provider": selection.candidate.name,
                    "score": selection.score,
                    "scores": selection.scores,
                    "regions": selection.candidate.regions,
                }))
            }
        })
    };

    let design_layers = {
        let generator = generator.clone();
        Stage::new("design_layers", move |input: StageInput| {
            let generator = generator.clone();
            async move {
                let provider = stage_str(&input, "select_provider", "provider")?;
                let tier = stage_str(&input, "analyze_requirements", "workload_tier")?;
                let prompt = format!(
                    "Design the application, data, and network layers of a {tier}-workload \
                     system on {provider}. Name each layer and its managed services."
                );
                let ctx = json!({ "prior": input.prior });
                let doc = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "layers_doc": doc }))
            }
        })
    };

    let estimate_cost = {
        let providers = providers.clone();
        Stage::new("estimate_cost", move |input: StageInput| {
            let providers = providers.clone();
            async move {
                let name = stage_str(&input, "select_provider", "provider")?;
                let provider = providers
                    .iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| AtelierError::StageFailure {
                        stage: "estimate_cost".to_string(),
                        cause: format!("selected provider '{name}' not in catalog"),
                    })?;
                let multiplier = input
                    .output("analyze_requirements")
                    .and_then(|v| v.get("cost_multiplier"))
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as u32;
                Ok(json!({
                    "estimated_monthly_usd": provider.base_monthly_usd * multiplier,
                    "basis": "estimate derived from catalog baselines, not a quote",
                }))
            }
        })
    };

    let write_documentation = {
        let generator = generator.clone();
        Stage::new("write_documentation", move |input: StageInput| {
            let generator = generator.clone();
            async move {
                let provider = stage_str(&input, "select_provider", "provider")?;
                let prompt = format!(
                    "Write an architecture plan document for the {provider} design, \
                     covering layers, cost estimate, and operational notes."
                );
                let ctx = json!({ "prior": input.prior });
                let doc = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "artifacts": { "plan.md": doc } }))
            }
        })
    };

    let emit_infrastructure = {
        let generator = generator.clone();
        Stage::new("emit_infrastructure", move |input: StageInput| {
            let generator = generator.clone();
            async move {
                let provider = stage_str(&input, "select_provider", "provider")?;
                let prompt = format!(
                    "Emit Terraform for the designed {provider} architecture, one resource \
                     block per managed service."
                );
                let ctx = json!({ "prior": input.prior });
                let code = generate_with_policy(generator.as_ref(), &prompt, &ctx, policy).await?;
                Ok(json!({ "artifacts": { "infra.tf": code } }))
            }
        })
    };

    vec![
        analyze,
        select_provider,
        design_layers,
        estimate_cost,
        write_documentation,
        emit_infrastructure,
    ]
}

fn stage_str(input: &StageInput, stage: &str, key: &str) -> Result<String> {
    input
        .output(stage)
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AtelierError::StageFailure {
            stage: stage.to_string(),
            cause: format!("prior stage output missing '{key}'"),
        })
}

// ---------------------------------------------------------------------------
// Optimization domain
// ---------------------------------------------------------------------------

static IPV4_RE: OnceLock<Regex> = OnceLock::new();

fn ipv4_re() -> &'static Regex {
    IPV4_RE.get_or_init(|| Regex::new(r"\b\d{1,3}(\.\d{1,3}){3}\b").unwrap())
}

/// Zero-based line index from a `line N` issue reference.
fn line_number(reference: &str) -> Option<usize> {
    reference
        .strip_prefix("line ")?
        .parse::<usize>()
        .ok()?
        .checked_sub(1)
}

/// Detectors and fixes for infrastructure documents.
///
/// Bottlenecks: single-instance resources, synchronous fan-out, and the
/// absence of any autoscaling group. Smells: hardcoded IPv4 addresses and
/// leftover TODO markers.
pub struct InfraOptimizeDomain;

impl InfraOptimizeDomain {
    fn line_issues(artifact: &str) -> (Vec<Issue>, Vec<Issue>) {
        let mut bottlenecks = Vec::new();
        let mut smells = Vec::new();
        for (i, line) in artifact.lines().enumerate() {
            let lineno = i + 1;
            if line.contains("single_instance") {
                bottlenecks.push(Issue {
                    kind: IssueKind::Performance,
                    reference: format!("line {lineno}"),
                    description: "single-instance resource with no redundancy".to_string(),
                    severity: Severity::High,
                });
            }
            if line.contains("synchronous") {
                bottlenecks.push(Issue {
                    kind: IssueKind::Performance,
                    reference: format!("line {lineno}"),
                    description: "synchronous fan-out on the request path".to_string(),
                    severity: Severity::Medium,
                });
            }
            if ipv4_re().is_match(line) {
                smells.push(Issue {
                    kind: IssueKind::Quality,
                    reference: format!("line {lineno}"),
                    description: "hardcoded IPv4 address".to_string(),
                    severity: Severity::Medium,
                });
            }
            if line.contains("TODO") {
                smells.push(Issue {
                    kind: IssueKind::Quality,
                    reference: format!("line {lineno}"),
                    description: "unresolved TODO marker".to_string(),
                    severity: Severity::Low,
                });
            }
        }
        (bottlenecks, smells)
    }
}

impl OptimizeDomain for InfraOptimizeDomain {
    type Artifact = String;

    fn detect_bottlenecks(&self, artifact: &String) -> Vec<Issue> {
        let (mut bottlenecks, _) = Self::line_issues(artifact);
        if !artifact.contains("autoscal") {
            bottlenecks.push(Issue {
                kind: IssueKind::Performance,
                reference: "document".to_string(),
                description: "no autoscaling group declared".to_string(),
                severity: Severity::Medium,
            });
        }
        bottlenecks
    }

    fn detect_smells(&self, artifact: &String) -> Vec<Issue> {
        Self::line_issues(artifact).1
    }

    fn fix_for(&self, issue: &Issue, _artifact: &String) -> FixPlan {
        match issue.description.as_str() {
            "single-instance resource with no redundancy" => FixPlan {
                action: format!("replace single_instance with an autoscaled group ({})", issue.reference),
                estimated_impact: "estimated: removes a single point of failure".to_string(),
            },
            "synchronous fan-out on the request path" => FixPlan {
                action: format!("move the fan-out behind a queue ({})", issue.reference),
                estimated_impact: "estimated: 30-50% lower p99 latency".to_string(),
            },
            "no autoscaling group declared" => FixPlan {
                action: "declare an autoscaling group for the stateless tier".to_string(),
                estimated_impact: "estimated: absorbs 5-10x traffic spikes".to_string(),
            },
            "hardcoded IPv4 address" => FixPlan {
                action: format!("replace the literal address with var.trusted_cidr ({})", issue.reference),
                estimated_impact: "estimated: removes an environment-specific constant".to_string(),
            },
            _ => FixPlan {
                action: format!("resolve the TODO ({})", issue.reference),
                estimated_impact: "estimated: minor readability gain".to_string(),
            },
        }
    }

    fn apply(&self, artifact: String, issues: &[Issue], fixes: &[Fix]) -> String {
        let mut lines: Vec<Option<String>> = artifact.lines().map(|l| Some(l.to_string())).collect();
        let mut declare_autoscaling = false;

        for fix in fixes {
            let issue = &issues[fix.issue_index];
            if issue.description == "no autoscaling group declared" {
                declare_autoscaling = true;
                continue;
            }
            let Some(slot) = line_number(&issue.reference).and_then(|i| lines.get_mut(i)) else {
                continue;
            };
            let Some(line) = slot.take() else { continue };
            *slot = match issue.description.as_str() {
                "single-instance resource with no redundancy" => {
                    Some(line.replace("single_instance", "autoscaled_group"))
                }
                "synchronous fan-out on the request path" => {
                    Some(line.replace("synchronous", "queued"))
                }
                "hardcoded IPv4 address" => {
                    Some(ipv4_re().replace_all(&line, "var.trusted_cidr").into_owned())
                }
                "unresolved TODO marker" => None,
                _ => Some(line),
            };
        }

        let mut improved = lines.into_iter().flatten().collect::<Vec<_>>().join("\n");
        if declare_autoscaling && !improved.contains("autoscal") {
            improved.push_str("\nresource \"autoscaling_group\" \"stateless\" {}\n");
        }
        improved
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

pub struct CloudArchitectAgent;

impl CloudArchitectAgent {
    /// Compose the cloud-architecture agent from its descriptor and the
    /// generation collaborator.
    pub fn build(
        descriptor: CapabilityDescriptor,
        generator: Arc<dyn Generate>,
        policy: GenPolicy,
    ) -> Agent {
        let providers = declared_providers(&descriptor);

        let design = {
            let generator = generator.clone();
            let providers = providers.clone();
            move |payload: JsonMap, context: JsonMap| {
                let generator = generator.clone();
                let providers = providers.clone();
                async move {
                    let requirements: DesignRequirements =
                        serde_json::from_value(Value::Object(payload))?;
                    let stages = design_stages(requirements, providers, generator, policy);
                    let result = run_pipeline(&stages, &context, &CancelToken::new()).await;
                    Ok(pipeline_to_data(&result))
                }
            }
        };

        let optimize_infra = move |payload: JsonMap, context: JsonMap| async move {
            let artifact = payload
                .get("architecture")
                .or_else(|| context.get("architecture"))
                .and_then(Value::as_str)
                .ok_or_else(|| AtelierError::HandlerFailure {
                    task_type: "optimize_architecture".to_string(),
                    message: "no 'architecture' artifact in payload or context".to_string(),
                })?
                .to_string();
            let report = optimize(&InfraOptimizeDomain, artifact);
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
            data.insert("architecture".to_string(), Value::String(report.artifact));
            Ok(data)
        };

        let dispatcher = TaskDispatcher::new()
            .register("design_architecture", design)
            .register("optimize_architecture", optimize_infra);

        Agent::new(descriptor, dispatcher)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

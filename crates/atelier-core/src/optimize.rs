use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity / IssueKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Performance,
    Quality,
}

// ---------------------------------------------------------------------------
// Issue / Fix
// ---------------------------------------------------------------------------

/// A defect detected in an existing artifact. Transient: produced and
/// consumed within one optimization cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    /// Location or reference within the artifact (line, section, resource).
    pub reference: String,
    pub description: String,
    pub severity: Severity,
}

/// A proposed remediation for one issue, produced by the domain's
/// fix generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixPlan {
    pub action: String,
    /// Advisory estimate, never a measured value.
    pub estimated_impact: String,
}

/// A remediation tied to exactly one issue. `issue_index` points into the
/// report's issue list, so traceability is guaranteed by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub issue_index: usize,
    pub action: String,
    /// Advisory estimate, never a measured value.
    pub estimated_impact: String,
}

// ---------------------------------------------------------------------------
// Metrics / OptimizationReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// 0–100 quality indicator.
    pub quality: u32,
    /// 0–100 performance indicator.
    pub performance: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport<A> {
    pub issues: Vec<Issue>,
    pub fixes: Vec<Fix>,
    pub metrics_before: Metrics,
    pub metrics_after: Metrics,
    /// The artifact after all fixes were applied.
    pub artifact: A,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// OptimizeDomain
// ---------------------------------------------------------------------------

/// Domain-supplied extension points for the optimization loop.
///
/// Detectors must be deterministic: given the same artifact they return the
/// same issues in the same order on every call.
pub trait OptimizeDomain {
    type Artifact;

    /// Performance-bottleneck detector.
    fn detect_bottlenecks(&self, artifact: &Self::Artifact) -> Vec<Issue>;

    /// Quality / code-smell detector.
    fn detect_smells(&self, artifact: &Self::Artifact) -> Vec<Issue>;

    /// Exactly one fix per issue; batching multiple issues into one fix is
    /// not allowed.
    fn fix_for(&self, issue: &Issue, artifact: &Self::Artifact) -> FixPlan;

    /// Apply each fix to the issue it references (`fixes[n].issue_index`
    /// points into `issues`), in fix-list order, which is the order the
    /// issues were detected.
    fn apply(&self, artifact: Self::Artifact, issues: &[Issue], fixes: &[Fix]) -> Self::Artifact;

    fn metrics(&self, artifact: &Self::Artifact) -> Metrics;
}

// ---------------------------------------------------------------------------
// optimize
// ---------------------------------------------------------------------------

/// Re-entrant optimization cycle: detect issues, generate one fix per issue,
/// apply all fixes in detection order, compute before/after metrics.
///
/// Issue order is bottlenecks first, then smells, each in detector order.
/// No unstable iteration anywhere, so repeated runs over the same artifact
/// produce identical issue and fix lists.
pub fn optimize<D: OptimizeDomain>(domain: &D, artifact: D::Artifact) -> OptimizationReport<D::Artifact> {
    let mut issues = domain.detect_bottlenecks(&artifact);
    issues.extend(domain.detect_smells(&artifact));

    let metrics_before = domain.metrics(&artifact);

    let fixes: Vec<Fix> = issues
        .iter()
        .enumerate()
        .map(|(i, issue)| {
            let plan = domain.fix_for(issue, &artifact);
            Fix {
                issue_index: i,
                action: plan.action,
                estimated_impact: plan.estimated_impact,
            }
        })
        .collect();

    let improved = domain.apply(artifact, &issues, &fixes);
    let metrics_after = domain.metrics(&improved);

    tracing::info!(
        issues = issues.len(),
        quality_before = metrics_before.quality,
        quality_after = metrics_after.quality,
        "optimization cycle complete"
    );

    OptimizationReport {
        issues,
        fixes,
        metrics_before,
        metrics_after,
        artifact: improved,
        generated_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

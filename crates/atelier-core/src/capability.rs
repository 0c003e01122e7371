use crate::error::{AtelierError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ToolSpec / Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

// ---------------------------------------------------------------------------
// CapabilityDescriptor
// ---------------------------------------------------------------------------

/// Parsed, immutable declaration of an agent's identity and capability set.
///
/// Loaded once at agent construction and never mutated afterwards. Two loads
/// of the same artifact compare equal field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub agent_id: String,
    /// Weak back-reference to the parent specialization; empty for top-level
    /// agents. Never resolved into a live object graph.
    #[serde(default)]
    pub parent_agent: String,
    pub specialization: String,
    /// Opaque identifier for the generation collaborator.
    #[serde(default = "default_model")]
    pub model: String,
    /// Tuning parameter passed through opaquely to the collaborator.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Capability category → ordered list of supported options.
    pub capabilities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    /// Context-requirement name → human description.
    #[serde(default)]
    pub context_requirements: BTreeMap<String, String>,
    pub outputs: Outputs,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
}

fn default_model() -> String {
    "gen-default".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

impl CapabilityDescriptor {
    /// Parse and validate a configuration artifact.
    ///
    /// All parse and validation failures are reported as `MalformedConfig`;
    /// no agent is constructed from a descriptor that fails here.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let descriptor: CapabilityDescriptor = serde_yaml::from_str(source)
            .map_err(|e| AtelierError::MalformedConfig(e.to_string()))?;
        descriptor.check()?;
        Ok(descriptor)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }

    /// Ordered options for one capability category; empty slice if the
    /// category is not declared.
    pub fn options(&self, category: &str) -> &[String] {
        self.capabilities
            .get(category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn requires_output(&self, name: &str) -> bool {
        self.outputs.required.iter().any(|o| o == name)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn check(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(AtelierError::MalformedConfig("agent_id is empty".into()));
        }
        if self.specialization.trim().is_empty() {
            return Err(AtelierError::MalformedConfig(
                "specialization is empty".into(),
            ));
        }
        if self.capabilities.is_empty() {
            return Err(AtelierError::MalformedConfig(
                "capabilities must declare at least one category".into(),
            ));
        }
        for (category, options) in &self.capabilities {
            if category.trim().is_empty() {
                return Err(AtelierError::MalformedConfig(
                    "capability category name is empty".into(),
                ));
            }
            if options.is_empty() {
                return Err(AtelierError::MalformedConfig(format!(
                    "capability category '{category}' has zero options"
                )));
            }
            let mut seen: HashSet<&str> = HashSet::new();
            for opt in options {
                if opt.trim().is_empty() {
                    return Err(AtelierError::MalformedConfig(format!(
                        "capability category '{category}' contains a blank option"
                    )));
                }
                if !seen.insert(opt.as_str()) {
                    return Err(AtelierError::MalformedConfig(format!(
                        "duplicate option '{opt}' in category '{category}'"
                    )));
                }
            }
        }
        if self.outputs.required.is_empty() {
            return Err(AtelierError::MalformedConfig(
                "outputs.required must name at least one artifact".into(),
            ));
        }
        Ok(())
    }

    /// Soft checks that do not block agent construction. `Error`-level
    /// entries flag values the generation collaborator will likely reject.
    pub fn validate_warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for name in &self.outputs.optional {
            if self.outputs.required.contains(name) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("output '{name}' listed as both required and optional"),
                });
            }
        }

        for tool in &self.tools {
            if tool.version.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("tool '{}' has no version pin", tool.name),
                });
            }
        }

        for (name, description) in &self.context_requirements {
            if description.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("context requirement '{name}' has no description"),
                });
            }
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("temperature {} is outside the usual 0.0-2.0 range", self.temperature),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

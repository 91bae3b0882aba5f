use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;

use crate::classify::PriorityRules;
use crate::duplicates::DEFAULT_RADIUS_KM;
use crate::lifecycle::TransitionPolicy;
use crate::sla::DEFAULT_NEARING_WINDOW_HOURS;

/// Directory holding a project's registry, blobs and config.
pub const PROJECT_DIR: &str = ".civic";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub duplicates: DuplicatesConfig,
    #[serde(default)]
    pub sla: SlaConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatesConfig {
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            radius_km: default_radius_km(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaConfig {
    #[serde(default = "default_nearing_window_hours")]
    pub nearing_window_hours: u32,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            nearing_window_hours: default_nearing_window_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_true")]
    pub strict_transitions: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            strict_transitions: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub extra_high_keywords: Vec<String>,
    #[serde(default)]
    pub extra_medium_keywords: Vec<String>,
}

impl ProjectConfig {
    /// Priority rules with any configured extra keywords appended.
    #[must_use]
    pub fn priority_rules(&self) -> PriorityRules {
        PriorityRules::with_extra_keywords(
            &self.priority.extra_high_keywords,
            &self.priority.extra_medium_keywords,
        )
    }

    #[must_use]
    pub const fn transition_policy(&self) -> TransitionPolicy {
        if self.lifecycle.strict_transitions {
            TransitionPolicy::Strict
        } else {
            TransitionPolicy::Permissive
        }
    }

    #[must_use]
    pub fn nearing_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.sla.nearing_window_hours))
    }

    /// Reject values that parse but make no sense.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let radius = self.duplicates.radius_km;
        if !radius.is_finite() || radius < 0.0 {
            bail!("duplicates.radius_km must be a non-negative number, got {radius}");
        }
        Ok(())
    }
}

/// Per-user defaults read from `<config dir>/civic/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid value in {}", path.display()))?;
    Ok(config)
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("civic/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Render the default project config, used by `civic init`.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn default_project_config_toml() -> Result<String> {
    toml::to_string_pretty(&ProjectConfig::default()).context("serialize default config")
}

pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<&str>, env_format: Option<&str>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }
    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }
    if let Some(mode) = user_output.and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_true() -> bool {
    true
}

const fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

const fn default_nearing_window_hours() -> u32 {
    DEFAULT_NEARING_WINDOW_HOURS
}

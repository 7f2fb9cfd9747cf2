use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::Error;

/// File name looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "treesim.toml";

/// Default limit on tree height, root included.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Accepted range for `max_depth`. The upper bound keeps scoring recursion
/// within the batch worker stack.
pub const MAX_DEPTH_RANGE: std::ops::RangeInclusive<usize> = 2..=4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    #[serde(default = "default_structure_weight")]
    pub structure_weight: f64,
    /// Node kinds whose content is replaced by the filtered marker.
    #[serde(default = "default_filtered_kinds")]
    pub filtered_kinds: Vec<String>,
    /// Maximum tree height. Deeper Markdown nesting is flattened; deeper
    /// trees handed to the batch comparator fail their pairs.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            text_weight: default_text_weight(),
            structure_weight: default_structure_weight(),
            filtered_kinds: default_filtered_kinds(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub max_workers: MaxWorkers,
    #[serde(default)]
    pub memoize: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: MaxWorkers::default(),
            memoize: false,
        }
    }
}

/// Worker count for the batch pool: a fixed number, or `"auto"` for one
/// worker per available processing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkersRepr", into = "WorkersRepr")]
pub enum MaxWorkers {
    Auto,
    Fixed(NonZeroUsize),
}

impl Default for MaxWorkers {
    fn default() -> Self {
        Self::Fixed(NonZeroUsize::new(8).unwrap_or(NonZeroUsize::MIN))
    }
}

impl MaxWorkers {
    /// Concrete thread count.
    #[must_use]
    pub fn resolve(self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            Self::Fixed(n) => n.get(),
        }
    }
}

impl FromStr for MaxWorkers {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        raw.parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self::Fixed)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "max_workers must be a positive integer or \"auto\", got {raw:?}"
                ))
            })
    }
}

impl fmt::Display for MaxWorkers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WorkersRepr {
    Count(usize),
    Keyword(String),
}

impl TryFrom<WorkersRepr> for MaxWorkers {
    type Error = Error;

    fn try_from(repr: WorkersRepr) -> Result<Self, Self::Error> {
        match repr {
            WorkersRepr::Count(n) => NonZeroUsize::new(n).map(Self::Fixed).ok_or_else(|| {
                Error::InvalidConfig("max_workers must be positive".to_string())
            }),
            WorkersRepr::Keyword(word) => word.parse(),
        }
    }
}

impl From<MaxWorkers> for WorkersRepr {
    fn from(workers: MaxWorkers) -> Self {
        match workers {
            MaxWorkers::Auto => Self::Keyword("auto".to_string()),
            MaxWorkers::Fixed(n) => Self::Count(n.get()),
        }
    }
}

impl Config {
    /// Reject values the engine cannot honor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for negative or non-finite weights
    /// and for a `max_depth` outside [`MAX_DEPTH_RANGE`].
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("text_weight", self.engine.text_weight),
            ("structure_weight", self.engine.structure_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a finite, non-negative number, got {value}"
                )));
            }
        }
        if !MAX_DEPTH_RANGE.contains(&self.engine.max_depth) {
            return Err(Error::InvalidConfig(format!(
                "max_depth must be between {} and {}, got {}",
                MAX_DEPTH_RANGE.start(),
                MAX_DEPTH_RANGE.end(),
                self.engine.max_depth
            )));
        }
        Ok(())
    }
}

/// Load a config file, failing if it is missing or malformed.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Path of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("treesim/config.toml"))
}

/// Resolve the effective configuration.
///
/// Precedence (highest wins): environment overrides, then the first file
/// found among `explicit`, `<project_root>/treesim.toml` and the user config.
/// Command-line flags are applied by the caller on top of the result.
///
/// # Errors
///
/// Returns an error if `explicit` does not exist, a config file fails to
/// parse, or an environment override is invalid.
pub fn resolve_config(project_root: &Path, explicit: Option<&Path>) -> Result<Config> {
    let mut config = if let Some(path) = explicit {
        load_config(path)?
    } else {
        let project = project_root.join(PROJECT_CONFIG_FILE);
        if project.exists() {
            load_config(&project)?
        } else if let Some(user) = user_config_path().filter(|path| path.exists()) {
            load_config(&user)?
        } else {
            Config::default()
        }
    };

    apply_env_overrides(&mut config, |key| env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply `TREESIM_WORKERS` and `TREESIM_MEMOIZE` from `lookup`.
///
/// # Errors
///
/// Returns an error if a value cannot be parsed.
pub fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = lookup("TREESIM_WORKERS") {
        config.batch.max_workers = raw.parse().context("TREESIM_WORKERS")?;
    }
    if let Some(raw) = lookup("TREESIM_MEMOIZE") {
        config.batch.memoize = is_truthy(&raw);
    }
    Ok(())
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

const fn default_text_weight() -> f64 {
    0.4
}

const fn default_structure_weight() -> f64 {
    0.6
}

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_filtered_kinds() -> Vec<String> {
    ["code_block", "html_block", "link", "image"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

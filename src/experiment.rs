use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::{ConfigError, ExperimentError};

/// Name of the config snapshot written into every run directory.
pub const SNAPSHOT_FILE: &str = "config.toml";

/// Environment variables consulted, in order, for the process rank.
pub const RANK_ENV_VARS: [&str; 4] = ["RANK", "LOCAL_RANK", "SLURM_PROCID", "JSM_NAMESPACE_RANK"];

/// `max_steps` value meaning "no step limit".
pub const NO_STEP_LIMIT: i64 = -1;

/// A validation interval or size as the trainer reads it: a whole number
/// counts batches, a decimal is a fraction of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum BatchAmount {
    Batches(u64),
    Fraction(f64),
}

/// Experiment configuration as read from a run's config file.
///
/// Keys the training driver reads unconditionally are required here too.
/// Keys this crate does not interpret are kept in `extra` so the snapshot
/// written to the run directory matches the input.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExperimentConfig {
    pub result_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_version: Option<String>,
    pub dataset_paths: Vec<PathBuf>,
    pub max_length: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_num_nodes")]
    pub num_nodes: usize,
    pub max_epochs: usize,
    /// [`NO_STEP_LIMIT`] trains until `max_epochs` is reached.
    pub max_steps: i64,
    pub val_check_interval: BatchAmount,
    pub check_val_every_n_epoch: usize,
    pub val_batches: BatchAmount,
    pub gradient_clip_val: f64,
    pub accumulate_grad_batches: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from_checkpoint_path: Option<PathBuf>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<u64>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_seed() -> u64 {
    42
}

fn default_num_nodes() -> usize {
    1
}

impl ExperimentConfig {
    /// Load a config file, apply `key=value` overrides, then validate.
    pub fn load(path: &Path, overrides: &[String]) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut table: toml::Table = toml::from_str(&content)?;
        for entry in overrides {
            apply_override(&mut table, entry)?;
        }
        let config: ExperimentConfig = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::Validation("max_length must be > 0".into()));
        }
        if self.num_nodes == 0 {
            return Err(ConfigError::Validation("num_nodes must be >= 1".into()));
        }
        if self.max_epochs == 0 {
            return Err(ConfigError::Validation("max_epochs must be >= 1".into()));
        }
        if self.max_steps != NO_STEP_LIMIT && self.max_steps < 1 {
            return Err(ConfigError::Validation(
                "max_steps must be -1 or >= 1".into(),
            ));
        }
        match self.val_check_interval {
            BatchAmount::Batches(0) => {
                return Err(ConfigError::Validation(
                    "val_check_interval must be >= 1 batch".into(),
                ))
            }
            BatchAmount::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(ConfigError::Validation(
                    "val_check_interval fraction must be in (0, 1]".into(),
                ))
            }
            _ => {}
        }
        if self.check_val_every_n_epoch == 0 {
            return Err(ConfigError::Validation(
                "check_val_every_n_epoch must be >= 1".into(),
            ));
        }
        // A batch count of 0 disables validation.
        if let BatchAmount::Fraction(f) = self.val_batches {
            if !(0.0..=1.0).contains(&f) {
                return Err(ConfigError::Validation(
                    "val_batches fraction must be in [0, 1]".into(),
                ));
            }
        }
        if self.gradient_clip_val < 0.0 {
            return Err(ConfigError::Validation(
                "gradient_clip_val must be >= 0".into(),
            ));
        }
        if self.accumulate_grad_batches == 0 {
            return Err(ConfigError::Validation(
                "accumulate_grad_batches must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Apply one `dotted.key=value` override. The value is parsed as a TOML
/// value and kept as a plain string when that fails.
pub fn apply_override(table: &mut toml::Table, entry: &str) -> Result<(), ConfigError> {
    let (key, raw) = entry
        .split_once('=')
        .ok_or_else(|| ConfigError::Validation(format!("override '{entry}' is not key=value")))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::Validation(format!(
            "override '{entry}' has an empty key"
        )));
    }
    let raw = raw.trim();
    let value = toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()));

    let mut parts: Vec<&str> = key.split('.').collect();
    let leaf = parts.pop().unwrap_or(key);
    let mut current = table;
    for part in parts {
        let slot = current
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        current = match slot {
            toml::Value::Table(inner) => inner,
            _ => {
                return Err(ConfigError::Validation(format!(
                    "override '{key}': '{part}' is not a table"
                )))
            }
        };
    }
    current.insert(leaf.to_string(), value);
    Ok(())
}

/// The `(exp_name, exp_version)` pair that names a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub exp_name: String,
    pub exp_version: String,
}

impl RunIdentity {
    /// `exp_name` comes from the config, else the config file name up to its
    /// first dot. `exp_version` comes from the override, else `started_at`.
    /// A version stored in the config file is not reused.
    pub fn new(
        config_path: &Path,
        config: &ExperimentConfig,
        version_override: Option<&str>,
        started_at: DateTime<Local>,
    ) -> Self {
        let exp_name = config
            .exp_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                config_path
                    .file_name()
                    .map(|n| n.to_string_lossy().split('.').next().unwrap_or("").to_string())
                    .unwrap_or_default()
            });
        let exp_version = version_override
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| started_at.format("%Y%m%d_%H%M%S").to_string());
        RunIdentity {
            exp_name,
            exp_version,
        }
    }

    /// Record the identity in the config so the snapshot carries it.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        config.exp_name = Some(self.exp_name.clone());
        config.exp_version = Some(self.exp_version.clone());
    }

    /// `result_path/exp_name/exp_version`; training checkpoints are saved here too.
    pub fn run_dir(&self, result_path: &Path) -> PathBuf {
        result_path.join(&self.exp_name).join(&self.exp_version)
    }
}

/// Rank of this process in a distributed run, from the first rank variable
/// that is set and parses. Defaults to 0.
pub fn process_rank<F>(lookup: F) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    for key in RANK_ENV_VARS {
        if let Some(value) = lookup(key) {
            match value.trim().parse::<usize>() {
                Ok(rank) => return rank,
                Err(_) => tracing::warn!(key, value = %value, "ignoring unparseable rank"),
            }
        }
    }
    0
}

/// Rank of the current process from its environment.
pub fn current_rank() -> usize {
    process_rank(|key| std::env::var(key).ok())
}

/// Write `config` to `run_dir/config.toml` on rank zero. Other ranks write
/// nothing and get `None`.
pub fn save_config_snapshot(
    run_dir: &Path,
    config: &ExperimentConfig,
    rank: usize,
) -> Result<Option<PathBuf>, ExperimentError> {
    if rank != 0 {
        tracing::debug!(rank, "skipping config snapshot on non-zero rank");
        return Ok(None);
    }
    std::fs::create_dir_all(run_dir).map_err(|e| ExperimentError::CreateDir {
        path: run_dir.to_path_buf(),
        source: e,
    })?;
    let path = run_dir.join(SNAPSHOT_FILE);
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|e| ExperimentError::Write {
        path: path.clone(),
        source: e,
    })?;
    tracing::info!("config is saved at {}", path.display());
    Ok(Some(path))
}

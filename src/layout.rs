use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Raw model weights shipped alongside a training checkpoint.
pub const WEIGHTS_FILE: &str = "pytorch_model.bin";

/// Trainer state (optimizer, schedulers, counters) in directory-form checkpoints.
pub const ARTIFACTS_FILE: &str = "artifacts.ckpt";

/// Prefix under which the model's parameters live in a trainer `state_dict`.
pub const STATE_DICT_PREFIX: &str = "model.";

/// Where the pieces of a resumable training checkpoint live on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum TrainingCheckpointLayout {
    /// A single trainer checkpoint file. If it carries no `state_dict`, the
    /// weights are taken from the sibling weights file.
    File {
        checkpoint: PathBuf,
        fallback_weights: PathBuf,
    },
    /// A directory holding trainer state and raw weights side by side.
    Directory { artifacts: PathBuf, weights: PathBuf },
}

impl TrainingCheckpointLayout {
    pub fn locate(path: &Path) -> Self {
        if path.is_file() {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            TrainingCheckpointLayout::File {
                checkpoint: path.to_path_buf(),
                fallback_weights: parent.join(WEIGHTS_FILE),
            }
        } else {
            TrainingCheckpointLayout::Directory {
                artifacts: path.join(ARTIFACTS_FILE),
                weights: path.join(WEIGHTS_FILE),
            }
        }
    }

    /// The file a loader reads first.
    pub fn primary(&self) -> &Path {
        match self {
            TrainingCheckpointLayout::File { checkpoint, .. } => checkpoint,
            TrainingCheckpointLayout::Directory { artifacts, .. } => artifacts,
        }
    }

    /// Required files that are absent. The fallback weights of the file form
    /// are optional and never reported.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        let required: Vec<&PathBuf> = match self {
            TrainingCheckpointLayout::File { checkpoint, .. } => vec![checkpoint],
            TrainingCheckpointLayout::Directory { artifacts, weights } => {
                vec![artifacts, weights]
            }
        };
        required
            .into_iter()
            .filter(|p| !p.is_file())
            .cloned()
            .collect()
    }
}

/// Graft raw model weights into a trainer `state_dict` by prefixing every key.
pub fn prefix_state_dict<V>(weights: BTreeMap<String, V>) -> BTreeMap<String, V> {
    weights
        .into_iter()
        .map(|(key, value)| (format!("{STATE_DICT_PREFIX}{key}"), value))
        .collect()
}

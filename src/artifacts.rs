//! Named checkpoint artifacts and the release endpoint they are published under.

/// Base URL of the published model releases.
pub const BASE_URL: &str = "https://github.com/facebookresearch/nougat/releases/download";

/// Release tag the checkpoint is pulled from.
pub const MODEL_TAG: &str = "0.1.0-small";

/// Files that make up a usable checkpoint, in download order.
pub const ARTIFACTS: [&str; 5] = [
    "config.json",
    "pytorch_model.bin",
    "special_tokens_map.json",
    "tokenizer.json",
    "tokenizer_config.json",
];

/// Minimum number of directory entries for a checkpoint to count as populated.
pub const MIN_ENTRIES: usize = ARTIFACTS.len();

/// Payloads of this many bytes or fewer are treated as placeholders and dropped.
pub const MIN_PAYLOAD_BYTES: usize = 15;

/// Where artifacts are downloaded from: `{base_url}/{tag}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub base_url: String,
    pub tag: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint {
            base_url: BASE_URL.to_string(),
            tag: MODEL_TAG.to_string(),
        }
    }
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, tag: impl Into<String>) -> Self {
        Endpoint {
            base_url: base_url.into(),
            tag: tag.into(),
        }
    }

    /// Download URL for a single artifact.
    pub fn artifact_url(&self, file: &str) -> String {
        format!("{}/{}/{}", self.base_url.trim_end_matches('/'), self.tag, file)
    }
}

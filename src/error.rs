use std::path::PathBuf;

/// Errors that can occur while downloading a single artifact.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read response body from {url}: {source}")]
    Read {
        url: String,
        source: std::io::Error,
    },
}

/// Errors that can occur while resolving or populating a checkpoint directory.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to download {artifact}: {source}")]
    Fetch {
        artifact: String,
        source: FetchError,
    },

    #[error("failed to create checkpoint directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to list checkpoint directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no cache directory available; set NOUGAT_CHECKPOINT or TORCH_HOME")]
    NoCacheDir,

    #[error("HTTP client setup failed: {0}")]
    Client(FetchError),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Errors that can occur while preparing an experiment run directory.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create run directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write config snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

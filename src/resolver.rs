//! Locates the local checkpoint directory and provisions it from the release
//! endpoint when it is missing or incomplete.
//!
//! Completeness is judged only by the number of directory entries. Downloads
//! are serial and unverified apart from a minimum payload size, and a failed
//! pass leaves whatever was already written in place; the next call simply
//! runs the whole pass again.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{Endpoint, ARTIFACTS, MIN_ENTRIES, MIN_PAYLOAD_BYTES};
use crate::error::ResolveError;
use crate::fetch::{Fetch, FetchConfig, HttpFetcher};

/// Environment variable naming the checkpoint directory.
pub const CHECKPOINT_ENV: &str = "NOUGAT_CHECKPOINT";

/// Environment variable naming the framework cache root.
pub const TORCH_HOME_ENV: &str = "TORCH_HOME";

/// Subdirectory of the framework hub cache that holds the checkpoint.
pub const CACHE_SUBDIR: &str = "nougat";

/// Configuration for the checkpoint resolver.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub endpoint: Endpoint,
    pub fetch: FetchConfig,
}

/// Outcome of one artifact download pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FetchReport {
    /// Artifacts written to disk.
    pub written: Vec<String>,
    /// Artifacts whose payload was too small to keep.
    pub dropped: Vec<String>,
}

/// How a resolve call ended.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResolveState {
    /// The directory already held enough entries; nothing was downloaded.
    Complete,
    /// Downloading was disabled, so the directory was not inspected.
    Unchecked,
    /// A download pass ran. The directory may still be incomplete.
    Fetched(FetchReport),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ResolveOutcome {
    pub path: PathBuf,
    #[serde(flatten)]
    pub state: ResolveState,
}

/// Pick the checkpoint location: explicit path, then the environment
/// override, then the framework default. An empty explicit path counts as
/// unset; a set but empty environment override means the current directory.
pub fn choose_location<F>(
    explicit: Option<&Path>,
    env_override: Option<OsString>,
    default: F,
) -> Result<PathBuf, ResolveError>
where
    F: FnOnce() -> Result<PathBuf, ResolveError>,
{
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_override {
        if value.is_empty() {
            return Ok(PathBuf::from("."));
        }
        return Ok(PathBuf::from(value));
    }
    default()
}

/// The framework hub cache: `$TORCH_HOME/hub`, else `<cache dir>/torch/hub`.
pub fn framework_hub_dir(torch_home: Option<OsString>) -> Option<PathBuf> {
    match torch_home.filter(|v| !v.is_empty()) {
        Some(home) => Some(PathBuf::from(home).join("hub")),
        None => dirs::cache_dir().map(|cache| cache.join("torch").join("hub")),
    }
}

/// Default checkpoint directory derived from the process environment.
pub fn default_location() -> Result<PathBuf, ResolveError> {
    framework_hub_dir(std::env::var_os(TORCH_HOME_ENV))
        .map(|hub| hub.join(CACHE_SUBDIR))
        .ok_or(ResolveError::NoCacheDir)
}

/// An existing regular file stands in for its parent directory.
pub fn directory_for(path: PathBuf) -> PathBuf {
    if path.is_file() {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    } else {
        path
    }
}

fn entry_count(dir: &Path) -> Result<usize, ResolveError> {
    let entries = fs::read_dir(dir).map_err(|e| ResolveError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(entries.count())
}

/// True when `dir` is missing or holds fewer than the expected entries.
pub fn needs_download(dir: &Path) -> Result<bool, ResolveError> {
    if !dir.exists() {
        return Ok(true);
    }
    Ok(entry_count(dir)? < MIN_ENTRIES)
}

/// Resolves checkpoint directories, downloading through `F` when needed.
pub struct Resolver<F: Fetch> {
    fetcher: F,
    endpoint: Endpoint,
}

impl Resolver<HttpFetcher> {
    /// Resolver backed by the blocking HTTP client.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolveError> {
        let fetcher = HttpFetcher::new(&config.fetch).map_err(ResolveError::Client)?;
        Ok(Resolver::new(fetcher, config.endpoint.clone()))
    }
}

impl<F: Fetch> Resolver<F> {
    pub fn new(fetcher: F, endpoint: Endpoint) -> Self {
        Resolver { fetcher, endpoint }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolve the checkpoint directory, consulting `NOUGAT_CHECKPOINT` and the
    /// framework cache when no explicit path is given.
    pub fn resolve(
        &self,
        explicit: Option<&Path>,
        allow_download: bool,
    ) -> Result<ResolveOutcome, ResolveError> {
        let location = choose_location(
            explicit,
            std::env::var_os(CHECKPOINT_ENV),
            default_location,
        )?;
        self.resolve_at(location, allow_download)
    }

    /// Resolve an already chosen location.
    pub fn resolve_at(
        &self,
        location: PathBuf,
        allow_download: bool,
    ) -> Result<ResolveOutcome, ResolveError> {
        let dir = directory_for(location);
        if !allow_download {
            return Ok(ResolveOutcome {
                path: dir,
                state: ResolveState::Unchecked,
            });
        }
        if !needs_download(&dir)? {
            tracing::debug!(path = %dir.display(), "checkpoint already present");
            return Ok(ResolveOutcome {
                path: dir,
                state: ResolveState::Complete,
            });
        }

        fs::create_dir_all(&dir).map_err(|e| ResolveError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        let report = self.populate(&dir)?;
        Ok(ResolveOutcome {
            path: dir,
            state: ResolveState::Fetched(report),
        })
    }

    /// Download every artifact into `dir`, overwriting existing files.
    pub fn populate(&self, dir: &Path) -> Result<FetchReport, ResolveError> {
        tracing::info!(
            "downloading nougat checkpoint version {} to path {}",
            self.endpoint.tag,
            dir.display()
        );
        let mut report = FetchReport::default();
        for file in ARTIFACTS {
            let url = self.endpoint.artifact_url(file);
            let payload = self
                .fetcher
                .fetch(&url, file)
                .map_err(|e| ResolveError::Fetch {
                    artifact: file.to_string(),
                    source: e,
                })?;

            if payload.len() <= MIN_PAYLOAD_BYTES {
                tracing::warn!(
                    artifact = file,
                    bytes = payload.len(),
                    "payload too small, not written"
                );
                report.dropped.push(file.to_string());
                continue;
            }

            let target = dir.join(file);
            fs::write(&target, &payload).map_err(|e| ResolveError::Write {
                path: target.clone(),
                source: e,
            })?;
            report.written.push(file.to_string());
        }
        Ok(report)
    }
}

/// Resolve the checkpoint with the default HTTP configuration.
pub fn get_checkpoint(
    explicit: Option<&Path>,
    allow_download: bool,
) -> Result<PathBuf, ResolveError> {
    let resolver = Resolver::from_config(&ResolverConfig::default())?;
    Ok(resolver.resolve(explicit, allow_download)?.path)
}

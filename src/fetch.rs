use std::io::{ErrorKind, Read};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::error::FetchError;

/// Upper bound on buffer space reserved up front from `Content-Length`.
const MAX_PREALLOC_BYTES: u64 = 64 << 20;

/// Configuration for artifact downloads.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Size of each streamed read from the response body.
    pub chunk_size: usize,
    /// Hide progress bars.
    pub quiet: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: None,
            chunk_size: 65_536,
            quiet: false,
        }
    }
}

/// Downloads one artifact fully into memory.
pub trait Fetch {
    /// `name` labels the transfer in progress output.
    fn fetch(&self, url: &str, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP(S) fetcher. Follows redirects, sends no credentials.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    chunk_size: usize,
    quiet: bool,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(FetchError::Client)?;
        Ok(HttpFetcher {
            client,
            chunk_size: config.chunk_size.max(1),
            quiet: config.quiet,
        })
    }

    fn progress_bar(&self, total: Option<u64>, name: &str) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{msg}: {bar:40.cyan/blue} {bytes}/{total_bytes} [{bytes_per_sec}, {eta}]",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{msg}: {spinner} {bytes} [{bytes_per_sec}]")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message(name.to_string());
        bar
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, name: &str) -> Result<Vec<u8>, FetchError> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = resp.content_length();
        let bar = self.progress_bar(total, name);
        // The header is untrusted; reserve at most a bounded amount and grow.
        let prealloc = total.map_or(0, |n| n.min(MAX_PREALLOC_BYTES));
        let mut body = Vec::with_capacity(usize::try_from(prealloc).unwrap_or(0));
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = match resp.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    bar.abandon();
                    return Err(FetchError::Read {
                        url: url.to_string(),
                        source: e,
                    });
                }
            };
            body.extend_from_slice(&chunk[..n]);
            bar.inc(n as u64);
        }
        bar.finish();

        tracing::debug!(url, bytes = body.len(), "downloaded artifact");
        Ok(body)
    }
}

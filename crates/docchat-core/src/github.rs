//! Content Fetcher: walks GitHub repositories through the contents API and downloads
//! documentation and source files as `.txt` into one flat, sanitized docs folder.
//!
//! Any non-success response aborts the whole run. Re-running overwrites same-named files.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::GithubConfig;
use crate::flatten::{flatten_dir, remove_empty_dirs, FlattenError};

const USER_AGENT: &str = concat!("docchat/", env!("CARGO_PKG_VERSION"));

/// One repository (and optional subdirectory) to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSource {
    pub owner: String,
    pub repo: String,
    /// Path inside the repository to start from. Empty means the repository root.
    #[serde(default)]
    pub path: String,
}

impl std::fmt::Display for RepoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}/{}", self.owner, self.repo)
        } else {
            write!(f, "{}/{}:{}", self.owner, self.repo, self.path)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: ItemKind,
    download_url: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ItemKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// The contents API answers a directory with an array and a file with a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Many(Vec<ContentItem>),
    One(ContentItem),
}

impl Listing {
    fn into_items(self) -> Vec<ContentItem> {
        match self {
            Listing::Many(items) => items,
            Listing::One(item) => vec![item],
        }
    }
}

/// What a fetch run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub files_written: usize,
    pub dirs_visited: usize,
    pub flattened: usize,
    pub removed_dirs: usize,
}

impl FetchReport {
    fn absorb(&mut self, other: &FetchReport) {
        self.files_written += other.files_written;
        self.dirs_visited += other.dirs_visited;
        self.flattened += other.flattened;
        self.removed_dirs += other.removed_dirs;
    }
}

/// GitHub contents API client.
#[derive(Debug, Clone)]
pub struct GithubFetcher {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
    extensions: Vec<String>,
    max_depth: usize,
}

impl GithubFetcher {
    /// Create a fetcher for the API at `api_url` (e.g. `https://api.github.com`).
    /// Requests are sent with `Authorization: Bearer <token>` when a token is given.
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self, FetchError> {
        let api_url = Url::parse(api_url)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;
        let defaults = GithubConfig::default();
        Ok(Self {
            client,
            api_url,
            token,
            extensions: defaults.extensions,
            max_depth: defaults.max_depth,
        })
    }

    /// Create from the `[github]` config section.
    pub fn from_config(config: &GithubConfig, token: Option<String>) -> Result<Self, FetchError> {
        Ok(Self::new(&config.api_url, token)?
            .with_extensions(config.extensions.clone())
            .with_max_depth(config.max_depth))
    }

    /// Set the file suffixes to download (with or without the leading dot).
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fetch every source into `output`, one after another. Stops at the first failure.
    pub async fn fetch_all(
        &self,
        sources: &[RepoSource],
        output: &Path,
    ) -> Result<FetchReport, FetchError> {
        let mut total = FetchReport::default();
        for source in sources {
            let report = self.fetch_repo(source, output).await?;
            total.absorb(&report);
        }
        Ok(total)
    }

    /// Walk `source` and write matching files into `output`, then flatten and prune it.
    pub async fn fetch_repo(
        &self,
        source: &RepoSource,
        output: &Path,
    ) -> Result<FetchReport, FetchError> {
        tracing::info!("fetching {} into {}", source, output.display());
        let mut report = FetchReport::default();
        let mut pending = vec![(source.path.trim_matches('/').to_string(), output.to_path_buf(), 0usize)];

        while let Some((repo_path, out_dir, depth)) = pending.pop() {
            report.dirs_visited += 1;
            std::fs::create_dir_all(&out_dir).map_err(|e| FetchError::Io(out_dir.clone(), e))?;

            for item in self.list(source, &repo_path).await? {
                match item.kind {
                    ItemKind::File => {
                        let Some(file_name) = txt_name(&item.name, &self.extensions) else {
                            continue;
                        };
                        let Some(download_url) = item.download_url.as_deref() else {
                            tracing::warn!("no download url for {}, skipping", item.path);
                            continue;
                        };
                        let text = self.get_text(download_url).await?;
                        let dest = out_dir.join(file_name);
                        std::fs::write(&dest, text).map_err(|e| FetchError::Io(dest.clone(), e))?;
                        tracing::debug!("wrote {}", dest.display());
                        report.files_written += 1;
                    }
                    ItemKind::Dir => {
                        if depth + 1 > self.max_depth {
                            return Err(FetchError::DepthExceeded {
                                path: item.path,
                                max_depth: self.max_depth,
                            });
                        }
                        pending.push((item.path, out_dir.join(&item.name), depth + 1));
                    }
                    ItemKind::Other => {}
                }
            }
        }

        report.flattened = flatten_dir(output)?;
        report.removed_dirs = remove_empty_dirs(output)?;
        tracing::info!(
            "fetched {} file(s) from {} ({} dir(s) visited)",
            report.files_written,
            source,
            report.dirs_visited
        );
        Ok(report)
    }

    /// Contents API URL for `repo_path`. Each path segment is percent-encoded, so names
    /// containing `#`, `?` or spaces address the right entry.
    fn contents_url(&self, source: &RepoSource, repo_path: &str) -> Result<Url, FetchError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::NotABase(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["repos", source.owner.as_str(), source.repo.as_str(), "contents"])
            .extend(repo_path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn list(&self, source: &RepoSource, repo_path: &str) -> Result<Vec<ContentItem>, FetchError> {
        let url = self.contents_url(source, repo_path)?;
        let response = self.send(url.as_str()).await?;
        let listing: Listing = response.json().await?;
        Ok(listing.into_items())
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.send(url).await?.text().await?)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }
}

/// Output name for a repository file: same base name with a `.txt` extension,
/// or `None` when the suffix isn't one we download.
fn txt_name(name: &str, extensions: &[String]) -> Option<String> {
    let path = Path::new(name);
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !extensions.iter().any(|e| *e == ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(format!("{stem}.txt"))
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid GitHub API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("GitHub API URL {0} cannot take a path")]
    NotABase(String),
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("GET {url} returned {status}")]
    Http { url: String, status: StatusCode },
    #[error("io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("{path} is deeper than the limit of {max_depth} directories")]
    DepthExceeded { path: String, max_depth: usize },
    #[error("layout error: {0}")]
    Flatten(#[from] FlattenError),
}

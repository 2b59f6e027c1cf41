//! Streaming a single asset to disk.
//!
//! A download is skipped without any transfer when its URL was already
//! handled during this run, or when a file with the resolved name is already
//! present in the album directory. New files are written to a `.part` file
//! and renamed once the last chunk is on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::http::HttpClient;
use crate::stats::{DownloadStatsTracker, FileStats};

/// Trait for receiving download progress updates.
///
/// All methods have default no-op implementations.
pub trait DownloadProgress: Send + Sync {
    /// Called when a transfer starts. `size` is 0 if the server did not say.
    fn on_file_start(&self, _name: &str, _size: u64) {}

    /// Called for every received chunk.
    fn on_progress(&self, _name: &str, _bytes_delta: u64) {}

    /// Called when a file has been written completely.
    fn on_file_complete(&self, _name: &str, _stats: &FileStats) {}

    /// Called when a file is already on disk and no bytes are transferred.
    fn on_skip(&self, _name: &str) {}

    /// Called when a transfer fails. `name` is the URL if no file name was known yet.
    fn on_error(&self, _name: &str, _error: &str) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// What a single download request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The URL was already handled earlier in this run.
    AlreadySeen,
    /// A file with the resolved name already existed; nothing was transferred.
    AlreadyPresent(PathBuf),
    /// The file was transferred and written.
    Downloaded {
        /// Final path of the file.
        path: PathBuf,
        /// Transfer statistics.
        stats: FileStats,
    },
}

impl DownloadOutcome {
    /// Local path of the file, if this outcome refers to one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::AlreadySeen => None,
            Self::AlreadyPresent(path) | Self::Downloaded { path, .. } => Some(path),
        }
    }

    /// True if no bytes were transferred.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        !matches!(self, Self::Downloaded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UrlState {
    InFlight,
    Done,
}

/// Asset URLs handled during this run.
///
/// This is the only state shared between concurrent downloads. Claiming a
/// URL checks and inserts under one lock, so two tracks pointing at the same
/// asset never both transfer it.
#[derive(Debug, Default)]
pub struct SeenUrls {
    urls: Mutex<HashMap<String, UrlState>>,
}

impl SeenUrls {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UrlState>> {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `url` for this caller. Returns false if it was already claimed.
    pub fn claim(&self, url: &str) -> bool {
        let mut urls = self.lock();
        if urls.contains_key(url) {
            return false;
        }
        urls.insert(url.to_string(), UrlState::InFlight);
        true
    }

    /// Marks a claimed URL as handled.
    pub fn complete(&self, url: &str) {
        self.lock().insert(url.to_string(), UrlState::Done);
    }

    /// Drops a claim after a failed transfer.
    pub fn release(&self, url: &str) {
        let mut urls = self.lock();
        if urls.get(url) == Some(&UrlState::InFlight) {
            urls.remove(url);
        }
    }

    /// True if `url` has been handled completely.
    #[must_use]
    pub fn is_done(&self, url: &str) -> bool {
        self.lock().get(url) == Some(&UrlState::Done)
    }

    /// Number of URLs handled completely.
    #[must_use]
    pub fn done_count(&self) -> usize {
        self.lock().values().filter(|s| **s == UrlState::Done).count()
    }
}

/// Returns the `.part` file path for a given final path.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Extracts the `filename` parameter of a `content-disposition` value.
///
/// `filename*=UTF-8''...` takes precedence over plain `filename=`.
#[must_use]
pub fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';') {
        let Some((key, raw)) = param.trim().split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw
                    .split_once("''")
                    .map_or(raw, |(_charset, rest)| rest);
                let name = percent_decode(encoded.trim_matches('"'));
                if !name.is_empty() {
                    return Some(name);
                }
            }
            "filename" => {
                let unquoted = raw
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(raw);
                if !unquoted.is_empty() {
                    plain = Some(percent_decode(unquoted));
                }
            }
            _ => {}
        }
    }
    plain
}

/// Last path segment of `url`, percent-decoded.
#[must_use]
pub fn url_filename(url: &Url) -> Option<String> {
    url.path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(percent_decode)
}

/// Resolves the local file name for a response: header first, then URL.
#[must_use]
pub fn local_filename(headers: &HeaderMap, url: &Url) -> Option<String> {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
        .or_else(|| url_filename(url))
        .map(|name| name.replace(['/', '\\'], "_"))
        .filter(|name| !matches!(name.as_str(), "" | "." | ".."))
}

fn percent_decode(s: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(s.as_bytes())).into_owned()
}

/// Downloads assets into album directories.
pub struct Downloader<F: FileSystem = TokioFileSystem> {
    http: HttpClient,
    fs: F,
    seen: SeenUrls,
    /// Destination paths claimed in this run, keyed by their display form.
    targets: SeenUrls,
    progress: Arc<dyn DownloadProgress>,
}

impl Downloader<TokioFileSystem> {
    /// Creates a new downloader with the default file system.
    #[must_use]
    pub fn new(http: HttpClient, progress: Arc<dyn DownloadProgress>) -> Self {
        Self::with_fs(http, TokioFileSystem, progress)
    }
}

impl<F: FileSystem> Downloader<F> {
    /// Creates a new downloader with a custom file system implementation.
    #[must_use]
    pub fn with_fs(http: HttpClient, fs: F, progress: Arc<dyn DownloadProgress>) -> Self {
        Self {
            http,
            fs,
            seen: SeenUrls::new(),
            targets: SeenUrls::new(),
            progress,
        }
    }

    /// Returns the HTTP client.
    #[must_use]
    pub const fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Returns the file system in use.
    #[must_use]
    pub const fn fs(&self) -> &F {
        &self.fs
    }

    /// Returns the URLs handled so far in this run.
    #[must_use]
    pub const fn seen(&self) -> &SeenUrls {
        &self.seen
    }

    /// Downloads `url` into `output_dir`, unless it is already handled or present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] for network or status failures, [`Error::Io`]
    /// if the file cannot be written, and [`Error::Format`] if no file name
    /// can be derived. A failed URL is released so it is not treated as seen.
    pub async fn download_file(&self, url: &Url, output_dir: &Path) -> Result<DownloadOutcome> {
        if !self.seen.claim(url.as_str()) {
            log::debug!("{url} already handled in this run");
            return Ok(DownloadOutcome::AlreadySeen);
        }

        match self.fetch_to_disk(url, output_dir).await {
            Ok(outcome) => {
                self.seen.complete(url.as_str());
                Ok(outcome)
            }
            Err(e) => {
                self.seen.release(url.as_str());
                log::error!("Failed to download {url}: {e}");
                Err(e)
            }
        }
    }

    async fn fetch_to_disk(&self, url: &Url, output_dir: &Path) -> Result<DownloadOutcome> {
        let response = self
            .http
            .get(url)
            .await
            .inspect_err(|e| self.progress.on_error(url.as_str(), &e.to_string()))?;

        let name = local_filename(response.headers(), url)
            .ok_or_else(|| Error::format(url.as_str(), "cannot derive a file name"))
            .inspect_err(|e| self.progress.on_error(url.as_str(), &e.to_string()))?;
        let path = output_dir.join(&name);

        // Distinct URLs may resolve to one file; only the first claimant writes it.
        let target = path.to_string_lossy().into_owned();
        if !self.targets.claim(&target) {
            log::info!("{name} is handled by another track in this run, skipping");
            self.progress.on_skip(&name);
            return Ok(DownloadOutcome::AlreadySeen);
        }

        let result = self.store(response, url, &name, path).await;
        if result.is_ok() {
            self.targets.complete(&target);
        } else {
            self.targets.release(&target);
        }
        result
    }

    async fn store(
        &self,
        response: reqwest::Response,
        url: &Url,
        name: &str,
        path: PathBuf,
    ) -> Result<DownloadOutcome> {
        // Decided on headers alone; the body of an existing file is never read.
        if self.fs.file_exists(&path).await {
            log::info!("{name} already present, skipping");
            self.progress.on_skip(name);
            return Ok(DownloadOutcome::AlreadyPresent(path));
        }

        let total = response.content_length().unwrap_or(0);
        self.progress.on_file_start(name, total);

        let part = part_path(&path);
        let stats = match self.write_body(response, url, &part, name).await {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(rm) = self.fs.remove_file(&part).await {
                    log::debug!("Could not remove {}: {rm}", part.display());
                }
                self.progress.on_error(name, &e.to_string());
                return Err(e);
            }
        };
        self.fs
            .rename_file(&part, &path)
            .await
            .map_err(|e| Error::io(&path, e))
            .inspect_err(|e| self.progress.on_error(name, &e.to_string()))?;

        log::info!("Downloaded {name} ({} bytes)", stats.size);
        self.progress.on_file_complete(name, &stats);
        Ok(DownloadOutcome::Downloaded { path, stats })
    }

    async fn write_body(
        &self,
        mut response: reqwest::Response,
        url: &Url,
        part: &Path,
        name: &str,
    ) -> Result<FileStats> {
        let mut file = self
            .fs
            .create_file(part)
            .await
            .map_err(|e| Error::io(part, e))?;
        let tracker = DownloadStatsTracker::new();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::fetch(url.as_str(), e))?
        {
            file.write_all(&chunk).await.map_err(|e| Error::io(part, e))?;
            let len = chunk.len() as u64;
            tracker.record_bytes(len);
            self.progress.on_progress(name, len);
        }
        file.flush().await.map_err(|e| Error::io(part, e))?;
        file.sync_all().await.map_err(|e| Error::io(part, e))?;

        Ok(tracker.finish())
    }
}

//! Driving whole albums: discover, fetch every track, report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{StreamExt, stream};
use url::Url;

use crate::album::{expand_inputs, resolve_album_url};
use crate::config::{DownloadConfig, FetchMode};
use crate::download::{DownloadOutcome, DownloadProgress, Downloader};
use crate::error::Result;
use crate::fs::{FileSystem, TokioFileSystem};
use crate::http::HttpClient;
use crate::listing::Album;
use crate::stats::{SessionStats, SessionStatsBuilder};

/// Whether an album needed any transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumStatus {
    /// Every track was already on disk or already handled in this run.
    AlreadyComplete,
    /// At least one track was transferred.
    Fetched {
        /// File name of the last track that finished with a file.
        resume_point: Option<String>,
    },
}

/// Result of processing one album.
#[derive(Debug, Clone)]
pub struct AlbumReport {
    /// Album display name.
    pub name: String,
    /// Folder the tracks went to.
    pub output_dir: PathBuf,
    /// One outcome per track: listing order when sequential, completion order when fanned out.
    pub outcomes: Vec<DownloadOutcome>,
    /// Aggregate status.
    pub status: AlbumStatus,
}

impl AlbumReport {
    fn new(album: Album, outcomes: Vec<DownloadOutcome>) -> Self {
        let status = album_status(&outcomes);
        Self {
            name: album.name,
            output_dir: album.output_dir,
            outcomes,
            status,
        }
    }
}

/// Collapses per-track outcomes into the album status.
#[must_use]
pub fn album_status(outcomes: &[DownloadOutcome]) -> AlbumStatus {
    if outcomes.iter().all(DownloadOutcome::is_skipped) {
        return AlbumStatus::AlreadyComplete;
    }
    let resume_point = outcomes
        .iter()
        .rev()
        .find_map(DownloadOutcome::path)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned());
    AlbumStatus::Fetched { resume_point }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One report per album, in input order.
    pub albums: Vec<AlbumReport>,
    /// Aggregate transfer statistics.
    pub stats: SessionStats,
}

/// Runs albums one after another through the download pipeline.
pub struct Coordinator<F: FileSystem = TokioFileSystem> {
    downloader: Downloader<F>,
    config: DownloadConfig,
    root: PathBuf,
}

impl Coordinator<TokioFileSystem> {
    /// Creates a coordinator writing album folders under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: DownloadConfig,
        root: impl Into<PathBuf>,
        progress: Arc<dyn DownloadProgress>,
    ) -> Result<Self> {
        let http = HttpClient::new(&config)?;
        Ok(Self::with_downloader(
            Downloader::new(http, progress),
            config,
            root,
        ))
    }
}

impl<F: FileSystem> Coordinator<F> {
    /// Creates a coordinator around an existing downloader.
    #[must_use]
    pub fn with_downloader(
        downloader: Downloader<F>,
        config: DownloadConfig,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader,
            config,
            root: root.into(),
        }
    }

    /// Expands `inputs` and processes every album in order.
    ///
    /// `on_album` is called as soon as each album has been reported.
    ///
    /// # Errors
    ///
    /// Stops at the first album that fails and returns its error.
    pub async fn run<S, C>(&self, inputs: &[S], mut on_album: C) -> Result<RunSummary>
    where
        S: AsRef<str>,
        C: FnMut(&AlbumReport),
    {
        let identifiers = expand_inputs(inputs).await?;
        log::info!("{} album(s) to process", identifiers.len());

        let mut builder = SessionStatsBuilder::new();
        let mut albums = Vec::with_capacity(identifiers.len());
        for identifier in &identifiers {
            let report = self.process_album(identifier).await?;
            for outcome in &report.outcomes {
                match outcome {
                    DownloadOutcome::Downloaded { stats, .. } => builder.add_download(stats),
                    DownloadOutcome::AlreadyPresent(_) | DownloadOutcome::AlreadySeen => {
                        builder.add_skipped();
                    }
                }
            }
            on_album(&report);
            albums.push(report);
        }

        Ok(RunSummary {
            albums,
            stats: builder.build(),
        })
    }

    /// Discovers one album and fetches all of its tracks.
    ///
    /// # Errors
    ///
    /// Returns the first discovery or track error.
    pub async fn process_album(&self, identifier: &str) -> Result<AlbumReport> {
        let url = resolve_album_url(identifier, &self.config.base_url)?;
        let album = self.downloader.fetch_album(&url, &self.root).await?;
        log::info!(
            "Fetching {} track(s) of {} ({:?})",
            album.tracks.len(),
            album.name,
            self.config.mode
        );

        let outcomes = match self.config.mode {
            FetchMode::Sequential => self.fetch_sequential(&album).await?,
            FetchMode::FanOut => self.fetch_fan_out(&album).await?,
        };
        Ok(AlbumReport::new(album, outcomes))
    }

    /// One track at a time in listing order; the first failure stops the album.
    async fn fetch_sequential(&self, album: &Album) -> Result<Vec<DownloadOutcome>> {
        let mut outcomes = Vec::with_capacity(album.tracks.len());
        for page in &album.tracks {
            outcomes.push(self.fetch_track(page, &album.output_dir).await?);
        }
        Ok(outcomes)
    }

    /// Every track at once; waits for all of them before reporting the first failure.
    async fn fetch_fan_out(&self, album: &Album) -> Result<Vec<DownloadOutcome>> {
        let results: Vec<Result<DownloadOutcome>> = stream::iter(&album.tracks)
            .map(|page| self.fetch_track(page, &album.output_dir))
            .buffer_unordered(album.tracks.len().max(1))
            .collect()
            .await;
        results.into_iter().collect()
    }

    async fn fetch_track(&self, page: &Url, output_dir: &Path) -> Result<DownloadOutcome> {
        self.downloader
            .resolve_track(page, output_dir, self.config.prefer_flac)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::Error;
    use crate::stats::FileStats;
    use std::collections::BTreeSet;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloaded(name: &str) -> DownloadOutcome {
        DownloadOutcome::Downloaded {
            path: PathBuf::from("album").join(name),
            stats: FileStats {
                size: 1,
                elapsed: Duration::ZERO,
                average_speed: 0,
                peak_speed: 0,
            },
        }
    }

    #[test]
    fn all_skipped_is_already_complete() {
        let outcomes = vec![
            DownloadOutcome::AlreadyPresent(PathBuf::from("album/01.mp3")),
            DownloadOutcome::AlreadySeen,
        ];
        assert_eq!(album_status(&outcomes), AlbumStatus::AlreadyComplete);
        assert_eq!(album_status(&[]), AlbumStatus::AlreadyComplete);
    }

    #[test]
    fn resume_point_is_last_outcome_with_a_file() {
        let outcomes = vec![
            downloaded("01.mp3"),
            DownloadOutcome::AlreadyPresent(PathBuf::from("album/02.mp3")),
            DownloadOutcome::AlreadySeen,
        ];
        assert_eq!(
            album_status(&outcomes),
            AlbumStatus::Fetched {
                resume_point: Some("02.mp3".to_string())
            }
        );
    }

    /// Serves one album with `tracks` tracks, each with an MP3 and a FLAC asset.
    async fn mount_album(server: &MockServer, slug: &str, tracks: usize) {
        let rows: String = (1..=tracks)
            .map(|i| {
                format!(
                    r#"<tr><td class="playlistDownloadSong"><a href="/album/{slug}/{i:02}.html">get</a></td></tr>"#
                )
            })
            .collect();
        let listing = format!(
            r#"<h2>{slug}</h2><p align="left">Number of Files: {tracks}<br></p><table id="songlist">{rows}</table>"#
        );
        Mock::given(method("GET"))
            .and(path(format!("/album/{slug}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(server)
            .await;

        for i in 1..=tracks {
            let page = format!(
                r#"<a href="/files/{slug}/{i:02}.mp3"><span class="songDownloadLink">MP3</span></a>
                   <a href="/files/{slug}/{i:02}.flac"><span class="songDownloadLink">FLAC</span></a>"#
            );
            Mock::given(method("GET"))
                .and(path(format!("/album/{slug}/{i:02}.html")))
                .respond_with(ResponseTemplate::new(200).set_body_string(page))
                .mount(server)
                .await;
            for ext in ["mp3", "flac"] {
                Mock::given(method("GET"))
                    .and(path(format!("/files/{slug}/{i:02}.{ext}")))
                    .respond_with(
                        ResponseTemplate::new(200).set_body_string(format!("{slug}-{i}-{ext}")),
                    )
                    .mount(server)
                    .await;
            }
        }
    }

    fn coordinator(server: &MockServer, root: &Path, mode: FetchMode, prefer_flac: bool) -> Coordinator {
        let base = Url::parse(&format!("{}/album/", server.uri())).unwrap();
        let config = DownloadConfig::default()
            .with_base_url(base)
            .with_mode(mode)
            .with_prefer_flac(prefer_flac)
            .with_retry(RetryConfig::disabled());
        Coordinator::new(config, root, Arc::new(crate::NoProgress)).unwrap()
    }

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn files_in(dir: &Path) -> BTreeSet<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    async fn asset_requests(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path().starts_with("/files/"))
            .count()
    }

    #[tokio::test]
    async fn fan_out_downloads_every_track() {
        let server = MockServer::start().await;
        mount_album(&server, "chrono-trigger", 3).await;
        let root = TempDir::new().unwrap();

        let summary = coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["chrono-trigger"], |_| {})
            .await
            .unwrap();

        let album_dir = root.path().join("Chrono Trigger");
        assert_eq!(
            files_in(&album_dir),
            names(&["01.mp3", "02.mp3", "03.mp3"])
        );
        assert_eq!(
            std::fs::read_to_string(album_dir.join("02.mp3")).unwrap(),
            "chrono-trigger-2-mp3"
        );
        assert_eq!(summary.stats.files_downloaded, 3);
        assert!(matches!(
            summary.albums[0].status,
            AlbumStatus::Fetched { resume_point: Some(_) }
        ));
    }

    #[tokio::test]
    async fn sequential_and_fan_out_produce_same_files() {
        let server = MockServer::start().await;
        mount_album(&server, "mother-3", 4).await;
        let seq_root = TempDir::new().unwrap();
        let fan_root = TempDir::new().unwrap();

        let seq = coordinator(&server, seq_root.path(), FetchMode::Sequential, true)
            .run(&["mother-3"], |_| {})
            .await
            .unwrap();
        coordinator(&server, fan_root.path(), FetchMode::FanOut, true)
            .run(&["mother-3"], |_| {})
            .await
            .unwrap();

        let seq_files = files_in(&seq_root.path().join("Mother 3"));
        assert_eq!(seq_files, files_in(&fan_root.path().join("Mother 3")));
        assert!(seq_files.iter().all(|f| f.ends_with(".flac")));
        assert_eq!(
            seq.albums[0].status,
            AlbumStatus::Fetched {
                resume_point: Some("04.flac".to_string())
            }
        );
    }

    #[tokio::test]
    async fn second_run_transfers_nothing() {
        let server = MockServer::start().await;
        mount_album(&server, "earthbound", 2).await;
        let root = TempDir::new().unwrap();

        coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["earthbound"], |_| {})
            .await
            .unwrap();
        let first_requests = asset_requests(&server).await;
        let first_written = std::fs::metadata(root.path().join("Earthbound").join("01.mp3"))
            .unwrap()
            .modified()
            .unwrap();

        let mut reported = Vec::new();
        let summary = coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["earthbound"], |r| reported.push(r.status.clone()))
            .await
            .unwrap();

        assert_eq!(reported, vec![AlbumStatus::AlreadyComplete]);
        assert_eq!(summary.stats.files_downloaded, 0);
        assert_eq!(summary.stats.files_skipped, 2);
        assert_eq!(summary.stats.total_bytes, 0);
        // Headers are requested again to learn the file name, but no file is rewritten.
        assert_eq!(asset_requests(&server).await, first_requests * 2);
        let second_written = std::fs::metadata(root.path().join("Earthbound").join("01.mp3"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(first_written, second_written);
    }

    #[tokio::test]
    async fn shared_asset_is_fetched_once_across_rows() {
        let server = MockServer::start().await;
        let listing = r#"<p align="left">Number of Files: 2</p><table id="songlist">
            <tr><td class="playlistDownloadSong"><a href="/album/dup/a.html">a</a></td></tr>
            <tr><td class="playlistDownloadSong"><a href="/album/dup/b.html">b</a></td></tr></table>"#;
        Mock::given(method("GET"))
            .and(path("/album/dup"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing))
            .mount(&server)
            .await;
        for page in ["a", "b"] {
            Mock::given(method("GET"))
                .and(path(format!("/album/dup/{page}.html")))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"<a href="/files/same.mp3"><span class="songDownloadLink">MP3</span></a>"#,
                ))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/files/same.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("once"))
            .expect(1)
            .mount(&server)
            .await;

        let root = TempDir::new().unwrap();
        let summary = coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["dup"], |_| {})
            .await
            .unwrap();

        assert_eq!(summary.stats.files_downloaded, 1);
        assert_eq!(summary.stats.files_skipped, 1);
        assert_eq!(files_in(&root.path().join("Dup")), names(&["same.mp3"]));
    }

    #[tokio::test]
    async fn fan_out_failure_fails_album_after_siblings_finish() {
        let server = MockServer::start().await;
        mount_album(&server, "broken", 3).await;
        Mock::given(method("GET"))
            .and(path("/album/broken/02.html"))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        let root = TempDir::new().unwrap();

        let err = coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["broken"], |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch { ref url, .. } if url.ends_with("/album/broken/02.html")));
        assert_eq!(
            files_in(&root.path().join("Broken")),
            names(&["01.mp3", "03.mp3"])
        );
    }

    #[tokio::test]
    async fn sequential_failure_stops_remaining_tracks() {
        let server = MockServer::start().await;
        mount_album(&server, "halted", 3).await;
        Mock::given(method("GET"))
            .and(path("/album/halted/02.html"))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(1)
            .mount(&server)
            .await;
        let root = TempDir::new().unwrap();

        let result = coordinator(&server, root.path(), FetchMode::Sequential, false)
            .run(&["halted"], |_| {})
            .await;

        assert!(result.is_err());
        assert_eq!(
            files_in(&root.path().join("Halted")),
            names(&["01.mp3"])
        );
    }

    #[tokio::test]
    async fn failing_album_aborts_the_run() {
        let server = MockServer::start().await;
        mount_album(&server, "second", 1).await;
        let root = TempDir::new().unwrap();

        let mut seen = Vec::new();
        let result = coordinator(&server, root.path(), FetchMode::FanOut, false)
            .run(&["missing", "second"], |r| seen.push(r.name.clone()))
            .await;

        assert!(matches!(result, Err(Error::Fetch { .. })));
        assert!(seen.is_empty());
        assert!(!root.path().join("Second").exists());
    }
}

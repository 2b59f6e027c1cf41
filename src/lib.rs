//! ripvgm - A library for downloading soundtrack albums from KHInsider.
//!
//! An input (album URL, bare album name, or a file listing either) expands to
//! album listing pages; every listing row leads to a track download page;
//! every download page yields one asset that is streamed to disk. Files that
//! already exist are never fetched again, and an asset reachable from several
//! rows is transferred once per run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ripvgm::{Coordinator, DownloadConfig, FetchMode, NoProgress};
//!
//! # async fn example() -> ripvgm::Result<()> {
//! let config = DownloadConfig::default()
//!     .with_prefer_flac(true)
//!     .with_mode(FetchMode::Sequential);
//! let coordinator = Coordinator::new(config, ".", Arc::new(NoProgress))?;
//!
//! let summary = coordinator
//!     .run(&["final-fantasy-vii"], |album| println!("{}: {:?}", album.name, album.status))
//!     .await?;
//! println!("Downloaded {} files", summary.stats.files_downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod album;
pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod html;
pub mod http;
pub mod listing;
pub mod retry;
pub mod stats;
pub mod track;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types for convenience
pub use album::{InputToken, album_display_name, expand_inputs, resolve_album_url};
pub use config::{AppConfig, DownloadConfig, FetchMode, PathConfig, RetryConfig};
pub use coordinator::{AlbumReport, AlbumStatus, Coordinator, RunSummary};
pub use download::{DownloadOutcome, DownloadProgress, Downloader, NoProgress, SeenUrls};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration};
pub use fs::{FileSystem, TokioFileSystem};
pub use http::HttpClient;
pub use listing::Album;
pub use stats::{FileStats, SessionStats};

//! Fetching an album listing page into an [`Album`].

use std::path::{Path, PathBuf};

use url::Url;

use crate::album::album_display_name;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::html::parse_listing_page;

/// One album as discovered from its listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    /// Canonical listing URL.
    pub url: Url,
    /// Display name, also the output folder name.
    pub name: String,
    /// Folder the tracks are written to.
    pub output_dir: PathBuf,
    /// Track count declared on the page.
    pub track_count: u32,
    /// Download page of every track, in listing order.
    pub tracks: Vec<Url>,
}

/// Picks one link per track row: the lexicographically smallest `href`.
///
/// # Errors
///
/// Returns [`Error::Format`] if a row carries no link or a link does not
/// resolve against `album_url`.
pub fn track_refs(rows: &[Vec<String>], album_url: &Url) -> Result<Vec<Url>> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let href = row.iter().min().ok_or_else(|| {
                Error::format(album_url.as_str(), format!("track row {} has no link", i + 1))
            })?;
            album_url.join(href).map_err(|e| {
                Error::format(album_url.as_str(), format!("bad track link {href:?}: {e}"))
            })
        })
        .collect()
}

impl<F: FileSystem> Downloader<F> {
    /// Creates the album folder under `root`, then fetches and parses the listing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the folder cannot be created, [`Error::Fetch`]
    /// if the page cannot be fetched and [`Error::Format`] if the page lacks
    /// the track count or has unusable rows.
    pub async fn fetch_album(&self, album_url: &Url, root: &Path) -> Result<Album> {
        let name = album_display_name(album_url);
        let output_dir = root.join(&name);
        self.fs()
            .create_dir_all(&output_dir)
            .await
            .map_err(|e| Error::io(&output_dir, e))?;

        let html = self.http().get_text(album_url).await?;
        log::info!("Obtained listing {album_url}");
        let page = parse_listing_page(&html, album_url.as_str())?;
        if let Some(title) = &page.title {
            log::info!("Album: {title}");
        }

        let tracks = track_refs(&page.track_rows, album_url)?;
        log::info!("{} songs available", page.track_count);
        if usize::try_from(page.track_count).ok() != Some(tracks.len()) {
            log::warn!(
                "{album_url} declares {} files but lists {} tracks",
                page.track_count,
                tracks.len()
            );
        }

        Ok(Album {
            url: album_url.clone(),
            name,
            output_dir,
            track_count: page.track_count,
            tracks,
        })
    }
}

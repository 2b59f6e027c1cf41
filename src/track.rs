//! Resolving a track's download page to the one asset to fetch.

use std::collections::BTreeMap;
use std::path::Path;

use url::Url;

use crate::download::{DownloadOutcome, Downloader};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::html::parse_download_page;

/// Lossless format picked when FLAC is preferred.
pub const LOSSLESS: &str = "flac";
/// Compressed format every track is expected to offer.
pub const COMPRESSED: &str = "mp3";

/// Asset URLs of one track keyed by lower-cased file extension.
pub type AssetCandidates = BTreeMap<String, Url>;

/// Resolves asset links against the page and keys them by extension.
///
/// Links that do not resolve to a URL or whose path has no extension are
/// ignored. When two links share an extension the later one wins.
#[must_use]
pub fn collect_candidates(links: &[String], page_url: &Url) -> AssetCandidates {
    links
        .iter()
        .filter_map(|href| match page_url.join(href) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Ignoring asset link {href:?} on {page_url}: {e}");
                None
            }
        })
        .filter_map(|url| {
            let ext = extension(&url)?;
            Some((ext, url))
        })
        .collect()
}

fn extension(url: &Url) -> Option<String> {
    let (_, ext) = url.path().rsplit_once('.')?;
    (!ext.is_empty() && !ext.contains('/')).then(|| ext.to_ascii_lowercase())
}

/// Picks FLAC if preferred and offered, MP3 otherwise.
///
/// # Errors
///
/// Returns [`Error::Format`] naming `page_url` if neither format is offered.
pub fn select_asset<'a>(
    candidates: &'a AssetCandidates,
    prefer_flac: bool,
    page_url: &Url,
) -> Result<&'a Url> {
    let lossless = prefer_flac.then(|| candidates.get(LOSSLESS)).flatten();
    lossless
        .or_else(|| candidates.get(COMPRESSED))
        .ok_or_else(|| {
            let offered: Vec<_> = candidates.keys().map(String::as_str).collect();
            Error::format(
                page_url.as_str(),
                format!("no usable asset (offered: [{}])", offered.join(", ")),
            )
        })
}

impl<F: FileSystem> Downloader<F> {
    /// Fetches a track's download page and downloads its preferred asset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the page or asset cannot be fetched and
    /// [`Error::Format`] if the page offers no usable asset.
    pub async fn resolve_track(
        &self,
        page_url: &Url,
        output_dir: &Path,
        prefer_flac: bool,
    ) -> Result<DownloadOutcome> {
        let html = self.http().get_text(page_url).await?;
        let page = parse_download_page(&html)?;
        let candidates = collect_candidates(&page.asset_links, page_url);
        let asset = select_asset(&candidates, prefer_flac, page_url)?;
        log::debug!("{page_url} -> {asset}");
        self.download_file(asset, output_dir).await
    }
}

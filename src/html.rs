//! Typed extraction of the two page kinds the catalog serves.
//!
//! Each page kind has one function that turns raw HTML into a plain record,
//! so the page contracts can be tested against fixed fixture documents
//! without touching the network.

use scraper::{ElementRef, Html, Selector};

use crate::error::{Error, Result};

const TITLE: &str = "h2";
const INFO_BLOCK: &str = r#"p[align="left"]"#;
const TRACK_ROW: &str = "#songlist .playlistDownloadSong";
const ROW_LINK: &str = "a[href]";
const ASSET_MARKER: &str = ".songDownloadLink";

const TRACK_COUNT_LABEL: &str = "Number of Files";

/// Fields read from an album listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Album title as shown on the page.
    pub title: Option<String>,
    /// Track count declared in the info block.
    pub track_count: u32,
    /// Per track row, every link `href` in document order.
    pub track_rows: Vec<Vec<String>>,
}

/// Fields read from a track download page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPage {
    /// `href` of the link around every asset marker, in document order.
    pub asset_links: Vec<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("invalid selector {css:?}: {e:?}")))
}

/// Parses an album listing page.
///
/// # Errors
///
/// Returns [`Error::Format`] (attributed to `page_url`) if the info block or
/// its "Number of Files" line is missing or not a number, and
/// [`Error::Parse`] if a selector cannot be compiled.
pub fn parse_listing_page(html: &str, page_url: &str) -> Result<ListingPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector(TITLE)?)
        .next()
        .map(|h| collapse_whitespace(&h.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let info = document
        .select(&selector(INFO_BLOCK)?)
        .next()
        .ok_or_else(|| Error::format(page_url, "album info block not found"))?;
    let track_count = declared_track_count(&info.text().collect::<String>())
        .ok_or_else(|| Error::format(page_url, format!("no numeric \"{TRACK_COUNT_LABEL}\" field")))?;

    let link = selector(ROW_LINK)?;
    let track_rows = document
        .select(&selector(TRACK_ROW)?)
        .map(|row| {
            row.select(&link)
                .filter_map(|a| a.value().attr("href"))
                .map(str::to_string)
                .collect()
        })
        .collect();

    Ok(ListingPage {
        title,
        track_count,
        track_rows,
    })
}

/// Parses a track download page.
///
/// # Errors
///
/// Returns [`Error::Parse`] if a selector cannot be compiled.
pub fn parse_download_page(html: &str) -> Result<DownloadPage> {
    let document = Html::parse_document(html);
    let asset_links = document
        .select(&selector(ASSET_MARKER)?)
        .filter_map(enclosing_link)
        .map(str::to_string)
        .collect();
    Ok(DownloadPage { asset_links })
}

/// Finds the `href` of the nearest `<a>` around `element`, itself included.
fn enclosing_link(element: ElementRef<'_>) -> Option<&str> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

/// Reads the integer from the first info line carrying the track count label.
fn declared_track_count(text: &str) -> Option<u32> {
    let line = text.lines().find(|line| line.contains(TRACK_COUNT_LABEL))?;
    line.rsplit(':').next()?.trim().parse().ok()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

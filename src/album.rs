//! Turning command-line inputs into album URLs.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};
use crate::format::display_name;

/// One positional input as given by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputToken {
    /// A full `http://` or `https://` album URL.
    Url(String),
    /// A catalog slug such as `final-fantasy-vii`.
    Name(String),
    /// A file whose whitespace-separated contents are further album identifiers.
    File(PathBuf),
}

fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

impl InputToken {
    /// Classifies a raw input: URL first, then existing file, else bare name.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        if is_url(raw) {
            Self::Url(raw.to_string())
        } else if Path::new(raw).is_file() {
            Self::File(PathBuf::from(raw))
        } else {
            Self::Name(raw.to_string())
        }
    }
}

/// Expands inputs into a flat, ordered list of album identifiers.
///
/// File contents are inlined in place; identifiers read from a file are
/// not expanded again.
///
/// # Errors
///
/// Returns [`Error::Io`] if a token file cannot be read.
pub async fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<String>> {
    let mut identifiers = Vec::new();
    for raw in inputs {
        match InputToken::classify(raw.as_ref()) {
            InputToken::Url(s) | InputToken::Name(s) => identifiers.push(s),
            InputToken::File(path) => {
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|e| Error::io(&path, e))?;
                let before = identifiers.len();
                identifiers.extend(contents.split_whitespace().map(str::to_string));
                log::info!(
                    "Read {} album(s) from {}",
                    identifiers.len() - before,
                    path.display()
                );
            }
        }
    }
    Ok(identifiers)
}

/// Canonical album URL for an identifier: URLs as given, names joined onto `base`.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the identifier does not form a valid URL.
pub fn resolve_album_url(identifier: &str, base: &Url) -> Result<Url> {
    let parsed = if is_url(identifier) {
        Url::parse(identifier)
    } else {
        base.join(identifier)
    };
    parsed.map_err(|source| Error::InvalidUrl {
        input: identifier.to_string(),
        source,
    })
}

/// Folder name for an album: last path segment, dashes to spaces, title-cased.
#[must_use]
pub fn album_display_name(url: &Url) -> String {
    let slug = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or_default();
    let slug = urlencoding::decode(slug)
        .map_or_else(|_| slug.to_string(), |s| s.into_owned())
        .replace(['/', '\\'], "_");
    let name = display_name(&slug);
    if matches!(name.trim(), "" | "." | "..") {
        url.host_str().unwrap_or("album").to_string()
    } else {
        name
    }
}

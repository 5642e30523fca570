//! Latest-dataset discovery from the SEC directory listing page.
//!
//! The listing is an HTML table whose first cell holding a link points at the
//! newest quarterly archive. The scan is positional: it takes the first anchor
//! found inside a table cell and does not look at link text or dates. A change
//! to the page layout can therefore make it pick the wrong file.

use reqwest::Url;
use tracing::debug;

use crate::error::InsiderError;
use crate::fetch::FetchClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    SeekingCell,
    SeekingAnchor,
    Done(String),
}

/// Incremental scanner over listing markup. Feed it text with [`feed`] until
/// [`href`] returns a value; input after that point is ignored.
///
/// [`feed`]: ListingScanner::feed
/// [`href`]: ListingScanner::href
#[derive(Debug, Clone)]
pub struct ListingScanner {
    state: ScanState,
    pending: String,
}

impl Default for ListingScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::SeekingCell,
            pending: String::new(),
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn href(&self) -> Option<&str> {
        match &self.state {
            ScanState::Done(href) => Some(href),
            _ => None,
        }
    }

    pub fn feed(&mut self, text: &str) {
        if matches!(self.state, ScanState::Done(_)) {
            return;
        }
        self.pending.push_str(text);
        let buffer = std::mem::take(&mut self.pending);
        let mut rest = buffer.as_str();

        while let Some(open) = rest.find('<') {
            let after_open = &rest[open + 1..];
            if after_open.starts_with("!--") {
                match after_open.find("-->") {
                    Some(end) => {
                        rest = &after_open[end + 3..];
                        continue;
                    }
                    None => {
                        self.pending = rest[open..].to_string();
                        return;
                    }
                }
            }
            let Some(close) = after_open.find('>') else {
                // tag continues in the next chunk
                self.pending = rest[open..].to_string();
                return;
            };
            self.on_tag(&after_open[..close]);
            if matches!(self.state, ScanState::Done(_)) {
                return;
            }
            rest = &after_open[close + 1..];
        }
    }

    fn on_tag(&mut self, body: &str) {
        let body = body.trim();
        let (closing, body) = match body.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let name_end = body
            .find(|ch: char| ch.is_whitespace() || ch == '/')
            .unwrap_or(body.len());
        let name = body[..name_end].to_ascii_lowercase();

        self.state = match (&self.state, closing, name.as_str()) {
            (ScanState::SeekingCell, false, "td") => ScanState::SeekingAnchor,
            (ScanState::SeekingAnchor, true, "td" | "tr" | "table") => ScanState::SeekingCell,
            (ScanState::SeekingAnchor, false, "a") => match attribute(&body[name_end..], "href") {
                Some(href) if !href.is_empty() => ScanState::Done(href),
                _ => ScanState::SeekingAnchor,
            },
            (state, _, _) => state.clone(),
        };
    }
}

/// Value of attribute `name` inside a tag body, with `&amp;` decoded.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(name) {
        let start = search_from + found;
        search_from = start + name.len();
        let preceded_ok = start == 0
            || lower[..start]
                .chars()
                .last()
                .map(char::is_whitespace)
                .unwrap_or(true);
        let after = attrs[start + name.len()..].trim_start();
        let Some(value) = after.strip_prefix('=') else {
            continue;
        };
        if !preceded_ok {
            continue;
        }
        let value = value.trim_start();
        let raw = match value.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let inner = &value[1..];
                &inner[..inner.find(quote).unwrap_or(inner.len())]
            }
            _ => {
                let end = value
                    .find(|ch: char| ch.is_whitespace() || ch == '>')
                    .unwrap_or(value.len());
                &value[..end]
            }
        };
        return Some(raw.replace("&amp;", "&"));
    }
    None
}

/// Runs a fresh scanner over a complete document.
pub fn first_cell_anchor(html: &str) -> Option<String> {
    let mut scanner = ListingScanner::new();
    scanner.feed(html);
    scanner.href().map(str::to_string)
}

/// Fetches the listing at `listing_url` and returns the file name of the
/// first linked dataset, e.g. `2024q3_form345.zip`.
pub fn resolve_latest_dataset_name<C: FetchClient + ?Sized>(
    client: &C,
    listing_url: &str,
) -> Result<String, InsiderError> {
    let failure = |reason: String| InsiderError::ListingResolution {
        url: listing_url.to_string(),
        reason,
    };

    let html = client.fetch_text(listing_url)?;
    let href = first_cell_anchor(&html)
        .ok_or_else(|| failure("no link found inside a table cell".to_string()))?;
    let base = Url::parse(listing_url).map_err(|err| failure(err.to_string()))?;
    let resolved = base.join(&href).map_err(|err| failure(err.to_string()))?;
    debug!("listing link resolved to {resolved}");

    resolved
        .path_segments()
        .and_then(|segments| segments.last().map(str::to_string))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| failure(format!("link {resolved} has no file name")))
}

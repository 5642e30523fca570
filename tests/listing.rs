mod common;

use assert_matches::assert_matches;

use edgar_insiders::error::InsiderError;
use edgar_insiders::listing::{
    ListingScanner, ScanState, first_cell_anchor, resolve_latest_dataset_name,
};

use common::FakeClient;

const LISTING_URL: &str = "https://www.sec.gov/files/structureddata/data/insider-transactions-data-sets/";

const LISTING: &str = r#"<html><body>
<nav><a href="/index.htm">Home</a></nav>
<!-- <td><a href="/commented.zip">x</a></td> -->
<table class="list">
  <tr><th>File</th><th>Size</th></tr>
  <tr><td class="name"><a HREF="/files/structureddata/data/insider-transactions-data-sets/2024q3_form345.zip">2024 Q3</a></td><td>12 MB</td></tr>
  <tr><td><a href="/files/structureddata/data/insider-transactions-data-sets/2024q2_form345.zip">2024 Q2</a></td></tr>
</table></body></html>"#;

#[test]
fn first_linked_cell_wins() {
    assert_eq!(
        first_cell_anchor(LISTING).as_deref(),
        Some("/files/structureddata/data/insider-transactions-data-sets/2024q3_form345.zip")
    );
}

#[test]
fn scanner_accepts_arbitrary_chunks() {
    for size in [1, 3, 7, 64] {
        let mut scanner = ListingScanner::new();
        let chars: Vec<char> = LISTING.chars().collect();
        for chunk in chars.chunks(size) {
            scanner.feed(&chunk.iter().collect::<String>());
        }
        assert_eq!(
            scanner.href(),
            Some("/files/structureddata/data/insider-transactions-data-sets/2024q3_form345.zip"),
            "chunk size {size}"
        );
    }
}

#[test]
fn empty_cell_does_not_stop_the_scan() {
    let html = "<table><tr><td></td><td>text</td></tr><tr><td><a href='b.zip'>b</a></td></tr></table>";
    let mut scanner = ListingScanner::new();
    scanner.feed(html);
    assert_eq!(scanner.state(), &ScanState::Done("b.zip".to_string()));
}

#[test]
fn latest_name_is_last_path_segment() {
    let client = FakeClient::default().with(LISTING_URL, LISTING);
    let name = resolve_latest_dataset_name(&client, LISTING_URL).unwrap();
    assert_eq!(name, "2024q3_form345.zip");
}

#[test]
fn relative_links_resolve_against_listing() {
    let client = FakeClient::default().with(
        LISTING_URL,
        "<table><tr><td><a href=\"2023q4_form345.zip\">Q4</a></td></tr></table>",
    );
    let name = resolve_latest_dataset_name(&client, LISTING_URL).unwrap();
    assert_eq!(name, "2023q4_form345.zip");
}

#[test]
fn page_without_cells_fails() {
    let client = FakeClient::default().with(LISTING_URL, "<p><a href=\"x.zip\">x</a></p>");
    assert_matches!(
        resolve_latest_dataset_name(&client, LISTING_URL),
        Err(InsiderError::ListingResolution { .. })
    );
}

#[test]
fn missing_listing_is_not_found() {
    let client = FakeClient::default();
    assert_matches!(
        resolve_latest_dataset_name(&client, LISTING_URL),
        Err(InsiderError::NotFound(_))
    );
}

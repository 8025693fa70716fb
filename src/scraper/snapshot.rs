use crate::domain::listing::Listing;
use crate::scraper::{PageSource, Query, ScraperError};
use tracing::{debug, info, warn};

/// Everything a query returned at one point in time.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub listings: Vec<Listing>,
    pub pages_fetched: usize,
    /// Records dropped because they could not be turned into a `Listing`.
    pub skipped: usize,
    /// The page ceiling was hit before the source ran dry.
    pub truncated: bool,
}

/// Walks every page of `query` and converts the payloads into listings.
///
/// Any failed page fails the whole snapshot: a partial snapshot would make
/// still-listed estates look removed. Hitting `max_pages` just stops the walk.
pub fn build_snapshot(
    source: &dyn PageSource,
    query: &Query,
    max_pages: usize,
    now: i64,
) -> Result<Snapshot, ScraperError> {
    let mut snapshot = Snapshot::default();
    let mut token = None;

    loop {
        if snapshot.pages_fetched >= max_pages {
            warn!(query = %query.url, max_pages, "page ceiling reached, stopping pagination");
            snapshot.truncated = true;
            break;
        }

        let page = source.fetch_page(query, token)?;
        snapshot.pages_fetched += 1;

        if page.records.is_empty() {
            debug!(query = %query.url, page = snapshot.pages_fetched, "empty page, stopping");
            break;
        }

        for raw in &page.records {
            match Listing::from_raw(raw, now) {
                Ok(listing) => snapshot.listings.push(listing),
                Err(e) => {
                    warn!(query = %query.url, error = %e, "skipping record");
                    snapshot.skipped += 1;
                }
            }
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    info!(
        query = %query.url,
        pages = snapshot.pages_fetched,
        listings = snapshot.listings.len(),
        skipped = snapshot.skipped,
        "snapshot complete"
    );
    Ok(snapshot)
}

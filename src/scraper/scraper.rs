// scraper.rs
use crate::scraper::models::{
    ApiVersion, Page, PageToken, Query, RawListing, V1Envelope, V2Envelope,
};
use crate::scraper::ScraperError;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Without a browser UA the API sometimes returns prices with a slight offset.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

const V1_PAGING_PARAMS: [&str; 2] = ["limit", "offset"];
const V2_PAGING_PARAMS: [&str; 2] = ["page", "per_page"];

/// Produces one page of raw listings at a time for a query.
///
/// `token` is `None` for the first page; a page with `next == None` is the last.
pub trait PageSource {
    fn fetch_page(&self, query: &Query, token: Option<PageToken>) -> Result<Page, ScraperError>;
}

pub struct SrealityScraper {
    client: Client,
    page_size: u64,
}

impl SrealityScraper {
    pub fn new(timeout: Duration, page_size: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        Ok(Self {
            client,
            page_size: page_size.max(1),
        })
    }

    fn get_text(&self, url: &Url) -> Result<String, ScraperError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScraperError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        resp.text().map_err(|e| ScraperError::Network(e.to_string()))
    }
}

impl PageSource for SrealityScraper {
    fn fetch_page(&self, query: &Query, token: Option<PageToken>) -> Result<Page, ScraperError> {
        match query.api {
            ApiVersion::V1 => {
                let offset = match token {
                    None => 0,
                    Some(PageToken::Offset(o)) => o,
                    Some(other) => {
                        return Err(ScraperError::UnexpectedShape(format!(
                            "v1 query cannot continue from {other:?}"
                        )))
                    }
                };
                let url = paged_url(
                    &query.url,
                    &V1_PAGING_PARAMS,
                    &[("limit", self.page_size), ("offset", offset)],
                )?;
                debug!(url = %url, "fetching v1 page");
                parse_v1_page(&self.get_text(&url)?, offset, self.page_size)
            }
            ApiVersion::V2 => {
                let page = match token {
                    None => 1,
                    Some(PageToken::Page(p)) => p,
                    Some(other) => {
                        return Err(ScraperError::UnexpectedShape(format!(
                            "v2 query cannot continue from {other:?}"
                        )))
                    }
                };
                let url = paged_url(
                    &query.url,
                    &V2_PAGING_PARAMS,
                    &[("per_page", self.page_size), ("page", page)],
                )?;
                debug!(url = %url, "fetching v2 page");
                parse_v2_page(&self.get_text(&url)?, page, self.page_size)
            }
        }
    }
}

/// Rebuilds `base` with its paging parameters replaced by `paging`.
pub(crate) fn paged_url(
    base: &str,
    drop: &[&str],
    paging: &[(&str, u64)],
) -> Result<Url, ScraperError> {
    let mut url = Url::parse(base).map_err(|e| ScraperError::InvalidUrl(format!("{base}: {e}")))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !drop.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        pairs.extend_pairs(kept);
        for (k, v) in paging {
            pairs.append_pair(k, &v.to_string());
        }
    }
    Ok(url)
}

pub(crate) fn parse_v1_page(body: &str, offset: u64, limit: u64) -> Result<Page, ScraperError> {
    let envelope: V1Envelope =
        serde_json::from_str(body).map_err(|e| ScraperError::JsonParse(e.to_string()))?;

    if envelope.results.is_empty() {
        return Ok(Page::default());
    }

    // the server's numbers are untrusted: an overflowing cursor ends the walk
    let next = match envelope.pagination {
        Some(p) if p.limit == 0 => None,
        Some(p) => p
            .offset
            .checked_add(p.limit)
            .filter(|end| *end < p.total)
            .map(PageToken::Offset),
        // no accounting; keep walking until an empty page
        None => offset
            .checked_add(limit.max(envelope.results.len() as u64))
            .map(PageToken::Offset),
    };

    Ok(Page {
        records: tag(envelope.results, ApiVersion::V1),
        next,
    })
}

pub(crate) fn parse_v2_page(body: &str, page: u64, per_page: u64) -> Result<Page, ScraperError> {
    let envelope: V2Envelope =
        serde_json::from_str(body).map_err(|e| ScraperError::JsonParse(e.to_string()))?;

    let estates = envelope.embedded.estates;
    if estates.is_empty() {
        return Ok(Page::default());
    }

    let page = envelope.page.unwrap_or(page);
    let per_page = envelope.per_page.unwrap_or(per_page);
    let next = match envelope.result_size {
        Some(total) if per_page == 0 || page.saturating_mul(per_page) >= total => None,
        _ => page.checked_add(1).map(PageToken::Page),
    };

    Ok(Page {
        records: tag(estates, ApiVersion::V2),
        next,
    })
}

fn tag(payloads: Vec<serde_json::Value>, api: ApiVersion) -> Vec<RawListing> {
    payloads
        .into_iter()
        .map(|payload| RawListing { api, payload })
        .collect()
}

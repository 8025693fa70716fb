pub mod models;
mod scraper;
mod scraper_error;
pub mod snapshot;

pub use models::{ApiVersion, Page, PageToken, Query, RawListing};
pub use scraper::{PageSource, SrealityScraper};
pub use scraper_error::ScraperError;
pub use snapshot::build_snapshot;

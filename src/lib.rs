pub mod dispatch;
pub mod download;
pub mod extract;
pub mod fetch;
pub mod format;
pub mod query;

mod error;

pub use dispatch::{describe_lookup, lookup_key, ContentKind};
pub use download::{DownloadSummary, DownloadUnit, Downloader, FsPersist, Persist};
pub use error::{DownloadError, ExtractError, FetchError, ScrapeError, UnitError};
pub use extract::{extract, Extraction, OutputFormat, Projection, ScrapedOutput, SelectionSpec};
pub use fetch::{Fetch, Fetched, Headers, HttpFetcher};
pub use format::format_output;
pub use query::HtmlParser;

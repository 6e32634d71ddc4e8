//! Crawl data model
//!
//! - [`FetchTask`]: what to retrieve and how
//! - [`FetchResult`]: the outcome of one attempt, with decoded content
//! - [`ExtractedRecord`]: fields pulled out of a page, headed for the sinks

mod headers;
mod record;
mod request;
mod result;

pub use headers::{load_header_file, parse_headers};
pub use record::{ExtractedRecord, RecordRow};
pub use request::{ContentKind, Cookie, FetchTask, RedirectAction, RedirectHook, RedirectInfo};
pub use result::{FetchError, FetchResult};

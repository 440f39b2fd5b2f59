// Source adapters and enrichment lookups. Every public fetch/lookup here is
// infallible: failures are logged and degrade to an empty result.

pub mod error;
pub mod http;
pub mod news;
pub mod portal;
pub mod primary_feed;
pub mod video;

pub use error::{Result, SourceError};
pub use http::build_http_client;
pub use news::NewsLookup;
pub use portal::{Extraction, Extractor, PortalAdapter};
pub use primary_feed::PrimaryFeedAdapter;
pub use video::VideoLookup;

//! Item metadata: typed records, wiki page parsing and a fetch-through
//! cache that never stores failures.

pub mod cache;
pub mod error;
pub mod parse;
pub mod record;
pub mod source;

pub use cache::MetadataCache;
pub use error::{FetchError, FetchResult, ParseError, ParseResult};
pub use parse::PageParser;
pub use record::{MetadataRecord, QualityTier};
pub use source::{MetadataSource, WikiSource};

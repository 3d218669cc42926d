use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::error::{FetchResult, ParseResult};
use crate::parse::PageParser;
use crate::record::MetadataRecord;
use crate::source::MetadataSource;

/// Fetch-through cache of item records.
///
/// Successful lookups are kept for the life of the cache; failures are not
/// stored, so a later call for the same item fetches again. Records are
/// inserted complete behind an `Arc`.
pub struct MetadataCache<S> {
    source: S,
    parser: PageParser,
    records: RwLock<HashMap<String, Arc<MetadataRecord>>>,
}

impl<S: MetadataSource> MetadataCache<S> {
    pub fn new(source: S) -> ParseResult<Self> {
        Ok(Self {
            source,
            parser: PageParser::new()?,
            records: RwLock::new(HashMap::new()),
        })
    }

    /// Cached record only, never fetches
    pub fn get(&self, name: &str) -> Option<Arc<MetadataRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(name).cloned()
    }

    /// Cached record, or fetch and parse the item page on a miss.
    ///
    /// Blocks for the duration of the fetch; callers on a latency-sensitive
    /// thread should run this on a worker.
    pub fn get_or_fetch(&self, name: &str) -> FetchResult<Arc<MetadataRecord>> {
        if let Some(record) = self.get(name) {
            debug!(item = name, "metadata cache hit");
            return Ok(record);
        }

        let page = self.source.fetch_page(name)?;
        let record = Arc::new(self.parser.parse(name, &page)?);

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        // A concurrent fetch of the same item may have landed first
        let stored = Arc::clone(records.entry(name.to_string()).or_insert(record));
        info!(item = name, title = %stored.title, cached = records.len(), "metadata fetched");
        Ok(stored)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::parse::tests::stub_page;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Serves a fixed page and counts calls
    struct StubSource {
        page: Option<String>,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn serving(page: Option<String>) -> Self {
            Self { page, calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MetadataSource for StubSource {
        fn fetch_page(&self, _name: &str) -> FetchResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.clone().ok_or(FetchError::Status(404))
        }
    }

    #[test]
    fn test_success_fetched_once() {
        let cache = MetadataCache::new(StubSource::serving(Some(stub_page("3", "105", &["Tears up"])))).unwrap();

        let first = cache.get_or_fetch("SadOnion").unwrap();
        let second = cache.get_or_fetch("SadOnion").unwrap();

        assert_eq!(cache.source().calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.quality.value(), 3);
        assert_eq!(first.entity_id, "105");
        assert_eq!(first.effects.len(), 1);
        assert!(first.synergies.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_not_cached() {
        let cache = MetadataCache::new(StubSource::serving(None)).unwrap();

        assert!(matches!(cache.get_or_fetch("Missing"), Err(FetchError::Status(404))));
        assert!(cache.get_or_fetch("Missing").is_err());

        assert_eq!(cache.source().calls(), 2);
        assert!(cache.is_empty());
        assert!(cache.get("Missing").is_none());
    }

    #[test]
    fn test_empty_page_is_unparseable() {
        let cache = MetadataCache::new(StubSource::serving(Some(String::new()))).unwrap();
        assert!(matches!(cache.get_or_fetch("Blank"), Err(FetchError::Unparseable(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_fetches_share_one_record() {
        let cache = Arc::new(MetadataCache::new(StubSource::serving(Some(stub_page("2", "7", &[])))).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_fetch("Brimstone").unwrap())
            })
            .collect();
        let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.len(), 1);
        let stored = cache.get("Brimstone").unwrap();
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &stored)));
    }
}

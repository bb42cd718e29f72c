//! One search surface over listing-capable and listing-incapable caches.
//!
//! Backends with `query` get wildcard listing; backends without it never
//! see a `query` call. For those, a blank or match-all pattern yields an
//! empty page (enumeration is impossible, not an error) and any other
//! input is treated as an exact key lookup, so operators can still pull
//! up a known key on a memcached or file cache from the same search box.

use crate::adapter::CacheAdapter;
use cachepanel_core::{
    Operation, PageRequest, PanelError, PanelResult, Pattern, SearchResult, MATCH_ALL,
};

/// Run one search against an adapter.
///
/// `page` is 1-indexed; `per_page` is clamped by [`PageRequest`]
/// validation, not silently adjusted.
pub fn search(
    adapter: &mut dyn CacheAdapter,
    raw_pattern: &str,
    page: usize,
    per_page: usize,
) -> PanelResult<SearchResult> {
    let request = PageRequest::new(page, per_page).map_err(PanelError::from)?;
    let trimmed = raw_pattern.trim();

    if !adapter.supports(Operation::Query) {
        if trimmed.is_empty() || trimmed == MATCH_ALL {
            return Ok(SearchResult::empty(&request));
        }
        return match adapter.get(trimmed) {
            Ok(record) => Ok(SearchResult::single(record, &request)),
            Err(PanelError::NotFound { .. }) => Ok(SearchResult::empty(&request)),
            Err(other) => Err(other),
        };
    }

    let pattern = Pattern::parse(if trimmed.is_empty() { MATCH_ALL } else { trimmed })?;
    adapter.query(&pattern, &request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{FileAdapter, MemoryAdapter, NoopAdapter};
    use cachepanel_core::{CacheInstance, CacheValue, ConfigError, DEFAULT_PER_PAGE};

    fn memory(location: &str) -> MemoryAdapter {
        let mut instance = CacheInstance::new(MemoryAdapter::BACKEND_NAME);
        instance.location = Some(format!("search-test-{location}"));
        MemoryAdapter::open("default", &instance, MemoryAdapter::declared_abilities())
            .expect("memory adapter opens")
    }

    fn file(dir: &std::path::Path) -> FileAdapter {
        let mut instance = CacheInstance::new(FileAdapter::BACKEND_NAME);
        instance.location = Some(dir.display().to_string());
        FileAdapter::open("files", &instance, FileAdapter::declared_abilities())
            .expect("file adapter opens")
    }

    fn text(value: &str) -> CacheValue {
        CacheValue::Text(value.to_string())
    }

    #[test]
    fn test_query_path_lists_matches() {
        let mut cache = memory("query-path");
        for i in 0..3 {
            cache.add(&format!("user:{i}"), &text("v"), None).expect("add");
        }
        cache.add("other", &text("v"), None).expect("add");

        let result = search(&mut cache, "user:*", 1, DEFAULT_PER_PAGE).expect("search");
        assert_eq!(result.total, Some(3));
        assert_eq!(result.records[0].key, "user:0");
    }

    #[test]
    fn test_blank_pattern_means_match_all_on_query_backends() {
        let mut cache = memory("blank-pattern");
        cache.add("k1", &text("v"), None).expect("add");
        cache.add("k2", &text("v"), None).expect("add");

        let blank = search(&mut cache, "   ", 1, DEFAULT_PER_PAGE).expect("search");
        assert_eq!(blank.total, Some(2));
        let star = search(&mut cache, "*", 1, DEFAULT_PER_PAGE).expect("search");
        assert_eq!(star.total, Some(2));
    }

    #[test]
    fn test_fallback_blank_pattern_is_empty_not_denied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = file(dir.path());
        cache.add("k", &text("v"), None).expect("add");

        for raw in ["", "   ", "*"] {
            let result = search(&mut cache, raw, 1, DEFAULT_PER_PAGE).expect("search");
            assert!(result.is_empty());
            assert_eq!(result.total, Some(0));
        }
    }

    #[test]
    fn test_fallback_treats_input_as_exact_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = file(dir.path());
        cache.add("user:1", &text("alice"), None).expect("add");

        let hit = search(&mut cache, "user:1", 1, DEFAULT_PER_PAGE).expect("search");
        assert_eq!(hit.total, Some(1));
        assert_eq!(hit.records[0].key, "user:1");
        assert!(!hit.has_next);

        let miss = search(&mut cache, "user:2", 1, DEFAULT_PER_PAGE).expect("search");
        assert!(miss.is_empty());
        assert_eq!(miss.total, Some(0));
    }

    #[test]
    fn test_fallback_hit_is_pinned_to_first_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = file(dir.path());
        cache.add("user:1", &text("alice"), None).expect("add");

        let page2 = search(&mut cache, "user:1", 2, DEFAULT_PER_PAGE).expect("search");
        assert!(page2.is_empty());
        assert_eq!(page2.total, Some(1));
        assert!(page2.has_previous);
    }

    #[test]
    fn test_fallback_without_get_surfaces_denial() {
        let instance = CacheInstance::new("myco.UnknownCache");
        let mut cache =
            NoopAdapter::open("mystery", &instance, NoopAdapter::declared_abilities())
                .expect("noop opens");

        // Blank input still short-circuits to an empty page.
        let blank = search(&mut cache, "", 1, DEFAULT_PER_PAGE).expect("search");
        assert!(blank.is_empty());

        // A concrete key needs `get`, which the noop adapter denies.
        let err = search(&mut cache, "user:1", 1, DEFAULT_PER_PAGE)
            .map(|_| ())
            .expect_err("denied");
        assert!(matches!(
            err,
            PanelError::CapabilityDenied {
                operation: Operation::Get,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_page_parameters_are_rejected() {
        let mut cache = memory("invalid-page");
        let err = search(&mut cache, "*", 0, DEFAULT_PER_PAGE)
            .map(|_| ())
            .expect_err("page 0");
        assert!(matches!(
            err,
            PanelError::Config(ConfigError::InvalidPage { .. })
        ));
        let err = search(&mut cache, "*", 1, 0).map(|_| ()).expect_err("per_page 0");
        assert!(matches!(
            err,
            PanelError::Config(ConfigError::InvalidPage { .. })
        ));
    }

    #[test]
    fn test_pagination_flows_through() {
        let mut cache = memory("paging");
        for i in 0..7 {
            cache.add(&format!("k{i}"), &text("v"), None).expect("add");
        }
        let page1 = search(&mut cache, "*", 1, 5).expect("search");
        let page2 = search(&mut cache, "*", 2, 5).expect("search");
        assert_eq!(page1.len(), 5);
        assert_eq!(page2.len(), 2);
        assert!(page1.has_next);
        assert!(page2.has_previous);
        assert!(!page2.has_next);
    }
}

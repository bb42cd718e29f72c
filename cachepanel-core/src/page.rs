//! Pagination requests, key records, and search results.

use crate::error::ConfigError;
use crate::value::CacheValue;
use serde::{Deserialize, Serialize};

/// Page size used when the caller does not specify one.
pub const DEFAULT_PER_PAGE: usize = 25;

/// Upper bound on page size, protecting backends from unbounded scans.
pub const MAX_PER_PAGE: usize = 500;

/// A validated, 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    per_page: usize,
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Result<Self, ConfigError> {
        if page == 0 {
            return Err(ConfigError::InvalidPage {
                reason: "page numbers are 1-indexed".to_string(),
            });
        }
        if per_page == 0 {
            return Err(ConfigError::InvalidPage {
                reason: "per_page must be a positive integer".to_string(),
            });
        }
        if per_page > MAX_PER_PAGE {
            return Err(ConfigError::InvalidPage {
                reason: format!("per_page may not exceed {MAX_PER_PAGE}"),
            });
        }
        Ok(Self { page, per_page })
    }

    /// The first page at the default size.
    pub fn first() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Zero-based index of the first record on this page.
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One key surfaced by `get` or `query`. Ephemeral: lives for a single
/// request/response and is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// The user-facing key name.
    pub key: String,
    /// The raw backend key, when it differs from the user-facing key by a
    /// storage prefix/version transform.
    pub storage_key: Option<String>,
    pub value: CacheValue,
}

impl KeyRecord {
    pub fn new(key: impl Into<String>, value: CacheValue) -> Self {
        Self {
            key: key.into(),
            storage_key: None,
            value,
        }
    }

    pub fn with_storage_key(mut self, storage_key: impl Into<String>) -> Self {
        self.storage_key = Some(storage_key.into());
        self
    }

    pub fn type_tag(&self) -> &'static str {
        self.value.type_tag()
    }
}

/// One page of matched keys plus value previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub records: Vec<KeyRecord>,
    /// Exact match count when the backend can count cheaply, `None` when
    /// the scan stopped early and counting would require a full pass.
    pub total: Option<usize>,
    pub page: usize,
    pub per_page: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl SearchResult {
    /// Build a result where the total is exactly known.
    pub fn from_counted(records: Vec<KeyRecord>, total: usize, page: &PageRequest) -> Self {
        let offset = page.offset();
        Self {
            has_previous: offset > 0 && total > 0,
            has_next: offset + records.len() < total,
            total: Some(total),
            records,
            page: page.page(),
            per_page: page.per_page(),
        }
    }

    /// Build a result from a scan that may have stopped before counting
    /// everything. `has_next` comes from the scanner itself.
    pub fn from_scan(
        records: Vec<KeyRecord>,
        total: Option<usize>,
        has_next: bool,
        page: &PageRequest,
    ) -> Self {
        Self {
            has_previous: page.offset() > 0 && total != Some(0),
            has_next,
            total,
            records,
            page: page.page(),
            per_page: page.per_page(),
        }
    }

    pub fn empty(page: &PageRequest) -> Self {
        Self::from_counted(Vec::new(), 0, page)
    }

    /// Wrap a single `get` hit as a one-element result, used by the search
    /// fallback for backends without a listing primitive.
    pub fn single(record: KeyRecord, page: &PageRequest) -> Self {
        if page.offset() == 0 {
            Self::from_counted(vec![record], 1, page)
        } else {
            Self::from_counted(Vec::new(), 1, page)
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Slice a fully materialized listing into one page, returning the page's
/// items and the exact total. Used by backends that list keys in process.
pub fn paginate<T>(items: Vec<T>, page: &PageRequest) -> (Vec<T>, usize) {
    let total = items.len();
    let start = page.offset().min(total);
    let end = (start + page.per_page()).min(total);
    let page_items = items
        .into_iter()
        .skip(start)
        .take(end - start)
        .collect();
    (page_items, total)
}

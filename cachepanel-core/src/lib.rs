//! cachepanel core - data model for the cache inspection panel.
//!
//! Pure data types and policies with no backend behavior: the ability
//! model, the error taxonomy, the JSON-or-plain-text value representation,
//! wildcard patterns, pagination, and operator configuration. Adapters,
//! the resolver, and the search engine live in `cachepanel-adapters`.

pub mod ability;
pub mod config;
pub mod error;
pub mod page;
pub mod pattern;
pub mod value;

pub use ability::{AbilityOverride, AbilitySet, Operation};
pub use config::{CacheInstance, OperatorOverrides, PanelConfig};
pub use error::{ConfigError, PanelError, PanelResult};
pub use page::{paginate, KeyRecord, PageRequest, SearchResult, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use pattern::{Pattern, MATCH_ALL};
pub use value::CacheValue;

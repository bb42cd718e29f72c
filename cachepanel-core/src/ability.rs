//! The ability model: a fixed six-operation capability record.
//!
//! Every adapter variant declares one [`AbilitySet`]; operators may narrow
//! (or, for custom adapters, widen) it per cache instance with an
//! [`AbilityOverride`]. Capability gating is only defined for the six
//! operations in [`Operation`] - the enum is closed on purpose.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six operations a panel can perform against a cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Wildcard key listing with pagination.
    Query,
    /// Exact-key read.
    Get,
    /// Replace the value of an existing key.
    Edit,
    /// Create a key that does not exist yet.
    Add,
    /// Remove a single key.
    Delete,
    /// Remove every key the instance owns.
    Flush,
}

impl Operation {
    /// All six operations, in gating order.
    pub const ALL: [Operation; 6] = [
        Operation::Query,
        Operation::Get,
        Operation::Edit,
        Operation::Add,
        Operation::Delete,
        Operation::Flush,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Query => "query",
            Operation::Get => "get",
            Operation::Edit => "edit",
            Operation::Add => "add",
            Operation::Delete => "delete",
            Operation::Flush => "flush",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared or effective capability record for one adapter.
///
/// `Default` is the all-false set: an unrecognized backend is assumed
/// capable of nothing until an explicit adapter registration proves
/// otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySet {
    pub query: bool,
    pub get: bool,
    pub edit: bool,
    pub add: bool,
    pub delete: bool,
    pub flush: bool,
}

impl AbilitySet {
    /// Every operation supported.
    pub const fn all() -> Self {
        Self {
            query: true,
            get: true,
            edit: true,
            add: true,
            delete: true,
            flush: true,
        }
    }

    /// No operation supported.
    pub const fn none() -> Self {
        Self {
            query: false,
            get: false,
            edit: false,
            add: false,
            delete: false,
            flush: false,
        }
    }

    /// Everything except key enumeration. Fits backends that have no
    /// listing primitive (file-based, memcached-protocol).
    pub const fn without_query() -> Self {
        Self {
            query: false,
            get: true,
            edit: true,
            add: true,
            delete: true,
            flush: true,
        }
    }

    pub fn supports(&self, operation: Operation) -> bool {
        match operation {
            Operation::Query => self.query,
            Operation::Get => self.get,
            Operation::Edit => self.edit,
            Operation::Add => self.add,
            Operation::Delete => self.delete,
            Operation::Flush => self.flush,
        }
    }

    /// Apply an operator override on top of this declared set. Fields the
    /// override leaves unset keep the declared value.
    pub fn merge(&self, overrides: &AbilityOverride) -> AbilitySet {
        AbilitySet {
            query: overrides.query.unwrap_or(self.query),
            get: overrides.get.unwrap_or(self.get),
            edit: overrides.edit.unwrap_or(self.edit),
            add: overrides.add.unwrap_or(self.add),
            delete: overrides.delete.unwrap_or(self.delete),
            flush: overrides.flush.unwrap_or(self.flush),
        }
    }

    /// First operation `effective` claims that this declared set does not.
    ///
    /// The resolver uses this to reject structurally impossible widenings
    /// at resolution time.
    pub fn first_widened(&self, effective: &AbilitySet) -> Option<Operation> {
        Operation::ALL
            .into_iter()
            .find(|op| effective.supports(*op) && !self.supports(*op))
    }
}

/// Per-cache-instance ability override: `Some(v)` replaces the declared
/// value, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityOverride {
    pub query: Option<bool>,
    pub get: Option<bool>,
    pub edit: Option<bool>,
    pub add: Option<bool>,
    pub delete: Option<bool>,
    pub flush: Option<bool>,
}

impl AbilityOverride {
    pub fn is_empty(&self) -> bool {
        *self == AbilityOverride::default()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn ability_set_strategy() -> impl Strategy<Value = AbilitySet> {
        (
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(query, get, edit, add, delete, flush)| AbilitySet {
                query,
                get,
                edit,
                add,
                delete,
                flush,
            })
    }

    fn ability_override_strategy() -> impl Strategy<Value = AbilityOverride> {
        (
            any::<Option<bool>>(),
            any::<Option<bool>>(),
            any::<Option<bool>>(),
            any::<Option<bool>>(),
            any::<Option<bool>>(),
            any::<Option<bool>>(),
        )
            .prop_map(|(query, get, edit, add, delete, flush)| AbilityOverride {
                query,
                get,
                edit,
                add,
                delete,
                flush,
            })
    }

    proptest! {
        /// Merge takes the override value where present and the declared
        /// value otherwise, for every field independently.
        #[test]
        fn prop_merge_field_semantics(
            declared in ability_set_strategy(),
            overrides in ability_override_strategy(),
        ) {
            let effective = declared.merge(&overrides);
            prop_assert_eq!(effective.query, overrides.query.unwrap_or(declared.query));
            prop_assert_eq!(effective.get, overrides.get.unwrap_or(declared.get));
            prop_assert_eq!(effective.edit, overrides.edit.unwrap_or(declared.edit));
            prop_assert_eq!(effective.add, overrides.add.unwrap_or(declared.add));
            prop_assert_eq!(effective.delete, overrides.delete.unwrap_or(declared.delete));
            prop_assert_eq!(effective.flush, overrides.flush.unwrap_or(declared.flush));
        }

        /// An override that only ever sets `false` can never widen.
        #[test]
        fn prop_narrowing_never_widens(
            declared in ability_set_strategy(),
            mask in ability_override_strategy(),
        ) {
            let narrowing = AbilityOverride {
                query: mask.query.map(|_| false),
                get: mask.get.map(|_| false),
                edit: mask.edit.map(|_| false),
                add: mask.add.map(|_| false),
                delete: mask.delete.map(|_| false),
                flush: mask.flush.map(|_| false),
            };
            let effective = declared.merge(&narrowing);
            prop_assert_eq!(declared.first_widened(&effective), None);
        }
    }
}

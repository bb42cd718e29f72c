//! cachepanel adapters - backend adapters, resolver, and search engine.
//!
//! This crate turns the data model from `cachepanel-core` into behavior: a
//! capability-gated [`CacheAdapter`] trait with one variant per backend
//! family, an explicit [`AdapterRegistry`] mapping backend identifiers to
//! adapter constructors, a [`Resolver`] that applies operator overrides and
//! fails closed on anything it cannot identify, and a [`search`] engine
//! that reconciles listing-capable and listing-incapable backends behind
//! one search surface.
//!
//! # Capability gating
//!
//! Every operation checks the effective ability set before touching the
//! backend; an unsupported operation returns
//! [`PanelError::CapabilityDenied`](cachepanel_core::PanelError) without
//! any client contact. Operator overrides may narrow an adapter's declared
//! abilities freely; widening past what a variant structurally supports is
//! rejected when the resolver is built, never mid-operation.

pub mod adapter;
pub mod backends;
pub mod keyspace;
pub mod registry;
pub mod resolver;
pub mod search;

pub use adapter::CacheAdapter;
pub use backends::{
    DatabaseAdapter, FileAdapter, MemcachedAdapter, MemoryAdapter, NoopAdapter, RedisAdapter,
    RedisClusterAdapter,
};
pub use keyspace::KeySpace;
pub use registry::{AdapterRegistry, AdapterSpec};
pub use resolver::{InstanceInfo, Resolver};
pub use search::search;

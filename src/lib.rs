//! IP denylist/allowlist/cloud-range ingestion and lookup engine.
//!
//! Answers "is this IPv4 address present on any denylist, allowlist, or
//! cloud-provider range, and which ones?" Feed plugins (module [`plugins`])
//! fetch heterogeneous external sources concurrently and normalize them to
//! a canonical interval stream; the [`merger`] concatenates that stream; the
//! [`flattener`] folds overlapping tagged ranges into a sorted, disjoint
//! partition; and the [`store`] abstraction persists that partition behind
//! an ordered key/score index for O(log N) point lookups.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────┐   ┌────────────┐   ┌──────────────┐
//! │ plugins │──▶│ merger │──▶│ flattener  │──▶│ sorted index │
//! └─────────┘   └────────┘   └────────────┘   └──────┬───────┘
//!                                                      │
//!                                         ┌────────────▼──────────┐
//!                                         │ lookup / lookup_batch │
//!                                         └────────────────────────┘
//! ```
//!
//! The [`coordinator`] runs the ingestion side under a distributed lock and
//! publishes the result via an atomic key rename; the [`lookup`] module is
//! a read-only, concurrency-safe client of the live key plus an optional
//! [`cache`] layer. [`context::Context`] is the explicit, no-singletons
//! handle both sides share.

pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod dnsbl;
pub mod error;
pub mod flattener;
pub mod health;
pub mod ip;
pub mod lookup;
pub mod merger;
pub mod plugins;
pub mod retry;
pub mod staging;
pub mod store;
pub mod tag;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Domain logic: reconcile the line-item object graph against the ad server.
//!
//! This crate owns *what* exists remotely and *when* it gets created; it does
//! not own transport (the [`lineforge_gateway::AdServer`] port) or
//! configuration (the `lineforge-config` schema).
//!
//! The load-bearing pieces:
//! - [`ops::ResourceOp`] — the fetch-or-create primitive. Query by equality
//!   filter, create only what is missing, synthesize ids in dry runs.
//! - [`validate::validate_created`] — the post-bulk-create completeness check.
//! - [`targeting`] — key/value-set resolution for a bidder's price key.
//! - [`cache::RunCache`] — resolve-once memoization shared across builders.
//! - [`batch::PriceBatchBuilder`] — one (bidder, media type, CPM batch),
//!   realized in dependency order.

pub mod batch;
pub mod cache;
pub mod creative;
pub mod ops;
pub mod targeting;
pub mod validate;

mod error;

pub use batch::{BatchCtx, PriceBatchBuilder};
pub use cache::RunCache;
pub use error::ProvisionError;
pub use ops::{FetchSpec, OpCtx, ResourceOp};
pub use targeting::CustomTargeting;

//! Declarative configuration for lineforge.
//!
//! A single YAML document declares the bidders, media types, CPM rate
//! granularity, targeting, and name templates that drive a provisioning run.
//! This crate owns the schema, its validation, and the expansion of rate
//! buckets into the ordered, batched CPM price points the orchestrator
//! iterates.

mod model;
mod rate;

pub use model::{
    AdvertiserConfig, AppConfig, BannerConfig, BidderConfig, ConfigError, CreativeConfig,
    CustomTargetingConfig, LineItemConfig, OrderConfig, RateConfig, TargetingConfig, VideoConfig,
    DEFAULT_LINE_ITEM_TEMPLATE,
};
pub use rate::{Bucket, GranularityConfig};

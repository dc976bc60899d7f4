use crate::rate::{batch_points, GranularityConfig};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use lineforge_types::{Cpm, MediaType, Size};
use serde::Deserialize;
use std::borrow::Cow;

/// The built-in line-item record template, used unless the configuration
/// points at an override file.
pub const DEFAULT_LINE_ITEM_TEMPLATE: &str = include_str!("../assets/line_item_template.yml");

/// Validation failures for a loaded configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no bidders configured")]
    NoBidders,
    #[error("no media types configured")]
    NoMediaTypes,
    #[error("media type '{0}' is listed twice")]
    DuplicateMediaType(MediaType),
    #[error("media type '{0}' has no creative section")]
    MissingCreativeSection(MediaType),
    #[error("creative section for '{0}' declares no sizes")]
    NoSizes(MediaType),
    #[error("rate bucket has min {min} above max {max}")]
    BucketRange { min: Cpm, max: Cpm },
    #[error("rate bucket interval must be positive, got {0}")]
    BucketInterval(Cpm),
    #[error("rate granularity produced no CPM points")]
    NoCpmPoints,
    #[error("cpm_batch_size must be at least 1")]
    BatchSize,
}

/// Top-level declarative configuration for one provisioning run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub bidders: Vec<BidderConfig>,
    pub media_types: Vec<MediaType>,
    pub rate: RateConfig,

    #[serde(default)]
    pub advertiser: AdvertiserConfig,
    #[serde(default)]
    pub order: OrderConfig,
    #[serde(default)]
    pub creative: CreativeConfig,
    #[serde(default)]
    pub line_item: LineItemConfig,
    #[serde(default)]
    pub targeting: TargetingConfig,
}

/// One header-bidding partner.
#[derive(Debug, Clone, Deserialize)]
pub struct BidderConfig {
    pub code: String,
    /// Human-readable name; falls back to the code.
    #[serde(default)]
    pub name: Option<String>,
}

impl BidderConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvertiserConfig {
    /// Name template; context: bidder_code, bidder_name.
    pub name: String,
}

impl Default for AdvertiserConfig {
    fn default() -> Self {
        Self {
            name: "Prebid - {{bidder_name}}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Name template; context: bidder_code, bidder_name, media_type,
    /// cpm_min, cpm_max.
    pub name: String,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            name: "Prebid {{bidder_code}} {{media_type}} {{cpm_min}}-{{cpm_max}}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CreativeConfig {
    /// Name template; context: bidder_code, bidder_name, media_type.
    pub name: String,
    pub banner: Option<BannerConfig>,
    pub video: Option<VideoConfig>,
}

impl Default for CreativeConfig {
    fn default() -> Self {
        Self {
            name: "Prebid {{bidder_code}} {{media_type}}".to_string(),
            banner: None,
            video: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BannerConfig {
    pub sizes: Vec<Size>,
    /// The third-party tag served for every banner creative.
    pub snippet: String,
    #[serde(default = "default_true")]
    pub safe_frame: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    pub sizes: Vec<Size>,
    pub vast_xml_url: String,
    #[serde(default = "default_duration")]
    pub duration_seconds: u32,
}

fn default_true() -> bool {
    true
}

fn default_duration() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineItemConfig {
    /// Name template; context: bidder_code, bidder_name, media_type, cpm.
    pub name: String,
    pub item_type: String,
    /// Optional path to a record-template file replacing the built-in one.
    pub template: Option<Utf8PathBuf>,
}

impl Default for LineItemConfig {
    fn default() -> Self {
        Self {
            name: "Prebid {{bidder_code}} {{media_type}} {{cpm}}".to_string(),
            item_type: "PRICE_PRIORITY".to_string(),
            template: None,
        }
    }
}

impl LineItemConfig {
    /// The record-template source: the override file if configured, the
    /// built-in template otherwise.
    pub fn template_source(&self) -> anyhow::Result<Cow<'static, str>> {
        match &self.template {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("read line item template {}", path))?;
                Ok(Cow::Owned(contents))
            }
            None => Ok(Cow::Borrowed(DEFAULT_LINE_ITEM_TEMPLATE)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Targeting key name template; context: bidder_code, bidder_name.
    pub key: String,
    /// Additional custom targeting declarations resolved once per run.
    pub custom: Vec<CustomTargetingConfig>,
    pub ad_unit_names: Vec<String>,
    pub placement_names: Vec<String>,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            key: "hb_pb_{{bidder_code}}".to_string(),
            custom: Vec::new(),
            ad_unit_names: Vec::new(),
            placement_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomTargetingConfig {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    pub granularity: GranularityConfig,
    #[serde(default = "default_batch_size")]
    pub cpm_batch_size: usize,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_batch_size() -> usize {
    100
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
        let config = Self::parse(&contents).with_context(|| format!("parse config file {}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating; validation is a separate, testable step.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("invalid YAML")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bidders.is_empty() {
            return Err(ConfigError::NoBidders);
        }
        if self.media_types.is_empty() {
            return Err(ConfigError::NoMediaTypes);
        }
        for (i, media) in self.media_types.iter().enumerate() {
            if self.media_types[..i].contains(media) {
                return Err(ConfigError::DuplicateMediaType(*media));
            }
            let sizes = match media {
                MediaType::Banner => self
                    .creative
                    .banner
                    .as_ref()
                    .map(|b| b.sizes.len())
                    .ok_or(ConfigError::MissingCreativeSection(*media))?,
                MediaType::Video => self
                    .creative
                    .video
                    .as_ref()
                    .map(|v| v.sizes.len())
                    .ok_or(ConfigError::MissingCreativeSection(*media))?,
            };
            if sizes == 0 {
                return Err(ConfigError::NoSizes(*media));
            }
        }
        for bucket in &self.rate.granularity.buckets {
            if bucket.min > bucket.max {
                return Err(ConfigError::BucketRange {
                    min: bucket.min,
                    max: bucket.max,
                });
            }
            if bucket.interval <= Cpm::default() {
                return Err(ConfigError::BucketInterval(bucket.interval));
            }
        }
        if self.rate.cpm_batch_size == 0 {
            return Err(ConfigError::BatchSize);
        }
        if self.cpm_points().is_empty() {
            return Err(ConfigError::NoCpmPoints);
        }
        Ok(())
    }

    /// All distinct CPM points, ascending.
    pub fn cpm_points(&self) -> Vec<Cpm> {
        self.rate.granularity.points()
    }

    /// The canonical names of every CPM point; these become the targeting
    /// value set for each bidder's price key.
    pub fn cpm_names(&self) -> Vec<String> {
        self.cpm_points().iter().map(Cpm::name).collect()
    }

    /// CPM points partitioned into fixed-size batches.
    pub fn cpm_batches(&self) -> Vec<Vec<Cpm>> {
        batch_points(&self.cpm_points(), self.rate.cpm_batch_size)
    }

    /// Declared sizes for one media type. Validation guarantees the section
    /// exists for every configured media type.
    pub fn sizes_for(&self, media: MediaType) -> Vec<Size> {
        match media {
            MediaType::Banner => self
                .creative
                .banner
                .as_ref()
                .map(|b| b.sizes.clone())
                .unwrap_or_default(),
            MediaType::Video => self
                .creative
                .video
                .as_ref()
                .map(|v| v.sizes.clone())
                .unwrap_or_default(),
        }
    }
}

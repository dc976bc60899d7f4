//! Per-media-type creative record construction.

use anyhow::Context;
use lineforge_config::CreativeConfig;
use lineforge_types::{Id, MediaType, Record, Size};
use serde_json::json;

/// Build the ready-to-create creative record for one size.
///
/// Banner and Video are a closed set: each arm fills its variant's full
/// field set, so a new media type cannot compile without declaring one.
pub fn creative_record(
    media_type: MediaType,
    creative: &CreativeConfig,
    name: &str,
    advertiser_id: &Id,
    size: Size,
) -> anyhow::Result<Record> {
    let base = Record::new()
        .with("name", name)
        .with("advertiserId", advertiser_id.clone())
        .with("size", json!({"width": size.width, "height": size.height}));

    match media_type {
        MediaType::Banner => {
            let banner = creative
                .banner
                .as_ref()
                .context("no banner creative section configured")?;
            Ok(base
                .with("xsiType", "ThirdPartyCreative")
                .with("snippet", banner.snippet.as_str())
                .with("isSafeFrameCompatible", banner.safe_frame))
        }
        MediaType::Video => {
            let video = creative
                .video
                .as_ref()
                .context("no video creative section configured")?;
            Ok(base
                .with("xsiType", "VastRedirectCreative")
                .with("vastXmlUrl", video.vast_xml_url.as_str())
                .with("vastRedirectType", "LINEAR")
                .with("duration", video.duration_seconds))
        }
    }
}

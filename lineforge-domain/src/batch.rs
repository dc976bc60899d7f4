//! One (bidder, media type, CPM batch) realized in dependency order:
//! advertiser → order → creatives → targeting → line items → associations.

use crate::cache::RunCache;
use crate::creative::creative_record;
use crate::ops::{self, OpCtx};
use crate::targeting::{self, CustomTargeting};
use anyhow::Context;
use lineforge_config::{AppConfig, BidderConfig};
use lineforge_render::Renderer;
use lineforge_types::{Cpm, MediaType, Record};
use serde_json::{json, Value};

/// Everything a builder needs beyond its own (bidder, media, batch) scope.
#[derive(Clone, Copy)]
pub struct BatchCtx<'a> {
    pub op: OpCtx<'a>,
    pub config: &'a AppConfig,
    pub renderer: &'a Renderer,
    /// Inventory resolved up front by the orchestrator.
    pub ad_units: &'a [Record],
    pub placements: &'a [Record],
}

/// Builds the object graph for one price batch.
///
/// The order and line items are realized lazily into explicit holders and
/// never re-queried once populated; advertiser, targeting, and creative sets
/// resolve through the shared [`RunCache`] so sibling batches reuse them.
pub struct PriceBatchBuilder<'a> {
    ctx: BatchCtx<'a>,
    cache: &'a mut RunCache,
    bidder: &'a BidderConfig,
    media_type: MediaType,
    cpms: &'a [Cpm],
    order: Option<Record>,
    line_items: Option<Vec<Record>>,
}

impl<'a> PriceBatchBuilder<'a> {
    pub fn new(
        ctx: BatchCtx<'a>,
        cache: &'a mut RunCache,
        bidder: &'a BidderConfig,
        media_type: MediaType,
        cpms: &'a [Cpm],
    ) -> Self {
        Self {
            ctx,
            cache,
            bidder,
            media_type,
            cpms,
            order: None,
            line_items: None,
        }
    }

    fn bidder_vars(&self) -> Value {
        json!({
            "bidder_code": self.bidder.code,
            "bidder_name": self.bidder.display_name(),
        })
    }

    fn media_vars(&self) -> Value {
        json!({
            "bidder_code": self.bidder.code,
            "bidder_name": self.bidder.display_name(),
            "media_type": self.media_type.as_str(),
        })
    }

    /// The advertiser owning everything this bidder provisions. Shared
    /// run-wide across media types and batches.
    pub fn advertiser(&mut self) -> anyhow::Result<Record> {
        let ctx = self.ctx;
        let name = ctx
            .renderer
            .render_name(&ctx.config.advertiser.name, &self.bidder_vars())?;
        let op = ctx.op;
        self.cache
            .ensure_advertiser(&self.bidder.code, || {
                ops::advertiser(op, &name)
                    .fetch_one(true)?
                    .with_context(|| format!("advertiser '{}' could not be resolved", name))
            })
            .map(Record::clone)
    }

    /// The order holding this batch's line items, named from the bidder,
    /// media type, and CPM range.
    pub fn order(&mut self) -> anyhow::Result<Record> {
        if let Some(rec) = &self.order {
            return Ok(rec.clone());
        }
        let advertiser = self.advertiser()?;
        let advertiser_id = advertiser.id().context("advertiser record has no id")?;
        let trafficker_id = {
            let user = self.cache.ensure_user(self.ctx.op)?;
            user.id().context("current user has no id")?
        };

        let (cpm_min, cpm_max) = self.cpm_range()?;
        let mut vars = self.media_vars();
        vars["cpm_min"] = Value::from(cpm_min.name());
        vars["cpm_max"] = Value::from(cpm_max.name());
        let name = self
            .ctx
            .renderer
            .render_name(&self.ctx.config.order.name, &vars)?;

        let rec = ops::order(self.ctx.op, &name, advertiser_id, trafficker_id)
            .fetch_one(true)?
            .with_context(|| format!("order '{}' could not be resolved", name))?;
        self.order = Some(rec.clone());
        Ok(rec)
    }

    /// One creative per declared size for this media type. Shared run-wide
    /// per (bidder, media type).
    pub fn creatives(&mut self) -> anyhow::Result<Vec<Record>> {
        let advertiser = self.advertiser()?;
        let advertiser_id = advertiser.id().context("advertiser record has no id")?;
        let ctx = self.ctx;
        let media_type = self.media_type;
        let name = ctx
            .renderer
            .render_name(&ctx.config.creative.name, &self.media_vars())?;

        let recs = self
            .cache
            .ensure_creatives(&self.bidder.code, media_type, || {
                let sizes = ctx.config.sizes_for(media_type);
                let mut out = Vec::with_capacity(sizes.len());
                for size in sizes {
                    let template = creative_record(
                        media_type,
                        &ctx.config.creative,
                        &name,
                        &advertiser_id,
                        size,
                    )?;
                    let rec = ops::creative(ctx.op, template)
                        .fetch_one(true)?
                        .with_context(|| {
                            format!("creative '{}' ({}) could not be resolved", name, size)
                        })?;
                    out.push(rec);
                }
                Ok(out)
            })?;
        Ok(recs.to_vec())
    }

    /// This bidder's price targeting key with one value per CPM point of the
    /// whole run (not just this batch). Shared run-wide per key name.
    pub fn targeting(&mut self) -> anyhow::Result<CustomTargeting> {
        let ctx = self.ctx;
        let key_name = ctx
            .renderer
            .render_name(&ctx.config.targeting.key, &self.bidder_vars())?;
        let value_names = ctx.config.cpm_names();
        let op = ctx.op;
        self.cache
            .ensure_targeting(&key_name, || targeting::resolve(op, &key_name, &value_names))
            .map(CustomTargeting::clone)
    }

    /// One line item per CPM point in this batch, rendered from the record
    /// template and bulk-created with validation. Always newly created.
    pub fn line_items(&mut self) -> anyhow::Result<Vec<Record>> {
        if let Some(recs) = &self.line_items {
            return Ok(recs.clone());
        }
        let order = self.order()?;
        let order_id = order.id().context("order record has no id")?;
        let targeting = self.targeting()?;
        let targeting_key_id = targeting.key_id().context("targeting key has no id")?;

        let ctx = self.ctx;
        let template = ctx.config.line_item.template_source()?;
        let targeted_ad_units: Vec<Value> = ctx
            .ad_units
            .iter()
            .filter_map(Record::id)
            .map(|id| json!({ "adUnitId": Value::from(id) }))
            .collect();
        let placement_ids: Vec<Value> = ctx
            .placements
            .iter()
            .filter_map(Record::id)
            .map(Value::from)
            .collect();
        let placeholders: Vec<Value> = ctx
            .config
            .sizes_for(self.media_type)
            .iter()
            .map(|size| json!({ "size": { "width": size.width, "height": size.height } }))
            .collect();

        let mut contexts = Vec::with_capacity(self.cpms.len());
        for cpm in self.cpms {
            let mut vars = self.media_vars();
            vars["cpm"] = Value::from(cpm.name());
            let name = ctx
                .renderer
                .render_name(&ctx.config.line_item.name, &vars)?;
            let value_id = targeting
                .value_id(&cpm.name())
                .with_context(|| format!("no targeting value for CPM {}", cpm.name()))?;
            let micro_amount = cpm
                .micros()
                .with_context(|| format!("CPM {} does not fit in micro units", cpm.name()))?;

            contexts.push(json!({
                "name": name,
                "cpm": cpm.name(),
                "order_id": Value::from(order_id.clone()),
                "item_type": ctx.config.line_item.item_type,
                "currency": ctx.config.rate.currency,
                "micro_amount": micro_amount,
                "targeting_key_id": Value::from(targeting_key_id.clone()),
                "targeting_value_id": Value::from(value_id),
                "targeted_ad_units": targeted_ad_units,
                "placement_ids": placement_ids,
                "placeholders": placeholders,
            }));
        }

        let recs = ctx.renderer.render_records(&template, &contexts)?;
        let created = ops::line_items(ctx.op).create_all(recs, true)?;
        self.line_items = Some(created.clone());
        Ok(created)
    }

    /// Realize the full dependency chain through line items.
    pub fn build(&mut self) -> anyhow::Result<()> {
        self.creatives()?;
        self.line_items()?;
        Ok(())
    }

    /// Submit the full cross product of this batch's line items × creatives
    /// as one bulk create with validation.
    pub fn create_associations(&mut self) -> anyhow::Result<Vec<Record>> {
        let line_items = self.line_items()?;
        let creatives = self.creatives()?;

        let mut recs = Vec::with_capacity(line_items.len() * creatives.len());
        for line_item in &line_items {
            let line_item_id = line_item.id().context("line item record has no id")?;
            for creative in &creatives {
                let creative_id = creative.id().context("creative record has no id")?;
                recs.push(
                    Record::new()
                        .with("lineItemId", line_item_id.clone())
                        .with("creativeId", creative_id),
                );
            }
        }
        ops::licas(self.ctx.op).create_all(recs, true)
    }

    fn cpm_range(&self) -> anyhow::Result<(Cpm, Cpm)> {
        match (self.cpms.first(), self.cpms.last()) {
            (Some(first), Some(last)) => Ok((*first, *last)),
            _ => anyhow::bail!("price batch is empty"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineforge_gateway::InMemoryAdServer;
    use lineforge_types::{Id, NaturalKey, ObjectType};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    const CONFIG: &str = r#"
bidders:
  - code: bidderA
    name: Bidder A
media_types: [banner, video]
rate:
  granularity:
    buckets:
      - { min: 1.00, max: 1.20, interval: 0.10 }
creative:
  banner:
    sizes:
      - { width: 300, height: 250 }
      - { width: 728, height: 90 }
    snippet: '<script src="https://cdn.example.com/hb.js"></script>'
  video:
    sizes:
      - { width: 640, height: 480 }
    vast_xml_url: 'https://vast.example.com/tag'
"#;

    fn config() -> AppConfig {
        let config = AppConfig::parse(CONFIG).unwrap();
        config.validate().unwrap();
        config
    }

    fn op(server: &InMemoryAdServer, dry_run: bool) -> OpCtx<'_> {
        OpCtx {
            gateway: server,
            dry_run,
        }
    }

    #[test]
    fn single_banner_batch_builds_the_example_graph() {
        let server = InMemoryAdServer::new();
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();

        let ctx = BatchCtx {
            op: op(&server, false),
            config: &config,
            renderer: &renderer,
            ad_units: &[],
            placements: &[],
        };
        let mut builder =
            PriceBatchBuilder::new(ctx, &mut cache, &config.bidders[0], MediaType::Banner, &cpms);
        builder.build().unwrap();
        let licas = builder.create_associations().unwrap();

        assert_eq!(server.records(ObjectType::Advertiser).len(), 1);
        assert_eq!(server.records(ObjectType::Order).len(), 1);
        assert_eq!(server.records(ObjectType::Creative).len(), 2);
        assert_eq!(server.records(ObjectType::LineItem).len(), 3);
        assert_eq!(licas.len(), 6);

        // Association pairs are unique across the batch.
        let pairs: HashSet<NaturalKey> = licas
            .iter()
            .map(|rec| {
                NaturalKey::Pair(
                    rec.id_field("lineItemId").unwrap(),
                    rec.id_field("creativeId").unwrap(),
                )
            })
            .collect();
        assert_eq!(pairs.len(), 6);
    }

    #[test]
    fn line_items_carry_price_and_targeting() {
        let server = InMemoryAdServer::new();
        server.seed(ObjectType::AdUnit, Record::new().with("name", "top"));
        let ad_units = server.records(ObjectType::AdUnit);
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();

        let ctx = BatchCtx {
            op: op(&server, false),
            config: &config,
            renderer: &renderer,
            ad_units: &ad_units,
            placements: &[],
        };
        let mut builder =
            PriceBatchBuilder::new(ctx, &mut cache, &config.bidders[0], MediaType::Banner, &cpms);
        let line_items = builder.line_items().unwrap();
        let order_id = builder.order().unwrap().id().unwrap();

        assert_eq!(line_items.len(), 3);
        let first = &line_items[0];
        assert_eq!(first.name(), Some("Prebid bidderA banner 1.00"));
        assert_eq!(first.id_field("orderId"), Some(order_id));
        assert_eq!(
            first.get_path("costPerUnit.microAmount"),
            Some(&serde_json::json!(1_000_000))
        );
        assert_eq!(first.str_field("lineItemType"), Some("PRICE_PRIORITY"));

        // Inventory and custom targeting flowed through the record template.
        let targeted = first
            .get_path("targeting.inventoryTargeting.targetedAdUnits")
            .unwrap();
        assert_eq!(targeted.as_array().map(Vec::len), Some(1));
        assert!(first
            .get_path("targeting.customTargeting.children")
            .is_some());
    }

    #[test]
    fn sibling_batches_share_advertiser_creatives_and_targeting() {
        let server = InMemoryAdServer::new();
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();
        let (first_half, second_half) = cpms.split_at(2);

        for batch in [first_half, second_half] {
            let ctx = BatchCtx {
                op: op(&server, false),
                config: &config,
                renderer: &renderer,
                ad_units: &[],
                placements: &[],
            };
            let mut builder = PriceBatchBuilder::new(
                ctx,
                &mut cache,
                &config.bidders[0],
                MediaType::Banner,
                batch,
            );
            builder.build().unwrap();
            builder.create_associations().unwrap();
        }

        // One advertiser, one creative set, one targeting key; two orders.
        assert_eq!(server.records(ObjectType::Advertiser).len(), 1);
        assert_eq!(server.records(ObjectType::Creative).len(), 2);
        assert_eq!(server.records(ObjectType::TargetingKey).len(), 1);
        assert_eq!(server.records(ObjectType::Order).len(), 2);
        assert_eq!(server.records(ObjectType::LineItem).len(), 3);
        assert_eq!(cache.advertiser_count(), 1);
    }

    #[test]
    fn video_batch_uses_the_video_variant() {
        let server = InMemoryAdServer::new();
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();

        let ctx = BatchCtx {
            op: op(&server, false),
            config: &config,
            renderer: &renderer,
            ad_units: &[],
            placements: &[],
        };
        let mut builder =
            PriceBatchBuilder::new(ctx, &mut cache, &config.bidders[0], MediaType::Video, &cpms);
        let creatives = builder.creatives().unwrap();

        assert_eq!(creatives.len(), 1);
        assert_eq!(
            creatives[0].str_field("xsiType"),
            Some("VastRedirectCreative")
        );
        assert_eq!(creatives[0].name(), Some("Prebid bidderA video"));
    }

    #[test]
    fn dry_run_completes_with_synthetic_ids_and_no_writes() {
        let server = InMemoryAdServer::new();
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();

        let ctx = BatchCtx {
            op: op(&server, true),
            config: &config,
            renderer: &renderer,
            ad_units: &[],
            placements: &[],
        };
        let mut builder =
            PriceBatchBuilder::new(ctx, &mut cache, &config.bidders[0], MediaType::Banner, &cpms);
        builder.build().unwrap();
        let licas = builder.create_associations().unwrap();

        assert_eq!(server.create_call_count(), 0);
        assert_eq!(licas.len(), 6);
        // Downstream references point at synthetic ids.
        assert!(licas.iter().all(|rec| {
            matches!(rec.id_field("lineItemId"), Some(Id::Synthetic(_)))
                && matches!(rec.id_field("creativeId"), Some(Id::Synthetic(_)))
        }));
    }

    #[test]
    fn order_name_covers_the_batch_range() {
        let server = InMemoryAdServer::new();
        let config = config();
        let renderer = Renderer::new();
        let mut cache = RunCache::new();
        let cpms = config.cpm_points();

        let ctx = BatchCtx {
            op: op(&server, false),
            config: &config,
            renderer: &renderer,
            ad_units: &[],
            placements: &[],
        };
        let mut builder =
            PriceBatchBuilder::new(ctx, &mut cache, &config.bidders[0], MediaType::Banner, &cpms);
        let order = builder.order().unwrap();
        assert_eq!(order.name(), Some("Prebid bidderA banner 1.00-1.20"));
        assert!(order.id_field("traffickerId").is_some());
    }
}

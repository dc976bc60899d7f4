//! The provisioning state machine:
//! `INIT → RESOLVE_REFS → BUILD_BATCHES(loop) → {SUCCESS | FAILURE} → CLEANUP → DONE`.
//!
//! RESOLVE_REFS is read-only and fails fast on a missing inventory
//! reference, so a misconfigured name never produces partial creation.
//! BUILD_BATCHES iterates bidders × media types × CPM batches in declared
//! configuration order, strictly sequentially; archived-order bookkeeping
//! and log correlation depend on that determinism.

use crate::settings::ProvisionSettings;
use anyhow::Context;
use chrono::{DateTime, Utc};
use lineforge_config::AppConfig;
use lineforge_domain::ops::{self, OpCtx, ResourceOp};
use lineforge_domain::{targeting, BatchCtx, PriceBatchBuilder, ProvisionError, RunCache};
use lineforge_gateway::AdServer;
use lineforge_render::Renderer;
use lineforge_types::{Id, Record};
use serde::Serialize;
use tracing::{info, warn};

/// Summary of a completed provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Price-batch builders driven to completion; equals
    /// bidders × media types × batches on success.
    pub batches_built: usize,
    /// Distinct order ids created, in creation order.
    pub orders: Vec<Id>,
    pub advertisers: usize,
    pub creatives: usize,
    pub line_items: usize,
    pub associations: usize,
}

#[derive(Default)]
struct RunState {
    order_ids: Vec<Id>,
    line_items: usize,
    associations: usize,
    batches_built: usize,
    success: bool,
}

/// Run the full provisioning pipeline against a gateway.
///
/// On any fatal error the compensating archive runs first (unless skipped or
/// dry) and the error is then re-raised; archive failures are logged, never
/// allowed to mask the original error.
pub fn run_provision(
    settings: &ProvisionSettings,
    config: &AppConfig,
    gateway: &dyn AdServer,
) -> anyhow::Result<ProvisionOutcome> {
    let started_at = Utc::now();
    let renderer = Renderer::new();
    let op = OpCtx {
        gateway,
        dry_run: settings.dry_run,
    };
    let mut cache = RunCache::new();
    let mut run = RunState::default();

    let result = drive(op, config, &renderer, &mut cache, &mut run);
    run.success = result.is_ok();

    if let Err(archive_err) = cleanup(op, settings, &run) {
        warn!("order archive failed: {:#}", archive_err);
    }

    result?;

    Ok(ProvisionOutcome {
        started_at,
        ended_at: Utc::now(),
        dry_run: settings.dry_run,
        batches_built: run.batches_built,
        orders: run.order_ids,
        advertisers: cache.advertiser_count(),
        creatives: cache.creative_count(),
        line_items: run.line_items,
        associations: run.associations,
    })
}

fn drive(
    op: OpCtx<'_>,
    config: &AppConfig,
    renderer: &Renderer,
    cache: &mut RunCache,
    run: &mut RunState,
) -> anyhow::Result<()> {
    // RESOLVE_REFS: read-only, before any mutating call.
    let ad_units = resolve_named(op, "ad unit", &config.targeting.ad_unit_names, ops::ad_unit)?;
    let placements = resolve_named(
        op,
        "placement",
        &config.targeting.placement_names,
        ops::placement,
    )?;
    {
        let network = cache.ensure_network(op)?;
        info!(
            network = network.str_field("displayName").unwrap_or("unknown"),
            ad_units = ad_units.len(),
            placements = placements.len(),
            "resolved referenced inventory"
        );
    }
    cache.ensure_user(op)?;

    // Declared custom targeting is fetch-or-create, so it runs after the
    // read-only reference checks.
    for custom in &config.targeting.custom {
        targeting::resolve(op, &custom.key, &custom.values)
            .with_context(|| format!("resolve custom targeting key '{}'", custom.key))?;
    }

    // BUILD_BATCHES, in declared configuration order.
    let batches = config.cpm_batches();
    info!(
        bidders = config.bidders.len(),
        media_types = config.media_types.len(),
        batches = batches.len(),
        "building price batches"
    );

    for bidder in &config.bidders {
        info!(bidder = %bidder.code, name = bidder.display_name(), "bidder");
        for media_type in &config.media_types {
            for cpms in &batches {
                let (Some(cpm_min), Some(cpm_max)) = (cpms.first(), cpms.last()) else {
                    continue;
                };
                info!(
                    media_type = %media_type,
                    cpm_min = %cpm_min,
                    cpm_max = %cpm_max,
                    count = cpms.len(),
                    "line items"
                );

                let ctx = BatchCtx {
                    op,
                    config,
                    renderer,
                    ad_units: &ad_units,
                    placements: &placements,
                };
                let mut builder =
                    PriceBatchBuilder::new(ctx, cache, bidder, *media_type, cpms);

                // Record the order id as soon as the order exists, so a
                // later failure in the same batch still archives it.
                let order_id = builder
                    .order()?
                    .id()
                    .context("order record has no id")?;
                if !run.order_ids.contains(&order_id) {
                    run.order_ids.push(order_id);
                }

                builder.build()?;
                run.line_items += builder.line_items()?.len();

                let licas = builder.create_associations()?;
                info!(count = licas.len(), "created associations");
                run.associations += licas.len();
                run.batches_built += 1;
            }
        }
    }
    Ok(())
}

fn resolve_named(
    op: OpCtx<'_>,
    kind: &'static str,
    names: &[String],
    make: for<'g> fn(OpCtx<'g>, &str) -> ResourceOp<'g>,
) -> anyhow::Result<Vec<Record>> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let rec = make(op, name)
            .fetch_one(false)?
            .ok_or_else(|| ProvisionError::ReferenceNotFound {
                kind,
                name: name.clone(),
            })?;
        out.push(rec);
    }
    Ok(out)
}

// CLEANUP: best-effort compensating archive.
fn cleanup(
    op: OpCtx<'_>,
    settings: &ProvisionSettings,
    run: &RunState,
) -> anyhow::Result<()> {
    if run.success || settings.skip_auto_archive || run.order_ids.is_empty() {
        return Ok(());
    }
    if op.dry_run {
        info!("dry run failed; no remote orders were created, skipping archive");
        return Ok(());
    }

    info!(orders = ?run.order_ids, "auto-archiving orders created this run");
    let outcome = op
        .gateway
        .archive_orders(&run.order_ids)
        .context("archive orders")?;

    let expected = run.order_ids.len() as u64;
    match outcome.num_changes {
        Some(changes) if changes == expected => {}
        reported => warn!(
            expected,
            ?reported,
            "order archive reported an unexpected change count"
        ),
    }
    Ok(())
}

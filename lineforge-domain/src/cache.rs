//! Resolve-once memoization for a provisioning run.
//!
//! The cache is an explicit holder with idempotent ensure-accessors: each
//! slot is populated at most once per run and shared read-only by every
//! price-batch builder that references the same bidder or media type. This
//! is what makes a single Advertiser serve all media types for one bidder
//! instead of being re-fetched per batch.

use crate::ops::OpCtx;
use crate::targeting::CustomTargeting;
use anyhow::Context;
use lineforge_types::{MediaType, Record};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct RunCache {
    network: Option<Record>,
    user: Option<Record>,
    advertisers: BTreeMap<String, Record>,
    targeting: BTreeMap<String, CustomTargeting>,
    creatives: BTreeMap<(String, MediaType), Vec<Record>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The network this run is operating against, fetched once.
    pub fn ensure_network(&mut self, ctx: OpCtx<'_>) -> anyhow::Result<&Record> {
        match &mut self.network {
            Some(rec) => Ok(rec),
            slot @ None => {
                let rec = ctx
                    .gateway
                    .current_network()
                    .context("fetch current network")?;
                Ok(slot.insert(rec))
            }
        }
    }

    /// The user this run is operating as, fetched once. Orders are
    /// trafficked by this user.
    pub fn ensure_user(&mut self, ctx: OpCtx<'_>) -> anyhow::Result<&Record> {
        match &mut self.user {
            Some(rec) => Ok(rec),
            slot @ None => {
                let rec = ctx.gateway.current_user().context("fetch current user")?;
                Ok(slot.insert(rec))
            }
        }
    }

    /// One advertiser per bidder code for the whole run.
    pub fn ensure_advertiser(
        &mut self,
        bidder_code: &str,
        make: impl FnOnce() -> anyhow::Result<Record>,
    ) -> anyhow::Result<&Record> {
        match self.advertisers.entry(bidder_code.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(make()?)),
        }
    }

    /// One resolved targeting set per key name for the whole run.
    pub fn ensure_targeting(
        &mut self,
        key_name: &str,
        make: impl FnOnce() -> anyhow::Result<CustomTargeting>,
    ) -> anyhow::Result<&CustomTargeting> {
        match self.targeting.entry(key_name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(make()?)),
        }
    }

    /// One creative set per (bidder, media type) for the whole run.
    pub fn ensure_creatives(
        &mut self,
        bidder_code: &str,
        media_type: MediaType,
        make: impl FnOnce() -> anyhow::Result<Vec<Record>>,
    ) -> anyhow::Result<&[Record]> {
        match self.creatives.entry((bidder_code.to_string(), media_type)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(make()?)),
        }
    }

    pub fn advertiser_count(&self) -> usize {
        self.advertisers.len()
    }

    pub fn creative_count(&self) -> usize {
        self.creatives.values().map(Vec::len).sum()
    }

    pub fn targeting_key_count(&self) -> usize {
        self.targeting.len()
    }
}

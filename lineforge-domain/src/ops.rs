//! The fetch-or-create primitive over one remote object type.
//!
//! Every reconciliation in the workspace goes through [`ResourceOp`]: query
//! by the record's declared equality filter, treat the query result as the
//! source of truth for "already exists", and create only what is missing.
//! Matching is always by natural key — the remote store does not guarantee
//! that creation results correspond positionally to their input.

use crate::error::ProvisionError;
use crate::validate::validate_created;
use anyhow::Context;
use lineforge_gateway::AdServer;
use lineforge_types::{Filter, Id, NaturalKey, ObjectType, Record};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Shared per-run operation context: the gateway plus the process-wide
/// dry-run flag.
#[derive(Clone, Copy)]
pub struct OpCtx<'a> {
    pub gateway: &'a dyn AdServer,
    pub dry_run: bool,
}

/// Extracts a record's natural key, if its key fields are present.
pub type KeyFn = fn(&Record) -> Option<NaturalKey>;

/// Options for [`ResourceOp::fetch`].
#[derive(Debug, Default)]
pub struct FetchSpec {
    pub create: bool,
    pub recs: Vec<Record>,
    pub validate: bool,
}

/// One logical resource reconciled against the remote store.
pub struct ResourceOp<'a> {
    ctx: OpCtx<'a>,
    object_type: ObjectType,
    filter: Filter,
    template: Record,
    key: KeyFn,
    dry_label: fn(&Record) -> String,
}

impl<'a> ResourceOp<'a> {
    /// Fetch the single record matching this op's filter.
    ///
    /// With `create`, a missing record is created from the op's template in
    /// exactly one call. More than one match for a uniquely-keyed filter is
    /// a data-integrity error.
    pub fn fetch_one(&self, create: bool) -> anyhow::Result<Option<Record>> {
        let mut found = self.query()?;
        if found.len() > 1 {
            return Err(ProvisionError::AmbiguousMatch {
                object_type: self.object_type,
                filter: self.filter.to_string(),
                count: found.len(),
            }
            .into());
        }
        if let Some(rec) = found.pop() {
            return Ok(Some(rec));
        }
        if !create {
            return Ok(None);
        }
        let created = self.create_batch(vec![self.template.clone()])?;
        let rec = created
            .into_iter()
            .next()
            .with_context(|| format!("create {} returned no records", self.object_type))?;
        Ok(Some(rec))
    }

    /// Fetch everything matching this op's filter, optionally creating the
    /// subset of `recs` whose natural key is not already present.
    ///
    /// Returns the union of pre-existing matches and newly created records.
    pub fn fetch(&self, spec: FetchSpec) -> anyhow::Result<Vec<Record>> {
        let mut out = self.query()?;
        if spec.create {
            let existing: HashSet<NaturalKey> =
                out.iter().filter_map(|rec| (self.key)(rec)).collect();
            let mut to_create = Vec::new();
            for rec in &spec.recs {
                if !existing.contains(&self.key_of(rec)?) {
                    to_create.push(rec.clone());
                }
            }
            out.extend(self.create_batch(to_create)?);
        }
        if spec.validate {
            validate_created(self.object_type, &spec.recs, &out, self.key)?;
        }
        Ok(out)
    }

    /// Unconditional bulk create, for the object types that are never
    /// fetched (line items, associations).
    pub fn create_all(&self, recs: Vec<Record>, validate: bool) -> anyhow::Result<Vec<Record>> {
        let requested = validate.then(|| recs.clone());
        let created = self.create_batch(recs)?;
        if let Some(requested) = requested {
            validate_created(self.object_type, &requested, &created, self.key)?;
        }
        Ok(created)
    }

    fn query(&self) -> anyhow::Result<Vec<Record>> {
        self.ctx
            .gateway
            .query(self.object_type, &self.filter)
            .with_context(|| format!("query {}", self.object_type))
    }

    fn key_of(&self, rec: &Record) -> anyhow::Result<NaturalKey> {
        (self.key)(rec).with_context(|| {
            format!("{} record is missing its natural key fields", self.object_type)
        })
    }

    fn create_batch(&self, recs: Vec<Record>) -> anyhow::Result<Vec<Record>> {
        if recs.is_empty() {
            return Ok(Vec::new());
        }
        if self.ctx.dry_run {
            debug!(object_type = %self.object_type, count = recs.len(), "dry run, synthesizing ids");
            return Ok(recs
                .into_iter()
                .map(|mut rec| {
                    let label = (self.dry_label)(&rec);
                    rec.set_id(synthetic_id(&label));
                    rec
                })
                .collect());
        }
        debug!(object_type = %self.object_type, count = recs.len(), "creating records");
        self.ctx
            .gateway
            .create(self.object_type, recs)
            .with_context(|| format!("create {}", self.object_type))
    }
}

/// A locally synthesized id for a record a dry run would have created.
/// Random enough to stay unique within a run, labeled enough to read in logs.
pub fn synthetic_id(label: &str) -> Id {
    let uniq = Uuid::new_v4().simple().to_string();
    Id::Synthetic(format!("dry-{}-{}", &uniq[..8], label))
}

fn name_key(rec: &Record) -> Option<NaturalKey> {
    rec.name().map(|name| NaturalKey::Name(name.to_string()))
}

fn lica_key(rec: &Record) -> Option<NaturalKey> {
    Some(NaturalKey::Pair(
        rec.id_field("lineItemId")?,
        rec.id_field("creativeId")?,
    ))
}

fn name_label(rec: &Record) -> String {
    rec.name().unwrap_or("record").to_string()
}

// Creatives share a rendered name across sizes; the size keeps their
// synthetic ids apart.
fn creative_label(rec: &Record) -> String {
    let name = rec.name().unwrap_or("creative");
    match (rec.get_path("size.width"), rec.get_path("size.height")) {
        (Some(w), Some(h)) => format!("{}-{}x{}", name, w, h),
        _ => name.to_string(),
    }
}

fn lica_label(_rec: &Record) -> String {
    "lica".to_string()
}

pub fn advertiser<'a>(ctx: OpCtx<'a>, name: &str) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::Advertiser,
        filter: Filter::new().eq("name", name).eq("type", "ADVERTISER"),
        template: Record::new().with("name", name).with("type", "ADVERTISER"),
        key: name_key,
        dry_label: name_label,
    }
}

pub fn order<'a>(
    ctx: OpCtx<'a>,
    name: &str,
    advertiser_id: Id,
    trafficker_id: Id,
) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::Order,
        filter: Filter::new()
            .eq("name", name)
            .eq("advertiserId", advertiser_id.clone()),
        template: Record::new()
            .with("name", name)
            .with("advertiserId", advertiser_id)
            .with("traffickerId", trafficker_id),
        key: name_key,
        dry_label: name_label,
    }
}

/// Read-only ad unit lookup by name.
pub fn ad_unit<'a>(ctx: OpCtx<'a>, name: &str) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::AdUnit,
        filter: Filter::new().eq("name", name),
        template: Record::new(),
        key: name_key,
        dry_label: name_label,
    }
}

/// Read-only placement lookup by name.
pub fn placement<'a>(ctx: OpCtx<'a>, name: &str) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::Placement,
        filter: Filter::new().eq("name", name),
        template: Record::new(),
        key: name_key,
        dry_label: name_label,
    }
}

pub fn targeting_key<'a>(ctx: OpCtx<'a>, name: &str) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::TargetingKey,
        filter: Filter::new().eq("name", name),
        template: Record::new()
            .with("name", name)
            .with("displayName", name)
            .with("type", "PREDEFINED"),
        key: name_key,
        dry_label: name_label,
    }
}

/// All targeting values under one key; value identity is the name within
/// that key's scope.
pub fn targeting_values<'a>(ctx: OpCtx<'a>, key_id: Id) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::TargetingValue,
        filter: Filter::new().eq("customTargetingKeyId", key_id),
        template: Record::new(),
        key: name_key,
        dry_label: name_label,
    }
}

/// A creative scoped to its template's name, advertiser, and size; the
/// filter carries the size so one name can exist per declared size.
pub fn creative<'a>(ctx: OpCtx<'a>, template: Record) -> ResourceOp<'a> {
    let mut filter = Filter::new();
    if let Some(name) = template.name() {
        filter = filter.eq("name", name);
    }
    if let Some(advertiser_id) = template.get("advertiserId") {
        filter = filter.eq("advertiserId", advertiser_id.clone());
    }
    if let Some(width) = template.get_path("size.width") {
        filter = filter.eq("size.width", width.clone());
    }
    if let Some(height) = template.get_path("size.height") {
        filter = filter.eq("size.height", height.clone());
    }
    ResourceOp {
        ctx,
        object_type: ObjectType::Creative,
        filter,
        template,
        key: name_key,
        dry_label: creative_label,
    }
}

/// Create-only line items.
pub fn line_items<'a>(ctx: OpCtx<'a>) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::LineItem,
        filter: Filter::new(),
        template: Record::new(),
        key: name_key,
        dry_label: name_label,
    }
}

/// Create-only line-item/creative associations, keyed by the ordered
/// (lineItemId, creativeId) pair.
pub fn licas<'a>(ctx: OpCtx<'a>) -> ResourceOp<'a> {
    ResourceOp {
        ctx,
        object_type: ObjectType::Lica,
        filter: Filter::new(),
        template: Record::new(),
        key: lica_key,
        dry_label: lica_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineforge_gateway::InMemoryAdServer;
    use pretty_assertions::assert_eq;

    fn ctx(server: &InMemoryAdServer) -> OpCtx<'_> {
        OpCtx {
            gateway: server,
            dry_run: false,
        }
    }

    fn dry_ctx(server: &InMemoryAdServer) -> OpCtx<'_> {
        OpCtx {
            gateway: server,
            dry_run: true,
        }
    }

    #[test]
    fn fetch_one_creates_once_then_reuses() {
        let server = InMemoryAdServer::new();

        let first = advertiser(ctx(&server), "adv-a")
            .fetch_one(true)
            .unwrap()
            .unwrap();
        let second = advertiser(ctx(&server), "adv-a")
            .fetch_one(true)
            .unwrap()
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(server.create_call_count(), 1);
        assert_eq!(server.records(ObjectType::Advertiser).len(), 1);
    }

    #[test]
    fn fetch_one_returns_none_without_create() {
        let server = InMemoryAdServer::new();
        let found = ad_unit(ctx(&server), "missing").fetch_one(false).unwrap();
        assert!(found.is_none());
        assert_eq!(server.create_call_count(), 0);
    }

    #[test]
    fn fetch_one_rejects_ambiguous_matches() {
        let server = InMemoryAdServer::new();
        server.seed(ObjectType::AdUnit, Record::new().with("name", "dup"));
        server.seed(ObjectType::AdUnit, Record::new().with("name", "dup"));

        let err = ad_unit(ctx(&server), "dup").fetch_one(false).unwrap_err();
        match err.downcast_ref::<ProvisionError>() {
            Some(ProvisionError::AmbiguousMatch { count, .. }) => assert_eq!(*count, 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn fetch_creates_only_the_missing_subset() {
        let server = InMemoryAdServer::new();
        let key = targeting_key(ctx(&server), "hb_pb_a")
            .fetch_one(true)
            .unwrap()
            .unwrap();
        let key_id = key.id().unwrap();

        let value = |name: &str| {
            Record::new()
                .with("customTargetingKeyId", key_id.clone())
                .with("name", name)
                .with("displayName", name)
                .with("matchType", "EXACT")
        };

        // Pre-create one of three values.
        targeting_values(ctx(&server), key_id.clone())
            .fetch(FetchSpec {
                create: true,
                recs: vec![value("0.10")],
                validate: true,
            })
            .unwrap();
        let calls_before = server.create_call_count();

        let all = targeting_values(ctx(&server), key_id.clone())
            .fetch(FetchSpec {
                create: true,
                recs: vec![value("0.10"), value("0.20"), value("0.30")],
                validate: true,
            })
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(server.create_call_count(), calls_before + 1);
        assert_eq!(server.records(ObjectType::TargetingValue).len(), 3);
    }

    #[test]
    fn fetch_with_nothing_missing_issues_no_create() {
        let server = InMemoryAdServer::new();
        server.seed(ObjectType::TargetingValue, {
            Record::new()
                .with("customTargetingKeyId", 9)
                .with("name", "0.10")
        });

        let all = targeting_values(ctx(&server), Id::Num(9))
            .fetch(FetchSpec {
                create: true,
                recs: vec![Record::new()
                    .with("customTargetingKeyId", 9)
                    .with("name", "0.10")],
                validate: true,
            })
            .unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(server.create_call_count(), 0);
    }

    #[test]
    fn dry_run_synthesizes_ids_without_gateway_writes() {
        let server = InMemoryAdServer::new();

        let rec = advertiser(dry_ctx(&server), "adv-dry")
            .fetch_one(true)
            .unwrap()
            .unwrap();

        let id = rec.id().unwrap();
        assert!(id.is_synthetic());
        assert!(id.to_string().starts_with("dry-"));
        assert!(id.to_string().ends_with("adv-dry"));
        assert_eq!(server.create_call_count(), 0);
        assert!(server.records(ObjectType::Advertiser).is_empty());
    }

    #[test]
    fn dry_run_creative_labels_include_size() {
        let server = InMemoryAdServer::new();
        let template = Record::new()
            .with("name", "banner-x")
            .with("advertiserId", 3)
            .with("size", serde_json::json!({"width": 300, "height": 250}));

        let rec = creative(dry_ctx(&server), template)
            .fetch_one(true)
            .unwrap()
            .unwrap();
        assert!(rec.id().unwrap().to_string().ends_with("banner-x-300x250"));
    }

    #[test]
    fn creative_filter_separates_sizes_sharing_a_name() {
        let server = InMemoryAdServer::new();
        let template = |w: u32, h: u32| {
            Record::new()
                .with("name", "banner-x")
                .with("advertiserId", 3)
                .with("size", serde_json::json!({"width": w, "height": h}))
        };

        creative(ctx(&server), template(300, 250))
            .fetch_one(true)
            .unwrap();
        creative(ctx(&server), template(728, 90))
            .fetch_one(true)
            .unwrap();
        // Same name + size resolves to the existing record.
        creative(ctx(&server), template(300, 250))
            .fetch_one(true)
            .unwrap();

        assert_eq!(server.records(ObjectType::Creative).len(), 2);
    }

    #[test]
    fn create_all_validates_pair_keys() {
        let server = InMemoryAdServer::new();
        let recs = vec![
            Record::new().with("lineItemId", 10).with("creativeId", 20),
            Record::new().with("lineItemId", 10).with("creativeId", 21),
        ];

        let created = licas(ctx(&server)).create_all(recs, true).unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|rec| rec.id().is_some()));
    }

    #[test]
    fn synthetic_ids_are_unique_per_call() {
        let a = synthetic_id("label");
        let b = synthetic_id("label");
        assert_ne!(a, b);
    }
}

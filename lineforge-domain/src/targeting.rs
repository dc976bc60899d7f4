//! Targeting key and value-set resolution.

use crate::ops::{self, FetchSpec, OpCtx};
use anyhow::Context;
use lineforge_types::{Id, Record};
use std::collections::HashMap;

/// A resolved targeting key with its full value set.
#[derive(Debug, Clone)]
pub struct CustomTargeting {
    pub key: Record,
    pub values: Vec<Record>,
    /// Name → record, for O(1) lookup when building line items.
    pub by_name: HashMap<String, Record>,
}

impl CustomTargeting {
    pub fn key_id(&self) -> Option<Id> {
        self.key.id()
    }

    pub fn value_id(&self, name: &str) -> Option<Id> {
        self.by_name.get(name).and_then(Record::id)
    }
}

/// Fetch-or-create a targeting key by name, then fetch-or-create all its
/// values in one bulk call with validation.
///
/// Safe to call repeatedly for the same key: fetch-or-create finds what an
/// earlier call created, and callers that share a run memoize the result in
/// the run cache so repeated batches cost nothing.
pub fn resolve(
    ctx: OpCtx<'_>,
    key_name: &str,
    value_names: &[String],
) -> anyhow::Result<CustomTargeting> {
    let key = ops::targeting_key(ctx, key_name)
        .fetch_one(true)?
        .with_context(|| format!("targeting key '{}' could not be resolved", key_name))?;
    let key_id = key
        .id()
        .with_context(|| format!("targeting key '{}' has no id", key_name))?;

    let recs: Vec<Record> = value_names
        .iter()
        .map(|name| {
            Record::new()
                .with("customTargetingKeyId", key_id.clone())
                .with("name", name.as_str())
                .with("displayName", name.as_str())
                .with("matchType", "EXACT")
        })
        .collect();

    let values = ops::targeting_values(ctx, key_id).fetch(FetchSpec {
        create: true,
        recs,
        validate: true,
    })?;
    let by_name = values
        .iter()
        .filter_map(|value| value.name().map(|n| (n.to_string(), value.clone())))
        .collect();

    Ok(CustomTargeting {
        key,
        values,
        by_name,
    })
}

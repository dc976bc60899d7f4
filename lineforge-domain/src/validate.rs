//! Post-create completeness checking.
//!
//! The remote store can report transport-level success while silently
//! dropping records from a bulk create. Comparing natural-key sets is the
//! only defense; this check is never suppressed.

use crate::error::ProvisionError;
use crate::ops::KeyFn;
use anyhow::Context;
use lineforge_types::{NaturalKey, ObjectType, Record};
use std::collections::HashSet;

/// Fail if any requested record's natural key is absent from the returned
/// set, naming every missing key.
pub fn validate_created(
    object_type: ObjectType,
    requested: &[Record],
    returned: &[Record],
    key: KeyFn,
) -> anyhow::Result<()> {
    let observed: HashSet<NaturalKey> = returned.iter().filter_map(key).collect();
    let mut missing = Vec::new();
    for rec in requested {
        let k = key(rec).with_context(|| {
            format!("{} record is missing its natural key fields", object_type)
        })?;
        if !observed.contains(&k) {
            missing.push(k.to_string());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::MissingAfterCreate {
            object_type,
            missing,
        }
        .into())
    }
}

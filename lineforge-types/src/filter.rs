use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One equality clause of a query filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Field name; dotted paths reach into nested objects ("size.width").
    pub field: String,
    pub value: Value,
}

/// An equality filter over a record's declared query fields.
///
/// The remote store treats query results as the source of truth for "already
/// exists", so filters must name exactly the fields that make up a record's
/// identity scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(FilterClause {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    /// Whether a record satisfies every clause. An empty filter matches all.
    pub fn matches(&self, rec: &Record) -> bool {
        self.clauses
            .iter()
            .all(|clause| rec.get_path(&clause.field) == Some(&clause.value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("(all)");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{} = {}", clause.field, clause.value)?;
        }
        Ok(())
    }
}

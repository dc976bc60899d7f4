use lineforge_types::ObjectType;

/// The fatal error taxonomy of a provisioning run.
///
/// Everything here aborts the run; the orchestrator's only response is the
/// compensating archive. The archive-count mismatch is deliberately absent —
/// it is logged, never raised.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// A configured inventory reference has no remote match. Raised during
    /// reference resolution, before any mutating call.
    #[error("{kind} named '{name}' was not found")]
    ReferenceNotFound { kind: &'static str, name: String },

    /// A bulk create reported success but the returned set is missing
    /// requested natural keys. The remote mutation already partially
    /// happened, so this must trigger cleanup, never a silent retry.
    #[error("{object_type} records were not found after creation: {missing:?}")]
    MissingAfterCreate {
        object_type: ObjectType,
        missing: Vec<String>,
    },

    /// A uniquely-keyed filter matched more than one record.
    #[error("expected at most one {object_type} matching {filter}, found {count}")]
    AmbiguousMatch {
        object_type: ObjectType,
        filter: String,
        count: usize,
    },
}

use lineforge_types::{Filter, Id, ObjectType, Record};

/// Result of a bulk order archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    /// Change count reported by the remote store, if it reported one.
    pub num_changes: Option<u64>,
}

/// Blocking access to the remote ad server's object store.
///
/// `query` results are an ordered sequence, but creation results are NOT
/// guaranteed to correspond positionally to their input; callers must match
/// by natural key.
pub trait AdServer {
    /// Fetch all records of one type matching an equality filter.
    fn query(&self, object_type: ObjectType, filter: &Filter) -> anyhow::Result<Vec<Record>>;

    /// Create records, returning them with server-assigned ids attached.
    fn create(&self, object_type: ObjectType, recs: Vec<Record>) -> anyhow::Result<Vec<Record>>;

    /// Archive orders by id in one bulk call. Archived orders cascade to
    /// their line items on the platform side; this is a state transition,
    /// not a deletion.
    fn archive_orders(&self, ids: &[Id]) -> anyhow::Result<ArchiveOutcome>;

    /// The network this session is authenticated against.
    fn current_network(&self) -> anyhow::Result<Record>;

    /// The user this session is authenticated as.
    fn current_user(&self) -> anyhow::Result<Record>;
}

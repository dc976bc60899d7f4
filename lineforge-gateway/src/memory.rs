use crate::port::{AdServer, ArchiveOutcome};
use crate::snapshot::InventorySnapshot;
use anyhow::Context;
use lineforge_types::{Filter, Id, ObjectType, Record};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct Store {
    next_id: i64,
    tables: BTreeMap<ObjectType, Vec<Record>>,
    archived_orders: Vec<Id>,
    network: Record,
    user: Record,
    create_calls: u64,
}

/// An in-memory ad server backing tests and inventory-snapshot runs.
///
/// Records are matched with the same equality-filter semantics the port
/// promises, ids are assigned from a single sequence across all object
/// types, and archive calls report their change count like the real store.
#[derive(Debug)]
pub struct InMemoryAdServer {
    store: Mutex<Store>,
}

impl Default for InMemoryAdServer {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAdServer {
    pub fn new() -> Self {
        let store = Store {
            next_id: 1,
            network: Record::new()
                .with("id", 1001)
                .with("displayName", "In-memory network")
                .with("networkCode", "0000"),
            user: Record::new()
                .with("id", 1002)
                .with("name", "lineforge")
                .with("isActive", true),
            ..Default::default()
        };
        Self {
            store: Mutex::new(store),
        }
    }

    /// Build a server pre-populated from an inventory snapshot.
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let server = Self::new();
        {
            let mut store = server.lock();
            if let Some(network) = snapshot.network {
                store.network = network;
            }
            if let Some(user) = snapshot.user {
                store.user = user;
            }
            for rec in snapshot.ad_units {
                insert_seed(&mut store, ObjectType::AdUnit, rec);
            }
            for rec in snapshot.placements {
                insert_seed(&mut store, ObjectType::Placement, rec);
            }
        }
        server
    }

    /// Seed a record directly, assigning an id if it has none.
    pub fn seed(&self, object_type: ObjectType, rec: Record) {
        insert_seed(&mut self.lock(), object_type, rec);
    }

    /// All records of one type, in insertion order.
    pub fn records(&self, object_type: ObjectType) -> Vec<Record> {
        self.lock()
            .tables
            .get(&object_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Order ids archived so far, in call order.
    pub fn archived_orders(&self) -> Vec<Id> {
        self.lock().archived_orders.clone()
    }

    /// How many create calls have reached this server.
    pub fn create_call_count(&self) -> u64 {
        self.lock().create_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn insert_seed(store: &mut Store, object_type: ObjectType, mut rec: Record) {
    if rec.id().is_none() {
        let id = store.next_id;
        store.next_id += 1;
        rec.set_id(Id::Num(id));
    }
    store.tables.entry(object_type).or_default().push(rec);
}

impl AdServer for InMemoryAdServer {
    fn query(&self, object_type: ObjectType, filter: &Filter) -> anyhow::Result<Vec<Record>> {
        let store = self.lock();
        let hits = store
            .tables
            .get(&object_type)
            .map(|table| {
                table
                    .iter()
                    .filter(|rec| filter.matches(rec))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        debug!(%object_type, %filter, hits = hits.len(), "query");
        Ok(hits)
    }

    fn create(&self, object_type: ObjectType, recs: Vec<Record>) -> anyhow::Result<Vec<Record>> {
        let mut store = self.lock();
        store.create_calls += 1;
        let mut created = Vec::with_capacity(recs.len());
        for mut rec in recs {
            let id = store.next_id;
            store.next_id += 1;
            rec.set_id(Id::Num(id));
            store.tables.entry(object_type).or_default().push(rec.clone());
            created.push(rec);
        }
        debug!(%object_type, count = created.len(), "create");
        Ok(created)
    }

    fn archive_orders(&self, ids: &[Id]) -> anyhow::Result<ArchiveOutcome> {
        let mut store = self.lock();
        let mut changes = 0u64;
        let orders = store.tables.entry(ObjectType::Order).or_default();
        for order in orders.iter_mut() {
            let Some(id) = order.id() else { continue };
            let already =
                order.get("isArchived") == Some(&serde_json::Value::Bool(true));
            if ids.contains(&id) && !already {
                order.insert("isArchived", true);
                changes += 1;
            }
        }
        store.archived_orders.extend(ids.iter().cloned());
        Ok(ArchiveOutcome {
            num_changes: Some(changes),
        })
    }

    fn current_network(&self) -> anyhow::Result<Record> {
        Ok(self.lock().network.clone())
    }

    fn current_user(&self) -> anyhow::Result<Record> {
        let user = self.lock().user.clone();
        user.id().context("in-memory user has no id")?;
        Ok(user)
    }
}

//! In-memory knowledge-graph store.
//!
//! This is the reference implementation of `GraphStore`.
//! It keeps a typed graph behind a single `RwLock`.
//!
//! ## Limitations
//!
//! - **No rule engine**: `TxOptions::infer` is accepted, but only type and
//!   role subtyping are inferred. Rule-derived facts must be materialized
//!   in the snapshot.
//! - **No real transactions**: transactions are markers. Writes through the
//!   loading API apply immediately and are visible to open transactions.
//! - **No indexes beyond attribute uniqueness**: patterns are solved by
//!   scanning, which is fine for the neighbourhoods the interpreter asks for.
//!
//! Use this store for:
//! - Testing the interpreter end to end
//! - Running the `sam` binary against a JSON snapshot

mod data;
mod eval;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use data::GraphData;
use super::{GraphStore, Snapshot, StoreConfig};
use crate::model::{ConceptRow, DeclaredType, Iid, TypeKind, Value, ValueType};
use crate::tx::{Transaction, TxId, TxMode, TxOptions};
use crate::typeql::MatchQuery;
use crate::Result;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory typed graph store. Cloning shares the underlying graph.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    data: RwLock<GraphData>,
    next_tx_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty store holding only the root types.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                data: RwLock::new(GraphData::new()),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// Build a store from a parsed snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self> {
        let store = Self::new();
        snapshot.load_into(&store)?;
        Ok(store)
    }

    /// Read a JSON snapshot file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = Snapshot::from_json_file(path)?;
        Self::from_snapshot(&snapshot)
    }

    /// Open the store described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        match config {
            StoreConfig::Memory { snapshot: Some(path) } => Self::load_json(path),
            StoreConfig::Memory { snapshot: None } => Ok(Self::new()),
        }
    }

    // ========================================================================
    // Loading API
    // ========================================================================

    pub fn define_entity(&self, label: &str, supertype: Option<&str>) -> Result<()> {
        self.inner.data.write().define_type(label, TypeKind::Entity, supertype, None, &[])
    }

    pub fn define_attribute(&self, label: &str, supertype: Option<&str>, value_type: ValueType) -> Result<()> {
        self.inner.data.write().define_type(label, TypeKind::Attribute, supertype, Some(value_type), &[])
    }

    pub fn define_relation(&self, label: &str, supertype: Option<&str>, relates: &[String]) -> Result<()> {
        self.inner.data.write().define_type(label, TypeKind::Relation, supertype, None, relates)
    }

    pub fn insert_entity(&self, type_label: &str) -> Result<Iid> {
        self.inner.data.write().insert_entity(type_label)
    }

    /// Attach `attribute = value` to `owner`, creating the attribute if needed.
    pub fn insert_has(&self, owner: Iid, attribute: &str, value: Value) -> Result<Iid> {
        let mut data = self.inner.data.write();
        let attr = data.put_attribute(attribute, value)?;
        data.add_ownership(owner, attr)?;
        Ok(attr)
    }

    pub fn insert_relation(&self, type_label: &str, players: &[(&str, Iid)]) -> Result<Iid> {
        self.inner.data.write().insert_relation(type_label, players)
    }

    /// Declared value type of an attribute type.
    pub fn value_type(&self, attribute: &str) -> Option<ValueType> {
        self.inner.data.read().value_type(attribute)
    }

    pub fn instance_count(&self) -> usize {
        self.inner.data.read().instance_count()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction (a marker: id, mode, options).
#[derive(Debug)]
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    options: TxOptions,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
    fn options(&self) -> TxOptions { self.options }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn open_tx(&self, mode: TxMode, options: TxOptions) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode, options })
    }

    /// No-op: nothing is buffered per transaction.
    async fn close_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    async fn resolve_declared_type(&self, _tx: &MemoryTx, label: &str) -> Result<Option<DeclaredType>> {
        Ok(self.inner.data.read().declared_type(label))
    }

    async fn match_query(&self, tx: &MemoryTx, query: &MatchQuery) -> Result<Vec<ConceptRow>> {
        let rows = eval::evaluate(&self.inner.data.read(), query)?;
        debug!(tx = tx.id.0, answers = rows.len(), "{query}");
        Ok(rows)
    }
}

//! # Graph Store Trait
//!
//! This is THE contract between the interpreter and any knowledge-graph store.
//! The interpreter only reads: it resolves declared types and runs typed
//! match queries inside a transaction.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory typed graph, loaded from a JSON snapshot |

pub mod memory;
pub mod snapshot;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ConceptRow, DeclaredType};
use crate::tx::{Transaction, TxMode, TxOptions};
use crate::typeql::{MatchBuilder, MatchQuery};
use crate::Result;

pub use memory::MemoryStore;
pub use snapshot::Snapshot;

// ============================================================================
// Store Configuration
// ============================================================================

/// Which store to open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory, optionally seeded from a snapshot file.
    Memory {
        #[serde(default)]
        snapshot: Option<PathBuf>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { snapshot: None }
    }
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The read contract every knowledge-graph store fulfils.
///
/// Lookups with a sensible expression as a match query have default
/// implementations; stores override them when they have a faster path.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the store, releasing any session.
    async fn shutdown(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Open a transaction.
    async fn open_tx(&self, mode: TxMode, options: TxOptions) -> Result<Self::Tx>;

    /// Close a transaction. Read transactions have nothing to commit.
    async fn close_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Schema
    // ========================================================================

    /// The declared type with exactly this label, if any.
    async fn resolve_declared_type(&self, tx: &Self::Tx, label: &str) -> Result<Option<DeclaredType>>;

    // ========================================================================
    // Data
    // ========================================================================

    /// Evaluate a match query. Answers are distinct over the projection.
    async fn match_query(&self, tx: &Self::Tx, query: &MatchQuery) -> Result<Vec<ConceptRow>>;

    /// Label of the first attribute type holding the string `literal`.
    ///
    /// Default: `match $x "<literal>"; get $x;`
    async fn attribute_value_lookup(&self, tx: &Self::Tx, literal: &str) -> Result<Option<String>> {
        let query = MatchBuilder::new().value("x", literal).get(&["x"]);
        let rows = self.match_query(tx, &query).await?;
        match rows.first() {
            Some(row) => Ok(Some(row.label("x")?)),
            None => Ok(None),
        }
    }

    /// Label of the first relation type relating `role`.
    ///
    /// Default: `match $r relates <role>; get $r;`
    async fn relation_role_lookup(&self, tx: &Self::Tx, role: &str) -> Result<Option<String>> {
        let query = MatchBuilder::new().relates("r", role).get(&["r"]);
        let rows = self.match_query(tx, &query).await?;
        match rows.first() {
            Some(row) => Ok(Some(row.label("r")?)),
            None => Ok(None),
        }
    }
}

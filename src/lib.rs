//! # sam-rs: Situation Awareness for Subsea Robotics
//!
//! Interprets short imperative command phrases for an underwater robot
//! against a typed knowledge graph (entities, attributes, relations, roles).
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the interpreter and storage
//! 2. **Clean DTOs**: `Value`, `Concept`, `ConceptRow` cross all boundaries
//! 3. **Typed queries**: every query is a `MatchQuery` built step by step, never concatenated text
//! 4. **Operator as a boundary**: every question goes through the `Operator` trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sam_rs::{Interpreter, InterpreterConfig, Snapshot};
//! use sam_rs::operator::ConsoleOperator;
//!
//! # async fn example() -> sam_rs::Result<()> {
//! let world = Snapshot::from_json_file("fixtures/subsea_world.json")?;
//! let sam = Interpreter::with_snapshot(&world, InterpreterConfig::default())?;
//!
//! let mut operator = ConsoleOperator::stdio();
//! let report = sam.interpret("open valve MECH-VALVE-TURN-UN-IN-11", &mut operator).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Token classification | `resolve` | `Classification` |
//! | Phrase assembly | `intent` | `IntentRecord` |
//! | Neighbourhood | `relations` | `RelationContext` |
//! | Target location | `location` | `TargetLocation` |
//! | Gate | `compliance` | `Compliance` |
//! | Orchestration | `inquiry` | `SituationReport` |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod typeql;
pub mod storage;
pub mod tx;
pub mod resolve;
pub mod intent;
pub mod relations;
pub mod location;
pub mod compliance;
pub mod inquiry;
pub mod operator;
pub mod config;

use tracing::warn;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Value, ValueType, Concept, ConceptRow, DeclaredType,
    Iid, RoleLabel, Thing, TypeKind,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{GraphStore, MemoryStore, Snapshot, StoreConfig};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId, TxOptions};

// ============================================================================
// Re-exports: Interpretation
// ============================================================================

pub use compliance::ComplianceError;
pub use config::{InterpreterConfig, RetryLimits, Vocabulary};
pub use inquiry::SituationReport;
pub use intent::IntentRecord;
pub use location::LocationError;
pub use operator::{Notice, Operator, Prompt, Recovery};

// ============================================================================
// Top-level Interpreter handle
// ============================================================================

/// The primary entry point. An `Interpreter` wraps a graph store and the
/// configuration, and runs the situation awareness procedure per phrase.
pub struct Interpreter<S: GraphStore> {
    store: S,
    config: InterpreterConfig,
}

impl<S: GraphStore> Interpreter<S> {
    /// Create an interpreter over the given store.
    pub fn new(store: S, config: InterpreterConfig) -> Self {
        Self { store, config }
    }

    /// Build the intent record for `phrase` only.
    pub async fn parse_intent<O: Operator>(&self, phrase: &str, operator: &mut O) -> Result<IntentRecord> {
        let tx = self.store.open_tx(TxMode::Read, self.config.tx).await?;
        let result = intent::IntentBuilder::new(&self.store, &tx, &self.config.vocabulary, self.config.limits)
            .build(phrase, operator)
            .await;
        self.store.close_tx(tx).await?;
        result
    }

    /// One attempt at the full procedure, without top-level recovery.
    pub async fn inquire<O: Operator>(&self, phrase: &str, operator: &mut O) -> Result<SituationReport> {
        let tx = self.store.open_tx(TxMode::Read, self.config.tx).await?;
        let result = inquiry::Inquiry::new(&self.store, &tx, &self.config).run(phrase, operator).await;
        self.store.close_tx(tx).await?;
        result
    }

    /// Interpret `phrase`. Compliance and location failures are reported to
    /// the operator, who is asked for a complete new command line; at most
    /// `limits.command_restarts` times.
    pub async fn interpret<O: Operator>(&self, phrase: &str, operator: &mut O) -> Result<SituationReport> {
        let mut phrase = phrase.to_owned();
        let mut restarts = 0;
        loop {
            let reason = match self.inquire(&phrase, operator).await {
                Ok(report) => return Ok(report),
                Err(Error::Compliance(e)) => {
                    warn!(error = %e, "command is not compliant");
                    operator.notify(&Notice::NonCompliant {
                        command: e.command().to_owned(),
                        element: e.element().to_owned(),
                    })?;
                    Recovery::Compliance
                }
                Err(Error::Location(e)) => {
                    warn!(error = %e, "target location unresolved");
                    operator.notify(&Notice::Unlocated { detail: e.to_string() })?;
                    Recovery::MissingLocation
                }
                Err(e) => return Err(e),
            };

            if restarts >= self.config.limits.command_restarts {
                return Err(Error::RetriesExhausted { stage: "command", attempts: restarts + 1 });
            }
            restarts += 1;
            phrase = operator.prompt(&Prompt::CommandLine { reason })?;
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Access the underlying store (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Shut down the underlying store.
    pub async fn shutdown(self) -> Result<()> {
        self.store.shutdown().await
    }
}

/// In-memory knowledge graph for testing and embedding.
impl Interpreter<MemoryStore> {
    /// Open the store named by `config.store`.
    pub fn open(config: InterpreterConfig) -> Result<Self> {
        config.validate()?;
        let store = MemoryStore::open(&config.store)?;
        Ok(Self::new(store, config))
    }

    pub fn with_snapshot(snapshot: &Snapshot, config: InterpreterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(MemoryStore::from_snapshot(snapshot)?, config))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Compliance error: {0}")]
    Compliance(#[from] ComplianceError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Gave up on {stage} after {attempts} attempts")]
    RetriesExhausted { stage: &'static str, attempts: u32 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operator closed the input")]
    OperatorClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

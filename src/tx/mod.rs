//! Transaction management.

use serde::{Deserialize, Serialize};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    Read,
    Write,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Per-transaction query options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    /// Answer with rule-inferred facts as well as stored ones.
    pub infer: bool,
    /// Keep explanations for inferred answers (remote stores only).
    pub explain: bool,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self { infer: true, explain: false }
    }
}

/// Transaction trait that all stores must implement.
pub trait Transaction: Send + Sync {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;
    fn options(&self) -> TxOptions;
}

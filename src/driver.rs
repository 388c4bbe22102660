//! The backend driver contract.
//!
//! Every backend adapter implements [`Driver`]; the pool manager and the
//! dispatcher depend only on this trait, never on a concrete backend
//! type. The client proxy implements it too, which is what makes a pooled
//! remote connection indistinguishable from a direct one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PoolResult;

/// One result row: field name to value.
pub type Row = Map<String, Value>;

/// SQL bind arguments, positional (`["a", 1]`) or named (`{"id": 1}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindArgs {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Default for BindArgs {
    fn default() -> Self {
        BindArgs::Positional(Vec::new())
    }
}

impl BindArgs {
    pub fn is_empty(&self) -> bool {
        match self {
            BindArgs::Positional(values) => values.is_empty(),
            BindArgs::Named(map) => map.is_empty(),
        }
    }
}

/// The fixed operation set a backend connection must support.
#[async_trait]
pub trait Driver: Send {
    /// Execute a statement and return the number of affected rows.
    async fn query(&mut self, sql: &str, bind: BindArgs) -> PoolResult<u64>;

    /// Execute a statement and return every result row.
    async fn fetch_all(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Vec<Row>>;

    /// Execute a statement and return a single row, or `None` when the
    /// result set is empty.
    async fn fetch(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Option<Row>>;

    /// Execute a statement and return the first column of the first row.
    /// Intended for aggregates (`SELECT count(*) ...`).
    async fn fetch_one(&mut self, sql: &str, bind: BindArgs) -> PoolResult<Value>;

    /// The most recent insert id, or the current value of `sequence` for
    /// sequence-based backends.
    async fn last_insert_id(&mut self, sequence: Option<&str>) -> PoolResult<Value>;

    /// Rows affected by the most recently executed statement.
    async fn last_row_count(&mut self) -> PoolResult<u64>;

    async fn begin_transaction(&mut self) -> PoolResult<()>;

    async fn commit(&mut self) -> PoolResult<()>;

    async fn rollback(&mut self) -> PoolResult<()>;

    /// Backend identifier, e.g. `"oci"` or `"pdo"`.
    fn driver_name(&self) -> &str;

    /// Stable identity of the underlying native connection handle,
    /// recorded on the owning slot for log correlation.
    fn instance_id(&self) -> u64;
}

/// Produces one backend connection per call.
///
/// Supplied by the embedder and invoked once per slot while a worker
/// builds its pool at startup. A failed invocation costs that slot and
/// nothing else.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn create(&self) -> PoolResult<Box<dyn Driver>>;
}

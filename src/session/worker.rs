//! Collaborator traits a fetch session drives. The JSON-RPC implementation
//! lives in [`crate::rpc`]; tests substitute in-memory fakes.

use crate::schema::{Record, WireSchema};
use crate::session::credentials::WireDelegationToken;
use anyhow::Result;
use futures::future::BoxFuture;

/// Everything needed to open one worker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub hostname: String,
    pub port: u16,
    /// Maximum records per fetch round trip; `None` leaves the worker default.
    pub fetch_size: Option<u32>,
    pub delegation_token: Option<WireDelegationToken>,
}

/// Opens connections to workers.
pub trait WorkerConnector: Send + Sync {
    type Worker: WorkerClient;

    fn connect<'a>(&'a self, request: ConnectRequest) -> BoxFuture<'a, Result<Self::Worker>>;
}

/// A connected worker.
pub trait WorkerClient: Send + 'static {
    type Records: RecordStream;

    /// Executes the serialized task and starts fetching its results.
    fn exec_and_fetch<'a>(&'a mut self, task: &'a [u8]) -> BoxFuture<'a, Result<Self::Records>>;

    fn close<'a>(&'a mut self) -> BoxFuture<'a, Result<()>>;
}

/// Forward-only stream of records for one executing task. Closing it aborts
/// any fetch still in flight on the worker.
pub trait RecordStream: Send + 'static {
    fn schema(&self) -> &WireSchema;

    /// Next record, or `None` once the task's results are exhausted.
    fn next_record<'a>(&'a mut self) -> BoxFuture<'a, Result<Option<Record>>>;

    fn close<'a>(&'a mut self) -> BoxFuture<'a, Result<()>>;
}

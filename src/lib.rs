//! Client-side building blocks for reading task results from RecordService
//! workers: a fetch session that owns one worker connection and its record
//! stream, and a row field accessor that exposes fetched rows to query engines.

pub mod inspect;
pub mod rpc;
pub mod runtime;
pub mod schema;
pub mod session;

pub use inspect::{
    Category, FieldDescriptor, InspectError, PrimitiveKind, RowFieldAccessor, StructInspector,
};
pub use rpc::{JsonRpcRecordStream, JsonRpcWorker, JsonRpcWorkerConnector, RpcError};
pub use runtime::config::{ConfigSource, EnvSource, SessionConfig, SessionConfigBuilder};
pub use runtime::telemetry::init_tracing;
pub use schema::{ColumnLookup, ColumnType, FieldValue, Record, RowSchema, WireSchema};
pub use session::{
    Credentials, FetchSession, NetworkAddress, SessionError, TaskInfo, Token,
    DELEGATION_TOKEN_KIND,
};

//! JSON-RPC worker transport: authentication headers, client options, call
//! metrics, row decoding, and the connector, worker and record stream that
//! implement the session collaborator traits.

pub mod auth;
pub mod client;
pub mod helpers;
pub mod metrics;
pub mod options;
pub mod stream;

pub use client::{JsonRpcWorker, JsonRpcWorkerConnector, RpcError};
pub use metrics::RpcMetricsSnapshot;
pub use options::RpcClientOptions;
pub use stream::JsonRpcRecordStream;

//! JSON-RPC implementation of the worker collaborators. Houses the connector,
//! the connected worker client, the error types, and the shared channel used
//! by record streams to keep fetching from the same worker.

use crate::rpc::auth::build_auth_headers;
use crate::rpc::metrics::{RpcMetrics, RpcMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::stream::{ExecTaskResponse, JsonRpcRecordStream};
use crate::runtime::config::SessionConfig;
use crate::session::worker::{ConnectRequest, WorkerClient, WorkerConnector};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use futures::future::BoxFuture;
use jsonrpsee::core::{
    client::{ClientT, Error as JsonRpcError},
    http_helpers::HttpError,
    params::ArrayParams,
};
use jsonrpsee::http_client::transport::Error as HttpTransportError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::time::{timeout, Instant};

pub(crate) const VERSION_METHOD: &str = "worker.version";
pub(crate) const EXEC_TASK_METHOD: &str = "worker.execTask";
pub(crate) const FETCH_METHOD: &str = "worker.fetch";
pub(crate) const CLOSE_TASK_METHOD: &str = "worker.closeTask";

#[derive(Debug)]
pub enum RpcError {
    Timeout { method: &'static str },
    ResponseTooLarge { method: &'static str },
    WorkerClosed { endpoint: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::ResponseTooLarge { method } => {
                write!(f, "rpc {method} response exceeded HTTP size limits")
            }
            RpcError::WorkerClosed { endpoint } => {
                write!(f, "worker connection to {endpoint} is closed")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// HTTP client plus bookkeeping shared by a worker and the streams it opens.
#[derive(Debug, Clone)]
pub(crate) struct RpcChannel {
    endpoint: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<RpcMetrics>,
}

impl RpcChannel {
    fn new(endpoint: String, request: &ConnectRequest, options: RpcClientOptions) -> Result<Self> {
        options.validate()?;

        let headers = build_auth_headers(request.delegation_token.as_ref())?;
        let max_request_body_size = options.max_request_body_bytes.min(u32::MAX as usize) as u32;
        let max_response_body_size = options.max_response_body_bytes.min(u32::MAX as usize) as u32;

        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(options.request_timeout)
            .max_request_size(max_request_body_size)
            .max_response_size(max_response_body_size)
            .build(&endpoint)
            .map_err(|err| anyhow!("failed to build worker RPC client for {endpoint}: {err}"))?;

        Ok(Self {
            endpoint: Arc::new(endpoint),
            client,
            options,
            metrics: Arc::new(RpcMetrics::default()),
        })
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn metrics(&self) -> &RpcMetrics {
        &self.metrics
    }

    /// Issues one request. Never retried: a failed call fails the session.
    pub(crate) async fn call<R>(&self, method: &'static str, params: ArrayParams) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let outcome = timeout(
            self.options.request_timeout,
            self.client.request::<R, _>(method, params),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => {
                self.metrics.record_success(start.elapsed());
                tracing::trace!(method, endpoint = %self.endpoint, "worker rpc completed");
                Ok(value)
            }
            Ok(Err(err)) => {
                self.metrics.record_failure(start.elapsed());
                Err(map_rpc_error(method, err))
            }
            Err(_) => {
                self.metrics.record_timeout(start.elapsed());
                Err(RpcError::Timeout { method }.into())
            }
        }
    }
}

/// Opens [`JsonRpcWorker`] connections over HTTP.
#[derive(Debug, Clone, Default)]
pub struct JsonRpcWorkerConnector {
    options: RpcClientOptions,
}

impl JsonRpcWorkerConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RpcClientOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Self::with_options(config.rpc_options())
    }

    pub fn options(&self) -> &RpcClientOptions {
        &self.options
    }
}

impl WorkerConnector for JsonRpcWorkerConnector {
    type Worker = JsonRpcWorker;

    fn connect<'a>(&'a self, request: ConnectRequest) -> BoxFuture<'a, Result<JsonRpcWorker>> {
        Box::pin(JsonRpcWorker::connect(request, self.options.clone()))
    }
}

/// A connected worker reachable over JSON-RPC.
#[derive(Debug)]
pub struct JsonRpcWorker {
    channel: RpcChannel,
    fetch_size: Option<u32>,
    version: String,
    closed: bool,
}

impl JsonRpcWorker {
    /// Builds the client and performs the version handshake, which is also where
    /// an unreachable worker or a rejected token surfaces.
    pub async fn connect(request: ConnectRequest, options: RpcClientOptions) -> Result<Self> {
        let endpoint = format!("http://{}:{}", request.hostname, request.port);
        let channel = RpcChannel::new(endpoint, &request, options)?;

        let version: String = channel
            .call(VERSION_METHOD, rpc_params![])
            .await
            .with_context(|| format!("handshake with worker {} failed", channel.endpoint()))?;

        tracing::debug!(
            endpoint = channel.endpoint(),
            version = %version,
            fetch_size = ?request.fetch_size,
            "connected to worker"
        );

        Ok(Self {
            channel,
            fetch_size: request.fetch_size,
            version,
            closed: false,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.channel.endpoint()
    }

    /// Version string reported by the worker during the handshake.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.channel.metrics().snapshot()
    }

    async fn exec_task(&mut self, task: &[u8]) -> Result<JsonRpcRecordStream> {
        if self.closed {
            return Err(RpcError::WorkerClosed {
                endpoint: self.endpoint().to_owned(),
            }
            .into());
        }

        let payload = BASE64_STANDARD.encode(task);
        let response: ExecTaskResponse = self
            .channel
            .call(EXEC_TASK_METHOD, rpc_params![payload, self.fetch_size])
            .await?;

        tracing::debug!(
            endpoint = self.endpoint(),
            handle = response.handle,
            columns = response.schema.columns.len(),
            "task started on worker"
        );

        Ok(JsonRpcRecordStream::new(self.channel.clone(), response))
    }
}

impl WorkerClient for JsonRpcWorker {
    type Records = JsonRpcRecordStream;

    fn exec_and_fetch<'a>(
        &'a mut self,
        task: &'a [u8],
    ) -> BoxFuture<'a, Result<JsonRpcRecordStream>> {
        Box::pin(self.exec_task(task))
    }

    fn close<'a>(&'a mut self) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                tracing::debug!(endpoint = self.endpoint(), "worker connection closed");
            }
            Ok(())
        })
    }
}

pub(crate) fn map_rpc_error(label: &'static str, err: JsonRpcError) -> anyhow::Error {
    if response_too_large(&err) {
        return RpcError::ResponseTooLarge { method: label }.into();
    }
    match err {
        JsonRpcError::Call(call) => anyhow!(
            "rpc {label} call failed (code={}, message={})",
            call.code(),
            call.message()
        ),
        other => anyhow!("rpc {label} call failed: {other}"),
    }
}

fn response_too_large(err: &JsonRpcError) -> bool {
    match err {
        JsonRpcError::Transport(inner) => {
            if let Some(transport_err) = inner.downcast_ref::<HttpTransportError>() {
                match transport_err {
                    HttpTransportError::Http(http_err) => matches!(http_err, HttpError::TooLarge),
                    HttpTransportError::RequestTooLarge => true,
                    _ => false,
                }
            } else {
                false
            }
        }
        _ => false,
    }
}

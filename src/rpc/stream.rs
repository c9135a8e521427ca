//! Record stream over a task executing on a JSON-RPC worker. Records arrive in
//! batches from `worker.fetch` and are handed out one at a time.

use crate::rpc::client::{RpcChannel, RpcError, CLOSE_TASK_METHOD, FETCH_METHOD};
use crate::rpc::helpers::RecordDecoder;
use crate::schema::{Record, RowSchema, WireSchema};
use crate::session::worker::RecordStream;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use jsonrpsee::rpc_params;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExecTaskResponse {
    pub handle: u64,
    pub schema: WireSchema,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FetchResponse {
    #[serde(default)]
    pub records: Vec<Vec<Value>>,
    pub done: bool,
}

#[derive(Debug)]
pub struct JsonRpcRecordStream {
    channel: RpcChannel,
    handle: u64,
    schema: WireSchema,
    decoder: Option<RecordDecoder>,
    buffer: VecDeque<Record>,
    done: bool,
    closed: bool,
}

impl JsonRpcRecordStream {
    pub(crate) fn new(channel: RpcChannel, response: ExecTaskResponse) -> Self {
        Self {
            channel,
            handle: response.handle,
            schema: response.schema,
            decoder: None,
            buffer: VecDeque::new(),
            done: false,
            closed: false,
        }
    }

    /// Worker-side handle of the executing task.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    fn decoder(&mut self) -> Result<&RecordDecoder> {
        if self.decoder.is_none() {
            let schema = RowSchema::from_wire(&self.schema)?;
            self.decoder = Some(RecordDecoder::new(schema));
        }
        self.decoder
            .as_ref()
            .context("record decoder unavailable")
    }

    async fn fetch_batch(&mut self) -> Result<()> {
        let response: FetchResponse = self
            .channel
            .call(FETCH_METHOD, rpc_params![self.handle])
            .await
            .with_context(|| format!("failed to fetch records for task handle {}", self.handle))?;

        let decoder = self.decoder()?;
        let records = response
            .records
            .iter()
            .map(|row| decoder.decode(row))
            .collect::<Result<Vec<_>>>()?;

        self.channel.metrics().record_fetched(records.len());
        tracing::trace!(
            handle = self.handle,
            records = records.len(),
            done = response.done,
            "fetched record batch"
        );

        self.buffer.extend(records);
        self.done = response.done;
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            if self.closed {
                return Err(RpcError::WorkerClosed {
                    endpoint: self.channel.endpoint().to_owned(),
                }
                .into());
            }
            if self.done {
                return Ok(None);
            }
            self.fetch_batch().await?;
        }
    }

    async fn close_task(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();

        let _: Value = self
            .channel
            .call(CLOSE_TASK_METHOD, rpc_params![self.handle])
            .await
            .with_context(|| format!("failed to close task handle {}", self.handle))?;

        tracing::debug!(
            endpoint = self.channel.endpoint(),
            handle = self.handle,
            "task closed on worker"
        );
        Ok(())
    }
}

impl RecordStream for JsonRpcRecordStream {
    fn schema(&self) -> &WireSchema {
        &self.schema
    }

    fn next_record<'a>(&'a mut self) -> BoxFuture<'a, Result<Option<Record>>> {
        Box::pin(self.next())
    }

    fn close<'a>(&'a mut self) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.close_task())
    }
}

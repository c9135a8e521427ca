//! The fetch session: one worker connection, one executing task, one record
//! stream. Construction either yields a fully open session or releases every
//! resource it acquired before returning the error.

use crate::runtime::config::SessionConfig;
use crate::schema::{Record, RowSchema};
use crate::session::credentials::Credentials;
use crate::session::placement::{NetworkAddress, TaskInfo};
use crate::session::worker::{ConnectRequest, RecordStream, WorkerClient, WorkerConnector};
use anyhow::{Context, Error, Result};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum SessionError {
    NoLocations { task: String },
    Closed { task: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoLocations { task } => {
                write!(f, "task {task} has no candidate worker locations")
            }
            SessionError::Closed { task } => write!(f, "fetch session for task {task} is closed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Resources owned by a session. Release order is stream first, then worker.
struct SessionResources<W: WorkerClient> {
    worker: Option<W>,
    records: Option<W::Records>,
}

impl<W: WorkerClient> SessionResources<W> {
    fn empty() -> Self {
        Self {
            worker: None,
            records: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.worker.is_none() && self.records.is_none()
    }

    /// Closes whatever is still held. A failure closing the stream does not
    /// stop the worker from being closed; the first failure is returned.
    async fn release(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;

        if let Some(mut records) = self.records.take() {
            if let Err(err) = records.close().await {
                tracing::warn!(error = %err, "failed to close record stream");
                first_error = Some(err.context("failed to close record stream"));
            }
        }

        if let Some(mut worker) = self.worker.take() {
            if let Err(err) = worker.close().await {
                tracing::warn!(error = %err, "failed to close worker connection");
                if first_error.is_none() {
                    first_error = Some(err.context("failed to close worker connection"));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A live, schema-described record stream for a single task.
///
/// Delegation tokens are used when the credentials carry one; the session never
/// attempts any other form of authentication. Only the task's first location is
/// tried.
///
/// Call [`FetchSession::close`] when done. A session dropped while open is
/// released on a background task if a tokio runtime is current; outside a runtime
/// its worker-side task is left open.
pub struct FetchSession<W: WorkerClient> {
    task_id: String,
    location: NetworkAddress,
    resources: SessionResources<W>,
    schema: Arc<RowSchema>,
}

impl<W: WorkerClient> FetchSession<W> {
    pub async fn open<C>(
        connector: &C,
        config: &SessionConfig,
        credentials: &Credentials,
        task: &TaskInfo,
    ) -> Result<Self>
    where
        C: WorkerConnector<Worker = W>,
    {
        // TODO: try the remaining locations when the first worker is unreachable.
        let location = task
            .first_location()
            .cloned()
            .ok_or_else(|| SessionError::NoLocations {
                task: task.id().to_owned(),
            })?;

        let mut resources = SessionResources::empty();
        match Self::acquire(&mut resources, connector, config, credentials, task, &location).await
        {
            Ok(schema) => {
                tracing::debug!(
                    task = task.id(),
                    location = %location,
                    columns = schema.len(),
                    "fetch session opened"
                );
                Ok(Self {
                    task_id: task.id().to_owned(),
                    location,
                    resources,
                    schema: Arc::new(schema),
                })
            }
            Err(err) => {
                if let Err(close_err) = resources.release().await {
                    tracing::warn!(
                        task = task.id(),
                        location = %location,
                        error = %close_err,
                        "teardown after failed session open did not complete cleanly"
                    );
                }
                Err(err)
            }
        }
    }

    async fn acquire<C>(
        resources: &mut SessionResources<W>,
        connector: &C,
        config: &SessionConfig,
        credentials: &Credentials,
        task: &TaskInfo,
        location: &NetworkAddress,
    ) -> Result<RowSchema>
    where
        C: WorkerConnector<Worker = W>,
    {
        let fetch_size = config.fetch_size();
        let delegation_token = credentials.delegation_token().map(|token| token.to_wire());

        tracing::debug!(
            task = task.id(),
            location = %location,
            fetch_size = ?fetch_size,
            delegation_token = delegation_token.is_some(),
            "connecting to worker"
        );

        let request = ConnectRequest {
            hostname: location.hostname().to_owned(),
            port: location.port(),
            fetch_size,
            delegation_token,
        };
        let worker = connector.connect(request).await.with_context(|| {
            format!(
                "failed to connect to worker {location} for task {}",
                task.id()
            )
        })?;
        let worker = resources.worker.insert(worker);

        let records = worker.exec_and_fetch(task.task()).await.with_context(|| {
            format!("failed to execute task {} on worker {location}", task.id())
        })?;
        let records = resources.records.insert(records);

        RowSchema::from_wire(records.schema()).with_context(|| {
            format!(
                "worker {location} returned an unusable schema for task {}",
                task.id()
            )
        })
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn location(&self) -> &NetworkAddress {
        &self.location
    }

    pub fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    /// The connected worker, until the session is closed.
    pub fn worker(&self) -> Option<&W> {
        self.resources.worker.as_ref()
    }

    /// The live record stream.
    pub fn records(&mut self) -> Result<&mut W::Records> {
        match self.resources.records.as_mut() {
            Some(records) => Ok(records),
            None => Err(SessionError::Closed {
                task: self.task_id.clone(),
            }
            .into()),
        }
    }

    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(records) = self.resources.records.as_mut() else {
            return Err(SessionError::Closed {
                task: self.task_id.clone(),
            }
            .into());
        };
        records.next_record().await.with_context(|| {
            format!(
                "failed to read records for task {} from worker {}",
                self.task_id, self.location
            )
        })
    }

    pub fn is_closed(&self) -> bool {
        self.resources.is_empty()
    }

    /// Closes the record stream, then the worker connection. Safe to call more
    /// than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.resources.is_empty() {
            return Ok(());
        }

        let result = self.resources.release().await;
        tracing::debug!(
            task = %self.task_id,
            location = %self.location,
            clean = result.is_ok(),
            "fetch session closed"
        );
        result.with_context(|| format!("failed to close fetch session for task {}", self.task_id))
    }
}

impl<W: WorkerClient> Drop for FetchSession<W> {
    fn drop(&mut self) {
        if self.resources.is_empty() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                task = %self.task_id,
                location = %self.location,
                "fetch session dropped outside a runtime; worker resources were not released"
            );
            return;
        };

        tracing::warn!(
            task = %self.task_id,
            location = %self.location,
            "fetch session dropped without close; releasing in the background"
        );
        let mut resources = std::mem::replace(&mut self.resources, SessionResources::empty());
        let task = self.task_id.clone();
        let location = self.location.clone();
        runtime.spawn(async move {
            if let Err(err) = resources.release().await {
                tracing::warn!(
                    task = %task,
                    location = %location,
                    error = %err,
                    "background release of dropped fetch session failed"
                );
            }
        });
    }
}

impl<W: WorkerClient> fmt::Debug for FetchSession<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchSession")
            .field("task_id", &self.task_id)
            .field("location", &self.location)
            .field("columns", &self.schema.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

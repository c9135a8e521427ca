use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Rows handed out per `worker.fetch` when the task carries no fetch size.
pub const DEFAULT_BATCH: usize = 2;

pub const WORKER_VERSION: &str = "mock-worker-1.0";

/// Scripted task results plus a log of everything clients asked for.
#[derive(Clone)]
pub struct MockWorker {
    schema: Value,
    rows: Arc<Vec<Value>>,
    next_handle: Arc<AtomicU64>,
    fail_exec: Arc<AtomicBool>,
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    open_tasks: HashMap<u64, OpenTask>,
    authorization: Vec<Option<String>>,
    exec_fetch_sizes: Vec<Value>,
    exec_payloads: Vec<String>,
    fetch_calls: usize,
    closed_handles: Vec<u64>,
}

struct OpenTask {
    cursor: usize,
    batch: usize,
}

impl MockWorker {
    /// `schema` is the JSON schema object reported by `worker.execTask`;
    /// `rows` are positional JSON arrays.
    pub fn new(schema: Value, rows: Vec<Value>) -> Self {
        Self {
            schema,
            rows: Arc::new(rows),
            next_handle: Arc::new(AtomicU64::new(1)),
            fail_exec: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn fail_exec(&self, fail: bool) {
        self.fail_exec.store(fail, Ordering::SeqCst);
    }

    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.state().authorization.clone()
    }

    pub fn exec_fetch_sizes(&self) -> Vec<Value> {
        self.state().exec_fetch_sizes.clone()
    }

    pub fn exec_payloads(&self) -> Vec<String> {
        self.state().exec_payloads.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }

    pub fn closed_handles(&self) -> Vec<u64> {
        self.state().closed_handles.clone()
    }

    pub fn open_tasks(&self) -> usize {
        self.state().open_tasks.len()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock worker poisoned")
    }

    fn exec_task(&self, id: Value, params: &[Value]) -> Value {
        let payload = params
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let fetch_size = params.get(1).cloned().unwrap_or(Value::Null);

        let mut state = self.state();
        state.exec_payloads.push(payload);
        state.exec_fetch_sizes.push(fetch_size.clone());

        if self.fail_exec.load(Ordering::SeqCst) {
            return error(id, -32010, "task rejected by worker");
        }

        let batch = fetch_size
            .as_u64()
            .map(|size| size as usize)
            .unwrap_or(DEFAULT_BATCH);
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        state.open_tasks.insert(handle, OpenTask { cursor: 0, batch });

        success(id, json!({ "handle": handle, "schema": self.schema }))
    }

    fn fetch(&self, id: Value, params: &[Value]) -> Value {
        let handle = params.first().and_then(Value::as_u64).unwrap_or_default();
        let mut state = self.state();
        state.fetch_calls += 1;

        let Some(task) = state.open_tasks.get_mut(&handle) else {
            return error(id, -32011, format!("unknown task handle {handle}"));
        };

        let end = (task.cursor + task.batch).min(self.rows.len());
        let records = self.rows[task.cursor..end].to_vec();
        task.cursor = end;
        let done = end == self.rows.len();

        success(id, json!({ "records": records, "done": done }))
    }

    fn close_task(&self, id: Value, params: &[Value]) -> Value {
        let handle = params.first().and_then(Value::as_u64).unwrap_or_default();
        let mut state = self.state();
        state.open_tasks.remove(&handle);
        state.closed_handles.push(handle);
        success(id, json!(true))
    }
}

pub struct MockWorkerServer {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockWorkerServer {
    pub async fn start(worker: MockWorker) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock worker listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let worker = worker.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(worker.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock worker server stopped: {err}");
            }
        });

        Ok(Self {
            port: addr.port(),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(
    worker: MockWorker,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::POST {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    let authorization = req
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    worker.state().authorization.push(authorization);

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("failed to read body: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("invalid JSON payload: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let response_value = handle_call(&worker, payload);
    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn handle_call(worker: &MockWorker, call: Value) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = call
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    match method.as_str() {
        "worker.version" => success(id, json!(WORKER_VERSION)),
        "worker.execTask" => worker.exec_task(id, &params),
        "worker.fetch" => worker.fetch(id, &params),
        "worker.closeTask" => worker.close_task(id, &params),
        _ => error(id, -32601, format!("unknown method {method}")),
    }
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": id,
    })
}

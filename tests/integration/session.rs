use crate::support::{
    helpers::{
        config_with_fetch_size, delegation_credentials, init_tracing, people_rows, people_schema,
        task_on, TASK_BYTES,
    },
    mock_worker::{MockWorker, MockWorkerServer, DEFAULT_BATCH},
};
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use recordservice_client::{
    Credentials, FetchSession, FieldValue, InspectError, JsonRpcWorker, JsonRpcWorkerConnector,
    RowFieldAccessor, SessionConfig, SessionError,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn open_session(
    port: u16,
    config: &SessionConfig,
    credentials: &Credentials,
) -> Result<FetchSession<JsonRpcWorker>> {
    let connector = JsonRpcWorkerConnector::from_config(config)?;
    FetchSession::open(&connector, config, credentials, &task_on(port)).await
}

#[tokio::test]
async fn session_streams_every_row_and_closes_the_task() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = config_with_fetch_size(2);
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    assert_eq!(session.schema().len(), 4);
    assert_eq!(session.task_id(), "task-0");

    let accessor = RowFieldAccessor::new(session.schema())?;
    let name = accessor.field_by_name("NAME").expect("name field").clone();
    let score = accessor.field_by_name("Score").expect("score field").clone();

    let mut names = Vec::new();
    let mut scores = Vec::new();
    while let Some(record) = session.next_record().await? {
        names.push(accessor.field_value(&record, &name).cloned());
        scores.push(accessor.field_value(&record, &score).cloned());
    }

    assert_eq!(
        names,
        ["ada", "grace", "linus", "barbara", "ken"]
            .into_iter()
            .map(|n| Some(FieldValue::String(n.into())))
            .collect::<Vec<_>>()
    );
    assert_eq!(scores[2], Some(FieldValue::Null));
    assert_eq!(worker.fetch_calls(), 3);

    session.close().await?;
    assert!(session.is_closed());
    assert_eq!(worker.closed_handles(), vec![1]);
    assert_eq!(worker.open_tasks(), 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn task_payload_is_sent_base64_encoded() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    session.close().await?;

    assert_eq!(
        worker.exec_payloads(),
        vec![BASE64_STANDARD.encode(TASK_BYTES)]
    );
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn delegation_token_travels_as_basic_authorization() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let credentials = delegation_credentials("token-id", "token-secret");
    let mut session = open_session(server.port(), &config, &credentials).await?;
    session.close().await?;

    let expected = format!(
        "Basic {}",
        BASE64_STANDARD.encode(format!(
            "{}:{}",
            BASE64_STANDARD.encode("token-id"),
            BASE64_STANDARD.encode("token-secret")
        ))
    );
    let headers = worker.authorization_headers();
    assert!(!headers.is_empty());
    assert!(headers.iter().all(|h| h.as_deref() == Some(expected.as_str())));

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn no_delegation_token_means_no_authorization_header() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    session.close().await?;

    assert!(worker.authorization_headers().iter().all(Option::is_none));
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unset_fetch_size_leaves_the_worker_default() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = config_with_fetch_size(-1);
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    let mut count = 0;
    while session.next_record().await?.is_some() {
        count += 1;
    }
    session.close().await?;

    assert_eq!(count, 5);
    assert_eq!(worker.exec_fetch_sizes(), vec![Value::Null]);
    assert_eq!(worker.fetch_calls(), 5usize.div_ceil(DEFAULT_BATCH));
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn configured_fetch_size_is_forwarded() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = config_with_fetch_size(50_000);
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    while session.next_record().await?.is_some() {}
    session.close().await?;

    assert_eq!(worker.exec_fetch_sizes(), vec![json!(50_000)]);
    assert_eq!(worker.fetch_calls(), 1);
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_task_leaves_nothing_open() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    worker.fail_exec(true);
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let err = open_session(server.port(), &config, &Credentials::new())
        .await
        .expect_err("exec failure must fail the open");

    let message = format!("{err:#}");
    assert!(message.contains("failed to execute task task-0"));
    assert!(message.contains("task rejected by worker"));
    assert_eq!(worker.open_tasks(), 0);
    assert!(worker.closed_handles().is_empty());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unusable_schema_closes_the_started_task() -> Result<()> {
    init_tracing();
    let schema = json!({"columns": [{"name": "shape", "type": "GEOMETRY"}]});
    let worker = MockWorker::new(schema, Vec::new());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let err = open_session(server.port(), &config, &Credentials::new())
        .await
        .expect_err("unknown column type must fail the open");

    assert!(format!("{err:#}").contains("unusable schema"));
    assert_eq!(worker.closed_handles(), vec![1]);
    assert_eq!(worker.open_tasks(), 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_worker_fails_the_open() -> Result<()> {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let config = SessionConfig::default();
    let err = open_session(port, &config, &Credentials::new())
        .await
        .expect_err("nothing listens on the port");
    assert!(format!("{err:#}").contains("failed to connect to worker"));
    Ok(())
}

#[tokio::test]
async fn reading_after_close_reports_a_closed_session() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    assert!(session.next_record().await?.is_some());
    session.close().await?;
    session.close().await?;

    let err = session.next_record().await.expect_err("session is closed");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Closed { .. })
    ));
    assert_eq!(worker.closed_handles(), vec![1]);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn accessor_rejects_columns_without_a_primitive_inspector() -> Result<()> {
    init_tracing();
    let schema = json!({
        "columns": [
            {"name": "id", "type": "INT"},
            {"name": "created", "type": "TIMESTAMP_NANOS"}
        ]
    });
    let worker = MockWorker::new(schema, vec![json!([1, 1_700_000_000])]);
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = SessionConfig::default();
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    let err = RowFieldAccessor::new(session.schema()).expect_err("timestamp is unsupported");
    assert_eq!(
        err,
        InspectError::UnsupportedType {
            column: "created".into(),
            column_type: "TIMESTAMP_NANOS".into(),
        }
    );

    session.close().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn worker_metrics_count_fetched_records() -> Result<()> {
    init_tracing();
    let worker = MockWorker::new(people_schema(), people_rows());
    let server = MockWorkerServer::start(worker.clone()).await?;

    let config = config_with_fetch_size(2);
    let mut session = open_session(server.port(), &config, &Credentials::new()).await?;
    while session.next_record().await?.is_some() {}

    let snapshot = session.worker().map(JsonRpcWorker::metrics).expect("worker open");
    assert_eq!(snapshot.records_fetched, 5);
    assert_eq!(snapshot.total_errors, 0);

    session.close().await?;
    server.shutdown().await;
    Ok(())
}

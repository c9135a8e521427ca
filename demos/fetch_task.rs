use std::env;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use recordservice_client::{
    Credentials, EnvSource, FetchSession, JsonRpcWorker, JsonRpcWorkerConnector, NetworkAddress,
    RowFieldAccessor, SessionConfig, TaskInfo, Token, DELEGATION_TOKEN_KIND,
};

const DEFAULT_WORKER_HOST: &str = "localhost";
const DEFAULT_WORKER_PORT: u16 = 13050;
const DEFAULT_PRINT_ROWS: usize = 10;
const DEFAULT_LOG_DIRECTIVE: &str = "warn";

#[tokio::main]
async fn main() -> Result<()> {
    init_example_tracing();

    let args = ExampleArgs::from_env()?;
    let config = SessionConfig::from_source(&EnvSource)?;
    let connector = JsonRpcWorkerConnector::from_config(&config)?;
    let task = TaskInfo::new(
        "demo-task",
        args.task,
        vec![NetworkAddress::new(args.host, args.port)],
    );

    let bar = build_spinner();
    bar.println(format!(
        "Fetching task from {} (fetch size: {})",
        task.locations()[0],
        config
            .fetch_size()
            .map_or_else(|| "worker default".to_string(), |size| size.to_string())
    ));

    let mut session = FetchSession::open(&connector, &config, &args.credentials, &task).await?;
    let outcome = drain(&mut session, &bar, args.print_rows).await;
    let metrics = session.worker().map(|worker| worker.metrics());
    let closed = session.close().await;

    let (fetched, elapsed) = match outcome {
        Ok(drained) => {
            closed?;
            drained
        }
        Err(err) => {
            if let Err(close_err) = closed {
                bar.println(format!("Closing the session also failed: {close_err:#}"));
            }
            bar.abandon_with_message("fetch failed");
            return Err(err);
        }
    };
    bar.finish_with_message("done");
    let seconds = elapsed.as_secs_f64();
    let rate = if seconds > 0.0 {
        fetched as f64 / seconds
    } else {
        0.0
    };
    println!("Fetched {fetched} records in {seconds:.2}s [{rate:.2} records/s]");
    if let Some(metrics) = metrics {
        println!(
            "{} worker calls, {:.2}ms average latency, {} errors",
            metrics.total_requests, metrics.average_latency_ms, metrics.total_errors
        );
    }

    Ok(())
}

async fn drain(
    session: &mut FetchSession<JsonRpcWorker>,
    bar: &ProgressBar,
    print_rows: usize,
) -> Result<(u64, Duration)> {
    let accessor = RowFieldAccessor::new(session.schema())?;
    let header: Vec<&str> = accessor.all_fields().iter().map(|f| f.name()).collect();
    bar.println(header.join("\t"));

    let started_at = Instant::now();
    let mut fetched = 0u64;
    while let Some(record) = session.next_record().await? {
        if (fetched as usize) < print_rows {
            let row: Vec<String> = accessor
                .all_fields()
                .iter()
                .map(|field| format!("{:?}", accessor.field_value(&record, field)))
                .collect();
            bar.println(row.join("\t"));
        }
        fetched += 1;
        bar.set_position(fetched);
    }
    Ok((fetched, started_at.elapsed()))
}

fn init_example_tracing() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    recordservice_client::init_tracing();
}

fn build_spinner() -> ProgressBar {
    let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout_with_hz(12));
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {pos} records ({per_sec:.2} rec/s)",
    )
    .expect("valid progress bar template");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

struct ExampleArgs {
    host: String,
    port: u16,
    task: Vec<u8>,
    credentials: Credentials,
    print_rows: usize,
}

impl ExampleArgs {
    fn from_env() -> Result<Self> {
        let host = read_env_or_default("RECORDSERVICE_WORKER_HOST", DEFAULT_WORKER_HOST);
        let port = parse_env_with_default::<u16>("RECORDSERVICE_WORKER_PORT", DEFAULT_WORKER_PORT)?;
        let print_rows =
            parse_env_with_default::<usize>("RECORDSERVICE_PRINT_ROWS", DEFAULT_PRINT_ROWS)?;

        let encoded_task = env::var("RECORDSERVICE_TASK")
            .context("RECORDSERVICE_TASK must hold the base64 task from the planner")?;
        let task = BASE64_STANDARD
            .decode(encoded_task.trim())
            .context("RECORDSERVICE_TASK is not valid base64")?;

        let mut credentials = Credentials::new();
        if let (Ok(identifier), Ok(password)) = (
            env::var("RECORDSERVICE_TOKEN_IDENTIFIER"),
            env::var("RECORDSERVICE_TOKEN_PASSWORD"),
        ) {
            credentials.add_token(Token::new(
                identifier.into_bytes(),
                password.into_bytes(),
                DELEGATION_TOKEN_KIND,
                host.clone(),
            ));
        }

        Ok(Self {
            host,
            port,
            task,
            credentials,
            print_rows,
        })
    }
}

fn read_env_or_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

fn parse_env_with_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("failed to parse {key}='{value}'")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}

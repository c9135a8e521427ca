use crate::rpc::options::{RpcClientOptions, DEFAULT_HTTP_BODY_LIMIT_BYTES};
use anyhow::{anyhow, bail, Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::hash::BuildHasher;
use std::str::FromStr;
use std::time::Duration;

/// Maximum records per fetch round trip. Optional; the worker default applies
/// when it is absent or set to [`UNSET_FETCH_SIZE`].
pub const FETCH_SIZE_CONF: &str = "recordservice.fetch.size";
/// Per-request timeout, in milliseconds, for the JSON-RPC worker transport.
pub const RPC_TIMEOUT_MS_CONF: &str = "recordservice.worker.rpc.timeout.ms";
/// Largest worker response body, in bytes, the JSON-RPC transport accepts.
pub const RPC_MAX_RESPONSE_BYTES_CONF: &str = "recordservice.worker.rpc.max.response.bytes";

/// Sentinel meaning "no fetch size override".
pub const UNSET_FETCH_SIZE: i64 = -1;

/// Fetch size that suits scan-heavy tasks. Never applied implicitly; pass it to
/// [`SessionConfigBuilder::fetch_size`] to use it.
pub const DEFAULT_FETCH_SIZE: u32 = 50_000;

const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Key-value configuration source, such as a job configuration map.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher> ConfigSource for HashMap<String, String, S> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

/// Reads configuration keys from environment variables:
/// `recordservice.fetch.size` becomes `RECORDSERVICE_FETCH_SIZE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    pub fn variable_name(key: &str) -> String {
        key.to_ascii_uppercase().replace('.', "_")
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(Self::variable_name(key)).ok()
    }
}

/// Per-session settings.
///
/// Instances are constructed via [`SessionConfig::builder`], [`SessionConfig::new`] or
/// [`SessionConfig::from_source`] so the fetch size sentinel is resolved and every value
/// is validated before a session observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    fetch_size: Option<u32>,
    rpc_timeout: Duration,
    rpc_max_response_body_bytes: usize,
}

pub struct SessionConfigParams {
    /// Raw fetch size; [`UNSET_FETCH_SIZE`] for no override.
    pub fetch_size: i64,
    pub rpc_timeout: Duration,
    pub rpc_max_response_body_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fetch_size: None,
            rpc_timeout: Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS),
            rpc_max_response_body_bytes: DEFAULT_HTTP_BODY_LIMIT_BYTES,
        }
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    pub fn new(params: SessionConfigParams) -> Result<Self> {
        let SessionConfigParams {
            fetch_size,
            rpc_timeout,
            rpc_max_response_body_bytes,
        } = params;

        let config = Self {
            fetch_size: resolve_fetch_size(fetch_size)?,
            rpc_timeout,
            rpc_max_response_body_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads the recognised keys from `source`; keys that are absent keep their
    /// defaults.
    pub fn from_source<S: ConfigSource + ?Sized>(source: &S) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(raw) = source.get(FETCH_SIZE_CONF) {
            builder = builder.fetch_size(parse_value::<i64>(FETCH_SIZE_CONF, &raw)?);
        }
        if let Some(raw) = source.get(RPC_TIMEOUT_MS_CONF) {
            let millis = parse_value::<u64>(RPC_TIMEOUT_MS_CONF, &raw)?;
            builder = builder.rpc_timeout(Duration::from_millis(millis));
        }
        if let Some(raw) = source.get(RPC_MAX_RESPONSE_BYTES_CONF) {
            let bytes = parse_value::<usize>(RPC_MAX_RESPONSE_BYTES_CONF, &raw)?;
            builder = builder.rpc_max_response_body_bytes(bytes);
        }

        builder.build()
    }

    /// Fetch size to request from the worker; `None` lets the worker decide.
    pub fn fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    /// Per-request timeout applied by the JSON-RPC worker transport.
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Maximum response body accepted from a worker.
    pub fn rpc_max_response_body_bytes(&self) -> usize {
        self.rpc_max_response_body_bytes
    }

    pub fn rpc_options(&self) -> RpcClientOptions {
        RpcClientOptions {
            request_timeout: self.rpc_timeout,
            max_response_body_bytes: self.rpc_max_response_body_bytes,
            ..RpcClientOptions::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == Some(0) {
            bail!("fetch_size must be greater than 0");
        }

        if self.rpc_timeout.is_zero() {
            bail!("rpc_timeout must be greater than 0");
        }

        if self.rpc_max_response_body_bytes == 0 {
            bail!("rpc_max_response_body_bytes must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SessionConfigBuilder {
    fetch_size: Option<i64>,
    rpc_timeout: Option<Duration>,
    rpc_max_response_body_bytes: Option<usize>,
}

impl SessionConfigBuilder {
    /// Positive record count, or [`UNSET_FETCH_SIZE`] to clear the override.
    pub fn fetch_size(mut self, fetch_size: impl Into<i64>) -> Self {
        self.fetch_size = Some(fetch_size.into());
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = Some(timeout);
        self
    }

    pub fn rpc_max_response_body_bytes(mut self, bytes: usize) -> Self {
        self.rpc_max_response_body_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> Result<SessionConfig> {
        let defaults = SessionConfig::default();
        let params = SessionConfigParams {
            fetch_size: self.fetch_size.unwrap_or(UNSET_FETCH_SIZE),
            rpc_timeout: self.rpc_timeout.unwrap_or(defaults.rpc_timeout),
            rpc_max_response_body_bytes: self
                .rpc_max_response_body_bytes
                .unwrap_or(defaults.rpc_max_response_body_bytes),
        };

        SessionConfig::new(params)
    }
}

fn resolve_fetch_size(raw: i64) -> Result<Option<u32>> {
    if raw == UNSET_FETCH_SIZE {
        return Ok(None);
    }
    if raw <= 0 {
        bail!("fetch_size must be a positive record count or {UNSET_FETCH_SIZE} (got {raw})");
    }
    let size = u32::try_from(raw).map_err(|_| anyhow!("fetch_size {raw} is too large"))?;
    Ok(Some(size))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value {raw:?} for {key}"))
}

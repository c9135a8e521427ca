//! HTTP authentication helpers for wiring a worker delegation token into the
//! underlying `jsonrpsee` client builder.

use crate::session::credentials::WireDelegationToken;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use jsonrpsee::http_client::{HeaderMap, HeaderValue};

/// Builds the handshake headers. Without a token no `Authorization` header is
/// sent; the worker decides whether unauthenticated access is allowed.
pub(crate) fn build_auth_headers(token: Option<&WireDelegationToken>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let Some(token) = token else {
        return Ok(headers);
    };

    let credentials = format!("{}:{}", token.identifier, token.password);
    let encoded = BASE64_STANDARD.encode(credentials);
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .context("failed to build Authorization header")?;
    value.set_sensitive(true);
    headers.insert("Authorization", value);
    Ok(headers)
}

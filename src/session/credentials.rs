//! Security tokens minted upstream (by the planner) and carried to the task.
//! The session only ever consumes a delegation token; it never negotiates
//! credentials itself.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind under which the planner stores the worker delegation token.
pub const DELEGATION_TOKEN_KIND: &str = "RECORDSERVICE_DELEGATION_TOKEN";

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    identifier: Vec<u8>,
    password: Vec<u8>,
    kind: String,
    service: String,
}

impl Token {
    pub fn new(
        identifier: impl Into<Vec<u8>>,
        password: impl Into<Vec<u8>>,
        kind: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
            kind: kind.into(),
            service: service.into(),
        }
    }

    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Encodes the token the way the worker handshake expects it.
    pub fn to_wire(&self) -> WireDelegationToken {
        WireDelegationToken {
            identifier: BASE64_STANDARD.encode(&self.identifier),
            password: BASE64_STANDARD.encode(&self.password),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("service", &self.service)
            .field("identifier_len", &self.identifier.len())
            .finish_non_exhaustive()
    }
}

/// Token bundle keyed by token kind. At most one token per kind.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    tokens: HashMap<String, Token>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `token` under its kind, replacing any previous token of that kind.
    pub fn add_token(&mut self, token: Token) -> Option<Token> {
        self.tokens.insert(token.kind.clone(), token)
    }

    pub fn token(&self, kind: &str) -> Option<&Token> {
        self.tokens.get(kind)
    }

    pub fn delegation_token(&self) -> Option<&Token> {
        self.token(DELEGATION_TOKEN_KIND)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Base64 wire form of a delegation token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDelegationToken {
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for WireDelegationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireDelegationToken")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

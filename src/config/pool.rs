//! Pool and server configuration structures.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Transport security requested for the control connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecureMode {
    /// Plain FTP.
    #[default]
    Plain,
    /// Explicit FTPS (`AUTH TLS` after connecting).
    Explicit,
    /// Implicit FTPS (TLS from the first byte).
    Implicit,
}

/// Options handed verbatim to [`Connection::access`](crate::core::Connection::access).
///
/// The pool never interprets these; they are only stored and forwarded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOptions {
    /// Server host name or address.
    pub host: String,
    /// Control port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
    /// Transport security.
    #[serde(default)]
    pub secure: SecureMode,
}

const fn default_port() -> u16 {
    21
}

fn default_user() -> String {
    "anonymous".into()
}

impl AccessOptions {
    /// Options for `host` with default port, anonymous login and no TLS.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            secure: SecureMode::Plain,
        }
    }

    /// Set the login credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Set the control port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the transport security mode.
    #[must_use]
    pub const fn with_secure(mut self, secure: SecureMode) -> Self {
        self.secure = secure;
        self
    }
}

impl fmt::Debug for AccessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("secure", &self.secure)
            .finish()
    }
}

/// Configuration for one pooled server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Access options forwarded to every handshake.
    pub access: AccessOptions,
    /// Number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Re-establish sessions when their transport reports closure.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    /// Buffered reconnect failures per error subscriber.
    #[serde(default = "default_error_buffer")]
    pub error_buffer: usize,
}

const fn default_max_connections() -> usize {
    1
}

const fn default_auto_reconnect() -> bool {
    true
}

const fn default_error_buffer() -> usize {
    64
}

impl PoolConfig {
    /// Defaults for `access`: one connection, auto-reconnect on.
    pub fn new(access: AccessOptions) -> Self {
        Self {
            access,
            max_connections: default_max_connections(),
            auto_reconnect: default_auto_reconnect(),
            error_buffer: default_error_buffer(),
        }
    }

    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.access.host.trim().is_empty() {
            return Err("access.host must not be empty".into());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".into());
        }
        if self.error_buffer == 0 {
            return Err("error_buffer must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse a single pool configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `FTP_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("FTP_HOST").ok_or("FTP_HOST is not set")?;
        let mut access = AccessOptions::new(host);
        if let Some(port) = lookup("FTP_PORT") {
            access.port = port.parse().map_err(|e| format!("FTP_PORT: {e}"))?;
        }
        if let Some(user) = lookup("FTP_USER") {
            access.user = user;
        }
        if let Some(password) = lookup("FTP_PASSWORD") {
            access.password = password;
        }
        if let Some(secure) = lookup("FTP_SECURE") {
            access.secure = match secure.to_ascii_lowercase().as_str() {
                "" | "0" | "false" | "plain" => SecureMode::Plain,
                "1" | "true" | "explicit" => SecureMode::Explicit,
                "implicit" => SecureMode::Implicit,
                other => return Err(format!("FTP_SECURE: unknown mode `{other}`")),
            };
        }

        let mut cfg = Self::new(access);
        if let Some(max) = lookup("FTP_MAX_CONNECTIONS") {
            cfg.max_connections = max.parse().map_err(|e| format!("FTP_MAX_CONNECTIONS: {e}"))?;
        }
        if let Some(auto) = lookup("FTP_AUTO_RECONNECT") {
            cfg.auto_reconnect = auto
                .parse()
                .map_err(|e| format!("FTP_AUTO_RECONNECT: {e}"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Root configuration: one pool per named server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Map of server name to pool configuration.
    pub servers: HashMap<String, PoolConfig>,
}

impl MasterConfig {
    /// Validate all servers and ensure at least one exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.servers.is_empty() {
            return Err("at least one server must be defined".into());
        }
        for (name, pool) in &self.servers {
            pool.validate()
                .map_err(|e| format!("server `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

//! Session options and address handling
//!
//! [`SessionOptions`] is the full, validated configuration of a session.
//! [`SessionOptionsUpdate`] carries a partial change merged into a live
//! session. Addresses are checked up front so an unusable target is
//! reported before any transport is opened.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;
use crate::types::ClientId;

/// Close reason used when the collaborator disconnects without naming one
pub const DEFAULT_DISCONNECT_REASON: &str = "Client disconnect";

// ----------------------------------------------------------------------------
// Reconnect Options
// ----------------------------------------------------------------------------

/// Parameters of the exponential reconnect backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectOptions {
    /// Maximum number of automatic reconnect attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first reconnect attempt (ms)
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay (ms)
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt
    pub factor: f64,
    /// Add up to 50% random jitter on top of each delay
    pub jitter: bool,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            factor: 2.0,
            jitter: false,
        }
    }
}

impl ReconnectOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::Validation {
                field: "reconnect.factor".into(),
                reason: format!("must be a finite number >= 1, got {}", self.factor),
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::Validation {
                field: "reconnect.max_delay_ms".into(),
                reason: format!(
                    "must not be below initial_delay_ms ({} < {})",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Session Options
// ----------------------------------------------------------------------------

/// Complete configuration of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Target address, `ws://` or `wss://` with a non-root path
    pub url: String,
    /// Session credential sent in the connect request and the auth envelope
    pub auth_token: Option<String>,
    /// Connect as soon as the session is created (requires a credential)
    pub auto_connect: bool,
    /// Reconnect automatically after abnormal closes
    pub auto_reconnect: bool,
    /// Heartbeat period (ms), 0 disables heartbeats
    pub heartbeat_interval_ms: u64,
    /// Reconnect backoff parameters
    pub reconnect: ReconnectOptions,
    /// Log every frame at info level
    pub debug: bool,
    /// Sub-protocols offered during the transport handshake
    pub protocols: Vec<String>,
    /// Fixed client identifier instead of a generated one
    pub client_id: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            auto_connect: true,
            auto_reconnect: true,
            heartbeat_interval_ms: 30_000,
            reconnect: ReconnectOptions::default(),
            debug: false,
            protocols: Vec::new(),
            client_id: None,
        }
    }
}

impl SessionOptions {
    /// Options for `url` with every other field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Configured credential, ignoring empty strings
    pub fn credential(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|token| !token.is_empty())
    }

    /// Client identifier to use for a new session
    pub fn resolve_client_id(&self) -> ClientId {
        match self.client_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => ClientId::new(id),
            None => ClientId::generate(),
        }
    }

    /// Validate the address and the reconnect parameters
    pub fn validate(&self) -> Result<Url, ConfigError> {
        self.reconnect.validate()?;
        validate_address(&self.url)
    }
}

// ----------------------------------------------------------------------------
// Partial Updates
// ----------------------------------------------------------------------------

/// Partial change to the options of a live session
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptionsUpdate {
    pub url: Option<String>,
    pub auth_token: Option<String>,
    pub auto_connect: Option<bool>,
    pub auto_reconnect: Option<bool>,
    pub heartbeat_interval_ms: Option<u64>,
    pub reconnect: Option<ReconnectOptions>,
    pub debug: Option<bool>,
    pub protocols: Option<Vec<String>>,
}

impl SessionOptionsUpdate {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            auth_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `options`, returning the merged copy after validation
    ///
    /// `options` is left untouched when the merged result is invalid.
    pub fn merged_into(&self, options: &SessionOptions) -> Result<SessionOptions, ConfigError> {
        let mut merged = options.clone();
        if let Some(url) = &self.url {
            merged.url = url.clone();
        }
        if let Some(token) = &self.auth_token {
            merged.auth_token = Some(token.clone());
        }
        if let Some(auto_connect) = self.auto_connect {
            merged.auto_connect = auto_connect;
        }
        if let Some(auto_reconnect) = self.auto_reconnect {
            merged.auto_reconnect = auto_reconnect;
        }
        if let Some(interval) = self.heartbeat_interval_ms {
            merged.heartbeat_interval_ms = interval;
        }
        if let Some(reconnect) = &self.reconnect {
            merged.reconnect = reconnect.clone();
        }
        if let Some(debug) = self.debug {
            merged.debug = debug;
        }
        if let Some(protocols) = &self.protocols {
            merged.protocols = protocols.clone();
        }
        merged.validate()?;
        Ok(merged)
    }
}

/// Fields of `options` that differ from [`SessionOptions::default`]
///
/// The address is always carried. Fields left at their default value keep
/// whatever the live session currently uses.
impl From<SessionOptions> for SessionOptionsUpdate {
    fn from(options: SessionOptions) -> Self {
        fn changed<T: PartialEq>(value: T, default: T) -> Option<T> {
            (value != default).then_some(value)
        }

        let defaults = SessionOptions::default();
        Self {
            url: Some(options.url),
            auth_token: options.auth_token,
            auto_connect: changed(options.auto_connect, defaults.auto_connect),
            auto_reconnect: changed(options.auto_reconnect, defaults.auto_reconnect),
            heartbeat_interval_ms: changed(
                options.heartbeat_interval_ms,
                defaults.heartbeat_interval_ms,
            ),
            reconnect: changed(options.reconnect, defaults.reconnect),
            debug: changed(options.debug, defaults.debug),
            protocols: changed(options.protocols, defaults.protocols),
        }
    }
}

// ----------------------------------------------------------------------------
// Address Handling
// ----------------------------------------------------------------------------

/// Parse and check a session address
///
/// The scheme must be `ws` or `wss` and the path must name an endpoint
/// (neither empty nor `/`).
pub fn validate_address(address: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(address.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: address.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            })
        }
    }

    if url.path().is_empty() || url.path() == "/" {
        return Err(ConfigError::MissingPath {
            url: address.to_string(),
        });
    }

    Ok(url)
}

/// Address used for one connect attempt
///
/// Appends `clientId` and, when present, `token` as query parameters. This is
/// the only place the credential is placed on the connect request.
pub fn build_connect_url(base: &Url, client_id: &ClientId, token: Option<&str>) -> Url {
    let mut url = base.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("clientId", client_id.as_str());
        if let Some(token) = token {
            query.append_pair("token", token);
        }
    }
    url
}

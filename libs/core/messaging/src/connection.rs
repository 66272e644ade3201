//! Connection Registry (component A).
//!
//! Holds named NATS connections — most deployments only ever need the
//! default, but multi-tenant or multi-cluster hosts register a handle per
//! upstream. Connections are created lazily on first use and cached for the
//! lifetime of the registry.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Connection parameters for a single named upstream.
#[derive(Debug, Clone)]
pub struct ConnectionSpec {
    pub name: String,
    pub url: String,
    pub auth: ConnectionAuth,
}

#[derive(Debug, Clone, Default)]
pub enum ConnectionAuth {
    #[default]
    None,
    Token(String),
    UserPassword {
        user: String,
        password: String,
    },
}

impl ConnectionSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth: ConnectionAuth::None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth = ConnectionAuth::Token(token.into());
        self
    }

    pub fn with_user_password(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = ConnectionAuth::UserPassword {
            user: user.into(),
            password: password.into(),
        };
        self
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no connection named '{0}' is registered")]
    UnknownName(String),

    #[error("failed to connect to '{name}': {source}")]
    Connect {
        name: String,
        #[source]
        source: async_nats::ConnectError,
    },
}

/// A realized connection: the raw client plus its JetStream context.
pub struct ConnectionHandle {
    pub client: async_nats::Client,
    pub jetstream: async_nats::jetstream::Context,
}

/// Registry of named connections, created lazily and cached.
///
/// Referencing a name that was never registered via [`ConnectionRegistry::register`]
/// is a programmer error, not a runtime condition to recover from — callers
/// should treat [`ConnectionError::UnknownName`] as fatal at startup.
pub struct ConnectionRegistry {
    specs: HashMap<String, ConnectionSpec>,
    default_name: String,
    handles: RwLock<HashMap<String, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Build a registry around a single default connection.
    pub fn single(spec: ConnectionSpec) -> Self {
        let default_name = spec.name.clone();
        let mut specs = HashMap::new();
        specs.insert(spec.name.clone(), spec);
        Self {
            specs,
            default_name,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Build a registry from multiple named specs, with an explicit default.
    pub fn new(specs: Vec<ConnectionSpec>, default_name: impl Into<String>) -> Self {
        Self {
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            default_name: default_name.into(),
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&mut self, spec: ConnectionSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Fetch (connecting lazily on first use) the default connection.
    pub async fn default_connection(&self) -> Result<Arc<ConnectionHandle>, ConnectionError> {
        let name = self.default_name.clone();
        self.connection(&name).await
    }

    /// Fetch (connecting lazily on first use) the connection registered under `name`.
    pub async fn connection(&self, name: &str) -> Result<Arc<ConnectionHandle>, ConnectionError> {
        if let Some(handle) = self.handles.read().await.get(name) {
            return Ok(handle.clone());
        }

        let mut handles = self.handles.write().await;
        if let Some(handle) = handles.get(name) {
            return Ok(handle.clone());
        }

        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| ConnectionError::UnknownName(name.to_string()))?;

        let handle = Arc::new(connect(spec).await?);
        handles.insert(name.to_string(), handle.clone());
        info!(connection = %name, "established NATS connection");
        Ok(handle)
    }

    /// Close every cached connection. Further use of the registry reconnects
    /// lazily, so this is meant for graceful shutdown, not for reuse.
    pub async fn dispose(&self) {
        let mut handles = self.handles.write().await;
        for (name, handle) in handles.drain() {
            if let Err(err) = handle.client.drain().await {
                tracing::warn!(connection = %name, error = %err, "error draining connection on shutdown");
            }
        }
    }
}

async fn connect(spec: &ConnectionSpec) -> Result<ConnectionHandle, ConnectionError> {
    let options = match &spec.auth {
        ConnectionAuth::None => async_nats::ConnectOptions::new(),
        ConnectionAuth::Token(token) => async_nats::ConnectOptions::new().token(token.clone()),
        ConnectionAuth::UserPassword { user, password } => {
            async_nats::ConnectOptions::new().user_and_password(user.clone(), password.clone())
        }
    };

    let client = options
        .connect(&spec.url)
        .await
        .map_err(|source| ConnectionError::Connect {
            name: spec.name.clone(),
            source,
        })?;

    let jetstream = async_nats::jetstream::new(client.clone());

    Ok(ConnectionHandle { client, jetstream })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let registry = ConnectionRegistry::single(ConnectionSpec::new("default", "nats://localhost:4222"));
        let result = registry.connection("not-registered").await;
        assert!(matches!(result, Err(ConnectionError::UnknownName(name)) if name == "not-registered"));
    }

    #[test]
    fn with_token_sets_auth() {
        let spec = ConnectionSpec::new("default", "nats://localhost:4222").with_token("secret");
        assert!(matches!(spec.auth, ConnectionAuth::Token(t) if t == "secret"));
    }
}

use crate::error::{DataError, Result};
use crate::traits::DataSource;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Everything a backend needs to open a data source
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend identifier ("postgres", "graphql", "dynamodb", ...)
    pub backend: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Backend specific settings
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            options: BTreeMap::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Connection string safe for logs: the password is never included
    pub fn connection_string(&self) -> String {
        let mut result = format!("{}://", self.backend);

        if let Some(username) = &self.username {
            result.push_str(username);
            result.push('@');
        }
        if let Some(host) = &self.host {
            result.push_str(host);
        }
        if let Some(port) = self.port {
            result.push_str(&format!(":{port}"));
        }
        if let Some(database) = &self.database {
            result.push('/');
            result.push_str(database);
        }

        result
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("options", &self.options)
            .finish()
    }
}

/// Opens data sources for one backend type
pub trait DataSourceFactory: Send + Sync {
    fn backend(&self) -> &str;

    fn create(&self, config: &ConnectionConfig) -> Result<Arc<dyn DataSource>>;
}

/// Named data sources, created through backend factories
#[derive(Default)]
pub struct DataSourceRegistry {
    factories: RwLock<HashMap<String, Arc<dyn DataSourceFactory>>>,
    data_sources: RwLock<HashMap<String, Arc<dyn DataSource>>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_factory(&self, factory: Arc<dyn DataSourceFactory>) {
        let backend = factory.backend().to_string();
        let mut factories = self.factories.write().await;

        if factories.insert(backend.clone(), factory).is_some() {
            warn!("Replacing factory for backend '{}'", backend);
        } else {
            debug!("Registered factory for backend '{}'", backend);
        }
    }

    /// Open a data source and keep it under `name`.
    ///
    /// An existing data source with the same name is replaced.
    pub async fn connect(&self, name: &str, config: ConnectionConfig) -> Result<Arc<dyn DataSource>> {
        let factory = self
            .factories
            .read()
            .await
            .get(&config.backend)
            .cloned()
            .ok_or_else(|| {
                DataError::invalid_configuration(format!(
                    "No factory registered for backend '{}'",
                    config.backend
                ))
            })?;

        debug!("Connecting '{}' to {}", name, config.connection_string());
        let data_source = factory.create(&config)?;

        let mut data_sources = self.data_sources.write().await;
        if data_sources
            .insert(name.to_string(), data_source.clone())
            .is_some()
        {
            warn!("Replacing data source '{}'", name);
        }

        Ok(data_source)
    }

    pub async fn data_source(&self, name: &str) -> Result<Arc<dyn DataSource>> {
        self.data_sources
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::not_found(format!("Data source '{name}' not found")))
    }

    /// Forget a data source; returns whether it existed
    pub async fn disconnect(&self, name: &str) -> bool {
        let removed = self.data_sources.write().await.remove(name).is_some();
        if removed {
            debug!("Disconnected data source '{}'", name);
        }
        removed
    }

    /// Names of the connected data sources, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_sources.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn backends(&self) -> Vec<String> {
        let mut backends: Vec<String> = self.factories.read().await.keys().cloned().collect();
        backends.sort();
        backends
    }
}

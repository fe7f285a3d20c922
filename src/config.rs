//! Named connection configurations loaded from TOML.
//!
//! ```toml
//! [mongo.default]
//! hostname = "localhost"
//! port = 27017
//! database = "app"
//! username = "svc"
//! password = "secret"
//! persistent = true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{BuilderError, Result};

/// Prefix for per-instance environment overrides: `MONGO_FLUENT_<NAME>_<FIELD>`.
pub const ENV_PREFIX: &str = "MONGO_FLUENT";

/// Persistent-connection identifier handed to drivers that pool by key.
pub const PERSIST_KEY: &str = "mongo_fluent_persist";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("persistent", &self.persistent)
            .finish()
    }
}

fn non_empty(v: Option<&String>) -> Option<&str> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ConnectionConfig {
    /// # Errors
    /// `Config` when the hostname or the database is missing.
    pub fn validate(&self) -> Result<()> {
        if non_empty(self.hostname.as_ref()).is_none() {
            return Err(BuilderError::Config("The host must be set to connect".into()));
        }
        if non_empty(self.database.as_ref()).is_none() {
            return Err(BuilderError::Config("The database must be set to connect".into()));
        }
        Ok(())
    }

    /// `mongodb://[user:pass@]host[:port]/database`.
    ///
    /// # Errors
    /// Same as [`ConnectionConfig::validate`].
    pub fn connection_string(&self) -> Result<String> {
        self.render(false)
    }

    /// Connection string with the password masked, for logs.
    #[must_use]
    pub fn redacted_connection_string(&self) -> String {
        self.render(true).unwrap_or_else(|e| format!("<invalid: {e}>"))
    }

    fn render(&self, redact: bool) -> Result<String> {
        self.validate()?;
        let mut out = String::from("mongodb://");
        if let (Some(user), Some(pass)) =
            (non_empty(self.username.as_ref()), non_empty(self.password.as_ref()))
        {
            let pass = if redact { "***" } else { pass };
            out.push_str(&format!("{user}:{pass}@"));
        }
        out.push_str(non_empty(self.hostname.as_ref()).unwrap_or_default());
        if let Some(port) = self.port.filter(|p| *p != 0) {
            out.push_str(&format!(":{port}"));
        }
        out.push('/');
        out.push_str(non_empty(self.database.as_ref()).unwrap_or_default());
        Ok(out.trim().to_string())
    }

    #[must_use]
    pub fn persist_key(&self) -> Option<&'static str> {
        self.persistent.then_some(PERSIST_KEY)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub mongo: BTreeMap<String, ConnectionConfig>,
}

impl ConfigFile {
    /// # Errors
    /// `Io` when the file cannot be read, `Toml` when it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| BuilderError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    /// # Errors
    /// `Toml` when the text does not parse.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// # Errors
    /// `InvalidInstance` when no configuration carries that name.
    pub fn get(&self, name: &str) -> Result<&ConnectionConfig> {
        self.mongo.get(name).ok_or_else(|| BuilderError::InvalidInstance(name.to_string()))
    }

    pub fn insert(&mut self, name: &str, config: ConnectionConfig) {
        self.mongo.insert(name.to_string(), config);
    }

    /// Environment wins over file values for every named configuration.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        for (name, cfg) in &mut self.mongo {
            let key = |field: &str| format!("{ENV_PREFIX}_{}_{field}", name.to_ascii_uppercase());
            let var = |field: &str| std::env::var(key(field)).ok();
            if let Some(v) = var("HOSTNAME") {
                cfg.hostname = Some(v);
            }
            if let Some(v) = var("PORT").and_then(|p| p.parse().ok()) {
                cfg.port = Some(v);
            }
            if let Some(v) = var("DATABASE") {
                cfg.database = Some(v);
            }
            if let Some(v) = var("USERNAME") {
                cfg.username = Some(v);
            }
            if let Some(v) = var("PASSWORD") {
                cfg.password = Some(v);
            }
            if let Some(v) = var("PERSISTENT") {
                cfg.persistent = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
            }
        }
        self
    }
}

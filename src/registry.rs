//! Named builder instances, owned by the application.
//!
//! ```no_run
//! use mongo_fluent::{ConfigFile, Registry, store::memory::MemoryStore};
//!
//! let config = ConfigFile::load("mongo.toml".as_ref())?;
//! let store = MemoryStore::new();
//! let registry = Registry::new(config, move |_name, cfg| store.connect(cfg));
//! let users = registry.instance("default")?.lock().count("users")?;
//! # Ok::<(), mongo_fluent::BuilderError>(())
//! ```

use log::info;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::QueryBuilder;
use crate::config::{ConfigFile, ConnectionConfig};
use crate::errors::{BuilderError, Result};
use crate::store::Session;

pub const REGISTRY_TARGET: &str = "mongo_fluent::registry";

/// Name used when callers do not pick one.
pub const DEFAULT_INSTANCE: &str = "default";

pub type SharedBuilder<S> = Arc<Mutex<QueryBuilder<S>>>;

type Connector<S> = dyn Fn(&str, &ConnectionConfig) -> Result<S> + Send + Sync;

pub struct Registry<S: Session> {
    config: ConfigFile,
    connector: Box<Connector<S>>,
    instances: Mutex<BTreeMap<String, SharedBuilder<S>>>,
}

impl<S: Session> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("configured", &self.config.mongo.keys().collect::<Vec<_>>())
            .field("open", &self.names())
            .finish_non_exhaustive()
    }
}

impl<S: Session> Registry<S> {
    pub fn new<F>(config: ConfigFile, connector: F) -> Self
    where
        F: Fn(&str, &ConnectionConfig) -> Result<S> + Send + Sync + 'static,
    {
        Self { config, connector: Box::new(connector), instances: Mutex::new(BTreeMap::new()) }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// The builder for `name`, connecting on first use. Later calls with the
    /// same name share that builder.
    ///
    /// # Errors
    /// `InvalidInstance` for an unconfigured name, `Config` for an incomplete
    /// configuration, or whatever the connector reports.
    pub fn instance(&self, name: &str) -> Result<SharedBuilder<S>> {
        let mut instances = self.instances.lock();
        if let Some(existing) = instances.get(name) {
            return Ok(Arc::clone(existing));
        }
        let cfg = self.config.get(name)?;
        cfg.validate()?;
        let session = (self.connector)(name, cfg)?;
        let shared = Arc::new(Mutex::new(QueryBuilder::new(session)));
        instances.insert(name.to_string(), Arc::clone(&shared));
        info!(target: REGISTRY_TARGET, "opened instance {name:?} ({})", cfg.redacted_connection_string());
        Ok(shared)
    }

    /// # Errors
    /// As [`Registry::instance`].
    pub fn default_instance(&self) -> Result<SharedBuilder<S>> {
        self.instance(DEFAULT_INSTANCE)
    }

    /// Names of the instances opened so far.
    pub fn names(&self) -> Vec<String> {
        self.instances.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Forgets `name`; callers still holding the builder keep it.
    pub fn remove(&self, name: &str) -> Option<SharedBuilder<S>> {
        let out = self.instances.lock().remove(name);
        if out.is_some() {
            info!(target: REGISTRY_TARGET, "closed instance {name:?}");
        }
        out
    }

    pub fn shutdown(&self) {
        let mut instances = self.instances.lock();
        info!(target: REGISTRY_TARGET, "shutting down {} instance(s)", instances.len());
        instances.clear();
    }
}

//! Session-level calls. None of these read or clear accumulated state.

use bson::Document;
use log::info;

use super::QueryBuilder;
use super::exec::EXEC_TARGET;
use crate::errors::{BuilderError, Result};
use crate::store::Session;

impl<S: Session> QueryBuilder<S> {
    /// Makes `database` current for subsequent calls.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty name, `RemoteOperationFailed` otherwise.
    pub fn switch_db(&mut self, database: &str) -> Result<&mut Self> {
        let database = database.trim();
        if database.is_empty() {
            return Err(BuilderError::InvalidArgument("no database name given to switch to".into()));
        }
        self.session.select_database(database).map_err(|e| BuilderError::remote("switch_db", e))?;
        info!(target: EXEC_TARGET, "switched to database {database:?}");
        Ok(self)
    }

    /// # Errors
    /// `InvalidArgument` for an empty name, `RemoteOperationFailed` otherwise.
    pub fn drop_db(&mut self, database: &str) -> Result<&mut Self> {
        let database = database.trim();
        if database.is_empty() {
            return Err(BuilderError::InvalidArgument("no database name given to drop".into()));
        }
        self.session.drop_database(database).map_err(|e| BuilderError::remote("drop_db", e))?;
        info!(target: EXEC_TARGET, "dropped database {database:?}");
        Ok(self)
    }

    /// # Errors
    /// `InvalidArgument` for an empty database, `MissingCollection` for an empty
    /// collection, `RemoteOperationFailed` otherwise.
    pub fn drop_collection(&mut self, database: &str, collection: &str) -> Result<&mut Self> {
        if database.trim().is_empty() {
            return Err(BuilderError::InvalidArgument("no database name given to drop a collection from".into()));
        }
        if collection.trim().is_empty() {
            return Err(BuilderError::MissingCollection("drop_collection".into()));
        }
        self.session
            .drop_collection(database.trim(), collection.trim())
            .map_err(|e| BuilderError::remote("drop_collection", e))?;
        info!(target: EXEC_TARGET, "dropped collection {database}.{collection}");
        Ok(self)
    }

    /// Runs a raw server command and returns its response.
    ///
    /// # Errors
    /// `RemoteOperationFailed`.
    pub fn command(&self, command: &Document) -> Result<Document> {
        self.session.run_command(command).map_err(|e| BuilderError::remote("command", e))
    }
}

//! Fluent query and update builder for document stores.
//!
//! ```
//! use bson::doc;
//! use mongo_fluent::{QueryBuilder, store::memory::MemoryStore};
//!
//! let mut db = QueryBuilder::new(MemoryStore::new().session("app"));
//! db.insert("users", doc! {"name": "ada", "status": "active", "age": 36})?;
//! let adults = db
//!     .where_eq("status", "active")?
//!     .where_gte("age", 18)
//!     .order_by(&doc! {"age": -1})
//!     .limit(10)
//!     .get("users")?;
//! assert_eq!(adults.len(), 1);
//! // the builder is clean again
//! assert!(db.state().is_baseline());
//! # Ok::<(), mongo_fluent::BuilderError>(())
//! ```

pub mod builder;
pub mod config;
pub mod errors;
pub mod logger;
pub mod query;
pub mod registry;
pub mod store;
pub mod types;
pub mod utils;

pub use builder::{BuilderState, QueryBuilder, UpdateOptions};
pub use config::{ConfigFile, ConnectionConfig};
pub use errors::{BuilderError, StoreError};
pub use query::LikeOptions;
pub use registry::Registry;
pub use types::{IdentifierCodec, ObjectIdCodec, PassthroughCodec};

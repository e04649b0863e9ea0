//! # datakit-core
//!
//! Uniform data-access contract over heterogeneous backends.
//!
//! This crate defines what every backend and every decorator speaks:
//! - **Collection**: list, create, update, delete and aggregate records
//! - **DataSource**: a named set of collections
//! - **Projection**: which columns and relation paths a call needs
//! - **Filter vocabulary**: condition trees, sort, page and aggregation
//! - **CollectionDecorator**: wraps a collection, delegates by default and
//!   derives a cached schema from its child
//!
//! ## Example
//!
//! ```rust
//! use datakit_core::{ConnectionConfig, DataSourceRegistry, Projection};
//!
//! # async fn example() -> datakit_core::error::Result<()> {
//! let registry = DataSourceRegistry::new();
//!
//! let config = ConnectionConfig::new("postgres")
//!     .with_host("localhost")
//!     .with_port(5432)
//!     .with_database("shop");
//!
//! // Requires a factory for "postgres" to be registered first
//! // let source = registry.connect("shop", config).await?;
//!
//! let projection: Projection = ["id", "author:name"].into_iter().collect();
//! assert_eq!(projection.columns(), vec!["id"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backend Implementation
//!
//! 1. Implement `Collection` for each table, index or endpoint
//! 2. Implement `DataSource` to expose them
//! 3. Implement `DataSourceFactory` and register it in a `DataSourceRegistry`

pub mod action;
pub mod aggregation;
pub mod condition_tree;
pub mod decorator;
pub mod error;
pub mod filter;
pub mod projection;
pub mod registry;
pub mod schema;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use action::*;
pub use aggregation::*;
pub use condition_tree::*;
pub use decorator::*;
pub use error::{DataError, Result};
pub use filter::*;
pub use projection::*;
pub use registry::*;
pub use schema::*;
pub use telemetry::*;
pub use traits::*;
pub use types::*;

//! # datakit-decorators
//!
//! Collection decorators adding query capabilities on top of any backend.
//!
//! - **computed**: fields derived from other fields, possibly across
//!   relations, evaluated in batches after a single child fetch
//! - **lazy_join**: many-to-one relations read only through their key are
//!   served from the foreign key column, without a join
//! - **action**: custom actions with dynamic forms
//! - **batch**: explicit batching of record lookups by key
//!
//! [`DecoratorsStack`] assembles the layers in their canonical order.
//!
//! ## Example
//!
//! ```rust,no_run
//! use datakit_core::{Caller, Collection, DataSource, PrimitiveType, Projection, PaginatedFilter, Value};
//! use datakit_decorators::{ComputedDefinition, DecoratorsStack};
//! use std::sync::Arc;
//!
//! # async fn example(source: Arc<dyn DataSource>) -> datakit_core::Result<()> {
//! let stack = DecoratorsStack::new(source);
//!
//! stack.computed.collection("books")?.register_computed(
//!     "fullTitle",
//!     ComputedDefinition::per_record(PrimitiveType::String, ["title", "author:name"], |book| {
//!         let title = book["title"].as_str().unwrap_or_default();
//!         let author = book["author"]["name"].as_str().unwrap_or_default();
//!         Value::from(format!("{title} by {author}"))
//!     }),
//! )?;
//!
//! let books = stack.data_source().get_collection("books")?;
//! let projection: Projection = ["id", "fullTitle"].into_iter().collect();
//! let records = books
//!     .list(&Caller::new(1, "admin@example.com"), &PaginatedFilter::new(), &projection)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod batch;
pub mod computed;
pub mod context;
pub mod lazy_join;
pub mod stack;

pub use action::{
    ActionCollectionDecorator, ActionContext, ActionDataSource, ActionDefinition, DynamicField,
    FormValues,
};
pub use batch::{BatchLoader, LoadedRecords};
pub use computed::{ComputedCollection, ComputedDataSource, ComputedDefinition};
pub use context::CollectionContext;
pub use lazy_join::{LazyJoinCollection, LazyJoinDataSource};
pub use stack::DecoratorsStack;

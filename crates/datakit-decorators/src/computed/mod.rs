//! Computed fields.
//!
//! A computed field is declared on a collection with the paths it depends
//! on. On `list`, the decorator rewrites the projection so that the child
//! only fetches physical columns, then evaluates computed values in batches
//! and shapes the records back to the requested projection.

mod collection;
mod compute;
mod dedup;
mod definition;
mod flattener;
mod rewrite;

pub use collection::{ComputedCollection, ComputedDataSource};
pub use compute::compute_from_records;
pub use dedup::transform_unique_values;
pub use definition::ComputedDefinition;
pub use flattener::{
    flatten, unflatten, unflatten_records, with_null_markers, FlatRecordList, NULL_MARKER,
};
pub use rewrite::rewrite_field;

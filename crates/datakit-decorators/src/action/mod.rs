//! Custom actions with forms whose fields may depend on each other.

mod collection;
mod definition;
mod form_values;

pub use collection::{build_form, ActionCollectionDecorator, ActionDataSource};
pub use definition::{ActionContext, ActionDefinition, DynamicField};
pub use form_values::FormValues;

use crate::action::{ActionCollectionDecorator, ActionDataSource};
use crate::computed::{ComputedCollection, ComputedDataSource};
use crate::lazy_join::{LazyJoinCollection, LazyJoinDataSource};
use datakit_core::DataSource;
use std::sync::Arc;
use tracing::debug;

/// The decorator chain wrapped around a data source.
///
/// Layers, innermost first: lazy join, computed fields, actions. Computed
/// dependencies on `relation:id` therefore never cost a join.
pub struct DecoratorsStack {
    pub lazy_join: Arc<LazyJoinDataSource>,
    pub computed: Arc<ComputedDataSource>,
    pub action: Arc<ActionDataSource>,
}

impl DecoratorsStack {
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        let lazy_join = LazyJoinCollection::decorate(data_source);
        let computed = ComputedCollection::decorate(lazy_join.clone());
        let action = ActionCollectionDecorator::decorate(computed.clone());
        debug!("Built decorators stack");

        Self {
            lazy_join,
            computed,
            action,
        }
    }

    /// Outermost layer, the one callers should use
    pub fn data_source(&self) -> Arc<dyn DataSource> {
        self.action.clone()
    }
}

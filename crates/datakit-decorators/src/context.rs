use datakit_core::{Caller, Collection, DataSource};
use std::sync::Arc;

/// What a computed field evaluator can reach while it runs
#[derive(Clone)]
pub struct CollectionContext {
    pub collection: Arc<dyn Collection>,
    pub data_source: Arc<dyn DataSource>,
    pub caller: Caller,
}

impl CollectionContext {
    pub fn new(
        collection: Arc<dyn Collection>,
        data_source: Arc<dyn DataSource>,
        caller: Caller,
    ) -> Self {
        Self {
            collection,
            data_source,
            caller,
        }
    }
}

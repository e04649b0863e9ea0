use crate::action::{ActionField, ActionResult};
use crate::aggregation::{AggregateResult, Aggregation};
use crate::error::{DataError, Result};
use crate::filter::{Filter, PaginatedFilter};
use crate::projection::Projection;
use crate::schema::{CollectionSchema, DataSourceSchema};
use crate::types::{Caller, Record, Value};
use async_trait::async_trait;
use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;

/// Core trait that every collection, backend or decorator, implements
#[async_trait]
pub trait Collection: Send + Sync + DowncastSync {
    fn name(&self) -> &str;

    /// Fields, relations, actions and charts of the collection
    fn schema(&self) -> Arc<CollectionSchema>;

    /// Fetch records matching the filter, shaped by the projection.
    ///
    /// Relations appear as nested records; a missing to-one relation is null.
    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>>;

    async fn create(&self, caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>>;

    async fn update(&self, caller: &Caller, filter: &Filter, patch: Record) -> Result<()>;

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<()>;

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>>;

    /// Run an action on the records matching the filter
    async fn execute(
        &self,
        _caller: &Caller,
        name: &str,
        _form_values: Record,
        _filter: &Filter,
    ) -> Result<ActionResult> {
        Err(DataError::not_found(format!(
            "Action '{}' not found on collection '{}'",
            name,
            self.name()
        )))
    }

    /// Form of an action, evaluated for the given form values
    async fn get_form(
        &self,
        _caller: &Caller,
        _name: &str,
        _form_values: Option<Record>,
        _filter: Option<&Filter>,
    ) -> Result<Vec<ActionField>> {
        Ok(Vec::new())
    }

    async fn render_chart(
        &self,
        _caller: &Caller,
        name: &str,
        _record_id: &[Value],
    ) -> Result<Value> {
        Err(DataError::not_found(format!(
            "Chart '{}' not found on collection '{}'",
            name,
            self.name()
        )))
    }
}

impl_downcast!(sync Collection);

/// A set of collections served by one backend
#[async_trait]
pub trait DataSource: Send + Sync + DowncastSync {
    fn collections(&self) -> Vec<Arc<dyn Collection>>;

    fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>>;

    fn schema(&self) -> DataSourceSchema {
        DataSourceSchema::default()
    }

    async fn render_chart(&self, _caller: &Caller, name: &str) -> Result<Value> {
        Err(DataError::not_found(format!("Chart '{name}' not found")))
    }
}

impl_downcast!(sync DataSource);

//! Base mechanism shared by every decorator.
//!
//! A decorator wraps a child collection, forwards every operation it does
//! not override, and derives its schema from the child's. Any type
//! implementing [`CollectionDecorator`] is a [`Collection`].
//!
//! [`DataSourceDecorator`] wraps a whole data source and instantiates one
//! decorator per collection, on first access, so that state registered on a
//! decorator survives repeated lookups.

use crate::action::{ActionField, ActionResult};
use crate::aggregation::{AggregateResult, Aggregation};
use crate::error::Result;
use crate::filter::{Filter, PaginatedFilter};
use crate::projection::Projection;
use crate::schema::{CollectionSchema, DataSourceSchema};
use crate::traits::{Collection, DataSource};
use crate::types::{Caller, Record, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

/// Memoized output of `refine_schema`.
///
/// The refined schema is reused as long as the cache was not marked dirty
/// and the child still returns the same schema instance.
#[derive(Debug, Default)]
pub struct SchemaCache {
    state: RwLock<Option<CachedSchema>>,
}

#[derive(Debug)]
struct CachedSchema {
    child: Arc<CollectionSchema>,
    refined: Arc<CollectionSchema>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get_or_refine<F>(&self, child: Arc<CollectionSchema>, refine: F) -> Arc<CollectionSchema>
    where
        F: FnOnce(&CollectionSchema) -> CollectionSchema,
    {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = state.as_ref() {
                if Arc::ptr_eq(&cached.child, &child) {
                    return cached.refined.clone();
                }
            }
        }

        let refined = Arc::new(refine(&child));
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedSchema {
            child,
            refined: refined.clone(),
        });
        refined
    }
}

/// A collection wrapping another one.
///
/// Every operation defaults to pure delegation to the child collection.
#[async_trait]
pub trait CollectionDecorator: Send + Sync + 'static {
    fn child_collection(&self) -> &Arc<dyn Collection>;

    fn schema_cache(&self) -> &SchemaCache;

    /// Derive this decorator's schema from the child's current schema
    fn refine_schema(&self, child_schema: &CollectionSchema) -> CollectionSchema {
        child_schema.clone()
    }

    fn mark_schema_as_dirty(&self) {
        self.schema_cache().mark_dirty();
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        self.child_collection().list(caller, filter, projection).await
    }

    async fn create(&self, caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>> {
        self.child_collection().create(caller, records).await
    }

    async fn update(&self, caller: &Caller, filter: &Filter, patch: Record) -> Result<()> {
        self.child_collection().update(caller, filter, patch).await
    }

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<()> {
        self.child_collection().delete(caller, filter).await
    }

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        self.child_collection()
            .aggregate(caller, filter, aggregation, limit)
            .await
    }

    async fn execute(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Record,
        filter: &Filter,
    ) -> Result<ActionResult> {
        self.child_collection()
            .execute(caller, name, form_values, filter)
            .await
    }

    async fn get_form(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Option<Record>,
        filter: Option<&Filter>,
    ) -> Result<Vec<ActionField>> {
        self.child_collection()
            .get_form(caller, name, form_values, filter)
            .await
    }

    async fn render_chart(&self, caller: &Caller, name: &str, record_id: &[Value]) -> Result<Value> {
        self.child_collection()
            .render_chart(caller, name, record_id)
            .await
    }
}

#[async_trait]
impl<T: CollectionDecorator> Collection for T {
    fn name(&self) -> &str {
        self.child_collection().name()
    }

    fn schema(&self) -> Arc<CollectionSchema> {
        let child_schema = self.child_collection().schema();
        self.schema_cache().get_or_refine(child_schema, |schema| {
            debug!("Refining schema of collection '{}'", self.name());
            self.refine_schema(schema)
        })
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        CollectionDecorator::list(self, caller, filter, projection).await
    }

    async fn create(&self, caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>> {
        CollectionDecorator::create(self, caller, records).await
    }

    async fn update(&self, caller: &Caller, filter: &Filter, patch: Record) -> Result<()> {
        CollectionDecorator::update(self, caller, filter, patch).await
    }

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<()> {
        CollectionDecorator::delete(self, caller, filter).await
    }

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        CollectionDecorator::aggregate(self, caller, filter, aggregation, limit).await
    }

    async fn execute(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Record,
        filter: &Filter,
    ) -> Result<ActionResult> {
        CollectionDecorator::execute(self, caller, name, form_values, filter).await
    }

    async fn get_form(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Option<Record>,
        filter: Option<&Filter>,
    ) -> Result<Vec<ActionField>> {
        CollectionDecorator::get_form(self, caller, name, form_values, filter).await
    }

    async fn render_chart(&self, caller: &Caller, name: &str, record_id: &[Value]) -> Result<Value> {
        CollectionDecorator::render_chart(self, caller, name, record_id).await
    }
}

type CollectionFactory<C> =
    Box<dyn Fn(Arc<dyn Collection>, Weak<DataSourceDecorator<C>>) -> C + Send + Sync>;

/// Wraps every collection of a data source with a decorator of type `C`
pub struct DataSourceDecorator<C: Collection> {
    child_data_source: Arc<dyn DataSource>,
    factory: CollectionFactory<C>,
    collections: RwLock<HashMap<String, Arc<C>>>,
    this: Weak<DataSourceDecorator<C>>,
}

impl<C: Collection> DataSourceDecorator<C> {
    /// Wrap a data source.
    ///
    /// `factory` receives the child collection and a handle back to this
    /// decorator, for decorators that need to reach sibling collections.
    pub fn new<F>(child_data_source: Arc<dyn DataSource>, factory: F) -> Arc<Self>
    where
        F: Fn(Arc<dyn Collection>, Weak<DataSourceDecorator<C>>) -> C + Send + Sync + 'static,
    {
        Arc::new_cyclic(|this| Self {
            child_data_source,
            factory: Box::new(factory),
            collections: RwLock::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn child_data_source(&self) -> &Arc<dyn DataSource> {
        &self.child_data_source
    }

    /// Decorated collection for `name`, created on first access
    pub fn collection(&self, name: &str) -> Result<Arc<C>> {
        {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(collection) = collections.get(name) {
                return Ok(collection.clone());
            }
        }

        let child_collection = self.child_data_source.get_collection(name)?;
        Ok(self.decorate(child_collection))
    }

    fn decorate(&self, child_collection: Arc<dyn Collection>) -> Arc<C> {
        let name = child_collection.name().to_string();
        let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(name)
            .or_insert_with(|| {
                debug!("Decorating collection '{}'", child_collection.name());
                Arc::new((self.factory)(child_collection.clone(), self.this.clone()))
            })
            .clone()
    }
}

#[async_trait]
impl<C: Collection> DataSource for DataSourceDecorator<C> {
    fn collections(&self) -> Vec<Arc<dyn Collection>> {
        self.child_data_source
            .collections()
            .into_iter()
            .map(|child| self.decorate(child) as Arc<dyn Collection>)
            .collect()
    }

    fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        Ok(self.collection(name)? as Arc<dyn Collection>)
    }

    fn schema(&self) -> DataSourceSchema {
        self.child_data_source.schema()
    }

    async fn render_chart(&self, caller: &Caller, name: &str) -> Result<Value> {
        self.child_data_source.render_chart(caller, name).await
    }
}

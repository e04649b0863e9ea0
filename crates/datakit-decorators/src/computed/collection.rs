use super::compute::compute_from_records;
use super::definition::ComputedDefinition;
use super::rewrite::rewrite_field;
use crate::context::CollectionContext;
use async_trait::async_trait;
use datakit_core::{
    AggregateResult, Aggregation, Caller, Collection, CollectionDecorator, CollectionSchema,
    ColumnSchema, DataError, DataSource, DataSourceDecorator, FieldSchema, Filter,
    PaginatedFilter, Projection, Record, Result, SchemaCache, PATH_SEPARATOR,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

pub type ComputedDataSource = DataSourceDecorator<ComputedCollection>;

/// Adds computed fields to a collection
pub struct ComputedCollection {
    child_collection: Arc<dyn Collection>,
    data_source: Weak<ComputedDataSource>,
    computeds: RwLock<BTreeMap<String, Arc<ComputedDefinition>>>,
    schema_cache: SchemaCache,
}

impl ComputedCollection {
    pub fn new(child_collection: Arc<dyn Collection>, data_source: Weak<ComputedDataSource>) -> Self {
        Self {
            child_collection,
            data_source,
            computeds: RwLock::new(BTreeMap::new()),
            schema_cache: SchemaCache::new(),
        }
    }

    /// Wrap every collection of `data_source`
    pub fn decorate(data_source: Arc<dyn DataSource>) -> Arc<ComputedDataSource> {
        DataSourceDecorator::new(data_source, ComputedCollection::new)
    }

    pub(crate) fn data_source(&self) -> Result<Arc<ComputedDataSource>> {
        self.data_source
            .upgrade()
            .ok_or_else(|| DataError::internal("Computed data source was dropped"))
    }

    /// Definition of the computed field at `path`, following relations
    pub fn get_computed(&self, path: &str) -> Result<Option<Arc<ComputedDefinition>>> {
        let Some((relation, rest)) = path.split_once(PATH_SEPARATOR) else {
            let computeds = self.computeds.read().unwrap_or_else(PoisonError::into_inner);
            return Ok(computeds.get(path).cloned());
        };

        let schema = self.schema();
        let foreign_collection = schema
            .field(relation)
            .and_then(FieldSchema::foreign_collection)
            .ok_or_else(|| {
                DataError::invalid_configuration(format!(
                    "Relation '{}' not found on collection '{}'",
                    relation,
                    self.name()
                ))
            })?;

        self.data_source()?
            .collection(foreign_collection)?
            .get_computed(rest)
    }

    /// Declare a new computed field.
    ///
    /// The name must be free and every dependency must already exist, either
    /// as a column or as a previously registered computed field. Dependencies
    /// may only cross to-one relations.
    pub fn register_computed(&self, name: impl Into<String>, definition: ComputedDefinition) -> Result<()> {
        let name = name.into();
        let schema = self.schema();

        if schema.fields.contains_key(&name) {
            return Err(DataError::invalid_configuration(format!(
                "Field '{}' already exists on collection '{}'",
                name,
                self.name()
            )));
        }
        if definition.dependencies.is_empty() {
            return Err(DataError::invalid_configuration(format!(
                "Computed field '{}' on collection '{}' must have at least one dependency",
                name,
                self.name()
            )));
        }
        for dependency in &definition.dependencies {
            self.validate_dependency(&schema, dependency)?;
        }

        {
            let mut computeds = self.computeds.write().unwrap_or_else(PoisonError::into_inner);
            if computeds.contains_key(&name) {
                return Err(DataError::invalid_configuration(format!(
                    "Field '{}' already exists on collection '{}'",
                    name,
                    self.name()
                )));
            }
            computeds.insert(name.clone(), Arc::new(definition));
        }

        debug!("Registered computed field '{}' on '{}'", name, self.name());
        self.mark_schema_as_dirty();
        Ok(())
    }

    fn validate_dependency(&self, schema: &CollectionSchema, path: &str) -> Result<()> {
        let unknown = || {
            DataError::invalid_configuration(format!(
                "Unknown field '{}' in dependencies of collection '{}'",
                path,
                self.name()
            ))
        };

        match path.split_once(PATH_SEPARATOR) {
            None => match schema.field(path) {
                Some(FieldSchema::Column(_)) => Ok(()),
                _ => Err(unknown()),
            },
            Some((relation, rest)) => {
                let foreign_collection = schema
                    .field(relation)
                    .filter(|field| field.is_to_one())
                    .and_then(FieldSchema::foreign_collection)
                    .ok_or_else(unknown)?;

                let foreign = self.data_source()?.collection(foreign_collection)?;
                foreign
                    .validate_dependency(&foreign.schema(), rest)
                    .map_err(|_| unknown())
            }
        }
    }

    /// Computed values only exist after the child answered, so they cannot
    /// take part in what is sent to it.
    fn reject_computed<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a String>,
        operation: &str,
    ) -> Result<()> {
        for path in paths {
            if self.get_computed(path)?.is_some() {
                return Err(DataError::operation_not_supported(format!(
                    "Cannot {} on computed field '{}' of '{}'",
                    operation,
                    path,
                    self.name()
                )));
            }
        }
        Ok(())
    }

    fn reject_computed_condition(&self, filter: &Filter) -> Result<()> {
        match &filter.condition_tree {
            Some(tree) => self.reject_computed(&tree.projection(), "filter"),
            None => Ok(()),
        }
    }

    fn context(&self, caller: &Caller) -> Result<CollectionContext> {
        let data_source = self.data_source()?;
        let collection = data_source.collection(self.name())?;
        Ok(CollectionContext::new(collection, data_source, caller.clone()))
    }
}

#[async_trait]
impl CollectionDecorator for ComputedCollection {
    fn child_collection(&self) -> &Arc<dyn Collection> {
        &self.child_collection
    }

    fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    fn refine_schema(&self, child_schema: &CollectionSchema) -> CollectionSchema {
        let mut schema = child_schema.clone();
        let computeds = self.computeds.read().unwrap_or_else(PoisonError::into_inner);

        for (name, computed) in computeds.iter() {
            let mut column = ColumnSchema::new(computed.column_type.clone()).read_only();
            column.default_value = computed.default_value.clone();
            column.enum_values = computed.enum_values.clone();
            schema.fields.insert(name.clone(), column.into());
        }

        schema
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        if let Some(tree) = &filter.condition_tree {
            self.reject_computed(&tree.projection(), "filter")?;
        }
        if let Some(sort) = &filter.sort {
            self.reject_computed(sort.clauses.iter().map(|clause| &clause.field), "sort")?;
        }

        let child_projection = projection.replace(|path| rewrite_field(self, path))?;
        debug!(
            "Listing '{}' with [{}] for [{}]",
            self.name(),
            child_projection,
            projection
        );

        let records = self
            .child_collection
            .list(caller, filter, &child_projection)
            .await?;
        if child_projection == *projection {
            return Ok(records);
        }

        let context = self.context(caller)?;

        compute_from_records(self, &context, &child_projection, projection, records).await
    }

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        self.reject_computed_condition(filter)?;
        let projection = aggregation.projection();

        let mut uses_computed = false;
        for path in &projection {
            uses_computed |= self.get_computed(path)?.is_some();
        }
        if !uses_computed {
            return self
                .child_collection
                .aggregate(caller, filter, aggregation, limit)
                .await;
        }

        debug!("Aggregating computed fields of '{}' in memory", self.name());
        let records = CollectionDecorator::list(
            self,
            caller,
            &PaginatedFilter::from(filter.clone()),
            &projection,
        )
        .await?;

        aggregation.apply(&records, &caller.timezone, limit)
    }

    async fn create(&self, caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>> {
        for record in &records {
            self.reject_computed(record.keys(), "write")?;
        }
        self.child_collection.create(caller, records).await
    }

    async fn update(&self, caller: &Caller, filter: &Filter, patch: Record) -> Result<()> {
        self.reject_computed_condition(filter)?;
        self.reject_computed(patch.keys(), "write")?;
        self.child_collection.update(caller, filter, patch).await
    }

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<()> {
        self.reject_computed_condition(filter)?;
        self.child_collection.delete(caller, filter).await
    }
}

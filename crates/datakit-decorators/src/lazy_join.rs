//! Join elision for many-to-one relations.
//!
//! Asking for `card:id` when `card` is a many-to-one relation targeting
//! `id` does not require a join: the value already sits in the foreign key
//! column. This decorator rewrites such projections, filters and
//! aggregations to use the foreign key and rebuilds the relation object in
//! the returned records.

use async_trait::async_trait;
use datakit_core::{
    AggregateResult, Aggregation, Caller, Collection, CollectionDecorator, CollectionSchema,
    DataSource, DataSourceDecorator, FieldSchema, Filter, ManyToOneSchema, PaginatedFilter,
    Projection, Record, Result, SchemaCache, Value, PATH_SEPARATOR,
};
use std::sync::Arc;
use tracing::debug;

pub type LazyJoinDataSource = DataSourceDecorator<LazyJoinCollection>;

/// True when a relation is only read through the key it points to
pub fn is_lazy_relation_projection(relation: &FieldSchema, sub_projection: &Projection) -> bool {
    match relation {
        FieldSchema::ManyToOne(many_to_one) => {
            sub_projection.len() == 1 && sub_projection.contains(&many_to_one.foreign_key_target)
        }
        _ => false,
    }
}

pub struct LazyJoinCollection {
    child_collection: Arc<dyn Collection>,
    schema_cache: SchemaCache,
}

impl LazyJoinCollection {
    pub fn new(child_collection: Arc<dyn Collection>) -> Self {
        Self {
            child_collection,
            schema_cache: SchemaCache::new(),
        }
    }

    pub fn decorate(data_source: Arc<dyn DataSource>) -> Arc<LazyJoinDataSource> {
        DataSourceDecorator::new(data_source, |child, _| LazyJoinCollection::new(child))
    }
}

fn lazy_relations<'a>(
    schema: &'a CollectionSchema,
    projection: &Projection,
) -> Vec<(String, &'a ManyToOneSchema)> {
    projection
        .relations()
        .into_iter()
        .filter_map(|(relation, sub_projection)| match schema.field(&relation) {
            Some(field @ FieldSchema::ManyToOne(many_to_one))
                if is_lazy_relation_projection(field, &sub_projection) =>
            {
                Some((relation, many_to_one))
            }
            _ => None,
        })
        .collect()
}

fn refine_projection(
    projection: &Projection,
    lazy: &[(String, &ManyToOneSchema)],
) -> Projection {
    projection
        .iter()
        .map(|path| {
            let foreign_key = path.split_once(PATH_SEPARATOR).and_then(|(relation, _)| {
                lazy.iter()
                    .find(|(name, _)| name == relation)
                    .map(|(_, many_to_one)| many_to_one.foreign_key.as_str())
            });
            foreign_key.unwrap_or(path.as_str())
        })
        .collect()
}

/// `relation:target` of a many-to-one becomes the foreign key column
fn refine_field(schema: &CollectionSchema, path: &str) -> String {
    if let Some((relation, rest)) = path.split_once(PATH_SEPARATOR) {
        if let Some(FieldSchema::ManyToOne(many_to_one)) = schema.field(relation) {
            if rest == many_to_one.foreign_key_target {
                return many_to_one.foreign_key.clone();
            }
        }
    }
    path.to_string()
}

fn refine_filter(schema: &CollectionSchema, filter: &Filter) -> Filter {
    Filter {
        condition_tree: filter
            .condition_tree
            .as_ref()
            .map(|tree| tree.replace_fields(|field| refine_field(schema, field))),
        ..filter.clone()
    }
}

fn refine_paginated_filter(schema: &CollectionSchema, filter: &PaginatedFilter) -> PaginatedFilter {
    PaginatedFilter {
        condition_tree: filter
            .condition_tree
            .as_ref()
            .map(|tree| tree.replace_fields(|field| refine_field(schema, field))),
        sort: filter
            .sort
            .as_ref()
            .map(|sort| sort.replace_fields(|field| refine_field(schema, field))),
        ..filter.clone()
    }
}

fn reshape_records(
    records: &mut [Record],
    projection: &Projection,
    lazy: &[(String, &ManyToOneSchema)],
) {
    for record in records.iter_mut() {
        for (relation, many_to_one) in lazy {
            let foreign_key = if projection.contains(&many_to_one.foreign_key) {
                record.get(&many_to_one.foreign_key).cloned()
            } else {
                record.remove(&many_to_one.foreign_key)
            };

            match foreign_key {
                Some(value) if !value.is_null() => {
                    let mut nested = Record::new();
                    nested.insert(many_to_one.foreign_key_target.clone(), value);
                    record.insert(relation.clone(), Value::Object(nested));
                }
                _ => {
                    record.remove(relation);
                }
            }
        }
    }
}

#[async_trait]
impl CollectionDecorator for LazyJoinCollection {
    fn child_collection(&self) -> &Arc<dyn Collection> {
        &self.child_collection
    }

    fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    async fn list(
        &self,
        caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        let schema = self.child_collection.schema();
        let lazy = lazy_relations(&schema, projection);
        let child_projection = refine_projection(projection, &lazy);
        let child_filter = refine_paginated_filter(&schema, filter);

        if !lazy.is_empty() {
            debug!(
                "Elided {} join(s) on '{}': [{}]",
                lazy.len(),
                self.child_collection.name(),
                child_projection
            );
        }

        let mut records = self
            .child_collection
            .list(caller, &child_filter, &child_projection)
            .await?;
        reshape_records(&mut records, projection, &lazy);

        Ok(records)
    }

    async fn update(&self, caller: &Caller, filter: &Filter, patch: Record) -> Result<()> {
        let schema = self.child_collection.schema();
        self.child_collection
            .update(caller, &refine_filter(&schema, filter), patch)
            .await
    }

    async fn delete(&self, caller: &Caller, filter: &Filter) -> Result<()> {
        let schema = self.child_collection.schema();
        self.child_collection
            .delete(caller, &refine_filter(&schema, filter))
            .await
    }

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        let schema = self.child_collection.schema();
        let child_filter = refine_filter(&schema, filter);

        let mut renamed: Vec<(String, String)> = Vec::new();
        let child_aggregation = aggregation.replace_fields(|field| refine_field(&schema, field));
        for (group, original) in child_aggregation.groups.iter().zip(&aggregation.groups) {
            if group.field != original.field {
                renamed.push((group.field.clone(), original.field.clone()));
            }
        }

        let mut results = self
            .child_collection
            .aggregate(caller, &child_filter, &child_aggregation, limit)
            .await?;

        let requested_foreign_key = |foreign_key: &str| {
            aggregation
                .groups
                .iter()
                .any(|group| group.field == foreign_key)
        };
        for result in &mut results {
            for (foreign_key, original) in &renamed {
                let value = if requested_foreign_key(foreign_key.as_str()) {
                    result.group.get(foreign_key).cloned()
                } else {
                    result.group.remove(foreign_key)
                };
                if let Some(value) = value {
                    result.group.insert(original.clone(), value);
                }
            }
        }

        Ok(results)
    }
}

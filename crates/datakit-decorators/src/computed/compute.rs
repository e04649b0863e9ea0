use super::collection::ComputedCollection;
use super::dedup::transform_unique_values;
use super::flattener::{flatten, unflatten, unflatten_records, with_null_markers, FlatRecordList};
use crate::context::CollectionContext;
use datakit_core::{Collection, DataError, Projection, Record, Result, Value, PATH_SEPARATOR};
use futures::future::{self, BoxFuture, Shared, TryFutureExt};
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Column = Shared<BoxFuture<'static, Result<Arc<Vec<Value>>>>>;

/// Add computed values to records fetched from the child collection.
///
/// `records_projection` is what the child returned, `desired_projection`
/// what the caller asked for. Every computed field becomes a shared future
/// chained on its dependencies, so independent fields run concurrently and
/// each evaluator runs once per call.
pub async fn compute_from_records(
    collection: &ComputedCollection,
    context: &CollectionContext,
    records_projection: &Projection,
    desired_projection: &Projection,
    records: Vec<Record>,
) -> Result<Vec<Record>> {
    if desired_projection.is_empty() {
        return Ok(vec![Record::new(); records.len()]);
    }

    let paths = with_null_markers(records_projection);
    let mut columns: HashMap<String, Column> = paths
        .iter()
        .zip(flatten(&records, &paths))
        .map(|(path, values)| (path.clone(), future::ok(Arc::new(values)).boxed().shared()))
        .collect();

    let desired = with_null_markers(desired_projection);
    for path in &desired {
        queue_field(collection, context, path, &mut columns)?;
    }

    let pending = desired
        .iter()
        .map(|path| column(&columns, path))
        .collect::<Result<Vec<Column>>>()?;
    let flat: FlatRecordList = future::try_join_all(pending)
        .await?
        .into_iter()
        .map(|values| Arc::try_unwrap(values).unwrap_or_else(|shared| Vec::clone(&shared)))
        .collect();

    Ok(unflatten_records(&flat, &desired))
}

fn column(columns: &HashMap<String, Column>, path: &str) -> Result<Column> {
    columns
        .get(path)
        .cloned()
        .ok_or_else(|| DataError::internal(format!("Field '{path}' was not resolved")))
}

fn queue_field(
    collection: &ComputedCollection,
    context: &CollectionContext,
    path: &str,
    columns: &mut HashMap<String, Column>,
) -> Result<()> {
    if columns.contains_key(path) {
        return Ok(());
    }

    let computed = collection.get_computed(path)?.ok_or_else(|| {
        DataError::internal(format!(
            "Field '{}' is neither fetched nor computed on '{}'",
            path,
            context.collection.name()
        ))
    })?;

    // Dependencies are relative to the collection owning the field
    let prefix = path.rsplit_once(PATH_SEPARATOR).map(|(prefix, _)| prefix);
    let local: Projection = with_null_markers(
        &computed
            .dependencies
            .iter()
            .map(String::as_str)
            .collect::<Projection>(),
    );
    let nested = local.nest(prefix);

    for dependency in &nested {
        queue_field(collection, context, dependency, columns)?;
    }
    let dependencies = nested
        .iter()
        .map(|dependency| column(columns, dependency))
        .collect::<Result<Vec<Column>>>()?;

    debug!("Queued computed field '{}'", path);

    let context = context.clone();
    let field = path.to_string();
    let values = async move {
        let flat: FlatRecordList = future::try_join_all(dependencies)
            .await?
            .iter()
            .map(|values| Vec::clone(values))
            .collect();
        let partials = unflatten(&flat, &local);

        let values = transform_unique_values(&partials, |unique| async move {
            let records = unique
                .into_iter()
                .map(|partial| match partial {
                    Value::Object(record) => record,
                    _ => Record::new(),
                })
                .collect();
            computed.get_values(records, context).await
        })
        .map_err(|e| match e {
            DataError::Computation(message) => {
                DataError::computation(format!("Field '{field}': {message}"))
            }
            other => other,
        })
        .await?;

        Ok::<_, DataError>(Arc::new(values))
    };

    columns.insert(path.to_string(), values.boxed().shared());
    Ok(())
}

use super::collection::ComputedCollection;
use datakit_core::{Collection, DataError, FieldSchema, Projection, Result, PATH_SEPARATOR};

/// Physical paths the child collection must return to produce `path`.
///
/// Computed fields expand to their dependencies, recursively and across
/// relations. The output never contains a computed field.
pub fn rewrite_field(collection: &ComputedCollection, path: &str) -> Result<Projection> {
    if let Some((relation, rest)) = path.split_once(PATH_SEPARATOR) {
        let schema = collection.schema();
        let foreign_collection = schema
            .field(relation)
            .and_then(FieldSchema::foreign_collection)
            .ok_or_else(|| {
                DataError::invalid_configuration(format!(
                    "Relation '{}' not found on collection '{}'",
                    relation,
                    collection.name()
                ))
            })?;

        let foreign = collection.data_source()?.collection(foreign_collection)?;
        return Ok(rewrite_field(&foreign, rest)?.nest(Some(relation)));
    }

    match collection.get_computed(path)? {
        Some(computed) => computed
            .dependencies
            .iter()
            .map(String::as_str)
            .collect::<Projection>()
            .replace(|dependency| rewrite_field(collection, dependency)),
        None => Ok([path].into_iter().collect()),
    }
}

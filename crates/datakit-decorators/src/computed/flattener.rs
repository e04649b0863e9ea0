//! Conversion between nested records and column-oriented lists.
//!
//! Computed fields are resolved column by column, so records fetched from
//! the child collection are flattened into one column per projection path,
//! then rebuilt into nested records once every column is known.

use datakit_core::{get_field_value, Projection, Record, Value, PATH_SEPARATOR};

/// Pseudo-field telling whether a relation exists on a record
pub const NULL_MARKER: &str = "__nullMarker";

/// One column of values per path, aligned by record position
pub type FlatRecordList = Vec<Vec<Value>>;

/// Add a `prefix:__nullMarker` path for every relation the projection crosses
pub fn with_null_markers(projection: &Projection) -> Projection {
    let mut result = projection.clone();

    for path in projection {
        let mut prefix_end = 0;
        while let Some(offset) = path[prefix_end..].find(PATH_SEPARATOR) {
            prefix_end += offset;
            result.push(format!("{}{PATH_SEPARATOR}{NULL_MARKER}", &path[..prefix_end]));
            prefix_end += PATH_SEPARATOR.len_utf8();
        }
    }

    result
}

pub fn flatten(records: &[Record], projection: &Projection) -> FlatRecordList {
    projection
        .iter()
        .map(|path| {
            records
                .iter()
                .map(|record| flatten_value(record, path))
                .collect()
        })
        .collect()
}

fn flatten_value(record: &Record, path: &str) -> Value {
    match path.rsplit_once(PATH_SEPARATOR) {
        Some((relation, NULL_MARKER)) => match get_field_value(record, relation) {
            Some(Value::Object(_)) => Value::Bool(true),
            _ => Value::Null,
        },
        _ => get_field_value(record, path).cloned().unwrap_or(Value::Null),
    }
}

/// Rebuild nested values; a record whose values are all null becomes null
pub fn unflatten(flat: &FlatRecordList, projection: &Projection) -> Vec<Value> {
    let paths: Vec<&str> = projection.iter().map(String::as_str).collect();
    let columns: Vec<&[Value]> = flat.iter().map(Vec::as_slice).collect();

    (0..record_count(flat))
        .map(|index| {
            build_record(&paths, &columns, index)
                .map(Value::Object)
                .unwrap_or(Value::Null)
        })
        .collect()
}

/// Rebuild the records returned to the caller.
///
/// Same as [`unflatten`] except that root records are never collapsed.
pub fn unflatten_records(flat: &FlatRecordList, projection: &Projection) -> Vec<Record> {
    let paths: Vec<&str> = projection.iter().map(String::as_str).collect();
    let columns: Vec<&[Value]> = flat.iter().map(Vec::as_slice).collect();

    (0..record_count(flat))
        .map(|index| {
            build_record(&paths, &columns, index).unwrap_or_else(|| empty_record(projection))
        })
        .collect()
}

fn record_count(flat: &FlatRecordList) -> usize {
    flat.first().map_or(0, Vec::len)
}

fn empty_record(projection: &Projection) -> Record {
    let mut record = Record::new();
    for column in projection.columns() {
        if column != NULL_MARKER {
            record.insert(column.to_string(), Value::Null);
        }
    }
    for relation in projection.relations().into_keys() {
        record.insert(relation, Value::Null);
    }
    record
}

fn build_record(paths: &[&str], columns: &[&[Value]], index: usize) -> Option<Record> {
    let mut record = Record::new();
    let mut marker: Option<bool> = None;
    let mut relations: Vec<(&str, Vec<&str>, Vec<&[Value]>)> = Vec::new();

    for (path, column) in paths.iter().zip(columns) {
        let value = column.get(index).unwrap_or(&Value::Null);

        match path.split_once(PATH_SEPARATOR) {
            None if *path == NULL_MARKER => marker = Some(!value.is_null()),
            None => {
                record.insert(path.to_string(), value.clone());
            }
            Some((relation, rest)) => {
                let position = match relations.iter().position(|(name, _, _)| *name == relation) {
                    Some(position) => position,
                    None => {
                        relations.push((relation, Vec::new(), Vec::new()));
                        relations.len() - 1
                    }
                };
                relations[position].1.push(rest);
                relations[position].2.push(column);
            }
        }
    }

    for (relation, sub_paths, sub_columns) in relations {
        let nested = build_record(&sub_paths, &sub_columns, index)
            .map(Value::Object)
            .unwrap_or(Value::Null);
        record.insert(relation.to_string(), nested);
    }

    match marker {
        Some(present) => present.then_some(record),
        None if record.values().all(Value::is_null) => None,
        None => Some(record),
    }
}

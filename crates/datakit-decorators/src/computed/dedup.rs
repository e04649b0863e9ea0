use datakit_core::{DataError, Result, Value};
use std::collections::HashMap;
use std::future::Future;

/// Call `batch` once with the distinct non-null inputs and spread its
/// results back to every input position. Nulls map to null.
pub async fn transform_unique_values<F, Fut>(inputs: &[Value], batch: F) -> Result<Vec<Value>>
where
    F: FnOnce(Vec<Value>) -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<Value> = Vec::new();
    let mut slots: Vec<Option<usize>> = Vec::with_capacity(inputs.len());

    for value in inputs {
        if value.is_null() {
            slots.push(None);
            continue;
        }

        let position = *positions.entry(value.to_string()).or_insert_with(|| {
            unique.push(value.clone());
            unique.len() - 1
        });
        slots.push(Some(position));
    }

    if unique.is_empty() {
        return Ok(vec![Value::Null; inputs.len()]);
    }

    let expected = unique.len();
    let outputs = batch(unique).await?;
    if outputs.len() != expected {
        return Err(DataError::computation(format!(
            "Expected {} values, got {}",
            expected,
            outputs.len()
        )));
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.map_or(Value::Null, |position| outputs[position].clone()))
        .collect())
}

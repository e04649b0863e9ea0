use crate::error::{DataError, Result};
use crate::projection::Projection;
use crate::types::{compare_values, get_field_value, number_value, Record, Value};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateOperation {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

/// Truncation applied to a date before grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateOperation {
    Year,
    Quarter,
    Month,
    Week,
    Day,
}

impl DateOperation {
    fn truncate(&self, value: &Value, offset: FixedOffset) -> Result<Value> {
        let date = match value {
            Value::Null => return Ok(Value::Null),
            Value::String(raw) => parse_date(raw, offset)?,
            other => {
                return Err(DataError::InvalidAggregation(format!(
                    "Cannot group {other} by date"
                )))
            }
        };

        let truncated = match self {
            DateOperation::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            DateOperation::Quarter => {
                NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1)
            }
            DateOperation::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            DateOperation::Week => Some(
                date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            ),
            DateOperation::Day => Some(date),
        }
        .ok_or_else(|| DataError::InvalidAggregation(format!("Invalid date {date}")))?;

        Ok(Value::String(truncated.format("%Y-%m-%d").to_string()))
    }
}

fn parse_date(raw: &str, offset: FixedOffset) -> Result<NaiveDate> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.with_timezone(&offset).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DataError::InvalidAggregation(format!("Invalid date '{raw}': {e}")))
}

/// Parse "UTC" or a fixed "+HH:MM" / "-HH:MM" offset
fn parse_timezone(timezone: &str) -> Result<FixedOffset> {
    let unsupported =
        || DataError::InvalidAggregation(format!("Unsupported timezone '{timezone}'"));

    match timezone {
        "UTC" | "Etc/UTC" | "Z" => return FixedOffset::east_opt(0).ok_or_else(unsupported),
        _ => {}
    }

    let (sign, rest) = if let Some(rest) = timezone.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = timezone.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(unsupported());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(unsupported)?;
    let hours: i32 = hours.parse().map_err(|_| unsupported())?;
    let minutes: i32 = minutes.parse().map_err(|_| unsupported())?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(unsupported)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationGroup {
    pub field: String,
    pub operation: Option<DateOperation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub operation: AggregateOperation,
    pub field: Option<String>,
    #[serde(default)]
    pub groups: Vec<AggregationGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub value: Value,
    pub group: Record,
}

impl Aggregation {
    pub fn new(operation: AggregateOperation) -> Self {
        Self {
            operation,
            field: None,
            groups: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_group(mut self, field: impl Into<String>, operation: Option<DateOperation>) -> Self {
        self.groups.push(AggregationGroup {
            field: field.into(),
            operation,
        });
        self
    }

    /// Fields needed to compute the aggregation
    pub fn projection(&self) -> Projection {
        self.field
            .iter()
            .chain(self.groups.iter().map(|g| &g.field))
            .map(String::as_str)
            .collect()
    }

    pub fn replace_fields<F>(&self, mut handler: F) -> Aggregation
    where
        F: FnMut(&str) -> String,
    {
        Aggregation {
            operation: self.operation,
            field: self.field.as_deref().map(&mut handler),
            groups: self
                .groups
                .iter()
                .map(|group| AggregationGroup {
                    field: handler(&group.field),
                    operation: group.operation,
                })
                .collect(),
        }
    }

    /// Compute the aggregation over records held in memory.
    ///
    /// Results are ordered by value, largest first, then truncated to `limit`.
    pub fn apply(
        &self,
        records: &[Record],
        timezone: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        if self.field.is_none() && self.operation != AggregateOperation::Count {
            return Err(DataError::InvalidAggregation(format!(
                "{:?} requires a field",
                self.operation
            )));
        }

        let offset = if self.groups.iter().any(|g| g.operation.is_some()) {
            parse_timezone(timezone)?
        } else {
            FixedOffset::east_opt(0).ok_or_else(|| DataError::internal("UTC offset"))?
        };

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut buckets: Vec<(Record, Vec<&Record>)> = Vec::new();

        for record in records {
            let mut group = Record::new();
            for aggregation_group in &self.groups {
                let value = get_field_value(record, &aggregation_group.field)
                    .cloned()
                    .unwrap_or(Value::Null);
                let value = match &aggregation_group.operation {
                    Some(operation) => operation.truncate(&value, offset)?,
                    None => value,
                };
                group.insert(aggregation_group.field.clone(), value);
            }

            let key = Value::Object(group.clone()).to_string();
            let position = *index.entry(key).or_insert_with(|| {
                buckets.push((group, Vec::new()));
                buckets.len() - 1
            });
            buckets[position].1.push(record);
        }

        let mut results: Vec<AggregateResult> = buckets
            .into_iter()
            .map(|(group, rows)| AggregateResult {
                value: self.aggregate_rows(&rows),
                group,
            })
            .collect();

        results.sort_by(|a, b| compare_values(&b.value, &a.value));
        if let Some(limit) = limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    fn aggregate_rows(&self, rows: &[&Record]) -> Value {
        let values: Vec<&Value> = match &self.field {
            Some(field) => rows
                .iter()
                .filter_map(|row| get_field_value(row, field))
                .filter(|value| !value.is_null())
                .collect(),
            None => Vec::new(),
        };
        let numbers = || values.iter().filter_map(|v| v.as_f64());

        match self.operation {
            AggregateOperation::Count if self.field.is_none() => Value::from(rows.len()),
            AggregateOperation::Count => Value::from(values.len()),
            AggregateOperation::Sum => number_value(numbers().sum()),
            AggregateOperation::Avg => {
                let count = numbers().count();
                if count == 0 {
                    Value::Null
                } else {
                    number_value(numbers().sum::<f64>() / count as f64)
                }
            }
            AggregateOperation::Max => values
                .iter()
                .max_by(|a, b| compare_values(a, b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggregateOperation::Min => values
                .iter()
                .min_by(|a, b| compare_values(a, b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn books() -> Vec<Record> {
        vec![
            json!({"id": 1, "price": 10, "genre": "fantasy", "published": "2021-02-14", "author": {"name": "Tolkien"}}),
            json!({"id": 2, "price": 20, "genre": "fantasy", "published": "2021-05-03", "author": {"name": "Tolkien"}}),
            json!({"id": 3, "price": 5, "genre": "poetry", "published": "2022-11-30T23:30:00Z", "author": {"name": "Hugo"}}),
            json!({"id": 4, "price": null, "genre": "poetry", "published": null, "author": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn test_count_without_groups() {
        let results = Aggregation::new(AggregateOperation::Count)
            .apply(&books(), "UTC", None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, json!(4));
        assert!(results[0].group.is_empty());
    }

    #[test]
    fn test_count_field_ignores_nulls() {
        let results = Aggregation::new(AggregateOperation::Count)
            .with_field("price")
            .apply(&books(), "UTC", None)
            .unwrap();
        assert_eq!(results[0].value, json!(3));
    }

    #[test]
    fn test_sum_grouped_and_sorted() {
        let results = Aggregation::new(AggregateOperation::Sum)
            .with_field("price")
            .with_group("genre", None)
            .apply(&books(), "UTC", None)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].value, json!(30));
        assert_eq!(results[0].group["genre"], json!("fantasy"));
        assert_eq!(results[1].value, json!(5));
    }

    #[test]
    fn test_avg_max_min() {
        let avg = Aggregation::new(AggregateOperation::Avg).with_field("price");
        assert_eq!(avg.apply(&books(), "UTC", None).unwrap()[0].value, json!(35.0 / 3.0));

        let max = Aggregation::new(AggregateOperation::Max).with_field("price");
        assert_eq!(max.apply(&books(), "UTC", None).unwrap()[0].value, json!(20));

        let min = Aggregation::new(AggregateOperation::Min).with_field("price");
        assert_eq!(min.apply(&books(), "UTC", None).unwrap()[0].value, json!(5));
    }

    #[test]
    fn test_group_by_relation_with_limit() {
        let results = Aggregation::new(AggregateOperation::Count)
            .with_group("author:name", None)
            .apply(&books(), "UTC", Some(1))
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, json!(2));
        assert_eq!(results[0].group["author:name"], json!("Tolkien"));
    }

    #[test]
    fn test_group_by_date_operation() {
        let results = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Year))
            .apply(&books(), "UTC", None)
            .unwrap();

        let groups: Vec<(Value, Value)> = results
            .iter()
            .map(|r| (r.group["published"].clone(), r.value.clone()))
            .collect();
        assert!(groups.contains(&(json!("2021-01-01"), json!(2))));
        assert!(groups.contains(&(json!("2022-01-01"), json!(1))));
        assert!(groups.contains(&(Value::Null, json!(1))));
    }

    #[test]
    fn test_date_operations_respect_timezone() {
        let week = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Week));
        let results = week.apply(&books()[2..3], "+02:00", None).unwrap();
        // 2022-11-30T23:30Z is Thursday 2022-12-01 at +02:00, week starts Monday 2022-11-28
        assert_eq!(results[0].group["published"], json!("2022-11-28"));

        let quarter = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Quarter));
        let results = quarter.apply(&books()[1..2], "UTC", None).unwrap();
        assert_eq!(results[0].group["published"], json!("2021-04-01"));

        let month = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Month));
        let results = month.apply(&books()[2..3], "-01:00", None).unwrap();
        assert_eq!(results[0].group["published"], json!("2022-11-01"));
    }

    #[test]
    fn test_invalid_inputs() {
        let sum = Aggregation::new(AggregateOperation::Sum);
        assert!(sum.apply(&books(), "UTC", None).is_err());

        let by_day = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Day));
        assert!(by_day.apply(&books(), "Mars/Olympus", None).is_err());
    }

    #[test]
    fn test_only_utc_and_fixed_offsets_are_accepted() {
        let by_day = Aggregation::new(AggregateOperation::Count)
            .with_group("published", Some(DateOperation::Day));

        let err = by_day.apply(&books(), "Europe/Paris", None).unwrap_err();
        assert!(matches!(err, DataError::InvalidAggregation(_)));
        assert!(by_day.apply(&books(), "Etc/UTC", None).is_ok());
        assert!(by_day.apply(&books(), "+05:30", None).is_ok());

        let ungrouped = Aggregation::new(AggregateOperation::Count);
        assert!(ungrouped.apply(&books(), "Europe/Paris", None).is_ok());
    }

    #[test]
    fn test_projection_and_replace_fields() {
        let aggregation = Aggregation::new(AggregateOperation::Sum)
            .with_field("price")
            .with_group("card:id", None);

        let fields: Vec<String> = aggregation.projection().into();
        assert_eq!(fields, vec!["price", "card:id"]);

        let replaced = aggregation.replace_fields(|f| f.replace("card:id", "card_id"));
        assert_eq!(replaced.groups[0].field, "card_id");
        assert_eq!(replaced.field.as_deref(), Some("price"));
    }
}

//! Common test utilities shared across decorator integration tests
//!
//! This module provides:
//! - An in-memory collection that resolves to-one relations and records
//!   every call it receives
//! - A small library data set (books, persons, countries, customers, cards)
//! - Helpers to build projections and records

#![allow(dead_code)]

use async_trait::async_trait;
use datakit_core::{
    AggregateResult, Aggregation, Caller, Collection, CollectionSchema, ColumnSchema, DataError,
    DataSource, FieldSchema, Filter, ManyToOneSchema, PaginatedFilter, PrimitiveType, Projection,
    Record, Result, Value,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// A call received by a [`MemoryCollection`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List {
        filter: PaginatedFilter,
        projection: Projection,
    },
    Create {
        count: usize,
    },
    Update {
        filter: Filter,
    },
    Delete {
        filter: Filter,
    },
    Aggregate {
        filter: Filter,
        aggregation: Aggregation,
    },
}

/// Collection storing flat rows, joining to-one relations on demand
pub struct MemoryCollection {
    name: String,
    schema: Arc<CollectionSchema>,
    rows: Mutex<Vec<Record>>,
    calls: Mutex<Vec<Call>>,
    fail_next_list: AtomicBool,
    data_source: Weak<MemoryDataSource>,
}

impl MemoryCollection {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Projections of every `list` call, in order
    pub fn listed_projections(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::List { projection, .. } => Some(projection.into()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make the next `list` call fail with a backend error
    pub fn fail_next_list(&self) {
        self.fail_next_list.store(true, Ordering::SeqCst);
    }

    fn record_call(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn foreign(&self, name: &str) -> Arc<MemoryCollection> {
        self.data_source
            .upgrade()
            .expect("data source alive")
            .memory_collection(name)
    }

    /// Copy of a row with every relation needed by `paths` resolved
    fn hydrate(&self, row: &Record, paths: &Projection) -> Record {
        let mut record = row.clone();

        for (relation, sub_paths) in paths.relations() {
            let related = match self.schema.field(&relation) {
                Some(FieldSchema::ManyToOne(many_to_one)) => self.find_related(
                    &many_to_one.foreign_collection,
                    &many_to_one.foreign_key_target,
                    row.get(&many_to_one.foreign_key),
                ),
                Some(FieldSchema::OneToOne(one_to_one)) => self.find_related(
                    &one_to_one.foreign_collection,
                    &one_to_one.origin_key,
                    row.get(&one_to_one.origin_key_target),
                ),
                _ => None,
            };

            let value = match related {
                Some((collection, related_row)) => {
                    Value::Object(collection.hydrate(&related_row, &sub_paths))
                }
                None => Value::Null,
            };
            record.insert(relation, value);
        }

        record
    }

    fn find_related(
        &self,
        collection: &str,
        field: &str,
        value: Option<&Value>,
    ) -> Option<(Arc<MemoryCollection>, Record)> {
        let value = value.filter(|v| !v.is_null())?;
        let collection = self.foreign(collection);
        let row = collection
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.get(field) == Some(value))
            .cloned()?;
        Some((collection, row))
    }

    fn hydrated_rows(&self, paths: &Projection) -> Vec<Record> {
        let rows = self.rows.lock().unwrap().clone();
        rows.iter().map(|row| self.hydrate(row, paths)).collect()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Arc<CollectionSchema> {
        self.schema.clone()
    }

    async fn list(
        &self,
        _caller: &Caller,
        filter: &PaginatedFilter,
        projection: &Projection,
    ) -> Result<Vec<Record>> {
        self.record_call(Call::List {
            filter: filter.clone(),
            projection: projection.clone(),
        });
        if self.fail_next_list.swap(false, Ordering::SeqCst) {
            return Err(DataError::BackendError("connection reset".to_string()));
        }

        let mut needed = projection.clone();
        if let Some(tree) = &filter.condition_tree {
            needed = needed.union(&tree.projection());
        }
        if let Some(sort) = &filter.sort {
            needed = needed.union(&sort.projection());
        }

        let records = filter.apply(&self.hydrated_rows(&needed));
        Ok(projection.apply(&records))
    }

    async fn create(&self, _caller: &Caller, records: Vec<Record>) -> Result<Vec<Record>> {
        self.record_call(Call::Create {
            count: records.len(),
        });
        self.rows.lock().unwrap().extend(records.iter().cloned());
        Ok(records)
    }

    async fn update(&self, _caller: &Caller, filter: &Filter, patch: Record) -> Result<()> {
        self.record_call(Call::Update {
            filter: filter.clone(),
        });
        let paths = filter
            .condition_tree
            .as_ref()
            .map(|tree| tree.projection())
            .unwrap_or_default();

        let mut rows = self.rows.lock().unwrap();
        let matching: Vec<bool> = rows
            .iter()
            .map(|row| filter.matches(&self.hydrate(row, &paths)))
            .collect();
        for (row, matches) in rows.iter_mut().zip(matching) {
            if matches {
                row.extend(patch.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, _caller: &Caller, filter: &Filter) -> Result<()> {
        self.record_call(Call::Delete {
            filter: filter.clone(),
        });
        let paths = filter
            .condition_tree
            .as_ref()
            .map(|tree| tree.projection())
            .unwrap_or_default();

        let kept: Vec<Record> = self
            .rows
            .lock()
            .unwrap()
            .clone()
            .into_iter()
            .filter(|row| !filter.matches(&self.hydrate(row, &paths)))
            .collect();
        *self.rows.lock().unwrap() = kept;
        Ok(())
    }

    async fn aggregate(
        &self,
        caller: &Caller,
        filter: &Filter,
        aggregation: &Aggregation,
        limit: Option<usize>,
    ) -> Result<Vec<AggregateResult>> {
        self.record_call(Call::Aggregate {
            filter: filter.clone(),
            aggregation: aggregation.clone(),
        });

        let mut needed = aggregation.projection();
        if let Some(tree) = &filter.condition_tree {
            needed = needed.union(&tree.projection());
        }
        let rows: Vec<Record> = self
            .hydrated_rows(&needed)
            .into_iter()
            .filter(|row| filter.matches(row))
            .collect();

        aggregation.apply(&rows, &caller.timezone, limit)
    }
}

pub struct MemoryDataSource {
    collections: BTreeMap<String, Arc<MemoryCollection>>,
}

impl MemoryDataSource {
    pub fn new(definitions: Vec<(&str, CollectionSchema, Vec<Value>)>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<MemoryDataSource>| {
            let collections = definitions
                .into_iter()
                .map(|(name, schema, rows)| {
                    let collection = MemoryCollection {
                        name: name.to_string(),
                        schema: Arc::new(schema),
                        rows: Mutex::new(rows.into_iter().map(record).collect()),
                        calls: Mutex::new(Vec::new()),
                        fail_next_list: AtomicBool::new(false),
                        data_source: this.clone(),
                    };
                    (name.to_string(), Arc::new(collection))
                })
                .collect();
            MemoryDataSource { collections }
        })
    }

    pub fn memory_collection(&self, name: &str) -> Arc<MemoryCollection> {
        self.collections
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no fixture collection '{name}'"))
    }

    pub fn clear_calls(&self) {
        for collection in self.collections.values() {
            collection.clear_calls();
        }
    }
}

impl DataSource for MemoryDataSource {
    fn collections(&self) -> Vec<Arc<dyn Collection>> {
        self.collections
            .values()
            .map(|c| c.clone() as Arc<dyn Collection>)
            .collect()
    }

    fn get_collection(&self, name: &str) -> Result<Arc<dyn Collection>> {
        self.collections
            .get(name)
            .map(|c| c.clone() as Arc<dyn Collection>)
            .ok_or_else(|| DataError::not_found(format!("Collection '{name}' not found")))
    }
}

fn many_to_one(foreign_collection: &str, foreign_key: &str) -> ManyToOneSchema {
    ManyToOneSchema {
        foreign_collection: foreign_collection.to_string(),
        foreign_key: foreign_key.to_string(),
        foreign_key_target: "id".to_string(),
    }
}

fn id_column() -> ColumnSchema {
    ColumnSchema::new(PrimitiveType::Number).primary_key()
}

/// Books written by persons from countries, customers holding cards
pub fn library() -> Arc<MemoryDataSource> {
    MemoryDataSource::new(vec![
        (
            "books",
            CollectionSchema::new()
                .with_field("id", id_column())
                .with_field("title", ColumnSchema::new(PrimitiveType::String))
                .with_field("price", ColumnSchema::new(PrimitiveType::Number))
                .with_field("author_id", ColumnSchema::new(PrimitiveType::Number))
                .with_field("author", many_to_one("persons", "author_id")),
            vec![
                json!({"id": 1, "title": "The Hobbit", "price": 10, "author_id": 1}),
                json!({"id": 2, "title": "Les Misérables", "price": 25, "author_id": 2}),
                json!({"id": 3, "title": "The Silmarillion", "price": 15, "author_id": 1}),
                json!({"id": 4, "title": "Beowulf", "price": 5, "author_id": null}),
            ],
        ),
        (
            "persons",
            CollectionSchema::new()
                .with_field("id", id_column())
                .with_field("name", ColumnSchema::new(PrimitiveType::String))
                .with_field("first_name", ColumnSchema::new(PrimitiveType::String))
                .with_field("last_name", ColumnSchema::new(PrimitiveType::String))
                .with_field("country_id", ColumnSchema::new(PrimitiveType::Number))
                .with_field("country", many_to_one("countries", "country_id")),
            vec![
                json!({"id": 1, "name": "Tolkien", "first_name": "J.R.R.", "last_name": "Tolkien", "country_id": 1}),
                json!({"id": 2, "name": "Hugo", "first_name": "Victor", "last_name": "Hugo", "country_id": 2}),
            ],
        ),
        (
            "countries",
            CollectionSchema::new()
                .with_field("id", id_column())
                .with_field("code", ColumnSchema::new(PrimitiveType::String)),
            vec![json!({"id": 1, "code": "GB"}), json!({"id": 2, "code": "FR"})],
        ),
        (
            "customers",
            CollectionSchema::new()
                .with_field("id", id_column())
                .with_field("name", ColumnSchema::new(PrimitiveType::String))
                .with_field("card_id", ColumnSchema::new(PrimitiveType::Number))
                .with_field("card", many_to_one("cards", "card_id")),
            vec![
                json!({"id": 1, "name": "Ann", "card_id": 2}),
                json!({"id": 2, "name": "Bob", "card_id": null}),
                json!({"id": 3, "name": "Cid", "card_id": 1}),
            ],
        ),
        (
            "cards",
            CollectionSchema::new()
                .with_field("id", id_column())
                .with_field("type", ColumnSchema::new(PrimitiveType::String)),
            vec![json!({"id": 1, "type": "visa"}), json!({"id": 2, "type": "amex"})],
        ),
    ])
}

pub fn caller() -> Caller {
    Caller::new(1, "admin@example.com")
}

pub fn projection(paths: &[&str]) -> Projection {
    paths.iter().copied().collect()
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn values(records: &[Record]) -> Vec<Value> {
    records.iter().cloned().map(Value::Object).collect()
}

use datakit_core::{
    get_field_value, Caller, Collection, ConditionTree, Operator, PaginatedFilter, Projection,
    Record, Result, Value,
};
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Default)]
struct PendingKeys {
    keys: Vec<Value>,
    seen: HashSet<String>,
}

/// Collects record keys and loads them with a single `list` call.
///
/// Keys are queued with [`BatchLoader::enqueue`] and fetched together when
/// [`BatchLoader::flush`] is awaited.
pub struct BatchLoader {
    collection: Arc<dyn Collection>,
    key_field: String,
    projection: Projection,
    pending: Mutex<PendingKeys>,
}

impl BatchLoader {
    pub fn new(collection: Arc<dyn Collection>, key_field: impl Into<String>, projection: Projection) -> Self {
        let key_field = key_field.into();
        let projection = projection.union(&[key_field.as_str()].into_iter().collect::<Projection>());

        Self {
            collection,
            key_field,
            projection,
            pending: Mutex::new(PendingKeys::default()),
        }
    }

    /// Queue a key; nulls and keys already queued are ignored
    pub fn enqueue(&self, key: Value) {
        if key.is_null() {
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.seen.insert(key.to_string()) {
            pending.keys.push(key);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .len()
    }

    /// Load every queued key and empty the queue.
    ///
    /// When the load fails the keys are queued again, so the next flush
    /// retries them.
    pub async fn flush(&self, caller: &Caller) -> Result<LoadedRecords> {
        let keys = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            mem::take(&mut *pending).keys
        };

        if keys.is_empty() {
            return Ok(LoadedRecords::default());
        }

        debug!(
            "Loading {} key(s) from '{}' in one batch",
            keys.len(),
            self.collection.name()
        );

        let filter = PaginatedFilter::new().with_condition_tree(ConditionTree::leaf(
            self.key_field.as_str(),
            Operator::In,
            Value::Array(keys.clone()),
        ));
        let records = match self.collection.list(caller, &filter, &self.projection).await {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    "Batch load from '{}' failed, keeping {} key(s) queued: {}",
                    self.collection.name(),
                    keys.len(),
                    e
                );
                for key in keys {
                    self.enqueue(key);
                }
                return Err(e);
            }
        };

        let mut loaded = LoadedRecords::default();
        for record in records {
            if let Some(key) = get_field_value(&record, &self.key_field).filter(|key| !key.is_null()) {
                loaded.records.insert(key.to_string(), record);
            }
        }

        Ok(loaded)
    }
}

/// Records returned by a flush, looked up by key
#[derive(Debug, Default)]
pub struct LoadedRecords {
    records: HashMap<String, Record>,
}

impl LoadedRecords {
    pub fn get(&self, key: &Value) -> Option<&Record> {
        self.records.get(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

use datakit_core::{Record, Value};
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

/// Values typed in an action form.
///
/// Every key read through [`FormValues::get`] is remembered, which tells
/// which fields other fields depend on.
#[derive(Debug, Default)]
pub struct FormValues {
    values: Record,
    used: Mutex<BTreeSet<String>>,
}

impl FormValues {
    pub fn new(values: Record) -> Self {
        Self {
            values,
            used: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        self.values.get(key)
    }

    /// Untracked access
    pub fn values(&self) -> &Record {
        &self.values
    }

    pub fn used_keys(&self) -> BTreeSet<String> {
        self.used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

use crate::context::CollectionContext;
use datakit_core::{ColumnType, Record, Result, Value};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ValuesFn =
    dyn Fn(Vec<Record>, CollectionContext) -> BoxFuture<'static, Result<Vec<Value>>> + Send + Sync;

/// A field whose values are derived from other fields.
///
/// `dependencies` are paths relative to the owning collection and may cross
/// relations (`"author:name"`). The evaluator receives one partial record per
/// row holding only those paths, and must return one value per record.
#[derive(Clone)]
pub struct ComputedDefinition {
    pub column_type: ColumnType,
    pub dependencies: Vec<String>,
    pub default_value: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    get_values: Arc<ValuesFn>,
}

impl ComputedDefinition {
    pub fn new<D, S, F, Fut>(column_type: impl Into<ColumnType>, dependencies: D, get_values: F) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Vec<Record>, CollectionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>>> + Send + 'static,
    {
        Self {
            column_type: column_type.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            default_value: None,
            enum_values: None,
            get_values: Arc::new(move |records, context| get_values(records, context).boxed()),
        }
    }

    /// Evaluator computing each value from its own record only
    pub fn per_record<D, S, F>(column_type: impl Into<ColumnType>, dependencies: D, compute: F) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Record) -> Value + Send + Sync + 'static,
    {
        let compute = Arc::new(compute);
        Self::new(column_type, dependencies, move |records: Vec<Record>, _| {
            let compute = compute.clone();
            async move { Ok(records.iter().map(|record| compute(record)).collect()) }
        })
    }

    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub async fn get_values(
        &self,
        records: Vec<Record>,
        context: CollectionContext,
    ) -> Result<Vec<Value>> {
        (self.get_values)(records, context).await
    }
}

impl fmt::Debug for ComputedDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedDefinition")
            .field("column_type", &self.column_type)
            .field("dependencies", &self.dependencies)
            .field("default_value", &self.default_value)
            .field("enum_values", &self.enum_values)
            .finish_non_exhaustive()
    }
}

use super::form_values::FormValues;
use datakit_core::{
    ActionField, ActionFieldType, ActionResult, ActionSchema, ActionScope, Caller, Collection,
    Filter, PaginatedFilter, Projection, Record, Result, Value,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type Handler = dyn Fn(ActionContext) -> BoxFuture<'static, Result<ActionResult>> + Send + Sync;
type Condition = dyn Fn(&FormValues) -> bool + Send + Sync;
type ValueFn = dyn Fn(&FormValues) -> Value + Send + Sync;

/// What an action handler receives
#[derive(Clone)]
pub struct ActionContext {
    pub caller: Caller,
    pub filter: Filter,
    pub form_values: Record,
    collection: Arc<dyn Collection>,
}

impl ActionContext {
    pub fn new(
        caller: Caller,
        filter: Filter,
        form_values: Record,
        collection: Arc<dyn Collection>,
    ) -> Self {
        Self {
            caller,
            filter,
            form_values,
            collection,
        }
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    /// Records targeted by the action
    pub async fn get_records(&self, projection: &Projection) -> Result<Vec<Record>> {
        self.collection
            .list(
                &self.caller,
                &PaginatedFilter::from(self.filter.clone()),
                projection,
            )
            .await
    }
}

/// A form field whose visibility and value may depend on other fields
#[derive(Clone)]
pub struct DynamicField {
    pub label: String,
    pub field_type: ActionFieldType,
    pub description: Option<String>,
    pub is_required: bool,
    pub is_read_only: bool,
    pub default_value: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    condition: Option<Arc<Condition>>,
    value: Option<Arc<ValueFn>>,
}

impl DynamicField {
    pub fn new(label: impl Into<String>, field_type: ActionFieldType) -> Self {
        Self {
            label: label.into(),
            field_type,
            description: None,
            is_required: false,
            is_read_only: false,
            default_value: None,
            enum_values: None,
            condition: None,
            value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
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

    /// Only show the field when `condition` holds
    pub fn visible_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&FormValues) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Derive the field value from the rest of the form
    pub fn value_from<F>(mut self, value: F) -> Self
    where
        F: Fn(&FormValues) -> Value + Send + Sync + 'static,
    {
        self.value = Some(Arc::new(value));
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.condition.is_some() || self.value.is_some()
    }

    pub(crate) fn is_visible(&self, values: &FormValues) -> bool {
        self.condition.as_ref().map_or(true, |condition| condition(values))
    }

    pub(crate) fn render(&self, values: &FormValues) -> ActionField {
        let value = match &self.value {
            Some(value) => Some(value(values)),
            None => values.values().get(&self.label).cloned(),
        };

        ActionField {
            label: self.label.clone(),
            field_type: self.field_type,
            description: self.description.clone(),
            is_required: self.is_required,
            is_read_only: self.is_read_only,
            value,
            enum_values: self.enum_values.clone(),
            watch_changes: false,
        }
    }
}

impl fmt::Debug for DynamicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicField")
            .field("label", &self.label)
            .field("field_type", &self.field_type)
            .field("is_dynamic", &self.is_dynamic())
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ActionDefinition {
    pub scope: ActionScope,
    pub generate_file: bool,
    pub description: Option<String>,
    pub submit_button_label: Option<String>,
    pub form: Vec<DynamicField>,
    handler: Arc<Handler>,
}

impl ActionDefinition {
    pub fn new<F, Fut>(scope: ActionScope, handler: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResult>> + Send + 'static,
    {
        Self {
            scope,
            generate_file: false,
            description: None,
            submit_button_label: None,
            form: Vec::new(),
            handler: Arc::new(move |context| handler(context).boxed()),
        }
    }

    pub fn with_field(mut self, field: DynamicField) -> Self {
        self.form.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_submit_button_label(mut self, label: impl Into<String>) -> Self {
        self.submit_button_label = Some(label.into());
        self
    }

    pub fn generating_file(mut self) -> Self {
        self.generate_file = true;
        self
    }

    pub fn schema(&self) -> ActionSchema {
        ActionSchema {
            scope: self.scope,
            generate_file: self.generate_file,
            static_form: !self.form.iter().any(DynamicField::is_dynamic),
            description: self.description.clone(),
            submit_button_label: self.submit_button_label.clone(),
        }
    }

    pub async fn run(&self, context: ActionContext) -> Result<ActionResult> {
        (self.handler)(context).await
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("scope", &self.scope)
            .field("generate_file", &self.generate_file)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}

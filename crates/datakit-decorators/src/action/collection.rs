use super::definition::{ActionContext, ActionDefinition, DynamicField};
use super::form_values::FormValues;
use async_trait::async_trait;
use datakit_core::{
    ActionField, ActionResult, Caller, Collection, CollectionDecorator, CollectionSchema,
    DataError, DataSource, DataSourceDecorator, Filter, Record, Result, SchemaCache,
};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

pub type ActionDataSource = DataSourceDecorator<ActionCollectionDecorator>;

/// Adds actions to a collection
pub struct ActionCollectionDecorator {
    child_collection: Arc<dyn Collection>,
    data_source: Weak<ActionDataSource>,
    actions: RwLock<BTreeMap<String, Arc<ActionDefinition>>>,
    schema_cache: SchemaCache,
}

impl ActionCollectionDecorator {
    pub fn new(child_collection: Arc<dyn Collection>, data_source: Weak<ActionDataSource>) -> Self {
        Self {
            child_collection,
            data_source,
            actions: RwLock::new(BTreeMap::new()),
            schema_cache: SchemaCache::new(),
        }
    }

    pub fn decorate(data_source: Arc<dyn DataSource>) -> Arc<ActionDataSource> {
        DataSourceDecorator::new(data_source, ActionCollectionDecorator::new)
    }

    pub fn add_action(&self, name: impl Into<String>, action: ActionDefinition) -> Result<()> {
        let name = name.into();

        if self.schema().actions.contains_key(&name) {
            return Err(DataError::invalid_configuration(format!(
                "Action '{}' already exists on collection '{}'",
                name,
                self.name()
            )));
        }

        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::new(action));

        debug!("Registered action '{}' on '{}'", name, self.name());
        self.mark_schema_as_dirty();
        Ok(())
    }

    fn action(&self, name: &str) -> Option<Arc<ActionDefinition>> {
        self.actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// This collection as seen from outside, for handlers fetching records
    fn decorated(&self) -> Result<Arc<dyn Collection>> {
        let data_source = self
            .data_source
            .upgrade()
            .ok_or_else(|| DataError::internal("Action data source was dropped"))?;
        let collection: Arc<dyn Collection> = data_source.collection(self.name())?;
        Ok(collection)
    }
}

/// Evaluate a form against the values typed so far.
///
/// Fields read by another field's condition or value are flagged with
/// `watch_changes`, so that the form is refreshed when they change.
pub fn build_form(fields: &[DynamicField], values: Record) -> Vec<ActionField> {
    let values = FormValues::new(values);

    let mut form: Vec<ActionField> = fields
        .iter()
        .filter(|field| field.is_visible(&values))
        .map(|field| field.render(&values))
        .collect();

    let used = values.used_keys();
    for field in &mut form {
        field.watch_changes = used.contains(&field.label);
    }

    form
}

fn default_values(fields: &[DynamicField]) -> Record {
    fields
        .iter()
        .filter_map(|field| {
            field
                .default_value
                .clone()
                .map(|value| (field.label.clone(), value))
        })
        .collect()
}

#[async_trait]
impl CollectionDecorator for ActionCollectionDecorator {
    fn child_collection(&self) -> &Arc<dyn Collection> {
        &self.child_collection
    }

    fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    fn refine_schema(&self, child_schema: &CollectionSchema) -> CollectionSchema {
        let mut schema = child_schema.clone();
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);

        for (name, action) in actions.iter() {
            schema.actions.insert(name.clone(), action.schema());
        }

        schema
    }

    async fn execute(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Record,
        filter: &Filter,
    ) -> Result<ActionResult> {
        let Some(action) = self.action(name) else {
            return self
                .child_collection
                .execute(caller, name, form_values, filter)
                .await;
        };

        debug!("Executing action '{}' on '{}'", name, self.name());
        let context = ActionContext::new(caller.clone(), filter.clone(), form_values, self.decorated()?);
        action.run(context).await
    }

    async fn get_form(
        &self,
        caller: &Caller,
        name: &str,
        form_values: Option<Record>,
        filter: Option<&Filter>,
    ) -> Result<Vec<ActionField>> {
        let Some(action) = self.action(name) else {
            return self
                .child_collection
                .get_form(caller, name, form_values, filter)
                .await;
        };

        let values = form_values.unwrap_or_else(|| default_values(&action.form));
        Ok(build_form(&action.form, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datakit_core::{ActionFieldType, ActionScope};
    use serde_json::json;

    fn refund_form() -> Vec<DynamicField> {
        vec![
            DynamicField::new("amount", ActionFieldType::Number).with_default_value(json!(10)),
            DynamicField::new("reason", ActionFieldType::String)
                .visible_if(|values| values.get("amount").and_then(|v| v.as_f64()) > Some(100.0)),
            DynamicField::new("total", ActionFieldType::Number)
                .read_only()
                .value_from(|values| {
                    let amount = values.get("amount").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    json!(amount * 1.2)
                }),
        ]
    }

    #[test]
    fn test_build_form_evaluates_dynamic_fields() {
        let form = build_form(&refund_form(), default_values(&refund_form()));

        let labels: Vec<&str> = form.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["amount", "total"]);
        assert_eq!(form[0].value, Some(json!(10)));
        assert!(form[0].watch_changes);
        assert_eq!(form[1].value, Some(json!(12.0)));
        assert!(!form[1].watch_changes);
    }

    #[test]
    fn test_build_form_shows_conditional_fields() {
        let values = json!({"amount": 500, "reason": "broken"}).as_object().cloned().unwrap();
        let form = build_form(&refund_form(), values);

        let reason = form.iter().find(|f| f.label == "reason").unwrap();
        assert_eq!(reason.value, Some(json!("broken")));
        assert!(!reason.watch_changes);
    }

    #[test]
    fn test_static_form_detection() {
        let static_action = ActionDefinition::new(ActionScope::Bulk, |_| async {
            Ok(ActionResult::success("done"))
        })
        .with_field(DynamicField::new("note", ActionFieldType::String));
        assert!(static_action.schema().static_form);

        let dynamic_action = refund_form()
            .into_iter()
            .fold(
                ActionDefinition::new(ActionScope::Single, |_| async {
                    Ok(ActionResult::success("done"))
                }),
                ActionDefinition::with_field,
            );
        assert!(!dynamic_action.schema().static_form);
    }
}

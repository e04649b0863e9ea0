use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which records an action applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionScope {
    Single,
    Bulk,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSchema {
    pub scope: ActionScope,
    #[serde(default)]
    pub generate_file: bool,
    /// False when the form depends on the values typed by the user
    #[serde(default)]
    pub static_form: bool,
    pub description: Option<String>,
    pub submit_button_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionFieldType {
    Boolean,
    Collection,
    Date,
    Dateonly,
    Enum,
    EnumList,
    File,
    Json,
    Number,
    NumberList,
    String,
    StringList,
}

/// A form field as rendered for one user, dynamic parts already evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionField {
    pub label: String,
    pub field_type: ActionFieldType,
    pub description: Option<String>,
    pub is_required: bool,
    pub is_read_only: bool,
    pub value: Option<Value>,
    pub enum_values: Option<Vec<String>>,
    /// The form must be re-rendered when this field changes
    pub watch_changes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionResult {
    Success {
        message: String,
        html: Option<String>,
        #[serde(default)]
        invalidated: Vec<String>,
    },
    Error {
        message: String,
        html: Option<String>,
    },
    Webhook {
        url: String,
        method: String,
        headers: BTreeMap<String, String>,
        body: Value,
    },
    Redirect {
        path: String,
    },
}

impl ActionResult {
    pub fn success(message: impl Into<String>) -> Self {
        ActionResult::Success {
            message: message.into(),
            html: None,
            invalidated: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ActionResult::Error {
            message: message.into(),
            html: None,
        }
    }
}

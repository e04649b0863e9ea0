use crate::action::ActionSchema;
use crate::condition_tree::Operator;
use crate::types::{ColumnType, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A physical or computed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub column_type: ColumnType,
    #[serde(default)]
    pub filter_operators: BTreeSet<Operator>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_read_only: bool,
    #[serde(default)]
    pub is_sortable: bool,
    pub default_value: Option<Value>,
    pub enum_values: Option<Vec<String>>,
}

impl ColumnSchema {
    pub fn new(column_type: impl Into<ColumnType>) -> Self {
        Self {
            column_type: column_type.into(),
            filter_operators: BTreeSet::new(),
            is_primary_key: false,
            is_read_only: false,
            is_sortable: false,
            default_value: None,
            enum_values: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.is_sortable = true;
        self
    }

    pub fn with_operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.filter_operators.extend(operators);
        self
    }
}

/// The collection holds a foreign key pointing to one record of another one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyToOneSchema {
    pub foreign_collection: String,
    /// Column of this collection holding the reference
    pub foreign_key: String,
    /// Column of the foreign collection the reference points to
    pub foreign_key_target: String,
}

/// The other collection holds a foreign key pointing to this one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneToOneSchema {
    pub foreign_collection: String,
    pub origin_key: String,
    pub origin_key_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneToManySchema {
    pub foreign_collection: String,
    pub origin_key: String,
    pub origin_key_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManyToManySchema {
    pub foreign_collection: String,
    pub through_collection: String,
    pub foreign_key: String,
    pub foreign_key_target: String,
    pub origin_key: String,
    pub origin_key_target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldSchema {
    Column(ColumnSchema),
    ManyToOne(ManyToOneSchema),
    OneToOne(OneToOneSchema),
    OneToMany(OneToManySchema),
    ManyToMany(ManyToManySchema),
}

impl FieldSchema {
    pub fn as_column(&self) -> Option<&ColumnSchema> {
        match self {
            FieldSchema::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Target collection of a relation, `None` for columns
    pub fn foreign_collection(&self) -> Option<&str> {
        match self {
            FieldSchema::Column(_) => None,
            FieldSchema::ManyToOne(r) => Some(&r.foreign_collection),
            FieldSchema::OneToOne(r) => Some(&r.foreign_collection),
            FieldSchema::OneToMany(r) => Some(&r.foreign_collection),
            FieldSchema::ManyToMany(r) => Some(&r.foreign_collection),
        }
    }

    /// Relations that resolve to at most one record
    pub fn is_to_one(&self) -> bool {
        matches!(self, FieldSchema::ManyToOne(_) | FieldSchema::OneToOne(_))
    }
}

impl From<ColumnSchema> for FieldSchema {
    fn from(column: ColumnSchema) -> Self {
        FieldSchema::Column(column)
    }
}

impl From<ManyToOneSchema> for FieldSchema {
    fn from(relation: ManyToOneSchema) -> Self {
        FieldSchema::ManyToOne(relation)
    }
}

impl From<OneToOneSchema> for FieldSchema {
    fn from(relation: OneToOneSchema) -> Self {
        FieldSchema::OneToOne(relation)
    }
}

impl From<OneToManySchema> for FieldSchema {
    fn from(relation: OneToManySchema) -> Self {
        FieldSchema::OneToMany(relation)
    }
}

impl From<ManyToManySchema> for FieldSchema {
    fn from(relation: ManyToManySchema) -> Self {
        FieldSchema::ManyToMany(relation)
    }
}

/// Everything known about a collection: fields, actions, segments and charts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: BTreeMap<String, FieldSchema>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSchema>,
    #[serde(default)]
    pub segments: BTreeSet<String>,
    #[serde(default)]
    pub charts: BTreeSet<String>,
    #[serde(default)]
    pub searchable: bool,
}

impl CollectionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field: impl Into<FieldSchema>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, field)| field.as_column().is_some_and(|c| c.is_primary_key))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Schema of a data source as a whole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSchema {
    #[serde(default)]
    pub charts: BTreeSet<String>,
}

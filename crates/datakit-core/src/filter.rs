use crate::condition_tree::ConditionTree;
use crate::projection::Projection;
use crate::types::{compare_values, get_field_value, Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Restricts the set of records an operation targets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub condition_tree: Option<ConditionTree>,
    pub search: Option<String>,
    #[serde(default)]
    pub search_extended: bool,
    pub segment: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition_tree(mut self, condition_tree: ConditionTree) -> Self {
        self.condition_tree = Some(condition_tree);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    /// Whether a record held in memory satisfies the condition tree
    pub fn matches(&self, record: &Record) -> bool {
        self.condition_tree
            .as_ref()
            .map_or(true, |tree| tree.matches(record))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub clauses: Vec<SortClause>,
}

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascending(mut self, field: impl Into<String>) -> Self {
        self.clauses.push(SortClause {
            field: field.into(),
            ascending: true,
        });
        self
    }

    pub fn descending(mut self, field: impl Into<String>) -> Self {
        self.clauses.push(SortClause {
            field: field.into(),
            ascending: false,
        });
        self
    }

    pub fn projection(&self) -> Projection {
        self.clauses.iter().map(|c| c.field.as_str()).collect()
    }

    pub fn replace_fields<F>(&self, mut handler: F) -> Sort
    where
        F: FnMut(&str) -> String,
    {
        Sort {
            clauses: self
                .clauses
                .iter()
                .map(|clause| SortClause {
                    field: handler(&clause.field),
                    ascending: clause.ascending,
                })
                .collect(),
        }
    }

    /// Stable in-memory sort
    pub fn apply(&self, records: &mut [Record]) {
        records.sort_by(|a, b| {
            for clause in &self.clauses {
                let left = get_field_value(a, &clause.field).unwrap_or(&Value::Null);
                let right = get_field_value(b, &clause.field).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                let ordering = if clause.ascending {
                    ordering
                } else {
                    ordering.reverse()
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(skip: usize, limit: usize) -> Self {
        Self {
            skip,
            limit: Some(limit),
        }
    }

    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let remaining = records.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => remaining.take(limit).collect(),
            None => remaining.collect(),
        }
    }
}

/// A filter with ordering and pagination, used by `list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginatedFilter {
    pub condition_tree: Option<ConditionTree>,
    pub search: Option<String>,
    #[serde(default)]
    pub search_extended: bool,
    pub segment: Option<String>,
    pub sort: Option<Sort>,
    pub page: Option<Page>,
}

impl PaginatedFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition_tree(mut self, condition_tree: ConditionTree) -> Self {
        self.condition_tree = Some(condition_tree);
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Drop sort and pagination
    pub fn to_filter(&self) -> Filter {
        Filter {
            condition_tree: self.condition_tree.clone(),
            search: self.search.clone(),
            search_extended: self.search_extended,
            segment: self.segment.clone(),
        }
    }

    /// Filter, sort and paginate records held in memory
    pub fn apply(&self, records: &[Record]) -> Vec<Record> {
        let mut matching: Vec<Record> = records
            .iter()
            .filter(|record| {
                self.condition_tree
                    .as_ref()
                    .map_or(true, |tree| tree.matches(record))
            })
            .cloned()
            .collect();

        if let Some(sort) = &self.sort {
            sort.apply(&mut matching);
        }

        match &self.page {
            Some(page) => page.apply(matching),
            None => matching,
        }
    }
}

impl From<Filter> for PaginatedFilter {
    fn from(filter: Filter) -> Self {
        Self {
            condition_tree: filter.condition_tree,
            search: filter.search,
            search_extended: filter.search_extended,
            segment: filter.segment,
            sort: None,
            page: None,
        }
    }
}

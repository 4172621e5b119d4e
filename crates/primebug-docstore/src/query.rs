//! Collection queries.
//!
//! A [`Query`] selects documents from one collection by conjunction of
//! filters, optionally ordered by one field and truncated to a limit.
//! Field names address top-level document fields.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Maximum number of values accepted by a single `in` filter.
///
/// Callers holding longer id lists split them into chunks of this size.
pub const MAX_IN_FILTER_VALUES: usize = 10;

/// A single predicate over a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value.
    Eq {
        /// Field name.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Field is an array that contains the value.
    ArrayContains {
        /// Field name.
        field: String,
        /// Element that must be present.
        value: Value,
    },
    /// Field equals one of the values.
    In {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
}

impl Filter {
    /// Returns `true` if `data` satisfies this filter.
    #[must_use]
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        match self {
            Filter::Eq { field, value } => data.get(field) == Some(value),
            Filter::ArrayContains { field, value } => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Filter::In { field, values } => data.get(field).is_some_and(|v| values.contains(v)),
        }
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to scan.
    pub collection: String,
    /// Filters that must all hold.
    pub filters: Vec<Filter>,
    /// Optional ordering field.
    pub order_by: Option<(String, Order)>,
    /// Optional maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Start a query over `collection` with no filters.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Require `field == value`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require the array `field` to contain `value`.
    #[must_use]
    pub fn array_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require `field` to equal one of `values`.
    #[must_use]
    pub fn is_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Order results by `field`.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    /// Return at most `limit` results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check the query against engine limits.
    ///
    /// # Errors
    ///
    /// Returns `Error::InFilterTooLarge` if an `in` filter lists more than
    /// [`MAX_IN_FILTER_VALUES`] values.
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            if let Filter::In { field, values } = filter {
                if values.len() > MAX_IN_FILTER_VALUES {
                    return Err(Error::InFilterTooLarge {
                        field: field.clone(),
                        count: values.len(),
                        limit: MAX_IN_FILTER_VALUES,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if `data` satisfies every filter.
    #[must_use]
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Sort and truncate matching documents in place.
    ///
    /// Documents are expected to be pre-sorted by key so results stay
    /// deterministic when the ordering field ties or is absent.
    pub(crate) fn finish<T>(&self, items: &mut Vec<T>, data_of: impl Fn(&T) -> &Map<String, Value>) {
        if let Some((field, order)) = &self.order_by {
            items.sort_by(|a, b| {
                let ordering = compare_values(data_of(a).get(field), data_of(b).get(field));
                match order {
                    Order::Ascending => ordering,
                    Order::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
    }
}

/// Total order over optional JSON values: missing < null < bool < number < string.
/// Arrays and objects compare equal to each other and sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_) | Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

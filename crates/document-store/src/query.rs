use std::cmp::Ordering;

use serde_json::Value;

use crate::Document;
use crate::document::lookup_path;

/// Comparison operator for a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    /// Returns the SQL operator for this comparison.
    pub fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

/// A filter on a single (possibly dotted) field of the document body.
///
/// Documents that lack the field never match, whatever the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    /// Returns true if the document satisfies this filter.
    pub fn matches(&self, document: &Document) -> bool {
        let Some(actual) = lookup_path(&document.data, &self.field) else {
            return false;
        };
        let ordering = compare_values(actual, &self.value);
        match self.op {
            FilterOp::Eq => ordering == Some(Ordering::Equal),
            FilterOp::Ne => ordering != Some(Ordering::Equal),
            FilterOp::Lt => ordering == Some(Ordering::Less),
            FilterOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => ordering == Some(Ordering::Greater),
            FilterOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Builder for collection queries.
///
/// Supports equality/range filters on body fields, ordering by one field,
/// and limit/offset. Results are ordered by document id when no ordering is
/// given, and ties are broken by id.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// The collection to read.
    pub collection: String,

    /// All filters must match.
    pub filters: Vec<FieldFilter>,

    /// Field to order by.
    pub order_by: Option<(String, SortDirection)>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

impl DocumentQuery {
    /// Creates a query over every document of a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds a filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Adds an equality filter.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Orders results by a field.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the document passes every filter.
    pub fn matches(&self, document: &Document) -> bool {
        document.key.collection == self.collection && self.filters.iter().all(|f| f.matches(document))
    }

    /// Sorts, skips and truncates an already filtered result set.
    pub fn arrange(&self, mut documents: Vec<Document>) -> Vec<Document> {
        match &self.order_by {
            Some((field, direction)) => documents.sort_by(|a, b| {
                let ordering = match (a.field(field), b.field(field)) {
                    (Some(x), Some(y)) => {
                        let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                        match direction {
                            SortDirection::Ascending => ord,
                            SortDirection::Descending => ord.reverse(),
                        }
                    }
                    // Missing fields sort last in both directions
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                ordering.then_with(|| a.key.id.cmp(&b.key.id))
            }),
            None => documents.sort_by(|a, b| a.key.id.cmp(&b.key.id)),
        }

        let offset = self.offset.unwrap_or(0);
        let documents = documents.into_iter().skip(offset);
        match self.limit {
            Some(limit) => documents.take(limit).collect(),
            None => documents.collect(),
        }
    }
}

/// Compares two JSON values of the same kind.
///
/// Numbers compare numerically, strings lexicographically (so RFC 3339
/// timestamps order chronologically), booleans false < true. Values of
/// different kinds are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (x, y) if x == y => Some(Ordering::Equal),
        _ => None,
    }
}

//! Lazy query descriptions over a single table.
//!
//! A [`Scope`] is never evaluated on construction. Record stores compile it
//! each time it is used, so the same scope can be counted, paged through and
//! deleted against without holding a cursor open across deletions.

use std::fmt;

use chrono::{DateTime, Utc};

/// A value a filter compares a column against.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
            FieldValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

/// Comparison operators supported by [`Filter::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
        }
    }
}

/// A single predicate. All filters in a scope are AND-ed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: FieldValue,
    },
    IsNull(String),
    IsNotNull(String),
    /// Restricts the scope to an explicit set of primary keys.
    IdIn(Vec<i64>),
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { column, op, value } => {
                write!(f, "{} {} {}", column, op.as_sql(), value)
            }
            Filter::IsNull(column) => write!(f, "{} IS NULL", column),
            Filter::IsNotNull(column) => write!(f, "{} IS NOT NULL", column),
            Filter::IdIn(ids) => write!(f, "primary key IN ({} ids)", ids.len()),
        }
    }
}

/// Filter description over one table, keyed by an integer primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    table: String,
    primary_key: String,
    filters: Vec<Filter>,
}

impl Scope {
    /// Unfiltered scope over `table` with primary key `id`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: "id".to_string(),
            filters: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn compare(
        self,
        column: impl Into<String>,
        op: CompareOp,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.filter(Filter::Compare {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Lt, value)
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Le, value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Gt, value)
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Ge, value)
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Eq, value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.compare(column, CompareOp::Ne, value)
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNull(column.into()))
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::IsNotNull(column.into()))
    }

    /// A fresh scope over the same table restricted to exactly `ids`.
    ///
    /// The original filters are dropped: the ids were already resolved
    /// against them.
    pub fn only_ids(&self, ids: Vec<i64>) -> Self {
        Self {
            table: self.table.clone(),
            primary_key: self.primary_key.clone(),
            filters: vec![Filter::IdIn(ids)],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.table)?;
        for (i, filter) in self.filters.iter().enumerate() {
            let sep = if i == 0 { " WHERE " } else { " AND " };
            match filter {
                Filter::IdIn(ids) => {
                    write!(f, "{}{} IN ({} ids)", sep, self.primary_key, ids.len())?
                }
                filter => write!(f, "{}{}", sep, filter)?,
            }
        }
        Ok(())
    }
}

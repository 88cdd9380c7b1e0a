//! Filter and sort expressions
//!
//! Filters are boolean predicates over record fields. Remote backends render
//! them through [`Filter`]'s `Display` impl (`status = 'active' && end_at != null`);
//! [`MemoryStore`](crate::MemoryStore) evaluates them directly with
//! [`Filter::matches`].
//!
//! Comparison rules:
//! - numbers compare numerically
//! - strings that both parse as RFC 3339 timestamps compare chronologically
//! - other strings compare lexicographically
//! - a missing field behaves like `null`

use crate::record::Record;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything
    All,
    /// field = value
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// field present and not null
    IsSet(String),
    /// field missing or null
    IsNull(String),
    /// field equals one of the values
    In(String, Vec<Value>),
    /// Conjunction
    And(Vec<Filter>),
    /// Disjunction
    Or(Vec<Filter>),
    /// Negation
    Not(Box<Filter>),
}

impl Filter {
    /// field = value
    #[inline]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// field != value
    #[inline]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    /// field > value
    #[inline]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    /// field >= value
    #[inline]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(field.into(), value.into())
    }

    /// field < value
    #[inline]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    /// field <= value
    #[inline]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(field.into(), value.into())
    }

    /// field is set
    #[inline]
    pub fn is_set(field: impl Into<String>) -> Self {
        Self::IsSet(field.into())
    }

    /// field is null or missing
    #[inline]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    /// field in values
    pub fn any_eq<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Conjunction with another filter, flattening nested `And`
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Self::All, f) | (f, Self::All) => f,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), f) => {
                left.push(f);
                Self::And(left)
            }
            (f, Self::And(mut right)) => {
                right.insert(0, f);
                Self::And(right)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Disjunction with another filter
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Self::Or(mut left), f) => {
                left.push(f);
                Self::Or(left)
            }
            (a, b) => Self::Or(vec![a, b]),
        }
    }

    /// Negate this filter
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against a record
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let get = |field: &str| record.field(field).map(|v| v.into_owned()).unwrap_or(Value::Null);

        match self {
            Self::All => true,
            Self::Eq(field, value) => values_equal(&get(field), value),
            Self::Ne(field, value) => !values_equal(&get(field), value),
            Self::Gt(field, value) => compare(&get(field), value) == Some(Ordering::Greater),
            Self::Gte(field, value) => matches!(
                compare(&get(field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(field, value) => compare(&get(field), value) == Some(Ordering::Less),
            Self::Lte(field, value) => matches!(
                compare(&get(field), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::IsSet(field) => !get(field).is_null(),
            Self::IsNull(field) => get(field).is_null(),
            Self::In(field, values) => {
                let actual = get(field);
                values.iter().any(|v| values_equal(&actual, v))
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::All
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("true"),
            Self::Eq(field, v) => write!(f, "{field} = {}", literal(v)),
            Self::Ne(field, v) => write!(f, "{field} != {}", literal(v)),
            Self::Gt(field, v) => write!(f, "{field} > {}", literal(v)),
            Self::Gte(field, v) => write!(f, "{field} >= {}", literal(v)),
            Self::Lt(field, v) => write!(f, "{field} < {}", literal(v)),
            Self::Lte(field, v) => write!(f, "{field} <= {}", literal(v)),
            Self::IsSet(field) => write!(f, "{field} != null"),
            Self::IsNull(field) => write!(f, "{field} = null"),
            Self::In(field, values) => {
                let parts: Vec<String> = values
                    .iter()
                    .map(|v| format!("{field} = {}", literal(v)))
                    .collect();
                write!(f, "({})", parts.join(" || "))
            }
            Self::And(filters) => join(f, filters, " && "),
            Self::Or(filters) => join(f, filters, " || "),
            Self::Not(inner) => write!(f, "!({inner})"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, filters: &[Filter], sep: &str) -> fmt::Result {
    let parts: Vec<String> = filters.iter().map(|x| format!("({x})")).collect();
    f.write_str(&parts.join(sep))
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        other => other.to_string(),
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// Equality under the store's comparison rules
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::String(_), Value::String(_)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        _ => a == b,
    }
}

/// Ordering under the store's comparison rules; `None` when incomparable
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(ta), Some(tb)) => Some(ta.cmp(&tb)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field name
    pub field: String,
    /// Direction
    pub direction: Direction,
}

/// Sort order (keys applied in order)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort(Vec<SortKey>);

impl Sort {
    /// No ordering (store order)
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Ascending by field
    #[inline]
    pub fn asc(field: impl Into<String>) -> Self {
        Self::none().then_asc(field)
    }

    /// Descending by field
    #[inline]
    pub fn desc(field: impl Into<String>) -> Self {
        Self::none().then_desc(field)
    }

    /// Add ascending tie-breaker
    #[must_use]
    pub fn then_asc(mut self, field: impl Into<String>) -> Self {
        self.0.push(SortKey {
            field: field.into(),
            direction: Direction::Asc,
        });
        self
    }

    /// Add descending tie-breaker
    #[must_use]
    pub fn then_desc(mut self, field: impl Into<String>) -> Self {
        self.0.push(SortKey {
            field: field.into(),
            direction: Direction::Desc,
        });
        self
    }

    /// Sort keys
    #[inline]
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Whether any key is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare two records. Nulls sort first ascending.
    #[must_use]
    pub fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.0 {
            let left = a.field(&key.field).map(|v| v.into_owned()).unwrap_or(Value::Null);
            let right = b.field(&key.field).map(|v| v.into_owned()).unwrap_or(Value::Null);

            let ord = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare(&left, &right).unwrap_or(Ordering::Equal),
            };
            let ord = match key.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl FromStr for Sort {
    type Err = std::convert::Infallible;

    /// Parse `-created,id` style sort strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keys = s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| match k.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    direction: Direction::Desc,
                },
                None => SortKey {
                    field: k.trim_start_matches('+').to_string(),
                    direction: Direction::Asc,
                },
            })
            .collect();
        Ok(Self(keys))
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|k| match k.direction {
                Direction::Asc => k.field.clone(),
                Direction::Desc => format!("-{}", k.field),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

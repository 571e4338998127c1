//! Filter, sort, project and paginate over the top-level values of a document.
//!
//! A query maps field paths to either a literal (deep equality) or a
//! single-operator object:
//!
//! ```json
//! { "age": { "$gte": 18 }, "profile.country": "TR" }
//! ```
//!
//! Options are applied in a fixed order: sort, projection, skip, limit.
//!
//! ```rust
//! use dotstore_core::query::{find, FindOptions, Query};
//! use serde_json::json;
//!
//! let data = json!([{"age": 15}, {"age": 20}, {"age": 30}]);
//! let query = Query::from_value(&json!({"age": {"$gte": 18}})).unwrap();
//! let options = FindOptions::from_value(&json!({"sort": {"age": -1}, "limit": 2})).unwrap();
//!
//! assert_eq!(find(&data, &query, &options), vec![json!({"age": 30}), json!({"age": 20})]);
//! ```

use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::access;

/// A query or its options had the wrong shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed query: {message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A condition on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    NotEquals(Value),
    Greater(Value),
    GreaterOrEqual(Value),
    Less(Value),
    LessOrEqual(Value),
}

impl Condition {
    fn from_operand(operand: &Value) -> Condition {
        let single = match operand {
            Value::Object(map) if map.len() == 1 => map.iter().next(),
            _ => None,
        };
        if let Some((op, arg)) = single {
            let arg = arg.clone();
            match op.as_str() {
                "$gt" => return Condition::Greater(arg),
                "$gte" => return Condition::GreaterOrEqual(arg),
                "$lt" => return Condition::Less(arg),
                "$lte" => return Condition::LessOrEqual(arg),
                "$ne" => return Condition::NotEquals(arg),
                _ => {}
            }
        }
        Condition::Equals(operand.clone())
    }

    /// Test the (possibly absent) field value.
    pub fn matches(&self, field: Option<&Value>) -> bool {
        match self {
            Condition::Equals(expected) => field == Some(expected),
            Condition::NotEquals(expected) => field != Some(expected),
            Condition::Greater(bound) => ordered(field, bound).is_some_and(Ordering::is_gt),
            Condition::GreaterOrEqual(bound) => {
                ordered(field, bound).is_some_and(Ordering::is_ge)
            }
            Condition::Less(bound) => ordered(field, bound).is_some_and(Ordering::is_lt),
            Condition::LessOrEqual(bound) => ordered(field, bound).is_some_and(Ordering::is_le),
        }
    }

    fn to_value(&self) -> Value {
        let (op, arg) = match self {
            Condition::Equals(v) if !v.is_object() => return v.clone(),
            Condition::Equals(v) => ("$eq", v),
            Condition::NotEquals(v) => ("$ne", v),
            Condition::Greater(v) => ("$gt", v),
            Condition::GreaterOrEqual(v) => ("$gte", v),
            Condition::Less(v) => ("$lt", v),
            Condition::LessOrEqual(v) => ("$lte", v),
        };
        let mut map = Map::new();
        map.insert(op.to_string(), arg.clone());
        Value::Object(map)
    }
}

/// Ordering between a field and an operand of the same kind.
fn ordered(field: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match (field?, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// All clauses must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<(String, Condition)>,
}

impl Query {
    /// A query that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a query mapping.
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        let map = value
            .as_object()
            .ok_or_else(|| QueryError::new("query must be a mapping"))?;
        let clauses = map
            .iter()
            .map(|(path, operand)| (path.clone(), Condition::from_operand(operand)))
            .collect();
        Ok(Self { clauses })
    }

    /// Add a clause.
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((path.into(), condition));
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, candidate: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(path, condition)| condition.matches(resolve(candidate, path)))
    }

    /// The same query with every field path nested under `prefix`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .map(|(path, c)| (format!("{}.{}", prefix, path), c.clone()))
                .collect(),
        }
    }

    /// Render as a filter document (`{"age": {"$gte": 18}}`).
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.clauses
                .iter()
                .map(|(path, c)| (path.clone(), c.to_value()))
                .collect(),
        )
    }
}

fn resolve<'a>(candidate: &'a Value, path: &str) -> Option<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    access::get(candidate, &segments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort on a single field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub path: String,
    pub direction: SortDirection,
}

/// Field selection.
///
/// With at least one `true` entry only those paths are kept; with only
/// `false` entries those paths are dropped instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<(String, bool)>,
}

impl Projection {
    #[must_use]
    pub fn field(mut self, path: impl Into<String>, include: bool) -> Self {
        self.fields.push((path.into(), include));
        self
    }

    fn is_inclusion(&self) -> bool {
        self.fields.iter().any(|(_, include)| *include)
    }

    /// Apply to one candidate. Non-mapping candidates pass through.
    pub fn apply(&self, candidate: &Value) -> Value {
        let Value::Object(source) = candidate else {
            return candidate.clone();
        };

        if self.is_inclusion() {
            let mut out = Map::new();
            for (path, _) in self.fields.iter().filter(|(_, include)| *include) {
                if let Some(v) = resolve(candidate, path) {
                    access::set(path, v.clone(), &mut out);
                }
            }
            Value::Object(out)
        } else {
            let mut out = source.clone();
            for (path, _) in &self.fields {
                access::remove(&mut out, path);
            }
            Value::Object(out)
        }
    }

    fn prefixed(&self, prefix: &str) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|(path, include)| (format!("{}.{}", prefix, path), *include))
                .collect(),
        }
    }

    fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(path, include)| (path.clone(), Value::from(u8::from(*include))))
                .collect(),
        )
    }
}

/// Post-filter options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub projection: Option<Projection>,
    pub skip: usize,
    /// At most this many results; `None` or `Some(0)` means no limit.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Parse `{sort: {path: 1|-1}, projection: {path: bool}, skip: n, limit: n}`.
    /// `null` yields the defaults.
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            _ => return Err(QueryError::new("options must be a mapping")),
        };

        let mut options = Self::default();
        for (name, v) in map {
            match name.as_str() {
                "sort" => options.sort = Some(parse_sort(v)?),
                "projection" => options.projection = Some(parse_projection(v)?),
                "skip" => options.skip = parse_count(name, v)?,
                "limit" => options.limit = Some(parse_count(name, v)?),
                other => tracing::warn!(option = other, "ignoring unknown find option"),
            }
        }
        Ok(options)
    }

    #[must_use]
    pub fn sort_by(mut self, path: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort {
            path: path.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The same options with every field path nested under `prefix`.
    #[must_use]
    pub fn prefixed(&self, prefix: &str) -> Self {
        Self {
            sort: self.sort.as_ref().map(|s| Sort {
                path: format!("{}.{}", prefix, s.path),
                direction: s.direction,
            }),
            projection: self.projection.as_ref().map(|p| p.prefixed(prefix)),
            skip: self.skip,
            limit: self.limit,
        }
    }

    /// Render the sort as `{path: 1|-1}`.
    pub fn sort_value(&self) -> Option<Value> {
        self.sort.as_ref().map(|s| {
            let mut map = Map::new();
            let direction = match s.direction {
                SortDirection::Ascending => 1,
                SortDirection::Descending => -1,
            };
            map.insert(s.path.clone(), Value::from(direction));
            Value::Object(map)
        })
    }

    /// Render the projection as `{path: 1|0}`.
    pub fn projection_value(&self) -> Option<Value> {
        self.projection.as_ref().map(Projection::to_value)
    }

    /// Sort, project, skip and limit already-filtered candidates.
    pub fn apply(&self, mut matched: Vec<Value>) -> Vec<Value> {
        if let Some(sort) = &self.sort {
            // sort_by is stable, so ties keep document order.
            matched.sort_by(|a, b| {
                let ordering = compare_values(resolve(a, &sort.path), resolve(b, &sort.path));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        let projected = matched.into_iter().map(|v| match &self.projection {
            Some(projection) => projection.apply(&v),
            None => v,
        });

        let paged = projected.skip(self.skip);
        match self.limit {
            Some(limit) if limit > 0 => paged.take(limit).collect(),
            _ => paged.collect(),
        }
    }
}

fn parse_sort(value: &Value) -> Result<Sort, QueryError> {
    let (path, direction) = value
        .as_object()
        .filter(|m| m.len() == 1)
        .and_then(|m| m.iter().next())
        .ok_or_else(|| QueryError::new("sort must name exactly one field"))?;
    let direction = match direction.as_f64() {
        Some(d) if d > 0.0 => SortDirection::Ascending,
        Some(d) if d < 0.0 => SortDirection::Descending,
        _ => return Err(QueryError::new("sort direction must be 1 or -1")),
    };
    Ok(Sort {
        path: path.clone(),
        direction,
    })
}

fn parse_projection(value: &Value) -> Result<Projection, QueryError> {
    let map = value
        .as_object()
        .ok_or_else(|| QueryError::new("projection must be a mapping"))?;
    let mut projection = Projection::default();
    for (path, include) in map {
        let include = match include {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => return Err(QueryError::new("projection values must be booleans")),
        };
        projection = projection.field(path.clone(), include);
    }
    Ok(projection)
}

fn parse_count(name: &str, value: &Value) -> Result<usize, QueryError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| QueryError::new(format!("{} must be a non-negative integer", name)))
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Object(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Bool(_)) => 6,
    }
}

/// Total order used for sorting: absent < null < numbers < strings <
/// mappings < sequences < booleans.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => x
            .iter()
            .zip(y.iter())
            .map(|(p, q)| compare_values(Some(p), Some(q)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Run a query over the top-level values of `document`.
///
/// Sequence roots contribute their elements, mapping roots their values; any
/// other root yields nothing.
pub fn find(document: &Value, query: &Query, options: &FindOptions) -> Vec<Value> {
    let candidates: Box<dyn Iterator<Item = &Value>> = match document {
        Value::Array(arr) => Box::new(arr.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => return Vec::new(),
    };
    let matched = candidates.filter(|c| query.matches(c)).cloned().collect();
    options.apply(matched)
}

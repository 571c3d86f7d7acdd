// src/db/features.rs
// DOCUMENTATION: Filtering, sorting, field limiting and pagination for list endpoints
// PURPOSE: Turn a raw query string into bound SQL fragments over a column whitelist

use crate::errors::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

/// Keys that control the query instead of filtering it
const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// How a filter value is parsed and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Postgres enum column, compared through its text form
    Enum,
    Number,
    Bool,
    Id,
    Timestamp,
}

/// A filterable/sortable API field and the SQL column behind it
#[derive(Debug, Clone, Copy)]
pub struct QueryField {
    /// Name used in the query string and in JSON output (camelCase)
    pub name: &'static str,
    /// Qualified SQL column, e.g. "t.ratings_average"
    pub column: &'static str,
    pub kind: FieldKind,
}

impl QueryField {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        QueryField { name, column, kind }
    }

    fn push_column(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(self.column);
        if self.kind == FieldKind::Enum {
            qb.push("::text");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => " = ",
            FilterOp::Gt => " > ",
            FilterOp::Gte => " >= ",
            FilterOp::Lt => " < ",
            FilterOp::Lte => " <= ",
        }
    }
}

/// A typed filter value, parsed up front so SQL building cannot fail
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Id(Uuid),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    fn parse(field: &QueryField, raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::BadRequest(format!("Invalid {}: {}", field.name, raw));
        match field.kind {
            FieldKind::Text | FieldKind::Enum => Ok(FilterValue::Text(raw.to_string())),
            FieldKind::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FilterValue::Number)
                .ok_or_else(invalid),
            FieldKind::Bool => raw.parse::<bool>().map(FilterValue::Bool).map_err(|_| invalid()),
            FieldKind::Id => Uuid::parse_str(raw).map(FilterValue::Id).map_err(|_| invalid()),
            FieldKind::Timestamp => parse_timestamp(raw).map(FilterValue::Timestamp).ok_or_else(invalid),
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            FilterValue::Text(v) => qb.push_bind(v.clone()),
            FilterValue::Number(v) => qb.push_bind(*v),
            FilterValue::Bool(v) => qb.push_bind(*v),
            FilterValue::Id(v) => qb.push_bind(*v),
            FilterValue::Timestamp(v) => qb.push_bind(*v),
        };
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: QueryField,
    pub op: FilterOp,
    /// More than one value only for repeated equality filters (matches any)
    pub values: Vec<FilterValue>,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub field: QueryField,
    pub descending: bool,
}

/// Field projection applied to serialized documents
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Parsed list query
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: i64,
    pub limit: i64,
}

impl QueryFeatures {
    /// Parse query pairs against the allowed fields
    /// DOCUMENTATION: `field=value`, `field[gte]=value`, `sort=-price,name`,
    /// `fields=name,price`, `page=2`, `limit=10`. Control keys that appear
    /// more than once use the last value.
    pub fn parse(pairs: &[(String, String)], allowed: &[QueryField]) -> Result<Self, AppError> {
        let mut features = QueryFeatures {
            filters: Vec::new(),
            sort: Vec::new(),
            projection: Projection::All,
            page: 1,
            limit: DEFAULT_LIMIT,
        };
        let mut sort_param: Option<&str> = None;

        for (key, raw) in pairs {
            match key.as_str() {
                "page" => features.page = parse_positive(key, raw)?,
                "limit" => features.limit = parse_positive(key, raw)?.min(MAX_LIMIT),
                "sort" => sort_param = Some(raw.as_str()),
                "fields" => features.projection = parse_projection(raw),
                _ => features.push_filter(key, raw, allowed)?,
            }
        }

        features.sort = match sort_param {
            Some(sort) => parse_sort(sort, allowed)?,
            None => default_sort(allowed),
        };

        if (features.page - 1).checked_mul(features.limit).is_none() {
            return Err(AppError::BadRequest("'page' is out of range".to_string()));
        }

        Ok(features)
    }

    fn push_filter(&mut self, key: &str, raw: &str, allowed: &[QueryField]) -> Result<(), AppError> {
        let (name, op) = match key.split_once('[') {
            Some((name, rest)) => {
                let op = rest
                    .strip_suffix(']')
                    .and_then(FilterOp::parse)
                    .ok_or_else(|| AppError::BadRequest(format!("Invalid filter operator in '{}'", key)))?;
                (name, op)
            }
            None => (key, FilterOp::Eq),
        };

        if RESERVED_KEYS.contains(&name) {
            return Err(AppError::BadRequest(format!("'{}' cannot be used as a filter", name)));
        }

        let field = find_field(name, allowed)?;
        let value = FilterValue::parse(&field, raw)?;

        if op == FilterOp::Eq {
            if let Some(existing) = self
                .filters
                .iter_mut()
                .find(|f| f.op == FilterOp::Eq && f.field.name == field.name)
            {
                existing.values.push(value);
                return Ok(());
            }
        }

        self.filters.push(Filter {
            field,
            op,
            values: vec![value],
        });
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Append `AND <condition>` for every filter; the builder must already hold a WHERE clause
    pub fn push_filters(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for filter in &self.filters {
            qb.push(" AND ");
            filter.field.push_column(qb);

            if filter.values.len() > 1 {
                qb.push(" IN (");
                for (i, value) in filter.values.iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    value.push_bind(qb);
                }
                qb.push(")");
            } else if let Some(value) = filter.values.first() {
                qb.push(filter.op.sql());
                value.push_bind(qb);
            }
        }
    }

    /// Append ORDER BY, LIMIT and OFFSET
    pub fn push_order_and_page(&self, qb: &mut QueryBuilder<'_, Postgres>, tie_breaker: &str) {
        qb.push(" ORDER BY ");
        for key in &self.sort {
            qb.push(key.field.column);
            qb.push(if key.descending { " DESC, " } else { " ASC, " });
        }
        qb.push(tie_breaker);
        qb.push(" LIMIT ");
        qb.push_bind(self.limit);
        qb.push(" OFFSET ");
        qb.push_bind(self.offset());
    }

    /// Serialize documents and apply the `fields` projection
    pub fn project<T: Serialize>(&self, docs: &[T]) -> Result<Vec<Value>, AppError> {
        docs.iter()
            .map(|doc| {
                let value = serde_json::to_value(doc)
                    .map_err(|e| AppError::InternalError(format!("Serialization failed: {}", e)))?;
                Ok(self.apply_projection(value))
            })
            .collect()
    }

    fn apply_projection(&self, value: Value) -> Value {
        match value {
            Value::Object(mut map) => {
                match &self.projection {
                    Projection::All => {}
                    Projection::Include(keep) => {
                        map.retain(|k, _| k == "id" || keep.iter().any(|f| f == k));
                    }
                    Projection::Exclude(drop) => {
                        map.retain(|k, _| !drop.iter().any(|f| f == k));
                    }
                }
                Value::Object(map)
            }
            other => other,
        }
    }
}

fn find_field(name: &str, allowed: &[QueryField]) -> Result<QueryField, AppError> {
    allowed
        .iter()
        .find(|f| f.name == name)
        .copied()
        .ok_or_else(|| AppError::BadRequest(format!("Unknown field: {}", name)))
}

fn parse_positive(key: &str, raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' must be a positive integer", key)))
}

fn parse_sort(raw: &str, allowed: &[QueryField]) -> Result<Vec<SortKey>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            let (name, descending) = match part.strip_prefix('-') {
                Some(name) => (name, true),
                None => (part, false),
            };
            Ok(SortKey {
                field: find_field(name, allowed)?,
                descending,
            })
        })
        .collect()
}

/// Newest first when the resource has a createdAt field
fn default_sort(allowed: &[QueryField]) -> Vec<SortKey> {
    allowed
        .iter()
        .find(|f| f.name == "createdAt")
        .map(|f| SortKey {
            field: *f,
            descending: true,
        })
        .into_iter()
        .collect()
}

fn parse_projection(raw: &str) -> Projection {
    let fields: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if fields.is_empty() {
        return Projection::All;
    }
    if fields.iter().all(|f| f.starts_with('-')) {
        Projection::Exclude(fields.iter().map(|f| f[1..].to_string()).collect())
    } else {
        Projection::Include(
            fields
                .iter()
                .filter(|f| !f.starts_with('-'))
                .map(|f| f.to_string())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[QueryField] = &[
        QueryField::new("duration", "t.duration", FieldKind::Number),
        QueryField::new("price", "t.price", FieldKind::Number),
        QueryField::new("difficulty", "t.difficulty", FieldKind::Enum),
        QueryField::new("ratingsAverage", "t.ratings_average", FieldKind::Number),
        QueryField::new("createdAt", "t.created_at", FieldKind::Timestamp),
    ];

    fn pairs(query: &[(&str, &str)]) -> Vec<(String, String)> {
        query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn build_sql(features: &QueryFeatures) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM tours t WHERE TRUE");
        features.push_filters(&mut qb);
        features.push_order_and_page(&mut qb, "t.id");
        qb.sql().to_string()
    }

    #[test]
    fn test_defaults() {
        let features = QueryFeatures::parse(&[], FIELDS).unwrap();
        assert_eq!(features.page, 1);
        assert_eq!(features.limit, DEFAULT_LIMIT);
        assert_eq!(features.offset(), 0);
        assert_eq!(
            build_sql(&features),
            "SELECT * FROM tours t WHERE TRUE ORDER BY t.created_at DESC, t.id LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_filters_sort_and_pagination() {
        let query = pairs(&[
            ("duration[gte]", "5"),
            ("difficulty", "easy"),
            ("sort", "-price,ratingsAverage"),
            ("page", "2"),
            ("limit", "10"),
        ]);
        let features = QueryFeatures::parse(&query, FIELDS).unwrap();

        assert_eq!(features.offset(), 10);
        assert_eq!(
            build_sql(&features),
            "SELECT * FROM tours t WHERE TRUE AND t.duration >= $1 AND t.difficulty::text = $2 \
             ORDER BY t.price DESC, t.ratings_average ASC, t.id LIMIT $3 OFFSET $4"
        );
        assert_eq!(features.filters[0].values, vec![FilterValue::Number(5.0)]);
    }

    #[test]
    fn test_repeated_equality_filter_matches_any() {
        let query = pairs(&[("duration", "5"), ("duration", "9")]);
        let features = QueryFeatures::parse(&query, FIELDS).unwrap();
        assert_eq!(features.filters.len(), 1);
        assert!(build_sql(&features).contains("t.duration IN ($1, $2)"));
    }

    #[test]
    fn test_rejects_unknown_field_and_operator() {
        assert!(QueryFeatures::parse(&pairs(&[("password", "x")]), FIELDS).is_err());
        assert!(QueryFeatures::parse(&pairs(&[("price[ne]", "5")]), FIELDS).is_err());
        assert!(QueryFeatures::parse(&pairs(&[("sort", "secret")]), FIELDS).is_err());
        assert!(QueryFeatures::parse(&pairs(&[("price", "cheap")]), FIELDS).is_err());
        assert!(QueryFeatures::parse(&pairs(&[("page", "0")]), FIELDS).is_err());
    }

    #[test]
    fn test_injection_attempt_stays_a_bound_value() {
        let query = pairs(&[("difficulty", "easy' OR '1'='1")]);
        let features = QueryFeatures::parse(&query, FIELDS).unwrap();
        let sql = build_sql(&features);
        assert!(!sql.contains("OR '1'='1"));
        assert!(sql.contains("t.difficulty::text = $1"));
    }

    #[test]
    fn test_huge_page_is_rejected() {
        let huge = i64::MAX.to_string();
        let err = QueryFeatures::parse(&pairs(&[("page", huge.as_str()), ("limit", "10")]), FIELDS)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let features = QueryFeatures::parse(&pairs(&[("page", huge.as_str()), ("limit", "1")]), FIELDS)
            .unwrap();
        assert_eq!(features.offset(), i64::MAX - 1);
    }

    #[test]
    fn test_limit_is_capped() {
        let features = QueryFeatures::parse(&pairs(&[("limit", "50000")]), FIELDS).unwrap();
        assert_eq!(features.limit, MAX_LIMIT);
    }

    #[test]
    fn test_projection_include_keeps_id() {
        let features = QueryFeatures::parse(&pairs(&[("fields", "name,price")]), FIELDS).unwrap();
        let docs = vec![json!({"id": "1", "name": "Forest", "price": 397, "summary": "s"})];
        let projected = features.project(&docs).unwrap();
        assert_eq!(projected[0], json!({"id": "1", "name": "Forest", "price": 397}));
    }

    #[test]
    fn test_projection_exclude() {
        let features = QueryFeatures::parse(&pairs(&[("fields", "-summary")]), FIELDS).unwrap();
        let docs = vec![json!({"id": "1", "name": "Forest", "summary": "s"})];
        let projected = features.project(&docs).unwrap();
        assert_eq!(projected[0], json!({"id": "1", "name": "Forest"}));
    }

    #[test]
    fn test_timestamp_filter_accepts_dates() {
        let query = pairs(&[("createdAt[gte]", "2021-03-01")]);
        let features = QueryFeatures::parse(&query, FIELDS).unwrap();
        match &features.filters[0].values[0] {
            FilterValue::Timestamp(ts) => assert_eq!(ts.to_rfc3339(), "2021-03-01T00:00:00+00:00"),
            other => panic!("unexpected value {:?}", other),
        }
    }
}

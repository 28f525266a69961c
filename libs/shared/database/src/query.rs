//! Typed filter builder for PostgREST request paths.
//!
//! Every caller-supplied value enters a query as a [`FilterValue`] and is
//! rendered by the builder. Free-form text is percent-encoded on the way out,
//! so a query path can never be corrupted by the value it carries.

use chrono::NaiveDate;

/// A value bound to a filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    Text(String),
}

impl FilterValue {
    fn render(&self) -> String {
        match self {
            FilterValue::Int(v) => v.to_string(),
            FilterValue::Bool(v) => v.to_string(),
            // Day granularity by construction
            FilterValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            FilterValue::Text(s) => urlencoding::encode(s).into_owned(),
        }
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        FilterValue::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(v: NaiveDate) -> Self {
        FilterValue::Date(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Gte,
    Lte,
}

impl Op {
    fn keyword(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Neq => "neq",
            Op::Gte => "gte",
            Op::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// A read query against a single table. Predicates are AND-combined by
/// PostgREST.
#[derive(Debug, Clone)]
pub struct TableQuery {
    table: &'static str,
    select: Option<&'static str>,
    filters: Vec<(&'static str, Op, FilterValue)>,
    order: Option<(&'static str, Direction)>,
    limit: Option<i64>,
}

impl TableQuery {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            select: None,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the returned columns.
    pub fn select(mut self, columns: &'static str) -> Self {
        self.select = Some(columns);
        self
    }

    pub fn filter(mut self, column: &'static str, op: Op, value: impl Into<FilterValue>) -> Self {
        self.filters.push((column, op, value.into()));
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order = Some((column, direction));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the request path, e.g.
    /// `/rest/v1/appointments?voided=eq.false&order=appointment_date.desc`.
    pub fn path(&self) -> String {
        let mut parts = Vec::new();

        if let Some(select) = self.select {
            parts.push(format!("select={}", select));
        }
        for (column, op, value) in &self.filters {
            parts.push(format!("{}={}.{}", column, op.keyword(), value.render()));
        }
        if let Some((column, direction)) = self.order {
            parts.push(format!("order={}.{}", column, direction.keyword()));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }

        if parts.is_empty() {
            format!("/rest/v1/{}", self.table)
        } else {
            format!("/rest/v1/{}?{}", self.table, parts.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_bare_table_without_query_string() {
        assert_eq!(TableQuery::new("services").path(), "/rest/v1/services");
    }

    #[test]
    fn renders_typed_predicates_in_insertion_order() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let path = TableQuery::new("appointments")
            .select("appointment_id")
            .filter("patient_id", Op::Eq, 7)
            .filter("attended", Op::Eq, false)
            .filter("appointment_date", Op::Lte, date)
            .order_by("appointment_date", Direction::Desc)
            .limit(10)
            .path();

        assert_eq!(
            path,
            "/rest/v1/appointments?select=appointment_id\
             &patient_id=eq.7&attended=eq.false&appointment_date=lte.2024-01-31\
             &order=appointment_date.desc&limit=10"
        );
    }

    #[test]
    fn percent_encodes_text_values() {
        let path = TableQuery::new("appointment_states")
            .filter("description", Op::Eq, "no show & rebook")
            .path();

        assert_eq!(
            path,
            "/rest/v1/appointment_states?description=eq.no%20show%20%26%20rebook"
        );
    }

    #[test]
    fn text_value_cannot_smuggle_extra_predicates() {
        let path = TableQuery::new("appointment_states")
            .filter("description", Op::Eq, "x&voided=eq.true")
            .path();

        // The ampersand survives only in encoded form.
        assert!(!path.contains("&voided"));
        assert!(path.contains("%26voided%3Deq.true"));
    }
}

//! Typed PostgREST query builder.
//!
//! Filters stay structured until [`TableQuery::to_params`] renders them, so
//! the in-memory test backend can evaluate the same values the HTTP client
//! sends.

/// One row predicate. Column names may be dotted to reach an embedded
/// resource (`vacancy_programs.program_id`).
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    Neq(String, String),
    Gt(String, String),
    Gte(String, String),
    Lt(String, String),
    /// Case-insensitive `LIKE`. `%` is the wildcard.
    Ilike(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    IsNull(String),
    NotNull(String),
    /// Any of the inner filters matches.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Filter::Eq(column.to_string(), value.to_string())
    }

    pub fn ilike(column: &str, pattern: impl Into<String>) -> Self {
        Filter::Ilike(column.to_string(), pattern.into())
    }

    /// `ilike` with `%term%`.
    pub fn contains(column: &str, term: &str) -> Self {
        Filter::Ilike(column.to_string(), format!("%{term}%"))
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gt(c, _)
            | Filter::Gte(c, _)
            | Filter::Lt(c, _)
            | Filter::Ilike(c, _)
            | Filter::In(c, _)
            | Filter::NotIn(c, _)
            | Filter::IsNull(c)
            | Filter::NotNull(c) => Some(c),
            Filter::Or(_) => None,
        }
    }

    /// `op.value` as it appears after `column=` in a query string.
    fn operand(&self) -> String {
        match self {
            Filter::Eq(_, v) => format!("eq.{v}"),
            Filter::Neq(_, v) => format!("neq.{v}"),
            Filter::Gt(_, v) => format!("gt.{v}"),
            Filter::Gte(_, v) => format!("gte.{v}"),
            Filter::Lt(_, v) => format!("lt.{v}"),
            Filter::Ilike(_, p) => format!("ilike.{}", p.replace('%', "*")),
            Filter::In(_, values) => format!("in.{}", quoted_list(values)),
            Filter::NotIn(_, values) => format!("not.in.{}", quoted_list(values)),
            Filter::IsNull(_) => "is.null".to_string(),
            Filter::NotNull(_) => "not.is.null".to_string(),
            Filter::Or(inner) => format!("({})", render_group(inner)),
        }
    }

    /// `(key, value)` query parameter for a top-level filter.
    pub fn to_param(&self) -> (String, String) {
        match self {
            Filter::Or(_) => ("or".to_string(), self.operand()),
            other => (
                other.column().unwrap_or_default().to_string(),
                other.operand(),
            ),
        }
    }
}

fn quoted_list(values: &[String]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "")))
        .collect();
    format!("({})", items.join(","))
}

/// `a.op.v,b.op.v` for the inside of an `or=(...)` group.
fn render_group(filters: &[Filter]) -> String {
    filters
        .iter()
        .map(|f| match f {
            Filter::Or(inner) => format!("or({})", render_group(inner)),
            other => format!("{}.{}", other.column().unwrap_or_default(), other.operand()),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table: String,
    select: String,
    filters: Vec<Filter>,
    order: Vec<(String, bool)>,
    range: Option<(i64, i64)>,
    limit: Option<i64>,
}

impl TableQuery {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            range: None,
            limit: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn projection(&self) -> &str {
        &self.select
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn ordering(&self) -> &[(String, bool)] {
        &self.order
    }

    /// `(offset, limit)` after combining `range` and `limit`.
    pub fn window(&self) -> (i64, Option<i64>) {
        match (self.range, self.limit) {
            (Some((from, to)), limit) => {
                let span = (to - from + 1).max(0);
                (from, Some(limit.map_or(span, |l| l.min(span))))
            }
            (None, limit) => (0, limit),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(Filter::Neq(column.to_string(), value.to_string()))
    }

    pub fn gt(self, column: &str, value: impl ToString) -> Self {
        self.filter(Filter::Gt(column.to_string(), value.to_string()))
    }

    pub fn ilike(self, column: &str, pattern: impl Into<String>) -> Self {
        self.filter(Filter::ilike(column, pattern))
    }

    pub fn in_list<I, S>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filter(Filter::In(column.to_string(), values))
    }

    pub fn not_in<I, S>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filter(Filter::NotIn(column.to_string(), values))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Filter::IsNull(column.to_string()))
    }

    pub fn or(self, group: Vec<Filter>) -> Self {
        self.filter(Filter::Or(group))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// Inclusive row range, zero-based.
    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.range = Some((from, to));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// PostgREST query parameters, in a stable order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(c, asc)| format!("{c}.{}", if *asc { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }
        let (offset, limit) = self.window();
        if offset > 0 {
            params.push(("offset".to_string(), offset.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Filters for writes, rendered the same way as reads.
pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

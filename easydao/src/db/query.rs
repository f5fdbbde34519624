use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::db::interfaces::IntoColumn;
use crate::db::models::TableDescriptor;
use crate::db::value::Value;
use crate::errors::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Like,
    LikeLeft,
    LikeRight,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
}

impl Operator {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Like | Operator::LikeLeft | Operator::LikeRight => "LIKE",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    None,
    Single(Value),
    List(Vec<Value>),
    Range(Value, Value),
}

/// One predicate of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn has_value(&self) -> bool {
        !matches!(self.value, ConditionValue::None)
    }

    fn write_to(&self, sql: &mut String, params: &mut Vec<Value>) {
        sql.push_str(&self.column);
        sql.push(' ');
        sql.push_str(self.operator.as_sql());
        match &self.value {
            ConditionValue::None => {}
            ConditionValue::Single(v) => {
                sql.push_str(" ?");
                params.push(v.clone());
            }
            ConditionValue::List(values) => {
                sql.push_str(" (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('?');
                    params.push(v.clone());
                }
                sql.push(')');
            }
            ConditionValue::Range(start, end) => {
                sql.push_str(" ? AND ?");
                params.push(start.clone());
                params.push(end.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Zero-based inclusive row window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u64,
    pub end: u64,
}

impl PageRange {
    pub fn rows(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }
}

/// Rendered WHERE body (no leading keyword) with its ordered parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Fluent predicate, ordering and paging accumulator for `E`'s table.
///
/// Predicates form a flat conjunction kept in declaration order. Errors
/// from invalid paging are deferred and reported by the engine before any
/// statement reaches the provider.
pub struct QueryWrapper<E> {
    table: Arc<TableDescriptor>,
    conditions: Vec<Condition>,
    order: Option<OrderBy>,
    page: Option<PageRange>,
    limit: Option<u64>,
    error: Option<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for QueryWrapper<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            conditions: self.conditions.clone(),
            order: self.order.clone(),
            page: self.page,
            limit: self.limit,
            error: self.error.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> fmt::Debug for QueryWrapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryWrapper")
            .field("table", &self.table.name)
            .field("conditions", &self.conditions)
            .field("order", &self.order)
            .field("page", &self.page)
            .field("limit", &self.limit)
            .field("error", &self.error)
            .finish()
    }
}

impl<E> QueryWrapper<E> {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            order: None,
            page: None,
            limit: None,
            error: None,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    fn push(mut self, column: impl IntoColumn<E>, operator: Operator, value: ConditionValue) -> Self {
        let column = column.into_column(&self.table);
        self.conditions.push(Condition {
            column,
            operator,
            value,
        });
        self
    }

    fn single(self, column: impl IntoColumn<E>, operator: Operator, value: Value) -> Self {
        self.push(column, operator, ConditionValue::Single(value))
    }

    pub fn eq(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Eq, value.into())
    }

    pub fn ne(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Ne, value.into())
    }

    /// `col LIKE %value%`, unless the value already starts or ends with `%`.
    pub fn like(self, column: impl IntoColumn<E>, value: impl Into<String>) -> Self {
        let value = value.into();
        let pattern = if value.starts_with('%') || value.ends_with('%') {
            value
        } else {
            format!("%{value}%")
        };
        self.single(column, Operator::Like, Value::Text(pattern))
    }

    /// Matches values starting with `value`.
    pub fn like_left(self, column: impl IntoColumn<E>, value: impl Into<String>) -> Self {
        let pattern = format!("{}%", value.into());
        self.single(column, Operator::LikeLeft, Value::Text(pattern))
    }

    /// Matches values ending with `value`.
    pub fn like_right(self, column: impl IntoColumn<E>, value: impl Into<String>) -> Self {
        let pattern = format!("%{}", value.into());
        self.single(column, Operator::LikeRight, Value::Text(pattern))
    }

    pub fn gt(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Gt, value.into())
    }

    pub fn ge(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Ge, value.into())
    }

    pub fn lt(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Lt, value.into())
    }

    pub fn le(self, column: impl IntoColumn<E>, value: impl Into<Value>) -> Self {
        self.single(column, Operator::Le, value.into())
    }

    /// `col IN (...)`. An empty value set adds no predicate.
    pub fn is_in<I, V>(self, column: impl IntoColumn<E>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.list(column, Operator::In, values)
    }

    /// `col NOT IN (...)`. An empty value set adds no predicate.
    pub fn not_in<I, V>(self, column: impl IntoColumn<E>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.list(column, Operator::NotIn, values)
    }

    fn list<I, V>(self, column: impl IntoColumn<E>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self;
        }
        self.push(column, operator, ConditionValue::List(values))
    }

    pub fn is_null(self, column: impl IntoColumn<E>) -> Self {
        self.push(column, Operator::IsNull, ConditionValue::None)
    }

    pub fn is_not_null(self, column: impl IntoColumn<E>) -> Self {
        self.push(column, Operator::IsNotNull, ConditionValue::None)
    }

    /// Inclusive range on both bounds.
    pub fn between(
        self,
        column: impl IntoColumn<E>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.push(
            column,
            Operator::Between,
            ConditionValue::Range(start.into(), end.into()),
        )
    }

    /// Replaces any earlier ordering.
    pub fn order_by(mut self, column: impl IntoColumn<E>, ascending: bool) -> Self {
        let column = column.into_column(&self.table);
        self.order = Some(OrderBy { column, ascending });
        self
    }

    pub fn order_by_asc(self, column: impl IntoColumn<E>) -> Self {
        self.order_by(column, true)
    }

    pub fn order_by_desc(self, column: impl IntoColumn<E>) -> Self {
        self.order_by(column, false)
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, rows: u64) -> Self {
        if rows == 0 {
            self.error = Some("limit must be positive".into());
            return self;
        }
        self.limit = Some(rows);
        self
    }

    /// Selects the 1-based page `page_number` of `page_size` rows.
    pub fn page(mut self, page_number: u64, page_size: u64) -> Self {
        if page_number == 0 || page_size == 0 {
            self.error = Some(format!(
                "page number and size must be positive, got page {page_number} of size {page_size}"
            ));
            return self;
        }
        let range = (page_number - 1).checked_mul(page_size).and_then(|start| {
            let end = start.checked_add(page_size - 1)?;
            Some(PageRange { start, end })
        });
        match range {
            Some(range) => self.page = Some(range),
            None => {
                self.error = Some(format!(
                    "page {page_number} of size {page_size} is out of range"
                ))
            }
        }
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn order(&self) -> Option<&OrderBy> {
        self.order.as_ref()
    }

    pub fn page_range(&self) -> Option<PageRange> {
        self.page
    }

    pub fn limit_rows(&self) -> Option<u64> {
        self.limit
    }

    /// Row window handed to the provider: the page range capped by the
    /// limit, or `[0, limit-1]` for a bare limit.
    pub fn effective_range(&self) -> Option<PageRange> {
        match (self.page, self.limit) {
            (Some(page), Some(limit)) => Some(PageRange {
                start: page.start,
                end: page.end.min(page.start.saturating_add(limit - 1)),
            }),
            (Some(page), None) => Some(page),
            (None, Some(limit)) => Some(PageRange {
                start: 0,
                end: limit - 1,
            }),
            (None, None) => None,
        }
    }

    /// Reports a deferred builder error.
    pub fn check(&self) -> Result<(), DbError> {
        match &self.error {
            Some(reason) => Err(DbError::Validation(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn render(&self) -> Filter {
        let mut filter = Filter::default();
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                filter.sql.push_str(" AND ");
            }
            condition.write_to(&mut filter.sql, &mut filter.params);
        }
        filter
    }
}

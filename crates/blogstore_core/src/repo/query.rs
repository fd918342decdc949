//! SELECT composition over column catalogs.
//!
//! # Responsibility
//! - Build one parameterized SELECT from a primary catalog, an optional
//!   single-level join, filter criteria and pagination.
//!
//! # Invariants
//! - The join is always `LEFT OUTER JOIN`: a missing related row never
//!   suppresses the primary row.
//! - Filters and sort keys may only name primary-catalog columns. Joined
//!   fields are rejected with `UnsupportedFilterField`, not dropped.
//! - Values (filters, limit, offset) are bound; identifiers come only from
//!   static catalogs after whitelist checks.
//! - Results are always ordered, with `e.id ASC` as the final tiebreak.

use super::catalog::{is_valid_prefix, ColumnCatalog, ENTITY_ALIAS};
use crate::db::Statement;
use rusqlite::types::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Malformed composer input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("page size must be greater than zero")]
    InvalidPageSize,
    #[error("offset of page {page} with size {size} overflows")]
    PageOverflow { page: u32, size: u32 },
    #[error("filter on `{field}` is not supported; only `{table}` columns can be filtered")]
    UnsupportedFilterField { field: String, table: &'static str },
    #[error("cannot sort `{table}` by unknown column `{field}`")]
    UnknownSortField { field: String, table: &'static str },
    #[error("join alias `{0}` must be non-empty, contain no `_` and differ from the entity alias")]
    InvalidJoinAlias(&'static str),
    #[error("join column `{column}` is not a column of `{table}`")]
    UnknownJoinColumn {
        column: &'static str,
        table: &'static str,
    },
    #[error("operator `{operator}` on `{field}` {expectation}")]
    OperatorArity {
        field: String,
        operator: Operator,
        expectation: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql())
    }
}

/// One `field operator value` condition on the primary entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Option<Value>,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Operator, value: Option<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, Some(value.into()))
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(field, Operator::Like, Some(Value::Text(pattern.into())))
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, None)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, None)
    }
}

/// Conjunction of filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    filters: Vec<Filter>,
}

impl Criteria {
    pub fn by_id(id: i64) -> Self {
        Self::default().and(Filter::eq("id", id))
    }

    pub fn and(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Stateless page request: zero-based page index and page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pageable {
    pub page: u32,
    pub size: u32,
    pub sort: Vec<Sort>,
}

impl Pageable {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }
}

/// Single-level equi-join `e.{foreign_key} = {alias}.id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub catalog: &'static ColumnCatalog,
    pub alias: &'static str,
    pub foreign_key: &'static str,
}

impl Join {
    pub const fn new(
        catalog: &'static ColumnCatalog,
        alias: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            catalog,
            alias,
            foreign_key,
        }
    }
}

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct SelectQuery<'a> {
    primary: &'static ColumnCatalog,
    join: Option<Join>,
    criteria: Option<&'a Criteria>,
    page: Option<&'a Pageable>,
}

impl<'a> SelectQuery<'a> {
    pub fn from(primary: &'static ColumnCatalog) -> Self {
        Self {
            primary,
            join: None,
            criteria: None,
            page: None,
        }
    }

    pub fn left_join(mut self, join: Option<Join>) -> Self {
        self.join = join;
        self
    }

    pub fn filter(mut self, criteria: Option<&'a Criteria>) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn paginate(mut self, page: Option<&'a Pageable>) -> Self {
        self.page = page;
        self
    }

    pub fn build(&self) -> Result<Statement, QueryError> {
        let mut columns = self.primary.projection(ENTITY_ALIAS);
        let mut from = format!("{} {ENTITY_ALIAS}", self.primary.table());

        if let Some(join) = self.join {
            if !is_valid_prefix(join.alias) || join.alias == ENTITY_ALIAS {
                return Err(QueryError::InvalidJoinAlias(join.alias));
            }
            if !self.primary.contains(join.foreign_key) {
                return Err(QueryError::UnknownJoinColumn {
                    column: join.foreign_key,
                    table: self.primary.table(),
                });
            }
            columns.extend(join.catalog.projection(join.alias));
            from.push_str(&format!(
                " LEFT OUTER JOIN {table} {alias} ON {ENTITY_ALIAS}.{fk} = {alias}.id",
                table = join.catalog.table(),
                alias = join.alias,
                fk = join.foreign_key,
            ));
        }

        let mut sql = format!("SELECT {} FROM {from}", columns.join(", "));
        let mut params = Vec::new();
        sql.push_str(&self.compose_where(&mut params)?);
        sql.push_str(&self.compose_order()?);

        if let Some(page) = self.page {
            if page.size == 0 {
                return Err(QueryError::InvalidPageSize);
            }
            let offset = u64::from(page.page)
                .checked_mul(u64::from(page.size))
                .and_then(|offset| i64::try_from(offset).ok())
                .ok_or(QueryError::PageOverflow {
                    page: page.page,
                    size: page.size,
                })?;
            sql.push_str(" LIMIT ? OFFSET ?");
            params.push(Value::Integer(i64::from(page.size)));
            params.push(Value::Integer(offset));
        }

        Ok(Statement::new(sql).bind_all(params))
    }

    /// `SELECT COUNT(*) AS total` over the primary table with the same
    /// criteria; join and pagination do not apply.
    pub fn build_count(&self) -> Result<Statement, QueryError> {
        let mut params = Vec::new();
        let mut sql = format!(
            "SELECT COUNT(*) AS total FROM {} {ENTITY_ALIAS}",
            self.primary.table()
        );
        sql.push_str(&self.compose_where(&mut params)?);
        Ok(Statement::new(sql).bind_all(params))
    }

    fn compose_where(&self, params: &mut Vec<Value>) -> Result<String, QueryError> {
        let Some(criteria) = self.criteria.filter(|criteria| !criteria.is_empty()) else {
            return Ok(String::new());
        };
        let mut clauses = Vec::with_capacity(criteria.filters().len());
        for filter in criteria.filters() {
            clauses.push(self.compose_filter(filter, params)?);
        }
        Ok(format!(" WHERE {}", clauses.join(" AND ")))
    }

    fn compose_filter(&self, filter: &Filter, params: &mut Vec<Value>) -> Result<String, QueryError> {
        if !self.primary.contains(&filter.field) {
            return Err(QueryError::UnsupportedFilterField {
                field: filter.field.clone(),
                table: self.primary.table(),
            });
        }

        let clause = format!("{ENTITY_ALIAS}.{} {}", filter.field, filter.operator.sql());
        match (filter.operator.takes_value(), &filter.value) {
            (true, Some(Value::Null)) => Err(QueryError::OperatorArity {
                field: filter.field.clone(),
                operator: filter.operator,
                expectation: "never matches NULL; use IS NULL or IS NOT NULL",
            }),
            (true, Some(value)) => {
                params.push(value.clone());
                Ok(format!("{clause} ?"))
            }
            (false, None) => Ok(clause),
            (true, None) => Err(QueryError::OperatorArity {
                field: filter.field.clone(),
                operator: filter.operator,
                expectation: "requires a value",
            }),
            (false, Some(_)) => Err(QueryError::OperatorArity {
                field: filter.field.clone(),
                operator: filter.operator,
                expectation: "takes no value",
            }),
        }
    }

    fn compose_order(&self) -> Result<String, QueryError> {
        let sort = self.page.map_or(&[][..], |page| page.sort.as_slice());
        let mut keys = Vec::with_capacity(sort.len() + 1);
        for entry in sort {
            if !self.primary.contains(&entry.field) {
                return Err(QueryError::UnknownSortField {
                    field: entry.field.clone(),
                    table: self.primary.table(),
                });
            }
            let direction = match entry.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            keys.push(format!("{ENTITY_ALIAS}.{} {direction}", entry.field));
        }
        if !sort.iter().any(|entry| entry.field == "id") {
            keys.push(format!("{ENTITY_ALIAS}.id ASC"));
        }
        Ok(format!(" ORDER BY {}", keys.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::{Criteria, Filter, Join, Operator, Pageable, QueryError, SelectQuery, Sort};
    use crate::repo::catalog::{BLOG_CATALOG, POST_CATALOG, TAG_CATALOG};
    use rusqlite::types::Value;

    fn blog_join() -> Option<Join> {
        Some(Join::new(&BLOG_CATALOG, "blog", "blog_id"))
    }

    #[test]
    fn plain_select_projects_prefixed_columns_in_id_order() {
        let statement = SelectQuery::from(&TAG_CATALOG).build().unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT e.id AS e_id, e.name AS e_name FROM tag e ORDER BY e.id ASC"
        );
        assert!(statement.params().is_empty());
    }

    #[test]
    fn join_is_left_outer_and_projects_both_catalogs() {
        let statement = SelectQuery::from(&POST_CATALOG)
            .left_join(blog_join())
            .build()
            .unwrap();
        let sql = statement.sql();
        assert!(sql.contains("FROM post e LEFT OUTER JOIN blog blog ON e.blog_id = blog.id"));
        assert!(sql.contains("e.blog_id AS e_blog_id"));
        assert!(sql.contains("blog.handle AS blog_handle"));
    }

    #[test]
    fn filters_and_pagination_are_bound_not_interpolated() {
        let criteria = Criteria::default()
            .and(Filter::like("title", "%'; DROP TABLE post; --"))
            .and(Filter::is_not_null("blog_id"));
        let page = Pageable::new(2, 10).sorted_by(Sort::desc("date"));
        let statement = SelectQuery::from(&POST_CATALOG)
            .filter(Some(&criteria))
            .paginate(Some(&page))
            .build()
            .unwrap();

        assert!(statement.sql().ends_with(
            "WHERE e.title LIKE ? AND e.blog_id IS NOT NULL \
             ORDER BY e.date DESC, e.id ASC LIMIT ? OFFSET ?"
        ));
        assert!(!statement.sql().contains("DROP"));
        assert_eq!(
            statement.params(),
            &[
                Value::Text("%'; DROP TABLE post; --".to_string()),
                Value::Integer(10),
                Value::Integer(20),
            ]
        );
    }

    #[test]
    fn filter_on_joined_field_is_rejected() {
        let criteria = Criteria::default().and(Filter::eq("blog.name", "rust".to_string()));
        let err = SelectQuery::from(&POST_CATALOG)
            .left_join(blog_join())
            .filter(Some(&criteria))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::UnsupportedFilterField {
                field: "blog.name".to_string(),
                table: "post",
            }
        );
    }

    #[test]
    fn invalid_pagination_and_sort_are_rejected() {
        let zero = Pageable::new(0, 0);
        let err = SelectQuery::from(&TAG_CATALOG)
            .paginate(Some(&zero))
            .build()
            .unwrap_err();
        assert_eq!(err, QueryError::InvalidPageSize);

        let unknown = Pageable::new(0, 5).sorted_by(Sort::asc("name; DROP"));
        let err = SelectQuery::from(&TAG_CATALOG)
            .paginate(Some(&unknown))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownSortField { .. }));
    }

    #[test]
    fn operator_arity_is_checked() {
        let criteria = Criteria::default().and(Filter::new("name", Operator::Eq, None));
        let err = SelectQuery::from(&TAG_CATALOG)
            .filter(Some(&criteria))
            .build()
            .unwrap_err();
        assert!(matches!(err, QueryError::OperatorArity { .. }));
    }

    #[test]
    fn equality_against_null_is_rejected() {
        for operator in [Operator::Eq, Operator::NotEq, Operator::Lt] {
            let criteria =
                Criteria::default().and(Filter::new("blog_id", operator, Some(Value::Null)));
            let err = SelectQuery::from(&POST_CATALOG)
                .filter(Some(&criteria))
                .build()
                .unwrap_err();
            assert!(matches!(
                err,
                QueryError::OperatorArity { operator: found, .. } if found == operator
            ));
        }
    }

    #[test]
    fn join_alias_must_be_a_distinct_prefix() {
        for alias in ["e", "e_blog", ""] {
            let err = SelectQuery::from(&POST_CATALOG)
                .left_join(Some(Join::new(&BLOG_CATALOG, alias, "blog_id")))
                .build()
                .unwrap_err();
            assert_eq!(err, QueryError::InvalidJoinAlias(alias));
        }
    }

    #[test]
    fn count_reuses_criteria_without_join_or_paging() {
        let criteria = Criteria::by_id(3);
        let statement = SelectQuery::from(&POST_CATALOG)
            .left_join(blog_join())
            .filter(Some(&criteria))
            .build_count()
            .unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT COUNT(*) AS total FROM post e WHERE e.id = ?"
        );
        assert_eq!(statement.params(), &[Value::Integer(3)]);
    }
}

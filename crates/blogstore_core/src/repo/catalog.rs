//! Per-entity column catalogs and link-table descriptors.
//!
//! # Invariants
//! - `id` is the first column of every catalog.
//! - Projected aliases are `{prefix}_{column}`. Prefixes never contain `_`,
//!   so two catalogs projected under different prefixes never collide in one
//!   joined row. `is_valid_prefix` is the check.

/// Table alias used for the primary entity of every SELECT.
pub const ENTITY_ALIAS: &str = "e";

/// Column list of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnCatalog {
    table: &'static str,
    columns: &'static [&'static str],
}

impl ColumnCatalog {
    pub const fn new(table: &'static str, columns: &'static [&'static str]) -> Self {
        Self { table, columns }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    /// Columns written by insert/update (everything except `id`).
    pub fn writable_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .copied()
            .filter(|column| *column != "id")
            .collect()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|current| *current == column)
    }

    /// `alias.column AS alias_column` for every column.
    pub fn projection(&self, alias: &str) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| format!("{alias}.{column} AS {}", column_alias(alias, column)))
            .collect()
    }
}

/// Whether `prefix` can be projected without colliding with another prefix.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && !prefix.contains('_')
}

/// Result-set alias of `column` projected under `prefix`.
pub fn column_alias(prefix: &str, column: &str) -> String {
    format!("{prefix}_{column}")
}

/// Many-to-many association table with no identity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    /// Table whose rows own the link set.
    pub owner_table: &'static str,
    pub owner_column: &'static str,
    pub related_column: &'static str,
}

pub const USER_CATALOG: ColumnCatalog = ColumnCatalog::new("app_user", &["id", "login"]);

pub const BLOG_CATALOG: ColumnCatalog =
    ColumnCatalog::new("blog", &["id", "name", "handle", "user_id"]);

pub const POST_CATALOG: ColumnCatalog =
    ColumnCatalog::new("post", &["id", "title", "content", "date", "blog_id"]);

pub const TAG_CATALOG: ColumnCatalog = ColumnCatalog::new("tag", &["id", "name"]);

pub const POST_TAG_LINK: LinkTable = LinkTable {
    table: "rel_post__tag",
    owner_table: "post",
    owner_column: "post_id",
    related_column: "tag_id",
};

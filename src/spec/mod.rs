//! QuerySpec - the tree-shaped description of a query.
//!
//! A [`QuerySpec`] names a primary table, the columns to select, joins
//! (against plain tables or nested specs used as derived tables), filters
//! and orders. Specs are plain owned values: once built they are only read,
//! and the compiler in [`crate::sql`] turns them into SQL text.
//!
//! The serde representation matches the JSON wire shape used by the HTTP
//! surface (camelCase keys, upper-case join kinds and aggregates).
//!
//! ```
//! use dynq::spec::{Column, Join, JoinKind, Order, QuerySpec, TableRef};
//!
//! let users = TableRef::primary("users");
//! let orders = TableRef::new("orders");
//!
//! let spec = QuerySpec::new("users")
//!     .column(Column::new(users.clone(), "email").with_label("Email"))
//!     .join(Join::table(JoinKind::Inner, users.clone(), "id", orders, "user_id"))
//!     .order(Order::asc(users, "email"));
//!
//! assert_eq!(spec.joins.len(), 1);
//! ```

pub mod system;

use serde::{Deserialize, Serialize};

// =============================================================================
// Tables and columns
// =============================================================================

/// A reference to a table inside a spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub table: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl TableRef {
    /// A non-primary table (join target).
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            is_primary: false,
        }
    }

    /// The primary table of a spec.
    pub fn primary(table: &str) -> Self {
        Self {
            table: table.into(),
            is_primary: true,
        }
    }
}

/// Aggregate function applied to a selected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// A selected column with its output label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "builders have no effect until used"]
pub struct Column {
    pub table: TableRef,
    pub column: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
}

impl Column {
    pub fn new(table: TableRef, column: &str) -> Self {
        Self {
            table,
            column: column.into(),
            label: String::new(),
            aggregate: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Outer => "OUTER",
        }
    }
}

/// What a join points at: a plain table, or a nested spec compiled as a
/// derived table. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Table(TableRef),
    Derived(Box<QuerySpec>),
}

impl JoinTarget {
    /// The table name other clauses use to refer to this join target.
    ///
    /// For a derived table this is the nested spec's primary table.
    pub fn table_name(&self) -> &str {
        match self {
            JoinTarget::Table(table) => &table.table,
            JoinTarget::Derived(spec) => &spec.table.table,
        }
    }
}

/// A JOIN between a local table/column and a target table/column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JoinWire", into = "JoinWire")]
pub struct Join {
    pub kind: JoinKind,
    pub local_table: TableRef,
    pub local_column: String,
    pub target: JoinTarget,
    pub reference_column: String,
}

impl Join {
    /// Join against a plain table.
    pub fn table(
        kind: JoinKind,
        local_table: TableRef,
        local_column: &str,
        reference_table: TableRef,
        reference_column: &str,
    ) -> Self {
        Self {
            kind,
            local_table,
            local_column: local_column.into(),
            target: JoinTarget::Table(reference_table),
            reference_column: reference_column.into(),
        }
    }

    /// Join against a nested spec (derived table).
    pub fn derived(
        kind: JoinKind,
        local_table: TableRef,
        local_column: &str,
        subquery: QuerySpec,
        reference_column: &str,
    ) -> Self {
        Self {
            kind,
            local_table,
            local_column: local_column.into(),
            target: JoinTarget::Derived(Box::new(subquery)),
            reference_column: reference_column.into(),
        }
    }
}

/// JSON shape of a join: `referenceTable` and `subQuery` are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinWire {
    #[serde(rename = "type")]
    kind: JoinKind,
    local_table: TableRef,
    local_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_table: Option<TableRef>,
    reference_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_query: Option<Box<QuerySpec>>,
}

impl TryFrom<JoinWire> for Join {
    type Error = String;

    fn try_from(wire: JoinWire) -> Result<Self, Self::Error> {
        let target = match (wire.reference_table, wire.sub_query) {
            (Some(table), None) => JoinTarget::Table(table),
            (None, Some(spec)) => JoinTarget::Derived(spec),
            (Some(_), Some(_)) => {
                return Err("join must set either referenceTable or subQuery, not both".into())
            }
            (None, None) => return Err("join must set referenceTable or subQuery".into()),
        };

        Ok(Join {
            kind: wire.kind,
            local_table: wire.local_table,
            local_column: wire.local_column,
            target,
            reference_column: wire.reference_column,
        })
    }
}

impl From<Join> for JoinWire {
    fn from(join: Join) -> Self {
        let (reference_table, sub_query) = match join.target {
            JoinTarget::Table(table) => (Some(table), None),
            JoinTarget::Derived(spec) => (None, Some(spec)),
        };
        JoinWire {
            kind: join.kind,
            local_table: join.local_table,
            local_column: join.local_column,
            reference_table,
            reference_column: join.reference_column,
            sub_query,
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>", alias = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "LIKE", alias = "like")]
    Like,
    #[serde(rename = "NOT LIKE", alias = "not like")]
    NotLike,
}

/// A filter literal, tagged by its value kind.
///
/// String and date values are rendered single-quoted; numbers and booleans
/// are rendered bare.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Date(String),
    Number(serde_json::Number),
    Boolean(bool),
}

impl FilterValue {
    pub fn string(value: &str) -> Self {
        FilterValue::String(value.into())
    }

    pub fn date(value: &str) -> Self {
        FilterValue::Date(value.into())
    }

    pub fn int(value: i64) -> Self {
        FilterValue::Number(value.into())
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterValue::String(_) => FilterKind::String,
            FilterValue::Date(_) => FilterKind::Date,
            FilterValue::Number(_) => FilterKind::Number,
            FilterValue::Boolean(_) => FilterKind::Boolean,
        }
    }

    fn parse(kind: FilterKind, raw: &str) -> Result<Self, String> {
        match kind {
            FilterKind::String => Ok(FilterValue::String(raw.into())),
            FilterKind::Date => Ok(FilterValue::Date(raw.into())),
            FilterKind::Number => serde_json::from_str::<serde_json::Number>(raw.trim())
                .map(FilterValue::Number)
                .map_err(|_| format!("'{}' is not a number", raw)),
            FilterKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(FilterValue::Boolean(true)),
                "false" => Ok(FilterValue::Boolean(false)),
                _ => Err(format!("'{}' is not a boolean", raw)),
            },
        }
    }

    fn raw(&self) -> String {
        match self {
            FilterValue::String(s) | FilterValue::Date(s) => s.clone(),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Boolean(b) => b.to_string(),
        }
    }
}

/// Value kind carried on the wire next to the literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    String,
    Date,
    Number,
    Boolean,
}

/// A WHERE predicate: `table.column <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterWire", into = "FilterWire")]
pub struct Filter {
    pub table: TableRef,
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(table: TableRef, column: &str, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            table,
            column: column.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FilterWire {
    table: TableRef,
    field: String,
    operator: FilterOperator,
    #[serde(rename = "type")]
    kind: FilterKind,
    value: String,
}

impl TryFrom<FilterWire> for Filter {
    type Error = String;

    fn try_from(wire: FilterWire) -> Result<Self, Self::Error> {
        Ok(Filter {
            value: FilterValue::parse(wire.kind, &wire.value)?,
            table: wire.table,
            column: wire.field,
            operator: wire.operator,
        })
    }
}

impl From<Filter> for FilterWire {
    fn from(filter: Filter) -> Self {
        FilterWire {
            kind: filter.value.kind(),
            value: filter.value.raw(),
            table: filter.table,
            field: filter.column,
            operator: filter.operator,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub table: TableRef,
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

impl Order {
    pub fn asc(table: TableRef, column: &str) -> Self {
        Self {
            table,
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(table: TableRef, column: &str) -> Self {
        Self {
            table,
            column: column.into(),
            descending: true,
        }
    }
}

// =============================================================================
// QuerySpec
// =============================================================================

/// A query tree: primary table, columns, joins, filters and orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "QuerySpec has no effect until compiled"]
pub struct QuerySpec {
    /// Optional catalog/database qualifier for every table in this spec.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Compiled as a nested derived table: column labels are dropped.
    #[serde(default)]
    pub is_sub_query: bool,
    pub table: TableRef,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl QuerySpec {
    /// Create a spec over `table` as its primary table.
    pub fn new(table: &str) -> Self {
        Self {
            database: None,
            is_sub_query: false,
            table: TableRef::primary(table),
            columns: vec![],
            joins: vec![],
            filters: vec![],
            orders: vec![],
        }
    }

    /// Qualify the tables of this spec with a catalog/database name.
    pub fn in_database(mut self, database: &str) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Mark this spec as a nested subquery.
    pub fn as_subquery(mut self) -> Self {
        self.is_sub_query = true;
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Nesting depth of derived tables below this spec (0 for a flat spec).
    pub fn depth(&self) -> usize {
        self.joins
            .iter()
            .map(|join| match &join.target {
                JoinTarget::Derived(spec) => 1 + spec.depth(),
                JoinTarget::Table(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }
}

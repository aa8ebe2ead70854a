//! End-to-end compilation of QuerySpec trees, built in code and from JSON.

use dynq::prelude::*;
use dynq::sql::DEFAULT_MAX_DEPTH;
use insta::assert_snapshot;

fn orders() -> TableRef {
    TableRef::primary("orders")
}

fn customers() -> TableRef {
    TableRef::new("customers")
}

fn revenue_by_customer() -> QuerySpec {
    QuerySpec::new("orders")
        .in_database("sales")
        .column(Column::new(customers(), "name").with_label("Customer"))
        .column(
            Column::new(orders(), "amount")
                .with_aggregate(Aggregate::Sum)
                .with_label("Total Revenue"),
        )
        .join(Join::table(
            JoinKind::Inner,
            orders(),
            "customer_id",
            customers(),
            "id",
        ))
        .filter(Filter::new(
            orders(),
            "status",
            FilterOperator::Ne,
            FilterValue::string("cancelled"),
        ))
        .filter(Filter::new(
            orders(),
            "amount",
            FilterOperator::Gte,
            FilterValue::int(100),
        ))
        .order(Order::desc(customers(), "name"))
}

#[test]
fn test_single_table_join_with_filters() {
    let sql = compile(&revenue_by_customer()).unwrap();
    assert_snapshot!(sql, @r#"
    SELECT
      t2.name AS Customer,
      SUM(t1.amount) AS "Total Revenue"
    FROM sales.orders AS t1
    INNER JOIN sales.customers AS t2 ON t1.customer_id = t2.id
    WHERE
      t1.status <> 'cancelled'
      AND t1.amount >= 100
    ORDER BY t2.name DESC
    "#);
}

#[test]
fn test_compilation_is_pure() {
    let spec = revenue_by_customer();
    let before = spec.clone();

    let first = compile(&spec).unwrap();
    let second = compile(&spec).unwrap();

    assert_eq!(first, second);
    assert_eq!(spec, before);
}

#[test]
fn test_derived_table_drops_labels() {
    let recent = QuerySpec::new("orders")
        .as_subquery()
        .column(Column::new(orders(), "customer_id").with_label("Customer Id"))
        .filter(Filter::new(
            orders(),
            "placed_on",
            FilterOperator::Gt,
            FilterValue::date("2024-01-01"),
        ));

    let spec = QuerySpec::new("customers")
        .column(Column::new(TableRef::primary("customers"), "email").with_label("Email"))
        .join(Join::derived(
            JoinKind::Left,
            TableRef::primary("customers"),
            "id",
            recent,
            "customer_id",
        ));

    let sql = compile(&spec).unwrap();
    assert_snapshot!(sql, @r"
    SELECT
      t1.email AS Email
    FROM customers AS t1
    LEFT JOIN (
      SELECT
        t1.customer_id
      FROM orders AS t1
      WHERE
        t1.placed_on > '2024-01-01'
    ) AS t2 ON t1.id = t2.customer_id
    ");
    assert!(!sql.contains("Customer Id"));
}

#[test]
fn test_labels_dropped_for_subquery_at_top_level() {
    let spec = QuerySpec::new("orders")
        .as_subquery()
        .column(Column::new(orders(), "id").with_label("Order"));

    assert_eq!(compile(&spec).unwrap(), "SELECT\n  t1.id\nFROM orders AS t1");
}

#[test]
fn test_empty_label_is_omitted() {
    let users = TableRef::primary("users");
    let spec = QuerySpec::new("users")
        .column(Column::new(users.clone(), "id").with_label(""))
        .column(Column::new(users, "email").with_label("Email"));

    assert_eq!(
        compile(&spec).unwrap(),
        "SELECT\n  t1.id,\n  t1.email AS Email\nFROM users AS t1"
    );
}

fn invoices_by_user() -> QuerySpec {
    QuerySpec::new("users")
        .column(Column::new(TableRef::primary("users"), "email").with_label("Email"))
        .column(Column::new(TableRef::new("invoices"), "total").with_label("Total"))
        .join(Join::table(
            JoinKind::Inner,
            TableRef::primary("users"),
            "id",
            TableRef::new("orders"),
            "user_id",
        ))
        .join(Join::table(
            JoinKind::Inner,
            TableRef::new("orders"),
            "id",
            TableRef::new("invoices"),
            "order_id",
        ))
}

#[test]
fn test_joins_hang_off_primary_table() {
    let sql = compile(&invoices_by_user()).unwrap();
    assert_snapshot!(sql, @r"
    SELECT
      t1.email AS Email,
      t3.total AS Total
    FROM users AS t1
    INNER JOIN orders AS t2 ON t1.id = t2.user_id
    INNER JOIN invoices AS t3 ON t1.id = t3.order_id
    ");
}

#[test]
fn test_chained_joins_when_resolution_enabled() {
    let sql = Compiler::new()
        .with_join_local_resolution(true)
        .compile(&invoices_by_user())
        .unwrap();

    assert!(sql.contains("INNER JOIN orders AS t2 ON t1.id = t2.user_id"), "{}", sql);
    assert!(sql.contains("INNER JOIN invoices AS t3 ON t2.id = t3.order_id"), "{}", sql);
}

#[test]
fn test_string_literals_are_escaped() {
    let spec = QuerySpec::new("customers")
        .column(Column::new(TableRef::primary("customers"), "id"))
        .filter(Filter::new(
            TableRef::primary("customers"),
            "name",
            FilterOperator::Like,
            FilterValue::string("O'Brien%"),
        ));

    let sql = compile(&spec).unwrap();
    assert!(sql.ends_with("t1.name LIKE 'O''Brien%'"), "{}", sql);
}

#[test]
fn test_unresolved_table_is_an_error() {
    let spec = QuerySpec::new("orders").column(Column::new(TableRef::new("refunds"), "id"));

    assert_eq!(
        compile(&spec).unwrap_err(),
        CompileError::UnresolvedTable {
            table: "refunds".into()
        }
    );
}

#[test]
fn test_nesting_bound() {
    let mut spec = QuerySpec::new("t").column(Column::new(TableRef::primary("t"), "id"));
    for _ in 0..3 {
        spec = QuerySpec::new("t")
            .column(Column::new(TableRef::primary("t"), "id"))
            .join(Join::derived(
                JoinKind::Inner,
                TableRef::primary("t"),
                "id",
                spec.as_subquery(),
                "id",
            ));
    }
    assert_eq!(spec.depth(), 3);

    assert!(Compiler::new().with_max_depth(3).compile(&spec).is_ok());
    assert_eq!(
        Compiler::new().with_max_depth(2).compile(&spec).unwrap_err(),
        CompileError::NestingTooDeep { max: 2 }
    );
    assert_eq!(Compiler::new().max_depth(), DEFAULT_MAX_DEPTH);
}

#[test]
fn test_compile_from_json() {
    let json = r#"{
        "database": "sales",
        "table": { "table": "orders", "isPrimary": true },
        "columns": [
            { "table": { "table": "orders", "isPrimary": true }, "column": "id", "label": "OrderId" },
            { "table": { "table": "customers" }, "column": "email", "label": "Email" }
        ],
        "joins": [
            {
                "type": "LEFT",
                "localTable": { "table": "orders", "isPrimary": true },
                "localColumn": "customer_id",
                "referenceTable": { "table": "customers" },
                "referenceColumn": "id"
            }
        ],
        "filters": [
            {
                "table": { "table": "customers" },
                "field": "active",
                "operator": "=",
                "type": "boolean",
                "value": "TRUE"
            },
            {
                "table": { "table": "orders", "isPrimary": true },
                "field": "amount",
                "operator": "<",
                "type": "number",
                "value": "12.5"
            }
        ],
        "orders": [
            { "table": { "table": "orders", "isPrimary": true }, "column": "id" }
        ]
    }"#;

    let spec: QuerySpec = serde_json::from_str(json).unwrap();
    let sql = compile(&spec).unwrap();
    assert_snapshot!(sql, @r"
    SELECT
      t1.id AS OrderId,
      t2.email AS Email
    FROM sales.orders AS t1
    LEFT JOIN sales.customers AS t2 ON t1.customer_id = t2.id
    WHERE
      t2.active = true
      AND t1.amount < 12.5
    ORDER BY t1.id ASC
    ");
}

#[test]
fn test_join_requires_exactly_one_target() {
    let json = r#"{
        "table": { "table": "orders", "isPrimary": true },
        "joins": [
            {
                "type": "INNER",
                "localTable": { "table": "orders", "isPrimary": true },
                "localColumn": "customer_id",
                "referenceColumn": "id"
            }
        ]
    }"#;

    let err = serde_json::from_str::<QuerySpec>(json).unwrap_err();
    assert!(err.to_string().contains("referenceTable or subQuery"), "{}", err);
}

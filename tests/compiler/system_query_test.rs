use dynq::compile;
use dynq::spec::system;
use insta::assert_snapshot;

#[test]
fn test_system_query_sql() {
    let sql = compile(&system::customers_with_addresses()).unwrap();
    assert_snapshot!(sql, @r#"
    SELECT
      t1.Email AS Email,
      t2.StreetAddress AS "Street Address",
      t2.POP AS "Point Of Presence"
    FROM Zing.Customers AS t1
    INNER JOIN (
      SELECT
        t1.Id,
        t1.StreetAddress,
        t1.POP
      FROM Zing.Addresses AS t1
      WHERE
        t1.POP = 'UML'
      ORDER BY t1.DateCreated ASC
    ) AS t2 ON t1.AddressId = t2.Id
    ORDER BY t1.Email ASC
    "#);
}

#[test]
fn test_addresses_subquery_alone() {
    let spec = system::addresses_subquery();
    assert!(spec.is_sub_query);

    let sql = compile(&spec).unwrap();
    assert!(sql.starts_with("SELECT\n  t1.Id,\n  t1.StreetAddress,\n  t1.POP\n"), "{}", sql);
    assert!(sql.contains("FROM Zing.Addresses AS t1"), "{}", sql);
}

#[test]
fn test_system_query_is_stable() {
    let a = compile(&system::customers_with_addresses()).unwrap();
    let b = compile(&system::customers_with_addresses()).unwrap();
    assert_eq!(a, b);
}

//! The built-in customer/address query served by the SQL preview endpoint.

use super::{Column, Filter, FilterOperator, FilterValue, Join, JoinKind, Order, QuerySpec, TableRef};

const DATABASE: &str = "Zing";

/// Addresses at the `UML` point of presence, oldest first, as a derived table.
pub fn addresses_subquery() -> QuerySpec {
    let addresses = TableRef::primary("Addresses");

    QuerySpec::new("Addresses")
        .in_database(DATABASE)
        .as_subquery()
        .column(Column::new(addresses.clone(), "Id"))
        .column(Column::new(addresses.clone(), "StreetAddress"))
        .column(Column::new(addresses.clone(), "POP"))
        .filter(Filter::new(
            addresses.clone(),
            "POP",
            FilterOperator::Eq,
            FilterValue::string("UML"),
        ))
        .order(Order::asc(addresses, "DateCreated"))
}

/// Customer emails with their street address and point of presence.
pub fn customers_with_addresses() -> QuerySpec {
    let customers = TableRef::primary("Customers");
    let addresses = TableRef::new("Addresses");

    QuerySpec::new("Customers")
        .in_database(DATABASE)
        .column(Column::new(customers.clone(), "Email").with_label("Email"))
        .column(Column::new(addresses.clone(), "StreetAddress").with_label("Street Address"))
        .column(Column::new(addresses, "POP").with_label("Point Of Presence"))
        .join(Join::derived(
            JoinKind::Inner,
            customers.clone(),
            "AddressId",
            addresses_subquery(),
            "Id",
        ))
        .order(Order::asc(customers, "Email"))
}

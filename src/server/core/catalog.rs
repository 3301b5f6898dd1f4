//! Read-only access to the menu catalog.

use crate::server::core::error::{CoreError, CoreResult};
use crate::server::model::item::MenuItem;
use rust_decimal::Decimal;
use tokio_postgres::{Client, Transaction};

/// Price of one catalog item, read on the caller's open transaction so
/// pricing observes exactly the catalog state this order commits against.
/// Prices are never cached across transactions.
pub(crate) async fn price_of(txn: &Transaction<'_>, item_id: i32) -> CoreResult<Decimal> {
    let row = txn
        .query_opt("SELECT price FROM menu_item WHERE id = $1", &[&item_id])
        .await?;
    match row {
        Some(row) => Ok(row.get("price")),
        None => Err(CoreError::not_found(format!("menu item {item_id}"))),
    }
}

pub(crate) async fn list_menu(client: &Client) -> CoreResult<Vec<MenuItem>> {
    let rows = client
        .query(
            "SELECT id, name, price, is_available FROM menu_item ORDER BY id",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| MenuItem {
            id: r.get("id"),
            name: r.get("name"),
            price: r.get("price"),
            is_available: r.get("is_available"),
        })
        .collect())
}

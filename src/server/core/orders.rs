//! Order transaction manager.
//!
//! Every public operation here runs as one postgres transaction: it either
//! commits completely or leaves no trace, including any table speculatively
//! reserved along the way. Validation happens before the first write.

use crate::server::core::error::{CoreError, CoreResult};
use crate::server::core::status::OrderStatus;
use crate::server::core::{catalog, status, tables};
use crate::server::model::order::{
    CreateOrderRequest, CreateOrderResponse, OrderLineRequest, UpdateOrderDetailsRequest,
};
use crate::server::util::time;
use log::{info, warn};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Transaction};

/// Declared client totals within one cent of the computed total are kept;
/// anything further off is replaced by the computed value. Absorbs client
/// float drift without letting a confused client set prices.
const TOTAL_TOLERANCE_CENTS: i64 = 1;

/// Key for the transaction-scoped advisory lock serializing id allocation.
const ORDER_ID_ALLOC_LOCK: i64 = 0x6f72_6465;

pub(crate) async fn create_order(
    client: &mut Client,
    order: CreateOrderRequest,
) -> CoreResult<CreateOrderResponse> {
    let customer_name = validated_customer_name(&order.customer_name)?;
    validate_lines(&order.items)?;
    let initial_status = validated_initial_status(order.status.as_deref())?;
    let payment_status = validated_payment_status(order.payment_status.as_deref())?;
    if let Some(declared) = order.total_price {
        if declared < Decimal::ZERO {
            return Err(CoreError::validation("total price must not be negative"));
        }
    }

    let txn = client.transaction().await?;

    let mut computed = Decimal::ZERO;
    for line in &order.items {
        let price = catalog::price_of(&txn, line.item_id).await?;
        computed += price * Decimal::from(line.quantity);
    }
    let total = reconcile_total(computed, order.total_price);

    let order_id = allocate_order_id(&txn).await?;

    let requested_label = order
        .table_number
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty());
    let reservation = if tables::requires_table(order.order_type.as_deref()) {
        Some(tables::reserve(&txn, requested_label, None).await?)
    } else {
        None
    };
    let table_number = reservation.as_ref().map(|r| r.number.clone());

    let status_str = initial_status.as_str();
    let created_at = time::helper::get_utc_now();
    txn.execute(
        "INSERT INTO orders(id, customer_name, total_price, status, order_type, \
         payment_method, table_number, needs_assistance, note, customer_email, \
         email_receipt, payment_status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        &[
            &order_id,
            &customer_name,
            &total,
            &status_str,
            &order.order_type,
            &order.payment_method,
            &table_number,
            &order.needs_assistance,
            &order.note,
            &order.customer_email,
            &order.email_receipt,
            &payment_status,
            &created_at,
        ],
    )
    .await?;
    insert_lines(&txn, order_id, &order.items).await?;
    if let Some(reservation) = &reservation {
        tables::finalize(&txn, reservation, order_id).await?;
    }
    txn.commit().await?;

    info!(
        "order {order_id} created for '{customer_name}', total={total}, table={}",
        table_number.as_deref().unwrap_or("-")
    );
    Ok(CreateOrderResponse {
        order_id,
        table_number,
    })
}

/// Apply any subset of detail changes in one transaction. A supplied item
/// list fully replaces the existing lines and the total is recomputed from
/// the catalog.
pub(crate) async fn update_order_details(
    client: &mut Client,
    order_id: i32,
    patch: UpdateOrderDetailsRequest,
) -> CoreResult<()> {
    if let Some(name) = &patch.customer_name {
        validated_customer_name(name)?;
    }
    if let Some(items) = &patch.items {
        validate_lines(items)?;
    }

    let txn = client.transaction().await?;
    let row = txn
        .query_opt(
            "SELECT status, table_number FROM orders WHERE id = $1 FOR UPDATE",
            &[&order_id],
        )
        .await?
        .ok_or_else(|| CoreError::not_found(format!("order {order_id}")))?;
    let stored: String = row.get("status");
    let current_status = status::normalize(&stored)?;
    let current_table: Option<String> = row.get("table_number");
    // terminal orders never hold a table, so they cannot be seated either
    if current_status.is_terminal()
        && patch
            .table_number
            .as_deref()
            .is_some_and(|label| !label.trim().is_empty())
    {
        return Err(CoreError::conflict(format!(
            "order {order_id} is {current_status} and cannot be assigned a table"
        )));
    }

    if let Some(items) = &patch.items {
        txn.execute("DELETE FROM order_item WHERE order_id = $1", &[&order_id])
            .await?;
        let mut computed = Decimal::ZERO;
        for line in items {
            let price = catalog::price_of(&txn, line.item_id).await?;
            computed += price * Decimal::from(line.quantity);
        }
        insert_lines(&txn, order_id, items).await?;
        let total = computed.round_dp(2);
        txn.execute(
            "UPDATE orders SET total_price = $2 WHERE id = $1",
            &[&order_id, &total],
        )
        .await?;
    }
    if let Some(note) = &patch.note {
        txn.execute("UPDATE orders SET note = $2 WHERE id = $1", &[&order_id, note])
            .await?;
    }
    if let Some(name) = &patch.customer_name {
        let name = name.trim();
        txn.execute(
            "UPDATE orders SET customer_name = $2 WHERE id = $1",
            &[&order_id, &name],
        )
        .await?;
    }
    if let Some(needs_assistance) = patch.needs_assistance {
        txn.execute(
            "UPDATE orders SET needs_assistance = $2 WHERE id = $1",
            &[&order_id, &needs_assistance],
        )
        .await?;
    }
    if let Some(label) = &patch.table_number {
        move_table(&txn, order_id, current_table.as_deref(), label.trim()).await?;
    }
    txn.commit().await?;
    info!("order {order_id} details updated");
    Ok(())
}

/// Reserve the new table before releasing the old one, so a failed
/// reservation leaves the order seated where it was.
async fn move_table(
    txn: &Transaction<'_>,
    order_id: i32,
    current: Option<&str>,
    requested: &str,
) -> CoreResult<()> {
    if requested.is_empty() {
        if let Some(number) = current {
            tables::release_if_held(txn, number, order_id).await?;
        }
        txn.execute(
            "UPDATE orders SET table_number = NULL WHERE id = $1",
            &[&order_id],
        )
        .await?;
        return Ok(());
    }
    if let Some(number) = current {
        if tables::normalize_label(number) == tables::normalize_label(requested) {
            return Ok(()); // already seated there
        }
    }
    let reservation = tables::reserve(txn, Some(requested), Some(order_id)).await?;
    if let Some(number) = current {
        tables::release_if_held(txn, number, order_id).await?;
    }
    tables::finalize(txn, &reservation, order_id).await?;
    txn.execute(
        "UPDATE orders SET table_number = $2 WHERE id = $1",
        &[&order_id, &reservation.number],
    )
    .await?;
    Ok(())
}

/// Normalize, check legality against the current status, and apply side
/// effects atomically. Re-applying the current status is a trivial success
/// with no side effects.
pub(crate) async fn update_order_status(
    client: &mut Client,
    order_id: i32,
    raw_status: &str,
) -> CoreResult<OrderStatus> {
    let target = status::normalize(raw_status)?;
    let txn = client.transaction().await?;
    let row = txn
        .query_opt(
            "SELECT status, total_price FROM orders WHERE id = $1 FOR UPDATE",
            &[&order_id],
        )
        .await?
        .ok_or_else(|| CoreError::not_found(format!("order {order_id}")))?;
    let stored: String = row.get("status");
    let current = status::normalize(&stored)?;

    if current == target {
        return Ok(current);
    }
    if !current.can_transition(target) {
        return Err(CoreError::conflict(format!(
            "cannot transition order {order_id} from {current} to {target}"
        )));
    }
    apply_status(&txn, order_id, target, row.get("total_price")).await?;
    txn.commit().await?;
    info!("order {order_id} status updated to {target}");
    Ok(target)
}

/// Writes the status and its side effects: terminal states release the
/// table, served stamps the QR payment payload, everything else clears it.
async fn apply_status(
    txn: &Transaction<'_>,
    order_id: i32,
    target: OrderStatus,
    total: Decimal,
) -> CoreResult<()> {
    let target_str = target.as_str();
    txn.execute(
        "UPDATE orders SET status = $2 WHERE id = $1",
        &[&order_id, &target_str],
    )
    .await?;
    if target.is_terminal() {
        if let Some(number) = tables::release_for_order(txn, order_id).await? {
            info!("released table {number} from order {order_id}");
        }
        txn.execute(
            "UPDATE orders SET table_number = NULL WHERE id = $1",
            &[&order_id],
        )
        .await?;
    }
    if target == OrderStatus::Served {
        let payload = qr_payload(order_id, total);
        txn.execute(
            "UPDATE orders SET qr_code_data = $2 WHERE id = $1",
            &[&order_id, &payload],
        )
        .await?;
    } else {
        txn.execute(
            "UPDATE orders SET qr_code_data = NULL WHERE id = $1",
            &[&order_id],
        )
        .await?;
    }
    Ok(())
}

/// Transition to served and hand back the stored QR payment payload.
pub(crate) async fn mark_served(client: &mut Client, order_id: i32) -> CoreResult<String> {
    update_order_status(client, order_id, OrderStatus::Served.as_str()).await?;
    let row = client
        .query_opt("SELECT qr_code_data FROM orders WHERE id = $1", &[&order_id])
        .await?
        .ok_or_else(|| CoreError::not_found(format!("order {order_id}")))?;
    row.get::<_, Option<String>>("qr_code_data")
        .ok_or(CoreError::Unknown)
}

/// Administrative delete: releases any held table, removes the lines, then
/// the order row.
pub(crate) async fn delete_order(client: &mut Client, order_id: i32) -> CoreResult<()> {
    let txn = client.transaction().await?;
    let released = tables::release_for_order(&txn, order_id).await?;
    txn.execute("DELETE FROM order_item WHERE order_id = $1", &[&order_id])
        .await?;
    let affected = txn
        .execute("DELETE FROM orders WHERE id = $1", &[&order_id])
        .await?;
    if affected == 0 {
        return Err(CoreError::not_found(format!("order {order_id}")));
    }
    txn.commit().await?;
    if let Some(number) = released {
        info!("released table {number} while deleting order {order_id}");
    }
    info!("order {order_id} deleted");
    Ok(())
}

fn validated_customer_name(raw: &str) -> CoreResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CoreError::validation("customer name must not be empty"));
    }
    Ok(name.to_string())
}

fn validate_lines(items: &[OrderLineRequest]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::validation(
            "order must contain at least one item",
        ));
    }
    for (idx, line) in items.iter().enumerate() {
        if line.item_id <= 0 {
            return Err(CoreError::validation(format!(
                "item {}: item id must be a positive integer",
                idx + 1
            )));
        }
        if line.quantity <= 0 {
            return Err(CoreError::validation(format!(
                "item {}: quantity must be a positive integer",
                idx + 1
            )));
        }
        if let Some(options) = &line.selected_options {
            // stored opaquely, never interpreted; it only has to serialize
            if serde_json::to_string(options).is_err() {
                return Err(CoreError::validation(format!(
                    "item {}: selected options are not serializable",
                    idx + 1
                )));
            }
        }
    }
    Ok(())
}

/// Orders always enter the pipeline as pending. Creating one directly as
/// served is rejected; any other requested status is overridden so staff
/// confirm before the kitchen sees it.
fn validated_initial_status(raw: Option<&str>) -> CoreResult<OrderStatus> {
    match raw {
        None => Ok(OrderStatus::Pending),
        Some(raw) => match status::normalize(raw)? {
            OrderStatus::Pending => Ok(OrderStatus::Pending),
            OrderStatus::Served => Err(CoreError::validation(
                "orders cannot be created as served",
            )),
            other => {
                warn!("ignoring client-supplied status '{other}' for new order");
                Ok(OrderStatus::Pending)
            }
        },
    }
}

fn validated_payment_status(raw: Option<&str>) -> CoreResult<String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok("unpaid".to_string()),
        Some(known @ ("unpaid" | "paid")) => Ok(known.to_string()),
        Some(other) => Err(CoreError::validation(format!(
            "invalid payment status: '{other}'"
        ))),
    }
}

/// The computed total is authoritative; a declared total survives only
/// within the tolerance, absorbing float drift from client-side summing.
fn reconcile_total(computed: Decimal, declared: Option<Decimal>) -> Decimal {
    let computed = computed.round_dp(2);
    match declared {
        Some(declared) => {
            let declared = declared.round_dp(2);
            if (declared - computed).abs() <= Decimal::new(TOTAL_TOLERANCE_CENTS, 2) {
                declared
            } else {
                computed
            }
        }
        None => computed,
    }
}

/// Gap-filling allocation: the lowest unused id. The advisory lock is
/// transaction-scoped and serializes concurrent allocations; deleted ids
/// get reused instead of staying dead forever.
async fn allocate_order_id(txn: &Transaction<'_>) -> CoreResult<i32> {
    txn.execute("SELECT pg_advisory_xact_lock($1)", &[&ORDER_ID_ALLOC_LOCK])
        .await?;
    let rows = txn.query("SELECT id FROM orders ORDER BY id", &[]).await?;
    let ids: Vec<i32> = rows.iter().map(|r| r.get("id")).collect();
    Ok(first_gap(&ids))
}

/// Expects ids sorted ascending.
fn first_gap(ids: &[i32]) -> i32 {
    let mut expected = 1;
    for id in ids {
        if *id != expected {
            return expected;
        }
        expected += 1;
    }
    expected
}

async fn insert_lines(
    txn: &Transaction<'_>,
    order_id: i32,
    items: &[OrderLineRequest],
) -> CoreResult<()> {
    const COLUMN_LEN: usize = 4;
    let mut stmt =
        "INSERT INTO order_item(order_id, menu_item_id, quantity, selected_options) VALUES"
            .to_string();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(items.len() * COLUMN_LEN);
    let mut idx = 1;
    for (i, line) in items.iter().enumerate() {
        let maybe_comma = if i != items.len() - 1 { "," } else { "" };
        stmt.push_str(&format!(
            " (${}, ${}, ${}, ${}){}",
            idx,
            idx + 1,
            idx + 2,
            idx + 3,
            maybe_comma
        ));
        params.extend([
            &order_id as &(dyn ToSql + Sync),
            &line.item_id,
            &line.quantity,
            &line.selected_options,
        ]);
        idx += COLUMN_LEN;
    }
    txn.execute(&stmt, &params).await?;
    Ok(())
}

fn qr_payload(order_id: i32, total: Decimal) -> String {
    serde_json::json!({ "order_id": order_id, "amount": total.round_dp(2) }).to_string()
}


#[cfg(test)]
mod db_tests {
    //! Lifecycle tests against a live postgres. Run with
    //! `cargo test -- --ignored` after pointing TEST_DATABASE_URL at a
    //! migrated, otherwise-idle database.

    use super::*;
    use crate::server::core::query;
    use crate::server::core::query::StatusFilter;
    use serde_json::json;
    use std::env;
    use tokio_postgres::NoTls;

    async fn connect() -> Client {
        let conn_str = env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
        let (client, conn) = tokio_postgres::connect(&conn_str, NoTls)
            .await
            .expect("failed to connect to test database");
        tokio::spawn(async move {
            let _ = conn.await;
        });
        client
    }

    fn dine_in_order(customer: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: customer.to_string(),
            items: vec![OrderLineRequest {
                item_id: 1,
                quantity: 3,
                selected_options: Some(json!({"size": "L"})),
            }],
            total_price: None,
            status: None,
            order_type: Some("dine-in".to_string()),
            payment_method: None,
            table_number: None,
            needs_assistance: false,
            note: None,
            customer_email: None,
            email_receipt: false,
            payment_status: None,
        }
    }

    async fn cleanup(client: &mut Client, order_ids: &[i32]) {
        for order_id in order_ids {
            let _ = delete_order(client, *order_id).await;
        }
    }

    #[tokio::test]
    #[ignore]
    async fn end_to_end_lifecycle_releases_table_at_served() {
        let mut client = connect().await;
        let created = create_order(&mut client, dine_in_order("lifecycle"))
            .await
            .expect("create failed");
        let table = created.table_number.clone().expect("no table auto-assigned");

        for target in ["confirmed", "sent_to_kitchen", "processing", "completed"] {
            update_order_status(&mut client, created.order_id, target)
                .await
                .expect("legal transition failed");
            let detail = query::get_order(&client, created.order_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(detail.summary.table_number.as_deref(), Some(table.as_str()));
        }

        // skipping a stage is a conflict and changes nothing
        let err = update_order_status(&mut client, created.order_id, "cancelled")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));

        let qr = mark_served(&mut client, created.order_id)
            .await
            .expect("mark served failed");
        let parsed: serde_json::Value = serde_json::from_str(&qr).unwrap();
        assert_eq!(parsed["order_id"], created.order_id);

        let detail = query::get_order(&client, created.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(detail.summary.status, "served");
        assert!(detail.summary.table_number.is_none());
        assert_eq!(
            detail.items[0].selected_options,
            Some(json!({"size": "L"}))
        );

        cleanup(&mut client, &[created.order_id]).await;
    }

    #[tokio::test]
    #[ignore]
    async fn concurrent_creates_for_same_table_conflict() {
        let mut order = dine_in_order("racer-a");
        order.table_number = Some("5".to_string());
        let mut other = dine_in_order("racer-b");
        other.table_number = Some("5".to_string());

        let a = tokio::spawn(async move {
            let mut client = connect().await;
            create_order(&mut client, order).await
        });
        let b = tokio::spawn(async move {
            let mut client = connect().await;
            create_order(&mut client, other).await
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        let winners: Vec<_> = [&a, &b].into_iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1, "exactly one reservation must win");
        let loser = if a.is_err() { a.as_ref() } else { b.as_ref() };
        assert!(matches!(
            loser.unwrap_err(),
            CoreError::Conflict { .. } | CoreError::Storage { .. }
        ));

        let mut client = connect().await;
        if let Ok(created) = &a {
            cleanup(&mut client, &[created.order_id]).await;
        }
        if let Ok(created) = &b {
            cleanup(&mut client, &[created.order_id]).await;
        }
    }

    #[tokio::test]
    #[ignore]
    async fn deleted_ids_are_reused() {
        let mut client = connect().await;
        let mut takeaway = dine_in_order("gap-filler");
        takeaway.order_type = Some("takeaway".to_string());

        let first = create_order(&mut client, dine_in_order("gap-a"))
            .await
            .unwrap();
        let second = create_order(&mut client, takeaway).await.unwrap();
        delete_order(&mut client, first.order_id).await.unwrap();

        let third = create_order(&mut client, {
            let mut o = dine_in_order("gap-b");
            o.order_type = Some("takeaway".to_string());
            o
        })
        .await
        .unwrap();
        assert_eq!(third.order_id, first.order_id);

        cleanup(&mut client, &[second.order_id, third.order_id]).await;
    }

    #[tokio::test]
    #[ignore]
    async fn status_filter_projects_kitchen_view() {
        let mut client = connect().await;
        let mut takeaway = dine_in_order("kitchen-view");
        takeaway.order_type = Some("takeaway".to_string());
        let created = create_order(&mut client, takeaway).await.unwrap();

        update_order_status(&mut client, created.order_id, "confirmed")
            .await
            .unwrap();
        update_order_status(&mut client, created.order_id, "sent_to_kitchen")
            .await
            .unwrap();

        let filter = StatusFilter::parse(Some("sent_to_kitchen,processing")).unwrap();
        let listed = query::list_orders(&client, &filter).await.unwrap();
        assert!(listed.iter().any(|o| o.id == created.order_id));

        let filter = StatusFilter::parse(Some("pending")).unwrap();
        let listed = query::list_orders(&client, &filter).await.unwrap();
        assert!(listed.iter().all(|o| o.id != created.order_id));

        cleanup(&mut client, &[created.order_id]).await;
    }
}

//! Read-side projections for orders and the floor plan.

use crate::server::core::error::{CoreError, CoreResult};
use crate::server::core::status::{self, OrderStatus};
use crate::server::model::order::{OrderDetail, OrderLineDetail, OrderSummary};
use crate::server::model::table::{TableConfig, TableOrderSnapshot, TableOverview};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::{Client, Row};

#[derive(Debug, PartialEq)]
pub(crate) enum StatusFilter {
    Any,
    Only(Vec<OrderStatus>),
}

impl StatusFilter {
    /// Parses the `status` query parameter: absent means everything,
    /// otherwise one token or a comma-separated set, each run through the
    /// alias table.
    pub fn parse(raw: Option<&str>) -> CoreResult<Self> {
        let Some(raw) = raw else {
            return Ok(Self::Any);
        };
        let mut statuses = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let parsed = status::normalize(token)?;
            if !statuses.contains(&parsed) {
                statuses.push(parsed);
            }
        }
        if statuses.is_empty() {
            Ok(Self::Any)
        } else {
            Ok(Self::Only(statuses))
        }
    }
}

pub(crate) async fn get_order(client: &Client, order_id: i32) -> CoreResult<Option<OrderDetail>> {
    let Some(row) = client
        .query_opt("SELECT * FROM orders WHERE id = $1", &[&order_id])
        .await?
    else {
        return Ok(None);
    };
    let items = client
        .query(
            "SELECT oi.menu_item_id, oi.quantity, oi.selected_options, mi.name, mi.price \
             FROM order_item oi \
             JOIN menu_item mi ON oi.menu_item_id = mi.id \
             WHERE oi.order_id = $1 \
             ORDER BY oi.id",
            &[&order_id],
        )
        .await?
        .iter()
        .map(|r| OrderLineDetail {
            item_id: r.get("menu_item_id"),
            name: r.get("name"),
            price: r.get("price"),
            quantity: r.get("quantity"),
            selected_options: parse_options(r.get("selected_options")),
        })
        .collect();
    Ok(Some(OrderDetail {
        summary: row_to_summary(&row),
        items,
    }))
}

pub(crate) async fn list_orders(
    client: &Client,
    filter: &StatusFilter,
) -> CoreResult<Vec<OrderSummary>> {
    let rows = match filter {
        StatusFilter::Any => {
            client
                .query("SELECT * FROM orders ORDER BY id DESC", &[])
                .await?
        }
        StatusFilter::Only(statuses) => {
            let tokens: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
            client
                .query(
                    "SELECT * FROM orders WHERE status = ANY($1) ORDER BY id DESC",
                    &[&tokens],
                )
                .await?
        }
    };
    Ok(rows.iter().map(row_to_summary).collect())
}

/// Floor-plan view: every configured table plus a snapshot of the order
/// currently holding it.
pub(crate) async fn get_tables_overview(client: &Client) -> CoreResult<Vec<TableOverview>> {
    let rows = client
        .query(
            "SELECT t.number, t.display_name, t.occupied, t.current_order_id, \
                    o.customer_name, o.status, o.payment_status, o.total_price \
             FROM dining_table t \
             LEFT JOIN orders o ON o.id = t.current_order_id \
             ORDER BY length(t.number), t.number",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| {
            let order = r
                .get::<_, Option<i32>>("current_order_id")
                .map(|order_id| TableOrderSnapshot {
                    order_id,
                    customer_name: r.get("customer_name"),
                    status: r.get("status"),
                    payment_status: r.get("payment_status"),
                    total_price: r.get("total_price"),
                });
            TableOverview {
                number: r.get("number"),
                display_name: r.get("display_name"),
                occupied: r.get("occupied"),
                order,
            }
        })
        .collect())
}

pub(crate) async fn get_table_configuration(client: &Client) -> CoreResult<Vec<TableConfig>> {
    let rows = client
        .query(
            "SELECT number, display_name FROM dining_table ORDER BY length(number), number",
            &[],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|r| TableConfig {
            number: r.get("number"),
            display_name: r.get("display_name"),
        })
        .collect())
}

/// `Ok(None)` means the order exists but has no QR payload yet (it is not
/// served); a missing order is `NotFound`.
pub(crate) async fn get_qr_code_data(
    client: &Client,
    order_id: i32,
) -> CoreResult<Option<String>> {
    let row = client
        .query_opt("SELECT qr_code_data FROM orders WHERE id = $1", &[&order_id])
        .await?
        .ok_or_else(|| CoreError::not_found(format!("order {order_id}")))?;
    Ok(row.get("qr_code_data"))
}

fn row_to_summary(row: &Row) -> OrderSummary {
    let created_at: DateTime<Utc> = row.get("created_at");
    OrderSummary {
        id: row.get("id"),
        customer_name: row.get("customer_name"),
        total_price: row.get("total_price"),
        status: row.get("status"),
        order_type: row.get("order_type"),
        payment_method: row.get("payment_method"),
        table_number: row.get("table_number"),
        needs_assistance: row.get("needs_assistance"),
        note: row.get("note"),
        customer_email: row.get("customer_email"),
        email_receipt: row.get("email_receipt"),
        payment_status: row.get("payment_status"),
        qr_code_data: row.get("qr_code_data"),
        created_at: created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
    }
}

/// Stored payloads are JSONB documents; legacy rows carried the document
/// encoded as a plain string. Unwrap that one level when it parses.
fn parse_options(raw: Option<Value>) -> Option<Value> {
    match raw {
        Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed) => Some(parsed),
            Err(_) => Some(Value::String(s)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_filter_matches_everything() {
        assert_eq!(StatusFilter::parse(None).unwrap(), StatusFilter::Any);
        assert_eq!(StatusFilter::parse(Some("  ")).unwrap(), StatusFilter::Any);
    }

    #[test]
    fn single_status_filter() {
        assert_eq!(
            StatusFilter::parse(Some("pending")).unwrap(),
            StatusFilter::Only(vec![OrderStatus::Pending])
        );
    }

    #[test]
    fn kitchen_filter_parses_a_comma_set() {
        let filter =
            StatusFilter::parse(Some("sent_to_kitchen, processing,completed,cancelled")).unwrap();
        assert_eq!(
            filter,
            StatusFilter::Only(vec![
                OrderStatus::SentToKitchen,
                OrderStatus::Processing,
                OrderStatus::Completed,
                OrderStatus::Cancelled,
            ])
        );
    }

    #[test]
    fn filter_tokens_are_normalized_and_deduplicated() {
        let filter = StatusFilter::parse(Some("Đã phục vụ,served")).unwrap();
        assert_eq!(filter, StatusFilter::Only(vec![OrderStatus::Served]));
    }

    #[test]
    fn unknown_filter_token_is_rejected() {
        assert!(StatusFilter::parse(Some("pending,shipped")).is_err());
    }

    #[test]
    fn options_pass_through_structured() {
        let options = json!({"size": "L", "ice": 50});
        assert_eq!(parse_options(Some(options.clone())), Some(options));
    }

    #[test]
    fn legacy_string_options_are_unwrapped() {
        let stored = Value::String(r#"{"size":"L"}"#.to_string());
        assert_eq!(parse_options(Some(stored)), Some(json!({"size": "L"})));
    }

    #[test]
    fn plain_string_options_survive_as_strings() {
        let stored = Value::String("no onions".to_string());
        assert_eq!(
            parse_options(Some(stored.clone())),
            Some(stored)
        );
    }

    #[test]
    fn absent_options_stay_absent() {
        assert_eq!(parse_options(None), None);
    }
}

use rust_decimal::Decimal;
use serde::Serialize;

/// Static provisioning entry for one physical table.
#[derive(Debug, Serialize)]
pub(crate) struct TableConfig {
    pub number: String,
    pub display_name: String,
}

/// Floor-plan row: the table plus a snapshot of whatever order holds it.
#[derive(Debug, Serialize)]
pub(crate) struct TableOverview {
    pub number: String,
    pub display_name: String,
    pub occupied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<TableOrderSnapshot>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TableOrderSnapshot {
    pub order_id: i32,
    pub customer_name: String,
    pub status: String,
    pub payment_status: String,
    pub total_price: Decimal,
}

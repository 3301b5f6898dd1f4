use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One requested line of an order. `selected_options` is opaque to the
/// backend: it only has to be serializable, and is stored verbatim.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OrderLineRequest {
    #[serde(alias = "product_id")]
    pub item_id: i32,
    pub quantity: i32,
    #[serde(default)]
    pub selected_options: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateOrderRequest {
    pub customer_name: String,
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub needs_assistance: bool,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub email_receipt: bool,
    #[serde(default)]
    pub payment_status: Option<String>,
}

/// Partial update; only the supplied fields change. `table_number` set to
/// an empty string releases the current table, a non-empty value moves the
/// order there.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpdateOrderDetailsRequest {
    #[serde(default)]
    pub items: Option<Vec<OrderLineRequest>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub needs_assistance: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersQueryParams {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateOrderResponse {
    pub order_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderSummary {
    pub id: i32,
    pub customer_name: String,
    pub total_price: Decimal,
    pub status: String,
    pub order_type: Option<String>,
    pub payment_method: Option<String>,
    pub table_number: Option<String>,
    pub needs_assistance: bool,
    pub note: Option<String>,
    pub customer_email: Option<String>,
    pub email_receipt: bool,
    pub payment_status: String,
    pub qr_code_data: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderLineDetail {
    pub item_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub items: Vec<OrderLineDetail>,
}

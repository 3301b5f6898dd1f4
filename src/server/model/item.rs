use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct MenuItem {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    pub is_available: bool,
}

use crate::server::controller::error::CustomError;
use crate::server::core::error::CoreError;
use crate::server::core::query::StatusFilter;
use crate::server::core::status::OrderStatus;
use crate::server::core::{orders, query, status};
use crate::server::model::order::{
    CreateOrderRequest, OrdersQueryParams, StatusUpdateRequest, UpdateOrderDetailsRequest,
};
use crate::server::state::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;

#[post("/v1/orders")]
/// place a new order
async fn post_order(
    req: web::Json<CreateOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let Some(mut conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let created = orders::create_order(&mut conn, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(created))
}

#[get("/v1/orders")]
/// list orders, optionally filtered to one or more statuses
async fn get_orders(
    params: web::Query<OrdersQueryParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let filter = StatusFilter::parse(params.status.as_deref())?;
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let listed = query::list_orders(&conn, &filter).await?;
    Ok(web::Json(listed))
}

#[get("/v1/orders/{id}")]
/// fetch one order with its line items
async fn get_order(
    id: web::Path<i32>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let order_id = id.into_inner();
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    match query::get_order(&conn, order_id).await? {
        Some(detail) => Ok(web::Json(detail)),
        None => Err(CoreError::not_found(format!("order {order_id}")).into()),
    }
}

#[put("/v1/orders/{id}/items")]
/// replace the order's items, with optional detail edits in the same call
async fn put_order_items(
    id: web::Path<i32>,
    req: web::Json<UpdateOrderDetailsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let order_id = id.into_inner();
    let patch = req.into_inner();
    if patch.items.is_none() {
        return Err(CoreError::validation("items are required").into());
    }
    let Some(mut conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    orders::update_order_details(&mut conn, order_id, patch).await?;
    let refreshed = query::get_order(&conn, order_id).await?;
    Ok(web::Json(json!({
        "message": "order updated",
        "order": refreshed,
    })))
}

#[post("/v1/orders/{id}/status")]
/// move an order through the pipeline; serving returns the QR payload
async fn post_order_status(
    id: web::Path<i32>,
    req: web::Json<StatusUpdateRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let order_id = id.into_inner();
    let target = status::normalize(&req.status)?;
    let Some(mut conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    if target == OrderStatus::Served {
        let qr_code_data = orders::mark_served(&mut conn, order_id).await?;
        return Ok(web::Json(json!({
            "message": "order marked as served",
            "qr_code_data": qr_code_data,
        })));
    }
    orders::update_order_status(&mut conn, order_id, &req.status).await?;
    let refreshed = query::get_order(&conn, order_id).await?;
    Ok(web::Json(json!({
        "message": "order status updated",
        "order": refreshed,
    })))
}

#[put("/v1/orders/{id}")]
/// status-only update kept for older clients
async fn put_order(
    id: web::Path<i32>,
    req: web::Json<StatusUpdateRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let Some(mut conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    orders::update_order_status(&mut conn, id.into_inner(), &req.status).await?;
    Ok(web::Json(json!({ "message": "order updated" })))
}

#[delete("/v1/orders/{id}")]
/// administrative delete; releases any held table
async fn delete_order(
    id: web::Path<i32>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let Some(mut conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    orders::delete_order(&mut conn, id.into_inner()).await?;
    Ok(web::Json(json!({ "message": "order deleted" })))
}

#[get("/v1/orders/{id}/qr")]
/// QR payment payload, available once the order is served
async fn get_order_qr(
    id: web::Path<i32>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    let order_id = id.into_inner();
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    match query::get_qr_code_data(&conn, order_id).await? {
        Some(qr_code_data) => Ok(web::Json(json!({ "qr_code_data": qr_code_data }))),
        None => Err(CoreError::not_found(format!("qr code for order {order_id}")).into()),
    }
}

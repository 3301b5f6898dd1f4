use crate::server::controller::error::CustomError;
use crate::server::core::query;
use crate::server::state::AppState;
use actix_web::{get, web, Responder};

#[get("/v1/tables")]
/// floor-plan view: every table with whatever order currently holds it
async fn get_tables(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let overview = query::get_tables_overview(&conn).await?;
    Ok(web::Json(overview))
}

#[get("/v1/tables/config")]
/// static table provisioning data
async fn get_table_config(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let config = query::get_table_configuration(&conn).await?;
    Ok(web::Json(config))
}

use crate::server::controller::error::CustomError;
use crate::server::core::catalog;
use crate::server::state::AppState;
use actix_web::{get, web, Responder};

#[get("/v1/menu")]
/// catalog listing for the ordering surfaces
async fn get_menu(data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    let Some(conn) = data.db_pool().acquire() else {
        return Err(CustomError::ServerIsBusy);
    };
    let menu = catalog::list_menu(&conn).await?;
    Ok(web::Json(menu))
}

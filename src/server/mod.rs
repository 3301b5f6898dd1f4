//! main file for the server

pub(crate) mod controller;
pub(crate) mod core;
pub(crate) mod database;
pub(crate) mod model;
pub(crate) mod state;
pub(crate) mod util;

use crate::server::controller::menu::get_menu;
use crate::server::controller::orders::{
    delete_order, get_order, get_order_qr, get_orders, post_order, post_order_status, put_order,
    put_order_items,
};
use crate::server::controller::tables::{get_table_config, get_tables};
use crate::server::database::pool::Pool;
use crate::server::model::config::ServerConfig;
use crate::server::state::AppState;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

/// Run the server
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let ServerConfig {
        addr,
        db_conn_str,
        pool_size,
    } = config;
    let pool = Pool::connect("pos", db_conn_str.as_str(), pool_size)
        .await
        .map_err(std::io::Error::other)?;
    let state = AppState::new(pool);
    info!("database pool ready, binding {addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(post_order)
            .service(get_orders)
            .service(get_order)
            .service(put_order_items)
            .service(post_order_status)
            .service(put_order)
            .service(delete_order)
            .service(get_order_qr)
            .service(get_menu)
            .service(get_tables)
            .service(get_table_config)
    })
    .bind(addr)?
    .run()
    .await
}

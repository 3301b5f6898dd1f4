use std::net::SocketAddrV4;

/// Server configs
#[derive(Debug)]
pub(crate) struct ServerConfig {
    pub addr: SocketAddrV4,
    pub db_conn_str: String,
    pub pool_size: usize,
}

impl ServerConfig {
    pub fn new(addr: SocketAddrV4, db_conn_str: String, pool_size: usize) -> Self {
        Self {
            addr,
            db_conn_str,
            pool_size,
        }
    }
}

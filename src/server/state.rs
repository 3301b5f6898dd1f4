use crate::server::database::pool::Pool;
use tokio_postgres::Client;

#[derive(Clone)]
pub(crate) struct AppState {
    db_pool: Pool<Client>,
}

impl AppState {
    pub fn new(db_pool: Pool<Client>) -> Self {
        Self { db_pool }
    }

    pub fn db_pool(&self) -> &Pool<Client> {
        &self.db_pool
    }
}

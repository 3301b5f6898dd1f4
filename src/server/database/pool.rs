use anyhow::{bail, Error};
use log::{error, info, warn};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tokio_postgres::{Client, NoTls};

/// FIFO pool of database clients.
///
/// Clients are handed out exclusively; every core operation opens a
/// transaction, which needs `&mut Client`. An empty pool returns `None`
/// from [`Pool::acquire`] rather than queueing the caller, and the
/// controller layer surfaces that as a busy response.
pub(crate) struct Pool<T>(Arc<PoolInner<T>>);

struct PoolInner<T> {
    /// pool name, only used in logs
    name: String,
    /// connections in the pool, accessed in a FIFO manner
    slots: Mutex<VecDeque<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Pool<T> {
        Pool(self.0.clone())
    }
}

impl<T> Pool<T> {
    /// Build a pool over already-constructed slots. Tests use this with
    /// stand-in slot types; production pools come from [`Pool::connect`].
    pub fn from_parts(name: impl Into<String>, slots: impl IntoIterator<Item = T>) -> Self {
        Self(Arc::new(PoolInner {
            name: name.into(),
            slots: Mutex::new(slots.into_iter().collect()),
        }))
    }

    /// Take a connection out of the pool, or `None` if all are in use.
    pub fn acquire(&self) -> Option<PooledConn<T>> {
        let mut slots = self.lock_slots();
        let conn = slots.pop_front();
        if conn.is_none() {
            warn!("pool {} exhausted, rejecting caller", self.0.name);
        }
        conn.map(|conn| PooledConn {
            conn: Some(conn),
            pool: self.clone(),
        })
    }

    fn release(&self, conn: T) {
        self.lock_slots().push_back(conn);
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // a poisoned pool mutex only means another thread panicked while
        // pushing/popping; the queue itself is still coherent
        self.0.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Pool<Client> {
    /// Open `size` connections concurrently and pool them.
    pub async fn connect(name: &str, conn_str: &str, size: usize) -> Result<Self, Error> {
        let mut set = JoinSet::new();
        for _ in 0..size {
            let conn_str = conn_str.to_string();
            set.spawn(async move { connect_one(conn_str.as_str()).await });
        }
        let mut slots = VecDeque::with_capacity(size);
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => slots.push_back(client),
                Ok(Err(e)) => error!("failed to open a connection for pool {name}, {e}"),
                Err(e) => error!("join_next failed when joining, {e}"),
            }
        }
        if slots.is_empty() {
            bail!("no connection in pool {name} could be established");
        }
        info!("pool {name} ready with {} connections", slots.len());
        Ok(Self::from_parts(name, slots))
    }
}

async fn connect_one(conn_str: &str) -> Result<Client, tokio_postgres::Error> {
    let (client, conn) = tokio_postgres::connect(conn_str, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            error!("connection returned error and aborted, {e}");
        }
    });
    Ok(client)
}

/// A connection checked out of a [`Pool`]; returns itself on drop.
pub(crate) struct PooledConn<T> {
    conn: Option<T>,
    pool: Pool<T>,
}

impl<T> Deref for PooledConn<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.conn.as_ref().expect("connection already released")
    }
}

impl<T> DerefMut for PooledConn<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.conn.as_mut().expect("connection already released")
    }
}

impl<T> Drop for PooledConn<T> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_empties_the_pool() {
        let pool = Pool::from_parts("test", [1u8]);

        let conn = pool.acquire().expect("should get a connection");
        assert_eq!(*conn, 1);
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn dropping_a_conn_releases_it() {
        let pool = Pool::from_parts("test", [1u8, 2]);
        {
            let _a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
            assert!(pool.acquire().is_none());
        } // both drop here, and are released automatically

        assert!(pool.acquire().is_some());
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn released_conns_requeue_fifo() {
        let pool = Pool::from_parts("test", [1u8, 2]);
        let first = pool.acquire().unwrap();
        drop(first); // 1 goes to the back

        assert_eq!(*pool.acquire().unwrap(), 2);
    }
}

pub mod db_connect;
pub mod resolver;
pub mod service;

use std::sync::{Arc, Mutex};
use surrealdb::{Surreal, engine::any::Any};
use tokio::sync::OnceCell;

use crate::service::ConnectionSettings;

pub struct ConnectionPool {
    pub settings: ConnectionSettings,
    pub connections: Arc<Mutex<Vec<Surreal<Any>>>>,
    pub max_size: usize,
    // embedded stores live inside the process, every connection must share one handle
    embedded: OnceCell<Surreal<Any>>,
}

pub struct Database {
    pub pool: ConnectionPool,
}

// A wrapper for a connection that returns it to the pool when dropped
pub struct PooledConnection<'a> {
    conn: Surreal<Any>,
    pool: &'a ConnectionPool,
}

impl PooledConnection<'_> {
    pub fn get_ref(&self) -> &Surreal<Any> {
        &self.conn
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        self.pool.return_connection(self.conn.clone());
    }
}

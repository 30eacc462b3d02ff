use crate::{ConnectionPool, Database, PooledConnection};

use anyhow::Context;
use app_config::DocumentDbConfig;
use app_models::Entity;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, de::DeserializeOwned};
use std::{
    marker::PhantomData,
    sync::{Arc, Mutex},
    time::Duration,
};
use surrealdb::{Surreal, engine::any::Any, opt::auth::Root};
use tokio::{sync::OnceCell, time::timeout};

use app_error::{AppError, AppErrorExt, AppResult};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

lazy_static! {
    // SurrealQL identifier rules
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}

#[derive(Clone)]
pub struct DbCredentials {
    username: String,
    password: String,
}

impl DbCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_password(&self) -> &str {
        &self.password
    }
}

// Don't accidentally log credentials
impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn validate_identifier(identifier: &str) -> AppResult<()> {
    if !IDENTIFIER_REGEX.is_match(identifier) {
        return Err(AppError::ValidationError(format!(
            "Invalid identifier '{}': must start with a letter or underscore and contain only alphanumeric characters and underscores",
            identifier
        )));
    }

    Ok(())
}

// Embedded and remote engines both report this as "Database index `x` already contains ..."
fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let message = err.to_string();
    message.contains("index") && message.contains("already contains")
}

/// Everything a fresh connection needs before it can serve queries.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// `None` skips the root sign-in, which embedded stores do not need
    pub credentials: Option<DbCredentials>,
    pub connect_timeout: Duration,
}

impl ConnectionSettings {
    pub fn new(
        endpoint: impl Into<String>,
        namespace: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            namespace: namespace.into(),
            database: database.into(),
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn in_memory(namespace: impl Into<String>, database: impl Into<String>) -> Self {
        Self::new("mem://", namespace, database)
    }

    pub fn from_config(config: &DocumentDbConfig) -> Self {
        let mut settings = Self::new(&config.endpoint, &config.namespace, &config.database);
        settings.connect_timeout = Duration::from_millis(config.pool.connection_timeout);
        if !config.is_embedded() {
            settings.credentials = Some(DbCredentials::new(&config.username, &config.password));
        }
        settings
    }

    pub fn is_embedded(&self) -> bool {
        self.endpoint.starts_with("mem://") || self.endpoint == "memory"
    }
}

impl ConnectionPool {
    pub fn new(settings: ConnectionSettings, max_size: usize) -> Self {
        Self {
            settings,
            connections: Mutex::new(Vec::with_capacity(max_size)).into(),
            max_size,
            embedded: OnceCell::new(),
        }
    }

    /// Get a connection from the pool or open a new one if needed.
    ///
    /// Pooled connections are health checked before being handed out; a
    /// connection that fails the check is dropped instead of returned.
    pub async fn get_connection(&self) -> AppResult<PooledConnection<'_>> {
        let conn_opt: Option<Surreal<Any>> = {
            let mut connections = self.connections.lock().map_err(|e| {
                AppError::ServerError(anyhow::anyhow!(
                    "Failed to lock connection pool mutex: {}",
                    e
                ))
            })?;
            connections.pop()
        };

        if let Some(conn) = conn_opt {
            match timeout(HEALTH_CHECK_TIMEOUT, conn.health()).await {
                Ok(Ok(())) => return Ok(PooledConnection { conn, pool: self }),
                _ => tracing::debug!("Discarding invalid connection from pool"),
            }
        }

        let conn = if self.settings.is_embedded() {
            self.embedded.get_or_try_init(|| self.open()).await?.clone()
        } else {
            self.open().await?
        };

        Ok(PooledConnection { conn, pool: self })
    }

    async fn open(&self) -> AppResult<Surreal<Any>> {
        let settings = &self.settings;
        let conn_future = surrealdb::engine::any::connect(settings.endpoint.as_str());

        let conn = match timeout(settings.connect_timeout, conn_future).await {
            Ok(conn_result) => conn_result
                .context("Failed to connect to database")
                .db_err()?,
            Err(_) => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "Database connection timeout - could not establish connection within {} ms",
                    settings.connect_timeout.as_millis()
                )));
            }
        };

        if let Some(credentials) = &settings.credentials {
            conn.signin(Root {
                username: credentials.get_username(),
                password: credentials.get_password(),
            })
            .await
            .context("Failed to authenticate with database")
            .db_err()?;
        }

        conn.use_ns(settings.namespace.as_str())
            .use_db(settings.database.as_str())
            .await
            .context("Failed to select namespace and database")
            .db_err()?;

        tracing::debug!(endpoint = %settings.endpoint, "Opened database connection");
        Ok(conn)
    }

    pub fn return_connection(&self, conn: Surreal<Any>) {
        if let Ok(mut connections) = self.connections.lock() {
            if connections.len() < self.max_size {
                connections.push(conn);
            }
        }
        // If we can't lock the mutex or the pool is full, the connection will be dropped
    }

    pub fn idle_connections(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Database {
    pub fn new(settings: ConnectionSettings, max_connections: usize) -> Self {
        let endpoint = settings.endpoint.as_str();
        if !settings.is_embedded()
            && !endpoint.starts_with("ws://")
            && !endpoint.starts_with("wss://")
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            tracing::warn!(
                "Potentially invalid database connection URL format: {}",
                endpoint
            );
        }

        let pool = ConnectionPool::new(settings, max_connections);
        Self { pool }
    }

    pub async fn get_connection(&self) -> AppResult<PooledConnection<'_>> {
        self.pool.get_connection().await
    }

    /// Build the pool and open a first connection so bad settings fail at startup.
    pub async fn initialize(settings: ConnectionSettings, max_connections: usize) -> AppResult<Self> {
        if settings.namespace.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Database namespace cannot be empty".into(),
            ));
        }

        if settings.database.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Database name cannot be empty".into(),
            ));
        }

        let db = Self::new(settings, max_connections);
        db.get_connection().await?;

        Ok(db)
    }

    pub async fn initialize_memory_db(
        max_connections: usize,
        namespace: &str,
        database: &str,
    ) -> AppResult<Self> {
        Self::initialize(ConnectionSettings::in_memory(namespace, database), max_connections).await
    }

    pub async fn create<T>(&self, location: (&str, &str), data: T) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let conn = self.get_connection().await?;
        conn.get_ref()
            .create(location)
            .content(data)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    tracing::debug!(table = location.0, "Unique index rejected record: {}", e);
                    AppError::ResourceExistsError(format!(
                        "A {} record with the same unique value already exists",
                        location.0
                    ))
                } else {
                    AppError::DatabaseError(anyhow::Error::new(e).context("Failed to create record"))
                }
            })
    }

    pub async fn update<T>(&self, location: (&str, &str), data: T) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let conn = self.get_connection().await?;
        conn.get_ref()
            .update(location)
            .content(data)
            .await
            .context("Failed to update record")
            .db_err()
    }

    pub async fn delete<T>(&self, location: (&str, &str)) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let conn = self.get_connection().await?;
        conn.get_ref()
            .delete(location)
            .await
            .context("Failed to delete record")
            .db_err()
    }

    pub async fn select<T>(&self, location: (&str, &str)) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let conn = self.get_connection().await?;
        conn.get_ref()
            .select(location)
            .await
            .context("Failed to select record")
            .db_err()
    }

    /// Define a UNIQUE index on `table.field` unless one already exists.
    pub async fn define_unique_index(&self, table: &str, field: &str) -> AppResult<()> {
        validate_identifier(table)?;
        validate_identifier(field)?;

        let sql = format!(
            "DEFINE INDEX IF NOT EXISTS {table}_{field} ON TABLE {table} FIELDS `{field}` UNIQUE"
        );

        let conn = self.get_connection().await?;
        conn.get_ref()
            .query(sql)
            .await
            .and_then(|response| response.check())
            .with_context(|| format!("Failed to define unique index on {}.{}", table, field))
            .db_err()?;

        tracing::debug!(table, field, "Unique index ready");
        Ok(())
    }

    pub fn query(&self, sql: impl Into<String>) -> QueryBuilder<'_> {
        QueryBuilder {
            pool: &self.pool,
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}

pub struct QueryBuilder<'a> {
    pool: &'a ConnectionPool,
    sql: String,
    bindings: Vec<(String, serde_json::Value)>,
}

impl QueryBuilder<'_> {
    pub fn bind(mut self, binding: (impl Into<String>, impl Into<serde_json::Value>)) -> Self {
        self.bindings.push((binding.0.into(), binding.1.into()));
        self
    }

    pub async fn r#await(self) -> AppResult<QueryResponse> {
        let conn = self.pool.get_connection().await?;
        let mut query = conn.get_ref().query(self.sql);

        for (name, value) in self.bindings {
            query = query.bind((name, value));
        }

        let response = query.await.context("Failed to execute query").db_err()?;
        Ok(QueryResponse(response))
    }
}

pub struct QueryResponse(surrealdb::Response);

impl QueryResponse {
    pub fn take<T>(mut self, index: usize) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        self.0
            .take(index)
            .context("Failed to extract query results")
            .db_err()
    }
}

/// Typed access to one table. Records are keyed by the hex form of their
/// [`app_models::ObjectId`].
pub struct DbService<T> {
    db: Arc<Database>,
    table_name: String,
    _phantom: PhantomData<T>,
}

impl<T> Clone for DbService<T> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            table_name: self.table_name.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> DbService<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(db: Arc<Database>, table_name: impl Into<String>) -> Self {
        Self {
            db,
            table_name: table_name.into(),
            _phantom: PhantomData,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    // Generic DB operation wrapper with consistent error handling and logging
    async fn execute_db_operation<F, R>(&self, operation: &str, execute: F) -> AppResult<R>
    where
        F: Future<Output = AppResult<R>>,
    {
        execute.await.map_err(|e| {
            if let AppError::DatabaseError(err) = e {
                tracing::error!(table = %self.table_name, "Failed to {} record: {:#}", operation, err);
                AppError::DatabaseError(anyhow::anyhow!(
                    "Failed to {} {} record: {}",
                    operation,
                    self.table_name,
                    err
                ))
            } else {
                e
            }
        })
    }

    pub async fn create_record(&self, record_id: &str, item: T) -> AppResult<Option<T>> {
        self.execute_db_operation("create", async {
            self.db.create((self.table_name.as_str(), record_id), item).await
        })
        .await
    }

    pub async fn update_record(&self, record_id: &str, updated_data: T) -> AppResult<Option<T>> {
        self.execute_db_operation("update", async {
            self.db.update((self.table_name.as_str(), record_id), updated_data).await
        })
        .await
    }

    pub async fn delete_record(&self, record_id: &str) -> AppResult<Option<T>> {
        self.execute_db_operation("delete", async {
            self.db.delete((self.table_name.as_str(), record_id)).await
        })
        .await
    }

    pub async fn get_record_by_id(&self, record_id: &str) -> AppResult<Option<T>> {
        self.execute_db_operation("fetch", async {
            self.db.select((self.table_name.as_str(), record_id)).await
        })
        .await
    }

    pub async fn get_records_by_field<V>(&self, field: &str, value: V) -> AppResult<Vec<T>>
    where
        V: Serialize + Send + Sync + 'static,
    {
        validate_identifier(field)?;
        validate_identifier(&self.table_name)?;

        // the field is escaped so names that collide with keywords (`user`) still work
        let sql = format!("SELECT * FROM {} WHERE `{}` = $value", self.table_name, field);

        let value_json = serde_json::to_value(value).map_err(|e| {
            AppError::ValidationError(format!(
                "Failed to serialize value for field '{}': {}",
                field, e
            ))
        })?;

        self.execute_db_operation("query", async {
            let response = self.db.query(sql).bind(("value", value_json)).r#await().await?;
            response.take(0)
        })
        .await
    }
}

impl<T> DbService<T>
where
    T: Entity + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// A service bound to the entity's own collection.
    pub fn for_entity(db: Arc<Database>) -> Self {
        Self::new(db, T::COLLECTION)
    }

    /// Store `item` under the hex form of its identifier.
    pub async fn insert(&self, item: T) -> AppResult<Option<T>> {
        let record_id = item.id().to_hex();
        self.create_record(&record_id, item).await
    }
}

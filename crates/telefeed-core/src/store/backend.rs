//! SQL-backed state store.

use chrono::Utc;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};

use crate::{
    domain::{ChatId, UserId},
    errors::Error,
    Result,
};

use super::config::StoreConfig;
use super::models::{
    from_millis, Connection, Filter, FilterList, License, Redirection, SessionRecord,
    Transformation,
};
use super::queries::{self, Sql};

/// Database type, detected from the connection URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if url.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }
}

/// Persistent store for licenses, connections, rules, filters and sessions.
///
/// Each write runs in its own transaction; an error drops the transaction,
/// which rolls it back. Queries lease a pooled connection for their duration.
#[derive(Clone)]
pub struct StateStore {
    pool: AnyPool,
    db_type: DatabaseType,
}

impl StateStore {
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let db_type = DatabaseType::from_url(&config.database_url).ok_or_else(|| {
            Error::Config(format!(
                "unsupported database URL scheme: {}",
                redact_url(&config.database_url)
            ))
        })?;

        let mut opts = AnyPoolOptions::new().acquire_timeout(config.acquire_timeout);
        opts = if config.is_in_memory() {
            opts.max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            opts.max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .idle_timeout(config.idle_timeout)
                .max_lifetime(config.max_lifetime)
        };

        let pool = opts.connect(&config.database_url).await?;
        tracing::info!(
            database = ?db_type,
            max_connections = config.max_connections,
            "state store connected"
        );

        Ok(Self { pool, db_type })
    }

    /// Create missing tables. Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        let statements = match self.db_type {
            DatabaseType::PostgreSQL => queries::SCHEMA_PG,
            DatabaseType::SQLite => queries::SCHEMA_SQLITE,
        };

        let mut tx = self.pool.begin().await?;
        for stmt in statements {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        tracing::info!("database schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query(self.sql(queries::PING))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn database_type(&self) -> DatabaseType {
        self.db_type
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn sql(&self, q: Sql) -> &'static str {
        q.get(self.db_type)
    }

    fn filter_sql(&self, q: Sql, list: FilterList) -> String {
        self.sql(q).replace("{table}", list.table())
    }

    // Licenses

    /// Insert or refresh the user's license, forcing it active.
    pub async fn upsert_license(&self, user: UserId, code: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.sql(queries::UPSERT_LICENSE))
            .bind(user.0)
            .bind(code)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn license(&self, user: UserId) -> Result<Option<License>> {
        let row = sqlx::query(self.sql(queries::FIND_LICENSE))
            .bind(user.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_license).transpose()
    }

    /// Returns whether a license row existed.
    pub async fn set_license_active(&self, user: UserId, active: bool) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(self.sql(queries::SET_LICENSE_ACTIVE))
            .bind(active)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // Connections

    /// Insert the (user, phone) pair or refresh `connected_at` and force it active.
    pub async fn upsert_connection(&self, user: UserId, phone: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.sql(queries::UPSERT_CONNECTION))
            .bind(user.0)
            .bind(phone)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn connection(&self, user: UserId, phone: &str) -> Result<Option<Connection>> {
        let row = sqlx::query(self.sql(queries::FIND_CONNECTION))
            .bind(user.0)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_connection).transpose()
    }

    /// Active connections in insertion order.
    pub async fn active_connections(&self, user: UserId) -> Result<Vec<Connection>> {
        sqlx::query(self.sql(queries::ACTIVE_CONNECTIONS))
            .bind(user.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(parse_connection)
            .collect()
    }

    /// Returns whether an active connection was switched off.
    pub async fn deactivate_connection(&self, user: UserId, phone: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(self.sql(queries::DEACTIVATE_CONNECTION))
            .bind(user.0)
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    /// Write the connection and its session row in a single transaction.
    pub async fn register_connected_session(
        &self,
        user: UserId,
        phone: &str,
        session_file: &str,
    ) -> Result<()> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.sql(queries::UPSERT_CONNECTION))
            .bind(user.0)
            .bind(phone)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query(self.sql(queries::UPSERT_SESSION))
            .bind(user.0)
            .bind(phone)
            .bind(session_file)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // Redirections

    /// Append a redirection rule. Identical rules are not deduplicated.
    pub async fn insert_redirection(
        &self,
        user: UserId,
        phone: &str,
        source: ChatId,
        destination: ChatId,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(self.sql(queries::INSERT_REDIRECTION))
            .bind(user.0)
            .bind(phone)
            .bind(source.0)
            .bind(destination.0)
            .bind(now_millis())
            .fetch_one(&mut *tx)
            .await?;
        let id: i64 = row.try_get("id")?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn active_redirections(&self, user: UserId) -> Result<Vec<Redirection>> {
        sqlx::query(self.sql(queries::ACTIVE_REDIRECTIONS))
            .bind(user.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(parse_redirection)
            .collect()
    }

    pub async fn deactivate_redirection(&self, user: UserId, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(self.sql(queries::DEACTIVATE_REDIRECTION))
            .bind(id)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // Transformations

    pub async fn insert_transformation(
        &self,
        user: UserId,
        phone: &str,
        transformation_type: &str,
        settings: &serde_json::Value,
    ) -> Result<i64> {
        let settings = serde_json::to_string(settings)?;

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(self.sql(queries::INSERT_TRANSFORMATION))
            .bind(user.0)
            .bind(phone)
            .bind(transformation_type)
            .bind(settings)
            .bind(now_millis())
            .fetch_one(&mut *tx)
            .await?;
        let id: i64 = row.try_get("id")?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn active_transformations(
        &self,
        user: UserId,
        phone: &str,
    ) -> Result<Vec<Transformation>> {
        sqlx::query(self.sql(queries::ACTIVE_TRANSFORMATIONS))
            .bind(user.0)
            .bind(phone)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(parse_transformation)
            .collect()
    }

    pub async fn deactivate_transformation(&self, user: UserId, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(self.sql(queries::DEACTIVATE_TRANSFORMATION))
            .bind(id)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // Filters

    pub async fn insert_filter(
        &self,
        list: FilterList,
        user: UserId,
        phone: &str,
        name: &str,
        value: &str,
    ) -> Result<i64> {
        let sql = self.filter_sql(queries::INSERT_FILTER, list);

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&sql)
            .bind(user.0)
            .bind(phone)
            .bind(name)
            .bind(value)
            .bind(now_millis())
            .fetch_one(&mut *tx)
            .await?;
        let id: i64 = row.try_get("id")?;
        tx.commit().await?;
        Ok(id)
    }

    pub async fn active_filters(
        &self,
        list: FilterList,
        user: UserId,
        phone: &str,
    ) -> Result<Vec<Filter>> {
        let sql = self.filter_sql(queries::ACTIVE_FILTERS, list);
        sqlx::query(&sql)
            .bind(user.0)
            .bind(phone)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| parse_filter(list, row))
            .collect()
    }

    pub async fn deactivate_filter(&self, list: FilterList, user: UserId, id: i64) -> Result<bool> {
        let sql = self.filter_sql(queries::DEACTIVATE_FILTER, list);

        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(&sql)
            .bind(id)
            .bind(user.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }

    // Sessions

    pub async fn upsert_session(&self, user: UserId, phone: &str, session_file: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(self.sql(queries::UPSERT_SESSION))
            .bind(user.0)
            .bind(phone)
            .bind(session_file)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn session(&self, user: UserId, phone: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(self.sql(queries::FIND_SESSION))
            .bind(user.0)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_session).transpose()
    }

    pub async fn active_sessions(&self, user: UserId) -> Result<Vec<SessionRecord>> {
        sqlx::query(self.sql(queries::ACTIVE_SESSIONS))
            .bind(user.0)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(parse_session)
            .collect()
    }

    /// Bump `last_activity` on an active session. Returns whether one existed.
    pub async fn touch_session(&self, user: UserId, phone: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let res = sqlx::query(self.sql(queries::TOUCH_SESSION))
            .bind(now_millis())
            .bind(user.0)
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(res.rows_affected() > 0)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, _)) => format!("{scheme}://…"),
        None => "<invalid>".to_string(),
    }
}

// SQLite may hand booleans back as integers, so try both types.
fn row_bool(row: &AnyRow, col: &str) -> bool {
    row.try_get::<bool, _>(col)
        .or_else(|_| row.try_get::<i64, _>(col).map(|v| v != 0))
        .or_else(|_| row.try_get::<i32, _>(col).map(|v| v != 0))
        .unwrap_or(false)
}

fn parse_license(row: AnyRow) -> Result<License> {
    Ok(License {
        user_id: UserId(row.try_get("user_id")?),
        license_code: row.try_get("license_code")?,
        validated_at: from_millis(row.try_get("validated_at")?),
        active: row_bool(&row, "active"),
    })
}

fn parse_connection(row: AnyRow) -> Result<Connection> {
    Ok(Connection {
        user_id: UserId(row.try_get("user_id")?),
        phone_number: row.try_get("phone_number")?,
        connected_at: from_millis(row.try_get("connected_at")?),
        active: row_bool(&row, "active"),
    })
}

fn parse_redirection(row: AnyRow) -> Result<Redirection> {
    Ok(Redirection {
        id: row.try_get("id")?,
        user_id: UserId(row.try_get("user_id")?),
        phone_number: row.try_get("phone_number")?,
        source_chat_id: ChatId(row.try_get("source_chat_id")?),
        destination_chat_id: ChatId(row.try_get("destination_chat_id")?),
        active: row_bool(&row, "active"),
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn parse_transformation(row: AnyRow) -> Result<Transformation> {
    let raw: String = row.try_get("settings")?;
    Ok(Transformation {
        id: row.try_get("id")?,
        user_id: UserId(row.try_get("user_id")?),
        phone_number: row.try_get("phone_number")?,
        transformation_type: row.try_get("transformation_type")?,
        settings: serde_json::from_str(&raw)?,
        active: row_bool(&row, "active"),
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn parse_filter(list: FilterList, row: AnyRow) -> Result<Filter> {
    Ok(Filter {
        id: row.try_get("id")?,
        list,
        user_id: UserId(row.try_get("user_id")?),
        phone_number: row.try_get("phone_number")?,
        filter_name: row.try_get("filter_name")?,
        filter_value: row.try_get("filter_value")?,
        active: row_bool(&row, "active"),
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn parse_session(row: AnyRow) -> Result<SessionRecord> {
    Ok(SessionRecord {
        user_id: UserId(row.try_get("user_id")?),
        phone_number: row.try_get("phone_number")?,
        session_file: row.try_get("session_file")?,
        last_activity: from_millis(row.try_get("last_activity")?),
        active: row_bool(&row, "active"),
    })
}

use super::{BoundDirection, Store, StoreError};
use crate::utils::hex::{normalize_number, parse_quantity};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{path::Path, str::FromStr};

/// Durable [`Store`] on `SQLite`.
///
/// Plain values live in `kv`; bound markers additionally carry their numeric value in the
/// `bound` column so the outward-only compare-and-set is a single upsert. A marker written
/// through [`Store::set`] has no `bound` yet; its value is parsed and adopted before the upsert. Ordered sets live in
/// `scored`, indexed by `(partition, key, score)`.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Opens (creating if missing) the database and its schema.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if the connection or schema creation fails.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        if !in_memory {
            ensure_parent_dir(database_url).await?;
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to `:memory:` opens a separate database
        let max_connections = if in_memory { 1 } else { 8 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Fills in `bound` for a marker stored as a plain value, so the upsert in
    /// [`Store::extend_bound`] compares against it. The update only applies while the value is
    /// unchanged; a concurrent `set` makes it retry.
    async fn adopt_plain_marker(&self, partition: u32, key: &str) -> Result<(), StoreError> {
        loop {
            let row = sqlx::query("SELECT value, bound FROM kv WHERE partition = ?1 AND key = ?2")
                .bind(i64::from(partition))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

            let Some(row) = row else { return Ok(()) };
            if row.try_get::<Option<i64>, _>("bound")?.is_some() {
                return Ok(());
            }

            let value: String = row.try_get("value")?;
            let Some(current) = parse_quantity(&value) else {
                return Err(StoreError::Corrupt { key: key.to_string(), value });
            };

            let adopted = sqlx::query(
                r"
                UPDATE kv SET bound = ?3
                WHERE partition = ?1 AND key = ?2 AND bound IS NULL AND value = ?4
                ",
            )
            .bind(i64::from(partition))
            .bind(key)
            .bind(to_sql(current)?)
            .bind(&value)
            .execute(&self.pool)
            .await?;

            if adopted.rows_affected() > 0 {
                return Ok(());
            }
        }
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS kv (
                partition INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                bound INTEGER,
                PRIMARY KEY (partition, key)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS scored (
                partition INTEGER NOT NULL,
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                score INTEGER NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (partition, key, member)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS scored_by_score ON scored (partition, key, score)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn ensure_parent_dir(database_url: &str) -> Result<(), StoreError> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
    }
    Ok(())
}

fn to_sql(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(value))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, partition: u32, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv WHERE partition = ?1 AND key = ?2")
            .bind(i64::from(partition))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.try_get::<String, _>("value")).transpose()?)
    }

    async fn set(&self, partition: u32, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO kv (partition, key, value, bound) VALUES (?1, ?2, ?3, NULL)
            ON CONFLICT (partition, key) DO UPDATE SET value = excluded.value, bound = NULL
            ",
        )
        .bind(i64::from(partition))
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn extend_bound(
        &self,
        partition: u32,
        key: &str,
        candidate: u64,
        direction: BoundDirection,
    ) -> Result<u64, StoreError> {
        self.adopt_plain_marker(partition, key).await?;

        let upsert = match direction {
            BoundDirection::Lower => {
                r"
                INSERT INTO kv (partition, key, value, bound) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (partition, key) DO UPDATE
                SET value = excluded.value, bound = excluded.bound
                WHERE excluded.bound < kv.bound
                "
            }
            BoundDirection::Upper => {
                r"
                INSERT INTO kv (partition, key, value, bound) VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (partition, key) DO UPDATE
                SET value = excluded.value, bound = excluded.bound
                WHERE excluded.bound > kv.bound
                "
            }
        };

        sqlx::query(upsert)
            .bind(i64::from(partition))
            .bind(key)
            .bind(normalize_number(candidate))
            .bind(to_sql(candidate)?)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT value, bound FROM kv WHERE partition = ?1 AND key = ?2")
            .bind(i64::from(partition))
            .bind(key)
            .fetch_one(&self.pool)
            .await?;

        let bound: Option<i64> = row.try_get("bound")?;
        bound.and_then(|b| u64::try_from(b).ok()).ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            value: row.try_get::<String, _>("value").unwrap_or_default(),
        })
    }

    async fn put_scored(
        &self,
        partition: u32,
        key: &str,
        score: u64,
        id: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO scored (partition, key, member, score, value) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (partition, key, member) DO UPDATE
            SET score = excluded.score, value = excluded.value
            ",
        )
        .bind(i64::from(partition))
        .bind(key)
        .bind(id)
        .bind(to_sql(score)?)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn range_by_score(
        &self,
        partition: u32,
        key: &str,
        min: u64,
        max: u64,
    ) -> Result<Vec<(u64, String)>, StoreError> {
        let Ok(min) = i64::try_from(min) else {
            return Ok(Vec::new());
        };
        let max = i64::try_from(max).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r"
            SELECT score, value FROM scored
            WHERE partition = ?1 AND key = ?2 AND score BETWEEN ?3 AND ?4
            ORDER BY score, member
            ",
        )
        .bind(i64::from(partition))
        .bind(key)
        .bind(min)
        .bind(max)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let score: i64 = row.try_get("score")?;
                let value: String = row.try_get("value")?;
                let score = u64::try_from(score)
                    .map_err(|_| StoreError::Corrupt { key: key.to_string(), value: score.to_string() })?;
                Ok((score, value))
            })
            .collect()
    }
}

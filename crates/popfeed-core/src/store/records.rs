//! Record read/write operations and the `Store` implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::item::{AuthorId, ItemId, ScoredItem, StorageId};

use super::db::{unix_timestamp, StatusDb};
use super::types::PersistedRecord;
use super::Store;

fn to_sql(v: u64, what: &str) -> Result<i64> {
    i64::try_from(v).with_context(|| format!("{} {} does not fit in an INTEGER column", what, v))
}

fn from_sql(v: i64, what: &str) -> Result<u64> {
    u64::try_from(v).with_context(|| format!("negative {} {} in database", what, v))
}

fn record_from_row(row: &SqliteRow) -> Result<PersistedRecord> {
    let fetched_secs: i64 = row.get("fetched_at");
    Ok(PersistedRecord {
        storage_id: row.get("id"),
        id: ItemId(from_sql(row.get("item_id"), "item id")?),
        author_id: AuthorId(from_sql(row.get("author_id"), "author id")?),
        score: from_sql(row.get("score"), "score")?,
        link: row.get("link"),
        fetched_at: DateTime::<Utc>::from_timestamp(fetched_secs, 0)
            .with_context(|| format!("fetched_at {} out of range in database", fetched_secs))?,
    })
}

impl StatusDb {
    /// All records of the given day, highest score first.
    pub async fn list_period(&self, date: NaiveDate) -> Result<Vec<PersistedRecord>> {
        let period = date.format("%Y-%m-%d").to_string();
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, author_id, score, link, fetched_at
            FROM popular_items
            WHERE period = ?1
            ORDER BY score DESC, id ASC
            "#,
        )
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Number of records kept for every stored day, newest day first.
    pub async fn period_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT period, COUNT(*) AS n
            FROM popular_items
            GROUP BY period
            ORDER BY period DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("period"), row.get("n")))
            .collect())
    }
}

#[async_trait]
impl Store for StatusDb {
    async fn read_current_period(&self) -> Result<Vec<PersistedRecord>> {
        self.list_period(self.period.date()).await
    }

    async fn insert(&self, item: &ScoredItem) -> Result<StorageId> {
        let now = unix_timestamp();
        let row_id = sqlx::query(
            r#"
            INSERT INTO popular_items (
                period, item_id, author_id, score, link,
                fetched_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(self.period.key())
        .bind(to_sql(item.id.0, "item id")?)
        .bind(to_sql(item.author_id.0, "author id")?)
        .bind(to_sql(item.score, "score")?)
        .bind(&item.link)
        .bind(item.fetched_at.timestamp())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    async fn update(&self, id: ItemId, score: u64) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE popular_items
            SET score = ?1,
                updated_at = ?2
            WHERE period = ?3 AND item_id = ?4
            "#,
        )
        .bind(to_sql(score, "score")?)
        .bind(now)
        .bind(self.period.key())
        .bind(to_sql(id.0, "item id")?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: ItemId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM popular_items
            WHERE period = ?1 AND item_id = ?2
            "#,
        )
        .bind(self.period.key())
        .bind(to_sql(id.0, "item id")?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

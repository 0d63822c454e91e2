//! SQLite-backed record store: connection, migrations, period handling.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// `$XDG_STATE_HOME/popfeed/popular.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("popfeed")?;
    Ok(xdg_dirs.get_state_home().join("popular.db"))
}

/// Which day counts as the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// The current UTC date, evaluated on every call.
    #[default]
    Today,
    /// A fixed date (tests, replays).
    Fixed(NaiveDate),
}

impl Period {
    pub fn date(self) -> NaiveDate {
        match self {
            Period::Today => Utc::now().date_naive(),
            Period::Fixed(d) => d,
        }
    }

    /// Period key as stored in the `period` column.
    pub fn key(self) -> String {
        self.date().format("%Y-%m-%d").to_string()
    }
}

/// Handle to the SQLite record database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/popfeed/popular.db` on Debian.
#[derive(Clone)]
pub struct StatusDb {
    pub(crate) pool: Pool<Sqlite>,
    pub(crate) period: Period,
}

impl StatusDb {
    /// Open (or create) the default database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(default_db_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = StatusDb {
            pool,
            period: Period::Today,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Same database, with the current period pinned to `date`.
    pub fn pinned_to(self, date: NaiveDate) -> Self {
        Self {
            period: Period::Fixed(date),
            ..self
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    async fn migrate(&self) -> Result<()> {
        // One row per (period, item). `id` is the storage id handed back on insert.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS popular_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                period TEXT NOT NULL,
                item_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                score INTEGER NOT NULL,
                link TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (period, item_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O), pinned to `date`.
pub(crate) async fn open_memory(date: NaiveDate) -> Result<StatusDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = StatusDb {
        pool,
        period: Period::Fixed(date),
    };
    db.migrate().await?;
    Ok(db)
}

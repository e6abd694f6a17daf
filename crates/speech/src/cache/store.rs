//! SQLite persistence for cached phrases
//!
//! Each phrase occupies one row holding the encoded audio blob and its
//! last-access timestamp, so recency survives restarts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::PhraseKey;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::SpeechError;
use crate::types::{AudioData, AudioFormat};

type ConnectionPool = Pool<SqliteConnectionManager>;

/// One persisted cache row
#[derive(Debug, Clone)]
pub(super) struct CachedEntry {
    pub audio: AudioData,
    pub last_access_at: DateTime<Utc>,
}

/// Pooled SQLite store for phrase audio
#[derive(Debug, Clone)]
pub(super) struct SqlitePhraseStore {
    pool: Arc<ConnectionPool>,
}

impl SqlitePhraseStore {
    /// Open the database, applying pragmas and the schema
    pub(super) fn open(config: &CacheConfig) -> Result<Self, SpeechError> {
        info!(path = %config.db_path.display(), "opening phrase cache database");

        let manager = if config.db_path.as_os_str() == ":memory:" {
            SqliteConnectionManager::memory()
        } else {
            if let Some(parent) = config.db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        SpeechError::Storage(format!("failed to create cache directory: {e}"))
                    })?;
                }
            }
            SqliteConnectionManager::file(&config.db_path)
        };

        // callers serialize access, one connection is enough
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(storage_err)?;

        {
            let conn = pool.get().map_err(storage_err)?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;

                CREATE TABLE IF NOT EXISTS phrase_cache (
                    text TEXT NOT NULL,
                    language TEXT NOT NULL,
                    audio BLOB NOT NULL,
                    format TEXT NOT NULL,
                    last_access_at TEXT NOT NULL,
                    PRIMARY KEY (text, language)
                );
                ",
            )
            .map_err(storage_err)?;
        }

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub(super) async fn load(&self, key: &PhraseKey) -> Result<Option<CachedEntry>, SpeechError> {
        let pool = Arc::clone(&self.pool);
        let (text, language) = columns(key);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            conn.query_row(
                "SELECT audio, format, last_access_at FROM phrase_cache
                 WHERE text = ?1 AND language = ?2",
                [&text, &language],
                row_to_entry,
            )
            .optional()
            .map_err(storage_err)
        })
        .await
        .map_err(storage_err)?
    }

    pub(super) async fn upsert(
        &self,
        key: &PhraseKey,
        audio: &AudioData,
        now: DateTime<Utc>,
    ) -> Result<(), SpeechError> {
        let pool = Arc::clone(&self.pool);
        let (text, language) = columns(key);
        let bytes = audio.data().to_vec();
        let format = audio.format().mime_type().to_string();

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            conn.execute(
                "INSERT INTO phrase_cache (text, language, audio, format, last_access_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (text, language)
                 DO UPDATE SET audio = ?3, format = ?4, last_access_at = ?5",
                params![text, language, bytes, format, now.to_rfc3339()],
            )
            .map_err(storage_err)?;
            debug!("stored phrase audio");
            Ok(())
        })
        .await
        .map_err(storage_err)?
    }

    pub(super) async fn touch(
        &self,
        key: &PhraseKey,
        now: DateTime<Utc>,
    ) -> Result<(), SpeechError> {
        let pool = Arc::clone(&self.pool);
        let (text, language) = columns(key);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            conn.execute(
                "UPDATE phrase_cache SET last_access_at = ?3
                 WHERE text = ?1 AND language = ?2",
                params![text, language, now.to_rfc3339()],
            )
            .map_err(storage_err)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?
    }

    pub(super) async fn remove(&self, key: &PhraseKey) -> Result<bool, SpeechError> {
        let pool = Arc::clone(&self.pool);
        let (text, language) = columns(key);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            let removed = conn
                .execute(
                    "DELETE FROM phrase_cache WHERE text = ?1 AND language = ?2",
                    [&text, &language],
                )
                .map_err(storage_err)?;
            Ok(removed > 0)
        })
        .await
        .map_err(storage_err)?
    }

    /// Delete every row last accessed at or before the cutoff
    pub(super) async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, SpeechError> {
        let pool = Arc::clone(&self.pool);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            let purged = conn
                .execute(
                    "DELETE FROM phrase_cache WHERE last_access_at <= ?1",
                    [&cutoff.to_rfc3339()],
                )
                .map_err(storage_err)?;
            debug!(purged, "purged expired phrases");
            Ok(purged)
        })
        .await
        .map_err(storage_err)?
    }

    /// Delete the least recently used row
    pub(super) async fn evict_lru(&self) -> Result<(), SpeechError> {
        let pool = Arc::clone(&self.pool);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            conn.execute(
                "DELETE FROM phrase_cache WHERE rowid IN (
                     SELECT rowid FROM phrase_cache
                     ORDER BY last_access_at ASC, rowid ASC LIMIT 1
                 )",
                [],
            )
            .map_err(storage_err)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?
    }

    pub(super) async fn count(&self) -> Result<usize, SpeechError> {
        let pool = Arc::clone(&self.pool);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM phrase_cache", [], |row| row.get(0))
                .map_err(storage_err)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(storage_err)?
    }

    pub(super) async fn clear(&self) -> Result<(), SpeechError> {
        let pool = Arc::clone(&self.pool);

        task::spawn_blocking(move || {
            let conn = pool.get().map_err(storage_err)?;
            conn.execute("DELETE FROM phrase_cache", [])
                .map_err(storage_err)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?
    }
}

fn columns(key: &PhraseKey) -> (String, String) {
    (
        key.text().to_string(),
        key.language().as_str().to_string(),
    )
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CachedEntry> {
    let bytes: Vec<u8> = row.get(0)?;
    let format_str: String = row.get(1)?;
    let accessed_str: String = row.get(2)?;

    let format = AudioFormat::from_mime_type(&format_str).unwrap_or(AudioFormat::Wav);
    let last_access_at = DateTime::parse_from_rfc3339(&accessed_str)
        .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));

    Ok(CachedEntry {
        audio: AudioData::new(bytes, format),
        last_access_at,
    })
}

fn storage_err(e: impl std::fmt::Display) -> SpeechError {
    SpeechError::Storage(e.to_string())
}

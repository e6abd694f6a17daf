//! Phrase cache
//!
//! Durable least-recently-used cache mapping phrases to encoded audio.
//! Entries are capped in size and count, expire a fixed number of days after
//! their last access, and survive restarts through a SQLite database that
//! also records recency.

mod store;

use chrono::{Duration, Utc};
use domain::PhraseKey;
use tracing::{debug, instrument};

use crate::config::CacheConfig;
use crate::error::SpeechError;
use crate::types::AudioData;

use store::SqlitePhraseStore;

/// LRU cache of synthesized phrase audio
pub struct PhraseCache {
    store: SqlitePhraseStore,
    config: CacheConfig,
    // put must check capacity, insert, and evict without interleaving
    lock: tokio::sync::Mutex<()>,
}

impl PhraseCache {
    /// Open the cache, purging entries whose expiry window has passed
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the database cannot be opened.
    pub async fn open(config: CacheConfig) -> Result<Self, SpeechError> {
        let store = SqlitePhraseStore::open(&config)?;
        let cutoff = Utc::now() - Duration::days(config.expiry_days);
        store.purge_before(cutoff).await?;

        Ok(Self {
            store,
            config,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Look up a phrase, refreshing its recency on a hit
    ///
    /// Entries past their expiry window are deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on database failures.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn get(&self, key: &PhraseKey) -> Result<Option<AudioData>, SpeechError> {
        let _guard = self.lock.lock().await;

        let Some(entry) = self.store.load(key).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if entry.last_access_at <= now - Duration::days(self.config.expiry_days) {
            debug!("cached phrase expired");
            self.store.remove(key).await?;
            return Ok(None);
        }

        self.store.touch(key, now).await?;
        Ok(Some(entry.audio))
    }

    /// Insert a phrase, evicting least recently used entries over capacity
    ///
    /// # Errors
    ///
    /// Returns `CacheEntryTooLarge` without inserting when the audio exceeds
    /// the per-entry cap, and `Storage` on database failures.
    #[instrument(skip(self, audio), fields(key = %key, bytes = audio.size_bytes()))]
    pub async fn put(&self, key: &PhraseKey, audio: &AudioData) -> Result<(), SpeechError> {
        if audio.size_bytes() > self.config.max_entry_bytes {
            return Err(SpeechError::CacheEntryTooLarge {
                size: audio.size_bytes(),
                max: self.config.max_entry_bytes,
            });
        }

        let _guard = self.lock.lock().await;

        self.store.upsert(key, audio, Utc::now()).await?;
        while self.store.count().await? > self.config.max_entries {
            self.store.evict_lru().await?;
        }
        Ok(())
    }

    /// Number of cached phrases
    ///
    /// # Errors
    ///
    /// Returns `Storage` on database failures.
    pub async fn len(&self) -> Result<usize, SpeechError> {
        self.store.count().await
    }

    /// Whether the cache holds no phrases
    ///
    /// # Errors
    ///
    /// Returns `Storage` on database failures.
    pub async fn is_empty(&self) -> Result<bool, SpeechError> {
        Ok(self.len().await? == 0)
    }

    /// Remove every cached phrase
    ///
    /// # Errors
    ///
    /// Returns `Storage` on database failures.
    pub async fn clear(&self) -> Result<(), SpeechError> {
        let _guard = self.lock.lock().await;
        self.store.clear().await
    }
}

impl std::fmt::Debug for PhraseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhraseCache")
            .field("max_entries", &self.config.max_entries)
            .field("max_entry_bytes", &self.config.max_entry_bytes)
            .finish_non_exhaustive()
    }
}

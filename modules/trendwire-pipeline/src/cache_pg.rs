use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::translator::TranslationCache;

type Key = (String, String);

/// Translation cache persisted in Postgres.
///
/// Recent entries are loaded once at startup; lookups are served from
/// memory and new entries are written back on `flush`.
pub struct PgTranslationCache {
    pool: PgPool,
    entries: Mutex<HashMap<Key, String>>,
    dirty: Mutex<HashSet<Key>>,
}

impl PgTranslationCache {
    pub async fn load(pool: PgPool, ttl_hours: i32) -> Result<Self> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT locale, source_text, translated_text
            FROM translation_cache
            WHERE updated_at > now() - make_interval(hours => $1)
            "#,
        )
        .bind(ttl_hours)
        .fetch_all(&pool)
        .await
        .context("loading translation cache")?;

        info!(entries = rows.len(), ttl_hours, "translation cache loaded");

        let entries = rows
            .into_iter()
            .map(|(locale, source, translated)| ((locale, source), translated))
            .collect();

        Ok(Self {
            pool,
            entries: Mutex::new(entries),
            dirty: Mutex::new(HashSet::new()),
        })
    }

    /// Entries set since the last successful flush.
    pub fn pending_len(&self) -> usize {
        self.dirty.lock().map(|d| d.len()).unwrap_or(0)
    }

    fn pending(&self) -> Vec<(Key, String)> {
        let Ok(mut dirty) = self.dirty.lock() else {
            return Vec::new();
        };
        let Ok(entries) = self.entries.lock() else {
            return Vec::new();
        };
        dirty
            .drain()
            .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
            .collect()
    }

    /// Put keys back after a failed flush so the next one retries them.
    fn requeue(&self, pending: Vec<(Key, String)>) {
        if let Ok(mut dirty) = self.dirty.lock() {
            dirty.extend(pending.into_iter().map(|(key, _)| key));
        }
    }

    async fn write(&self, pending: &[(Key, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for ((locale, source), translated) in pending {
            sqlx::query(
                r#"
                INSERT INTO translation_cache (locale, source_text, translated_text, updated_at)
                VALUES ($1, $2, $3, now())
                ON CONFLICT (locale, source_text) DO UPDATE
                SET translated_text = EXCLUDED.translated_text,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(locale)
            .bind(source)
            .bind(translated)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TranslationCache for PgTranslationCache {
    fn get(&self, locale: &str, text: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(&(locale.to_string(), text.to_string())).cloned()
    }

    fn set(&self, locale: &str, text: &str, translated: &str) {
        let key = (locale.to_string(), text.to_string());
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), translated.to_string());
        }
        if let Ok(mut dirty) = self.dirty.lock() {
            dirty.insert(key);
        }
    }

    async fn flush(&self) -> Result<()> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(());
        }

        match self.write(&pending).await {
            Ok(()) => {
                debug!(count = pending.len(), "translation cache flushed");
                Ok(())
            }
            Err(e) => {
                warn!(count = pending.len(), error = %e, "translation cache flush failed, will retry");
                self.requeue(pending);
                Err(e.context("flushing translation cache"))
            }
        }
    }
}

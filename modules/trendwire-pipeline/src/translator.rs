// Batch translation with a verified fallback.
//
// Cache misses are joined with a separator, translated in as few requests as
// the URL ceiling allows, and split back apart. If a batch request fails or
// splits into the wrong number of pieces, each of its texts is translated on
// its own. Output always has the input's length and order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::traits::TextTranslator;

pub const SEPARATOR: &str = " ||| ";
pub const DEFAULT_MAX_BATCH_CHARS: usize = 4_500;

/// Target value that disables translation.
const PASSTHROUGH_TARGET: &str = "auto";

// Translation may drop or space out the bars of the separator.
static SEPARATOR_VARIANTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\|\s*\|\s*\|\s*").expect("valid regex"));

// ---------------------------------------------------------------------------
// TranslationCache
// ---------------------------------------------------------------------------

/// `(target locale, source text) -> translated text`.
#[async_trait]
pub trait TranslationCache: Send + Sync {
    fn get(&self, locale: &str, text: &str) -> Option<String>;

    fn set(&self, locale: &str, text: &str, translated: &str);

    /// Persist entries written since the last flush.
    async fn flush(&self) -> Result<()>;
}

/// Process-local cache; flushing is a no-op.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TranslationCache for MemoryCache {
    fn get(&self, locale: &str, text: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries.get(&(locale.to_string(), text.to_string())).cloned()
    }

    fn set(&self, locale: &str, text: &str, translated: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert((locale.to_string(), text.to_string()), translated.to_string());
        }
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TranslationStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub requests: u64,
    pub batch_fallbacks: u64,
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    requests: AtomicU64,
    batch_fallbacks: AtomicU64,
    failures: AtomicU64,
}

pub struct Translator {
    client: Arc<dyn TextTranslator>,
    cache: Arc<dyn TranslationCache>,
    max_batch_chars: usize,
    counters: Counters,
}

impl Translator {
    pub fn new(client: Arc<dyn TextTranslator>, cache: Arc<dyn TranslationCache>) -> Self {
        Self {
            client,
            cache,
            max_batch_chars: DEFAULT_MAX_BATCH_CHARS,
            counters: Counters::default(),
        }
    }

    pub fn with_max_batch_chars(mut self, max: usize) -> Self {
        self.max_batch_chars = max.max(1);
        self
    }

    pub fn stats(&self) -> TranslationStats {
        TranslationStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            requests: self.counters.requests.load(Ordering::Relaxed),
            batch_fallbacks: self.counters.batch_fallbacks.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    pub async fn flush_cache(&self) -> Result<()> {
        self.cache.flush().await
    }

    /// Translate `texts` into `target`, returning exactly one string per input.
    pub async fn translate_batch(&self, texts: &[String], target: &str) -> Vec<String> {
        if target == PASSTHROUGH_TARGET {
            return texts.to_vec();
        }

        let mut resolved: HashMap<&str, String> = HashMap::new();
        let mut batchable: Vec<&str> = Vec::new();
        let mut singles: Vec<&str> = Vec::new();

        for text in texts.iter().map(String::as_str) {
            if resolved.contains_key(text) || batchable.contains(&text) || singles.contains(&text) {
                continue;
            }
            if text.trim().is_empty() {
                resolved.insert(text, text.to_string());
            } else if let Some(hit) = self.cache.get(target, text) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                resolved.insert(text, hit);
            } else {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                // Any bar can fuse with the separator and shift the split.
                if text.contains('|') {
                    singles.push(text);
                } else {
                    batchable.push(text);
                }
            }
        }

        for chunk in chunk_by_chars(&batchable, self.max_batch_chars) {
            for (source, translated) in self.translate_chunk(&chunk, target).await {
                resolved.insert(source, translated);
            }
        }
        for text in singles {
            let translated = self.translate_single(text, target).await;
            resolved.insert(text, translated);
        }

        texts
            .iter()
            .map(|t| resolved.get(t.as_str()).cloned().unwrap_or_else(|| t.clone()))
            .collect()
    }

    async fn translate_chunk<'a>(&self, chunk: &[&'a str], target: &str) -> Vec<(&'a str, String)> {
        if chunk.len() == 1 {
            let translated = self.translate_single(chunk[0], target).await;
            return vec![(chunk[0], translated)];
        }

        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let joined = chunk.join(SEPARATOR);
        match self.client.translate(&joined, target).await {
            Ok(combined) => {
                let parts: Vec<String> = SEPARATOR_VARIANTS
                    .split(combined.trim())
                    .map(|s| s.trim().to_string())
                    .collect();
                if parts.len() == chunk.len() {
                    for (source, translated) in chunk.iter().zip(&parts) {
                        self.cache.set(target, source, translated);
                    }
                    debug!(target_locale = target, count = chunk.len(), "batch translated");
                    return chunk.iter().copied().zip(parts).collect();
                }
                warn!(
                    target_locale = target,
                    expected = chunk.len(),
                    got = parts.len(),
                    "batch split mismatch, translating individually"
                );
            }
            Err(e) => {
                warn!(target_locale = target, error = %e, "batch request failed, translating individually");
            }
        }

        self.counters.batch_fallbacks.fetch_add(1, Ordering::Relaxed);
        let mut out = Vec::with_capacity(chunk.len());
        for source in chunk {
            out.push((*source, self.translate_single(source, target).await));
        }
        out
    }

    /// One request. Failures fall back to the source text and are not cached.
    async fn translate_single(&self, text: &str, target: &str) -> String {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);
        match self.client.translate(text, target).await {
            Ok(translated) => {
                let translated = translated.trim().to_string();
                self.cache.set(target, text, &translated);
                translated
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target_locale = target, error = %e, "translation failed, keeping source text");
                text.to_string()
            }
        }
    }
}

/// Group texts so each joined chunk stays within `max_chars`. A text that is
/// longer than the ceiling on its own forms a chunk by itself.
fn chunk_by_chars<'a>(texts: &[&'a str], max_chars: usize) -> Vec<Vec<&'a str>> {
    let mut chunks: Vec<Vec<&'a str>> = Vec::new();
    let mut current: Vec<&'a str> = Vec::new();
    let mut current_len = 0usize;

    for &text in texts {
        let len = text.chars().count();
        let added = if current.is_empty() {
            len
        } else {
            len + SEPARATOR.len()
        };
        if !current.is_empty() && current_len + added > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += if current.is_empty() { len } else { added };
        current.push(text);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

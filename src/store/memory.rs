//! Store em memória para testes e uso embutido.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::entry::{CacheEntry, EntryStatus};
use super::eviction::{self, RetentionPolicy};
use super::{ResultStore, SimilarEntry, StoreStats};
use crate::fingerprint::PerceptualKey;
use crate::{VisageError, VisageResult};

/// `ResultStore` em memória: um HashMap por chave exata.
///
/// Mesmos contratos da implementação SQLite, sem durabilidade.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    retention: RetentionPolicy,
}

impl MemoryStore {
    /// Cria um store vazio com retenção padrão.
    pub fn new() -> Self {
        Self::with_retention(RetentionPolicy::default())
    }

    /// Cria um store vazio com a retenção dada.
    pub fn with_retention(retention: RetentionPolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// Número de entradas armazenadas (vivas ou não).
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Se o store está vazio.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> VisageError {
        VisageError::StoreUnavailable("lock do MemoryStore envenenado".to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn get_by_exact_key(&self, exact_key: &str) -> VisageResult<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        let now = Utc::now();
        Ok(entries
            .get(exact_key)
            .filter(|e| eviction::is_live(e, now))
            .cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> VisageResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(entry.exact_key.clone(), entry.clone());
        Ok(())
    }

    async fn find_similar(
        &self,
        perceptual_key: &PerceptualKey,
        max_distance: u32,
    ) -> VisageResult<Vec<SimilarEntry>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        let now = Utc::now();

        let mut candidates: Vec<SimilarEntry> = entries
            .values()
            .filter(|e| e.status == EntryStatus::Success && eviction::is_live(e, now))
            .filter_map(|e| {
                let key = e.perceptual_key.as_ref()?;
                let distance = key.hamming_distance(perceptual_key)?;
                (distance <= max_distance).then(|| SimilarEntry {
                    entry: e.clone(),
                    distance,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then(b.entry.created_at.cmp(&a.entry.created_at))
        });

        Ok(candidates)
    }

    async fn increment_hit(&self, exact_key: &str) -> VisageResult<()> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        if let Some(entry) = entries.get_mut(exact_key) {
            entry.hit_count += 1;
        }
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> VisageResult<usize> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        let before = entries.len();
        entries.retain(|_, e| !eviction::should_sweep(e, now, &self.retention));
        Ok(before - entries.len())
    }

    async fn stats(&self) -> VisageResult<StoreStats> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;

        let success: Vec<&CacheEntry> = entries
            .values()
            .filter(|e| e.status == EntryStatus::Success)
            .collect();
        let avg = if success.is_empty() {
            0.0
        } else {
            success.iter().map(|e| e.processing_duration_ms).sum::<f64>() / success.len() as f64
        };

        Ok(StoreStats {
            total_entries: entries.len(),
            success_entries: success.len(),
            failure_entries: entries.len() - success.len(),
            total_hits: entries.values().map(|e| e.hit_count).sum(),
            avg_processing_ms: avg,
        })
    }

    async fn recent(&self, limit: usize) -> VisageResult<Vec<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        let mut all: Vec<CacheEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }
}

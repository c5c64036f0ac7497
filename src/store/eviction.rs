//! Política de expiração e recolhimento.
//!
//! Predicados puros sobre uma entrada e o relógio. Lookups se
//! auto-filtram com `is_live` - uma entrada expirada nunca é retornada,
//! mesmo antes do sweep periódico removê-la fisicamente.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::entry::{CacheEntry, EntryStatus};
use crate::types::config::CacheConfig;

/// Janelas de retenção usadas pelo sweep.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// Idade máxima de uma entrada Failure antes de ser recolhida.
    pub failure_retention: Duration,

    /// Idade máxima de uma entrada nunca reutilizada antes de ser
    /// recolhida.
    pub stale_retention: Duration,
}

impl RetentionPolicy {
    /// Deriva a política da configuração de cache.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            failure_retention: Duration::from_secs(config.failure_retention_secs),
            stale_retention: Duration::from_secs(config.stale_retention_secs),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

/// Uma entrada está viva enquanto não expirou.
pub fn is_live(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    now < entry.expires_at
}

/// Uma entrada é recolhível quando é uma Failure velha demais ou quando
/// nunca foi reutilizada dentro da janela de staleness.
pub fn is_reclaimable(entry: &CacheEntry, now: DateTime<Utc>, policy: &RetentionPolicy) -> bool {
    let age = (now - entry.created_at)
        .to_std()
        .unwrap_or(Duration::ZERO);

    (entry.status == EntryStatus::Failure && age > policy.failure_retention)
        || (entry.hit_count == 0 && age > policy.stale_retention)
}

/// O sweep remove o que não está vivo ou é recolhível.
pub fn should_sweep(entry: &CacheEntry, now: DateTime<Utc>, policy: &RetentionPolicy) -> bool {
    !is_live(entry, now) || is_reclaimable(entry, now, policy)
}

//! Contadores do resolver.

use std::sync::atomic::{AtomicU64, Ordering};

/// Contadores atômicos, incrementados durante a resolução.
#[derive(Debug, Default)]
pub struct ResolverCounters {
    exact_hits: AtomicU64,
    perceptual_hits: AtomicU64,
    computed: AtomicU64,
    cached_failures: AtomicU64,
    computed_failures: AtomicU64,
    flight_followers: AtomicU64,
    swept: AtomicU64,
}

impl ResolverCounters {
    pub(crate) fn record_exact_hit(&self) {
        self.exact_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_perceptual_hit(&self) {
        self.perceptual_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_computed(&self) {
        self.computed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cached_failure(&self) {
        self.cached_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_computed_failure(&self) {
        self.computed_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_follower(&self) {
        self.flight_followers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swept(&self, count: usize) {
        self.swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Snapshot consistente o suficiente para observabilidade.
    pub fn snapshot(&self) -> ResolverStats {
        ResolverStats {
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            perceptual_hits: self.perceptual_hits.load(Ordering::Relaxed),
            computed: self.computed.load(Ordering::Relaxed),
            cached_failures: self.cached_failures.load(Ordering::Relaxed),
            computed_failures: self.computed_failures.load(Ordering::Relaxed),
            flight_followers: self.flight_followers.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot dos contadores do resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverStats {
    /// Hits exatos servidos.
    pub exact_hits: u64,

    /// Hits perceptuais servidos.
    pub perceptual_hits: u64,

    /// Misses computados com sucesso.
    pub computed: u64,

    /// Falhas cacheadas servidas.
    pub cached_failures: u64,

    /// Computações que falharam agora.
    pub computed_failures: u64,

    /// Chamadores que receberam o resultado de um líder.
    pub flight_followers: u64,

    /// Entradas removidas pelo sweep.
    pub swept: u64,
}

impl ResolverStats {
    /// Taxa de acerto sobre as resoluções terminadas em payload.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.exact_hits + self.perceptual_hits;
        let total = hits + self.computed;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

//! Resolução de requisições: exato → perceptual → computar.
//!
//! O resolver orquestra o protocolo de lookup por cima do store, do
//! motor de fingerprint e do coordenador single-flight, e dirige a
//! escrita de resultados novos. O cache é best-effort: falha de leitura
//! vira miss, falha de escrita é logada e o resultado fresco ainda é
//! devolvido. O cache nunca é ponto único de falha de correção.

mod stats;

pub use stats::{ResolverCounters, ResolverStats};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::fingerprint::{FingerprintEngine, PerceptualKey};
use crate::flight::{FlightRole, SingleFlight};
use crate::processor::Processor;
use crate::store::{CacheEntry, EntryStatus, ResultStore};
use crate::types::config::Config;
use crate::types::requests::ArtifactRequest;
use crate::types::responses::{FailureInfo, Resolution};
use crate::{VisageError, VisageResult};

/// Resolve requisições contra o cache, computando no miss.
pub struct Resolver {
    fingerprint: FingerprintEngine,
    store: Arc<dyn ResultStore>,
    processor: Arc<dyn Processor>,
    flight: SingleFlight<Result<Resolution, Arc<VisageError>>>,
    similarity_threshold: u32,
    ttl_success: Duration,
    ttl_failure: Duration,
    sweep_interval: Duration,
    counters: ResolverCounters,
}

impl Resolver {
    /// Cria um resolver com store e processor injetados.
    pub fn new(config: &Config, store: Arc<dyn ResultStore>, processor: Arc<dyn Processor>) -> Self {
        Self {
            fingerprint: FingerprintEngine::new(&config.perceptual),
            store,
            processor,
            flight: SingleFlight::new(),
            similarity_threshold: config.perceptual.similarity_threshold,
            ttl_success: config.cache.ttl_success(),
            ttl_failure: config.cache.ttl_failure(),
            sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
            counters: ResolverCounters::default(),
        }
    }

    /// Resolve uma requisição.
    ///
    /// Chamadores concorrentes com a mesma chave exata compartilham uma
    /// única computação; todos recebem uma cópia idêntica do resultado
    /// do líder, sucesso ou falha.
    pub async fn resolve(&self, request: &ArtifactRequest) -> VisageResult<Resolution> {
        let exact_key = self.fingerprint.exact_key(request)?;
        let perceptual_key = self.fingerprint.perceptual_key(request);

        let outcome = self
            .flight
            .execute(&exact_key, || {
                let exact_key = exact_key.clone();
                let perceptual_key = perceptual_key.clone();
                async move {
                    self.lookup_or_compute(request, exact_key, perceptual_key)
                        .await
                        .map_err(Arc::new)
                }
            })
            .await;

        if outcome.role == FlightRole::Follower {
            self.counters.record_follower();
            tracing::debug!(exact_key = %exact_key, "resultado recebido do líder");
        }

        match outcome.value {
            Ok(resolution) => Ok(resolution),
            // Falha interna do líder, propagada verbatim a todos
            Err(shared) => Err(VisageError::other(shared.to_string())),
        }
    }

    /// O protocolo de lookup que o líder executa.
    async fn lookup_or_compute(
        &self,
        request: &ArtifactRequest,
        exact_key: String,
        perceptual_key: Option<PerceptualKey>,
    ) -> VisageResult<Resolution> {
        // 1. Lookup exato
        match self.store.get_by_exact_key(&exact_key).await {
            Ok(Some(entry)) => match entry.status {
                EntryStatus::Success => {
                    self.record_hit(&exact_key).await;
                    self.counters.record_exact_hit();
                    tracing::info!(exact_key = %exact_key, hits = entry.hit_count + 1, "hit exato");

                    let payload = entry.payload.clone().ok_or_else(|| {
                        VisageError::other("entrada Success sem payload no store")
                    })?;
                    return Ok(Resolution::exact_hit(
                        request.request_id.clone(),
                        exact_key,
                        payload,
                        entry.hit_count + 1,
                        entry.processing_duration_ms,
                    ));
                }
                EntryStatus::Failure => {
                    // Falha cacheada é honrada, não recomputada; o TTL
                    // de falha controla quando ela volta a ser tentada
                    self.counters.record_cached_failure();
                    tracing::info!(exact_key = %exact_key, "falha cacheada");

                    let failure = entry
                        .failure_info()
                        .unwrap_or_else(|| FailureInfo::new("unknown", ""));
                    return Ok(Resolution::cached_failure(
                        request.request_id.clone(),
                        exact_key,
                        failure,
                    ));
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(exact_key = %exact_key, error = %e, "leitura do store falhou; tratando como miss");
            }
        }

        // 2. Lookup perceptual, apenas quando a chave foi derivável
        if let Some(pkey) = &perceptual_key {
            match self.store.find_similar(pkey, self.similarity_threshold).await {
                Ok(candidates) => {
                    if let Some(best) = candidates.first() {
                        return Ok(self
                            .promote_perceptual_match(request, exact_key, pkey, best.clone())
                            .await);
                    }
                }
                Err(e) => {
                    tracing::warn!(exact_key = %exact_key, error = %e, "busca perceptual falhou; tratando como miss");
                }
            }
        }

        // 3. Miss completo: computa
        self.compute_and_store(request, exact_key, perceptual_key)
            .await
    }

    /// Serve um match perceptual e o promove a entrada exata própria,
    /// para que repetições exatas desta requisição sejam instantâneas.
    async fn promote_perceptual_match(
        &self,
        request: &ArtifactRequest,
        exact_key: String,
        perceptual_key: &PerceptualKey,
        best: crate::store::SimilarEntry,
    ) -> Resolution {
        self.record_hit(&best.entry.exact_key).await;
        self.counters.record_perceptual_hit();
        tracing::info!(
            exact_key = %exact_key,
            donor = %best.entry.exact_key,
            distance = best.distance,
            "hit perceptual"
        );

        let payload = best.entry.payload.clone().unwrap_or_else(|| {
            // find_similar só retorna Success; payload sempre presente
            crate::types::responses::ArtifactPayload::new(
                Vec::new(),
                Default::default(),
            )
        });

        // Entrada nova sob a chave exata atual, TTL fresco, contador
        // zerado - é uma entrada nova, não uma cópia do doador
        let promoted = CacheEntry::success(
            exact_key.clone(),
            Some(perceptual_key.clone()),
            payload.clone(),
            self.ttl_success,
            best.entry.processing_duration_ms,
            request.request_id.clone(),
        );
        if let Err(e) = self.store.put(&promoted).await {
            tracing::warn!(exact_key = %exact_key, error = %e, "falha ao promover match perceptual; resultado ainda servido");
        }

        Resolution::perceptual_hit(
            request.request_id.clone(),
            exact_key,
            payload,
            best.distance,
            best.entry.hit_count + 1,
            best.entry.processing_duration_ms,
        )
    }

    /// Invoca o Processor e grava o resultado, sucesso ou falha.
    async fn compute_and_store(
        &self,
        request: &ArtifactRequest,
        exact_key: String,
        perceptual_key: Option<PerceptualKey>,
    ) -> VisageResult<Resolution> {
        let started = Instant::now();
        tracing::debug!(exact_key = %exact_key, processor = self.processor.name(), "miss completo; computando");

        match self.processor.process(request).await {
            Ok(payload) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                let entry = CacheEntry::success(
                    exact_key.clone(),
                    perceptual_key,
                    payload.clone(),
                    self.ttl_success,
                    duration_ms,
                    request.request_id.clone(),
                );
                if let Err(e) = self.store.put(&entry).await {
                    tracing::warn!(exact_key = %exact_key, error = %e, "falha ao gravar resultado; resultado fresco ainda devolvido");
                }

                self.counters.record_computed();
                tracing::info!(exact_key = %exact_key, duration_ms, "computado");
                Ok(Resolution::computed(
                    request.request_id.clone(),
                    exact_key,
                    payload,
                    duration_ms,
                ))
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                let failure = match &e {
                    VisageError::Processor { kind, message } => {
                        FailureInfo::new(kind.clone(), message.clone())
                    }
                    other => FailureInfo::new("ProcessorError", other.to_string()),
                };

                let entry = CacheEntry::failure(
                    exact_key.clone(),
                    perceptual_key,
                    &failure,
                    self.ttl_failure,
                    duration_ms,
                    request.request_id.clone(),
                );
                if let Err(store_err) = self.store.put(&entry).await {
                    tracing::warn!(exact_key = %exact_key, error = %store_err, "falha ao gravar entrada de falha");
                }

                self.counters.record_computed_failure();
                tracing::warn!(exact_key = %exact_key, kind = %failure.kind, "Processor falhou");
                Ok(Resolution::computed_failure(
                    request.request_id.clone(),
                    exact_key,
                    failure,
                    duration_ms,
                ))
            }
        }
    }

    /// Incremento de hit é best-effort e nunca bloqueia a resposta.
    async fn record_hit(&self, exact_key: &str) {
        if let Err(e) = self.store.increment_hit(exact_key).await {
            tracing::warn!(exact_key = %exact_key, error = %e, "falha ao incrementar hit count");
        }
    }

    /// Remove entradas expiradas e recolhíveis.
    pub async fn sweep(&self) -> VisageResult<usize> {
        let removed = self.store.sweep_expired(Utc::now()).await?;
        self.counters.record_swept(removed);
        if removed > 0 {
            tracing::info!(removed, "sweep removeu entradas");
        }
        Ok(removed)
    }

    /// Inicia o sweep periódico em background.
    pub fn start_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let resolver = Arc::clone(self);
        // Intervalo zero estouraria o tokio::time::interval
        let interval = resolver.sweep_interval.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // O primeiro tick dispara imediatamente
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = resolver.sweep().await {
                    tracing::warn!(error = %e, "sweep periódico falhou");
                }
            }
        })
    }

    /// Snapshot dos contadores do resolver.
    pub fn stats(&self) -> ResolverStats {
        self.counters.snapshot()
    }

    /// Chaves com computação em voo neste instante.
    pub fn in_flight(&self) -> usize {
        self.flight.in_flight()
    }
}

//! Armazenamento durável de resultados.
//!
//! O `ResultStore` é um mapa durável de chave exata → entrada, com um
//! índice secundário sobre a chave perceptual para buscas por
//! similaridade. Duas implementações: SQLite (durável) e memória
//! (testes e uso embutido). O store é injetado no resolver - nenhum
//! singleton ambiente.

mod entry;
pub mod eviction;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use entry::{CacheEntry, EntryStatus};
pub use eviction::RetentionPolicy;
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::fingerprint::PerceptualKey;
use crate::VisageResult;

/// Um candidato retornado por uma busca de similaridade.
#[derive(Debug, Clone)]
pub struct SimilarEntry {
    /// A entrada candidata.
    pub entry: CacheEntry,

    /// Distância de Hamming até a chave consultada.
    pub distance: u32,
}

/// Estatísticas agregadas do store.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Total de entradas armazenadas.
    pub total_entries: usize,

    /// Entradas com status Success.
    pub success_entries: usize,

    /// Entradas com status Failure.
    pub failure_entries: usize,

    /// Soma de todos os hit counts.
    pub total_hits: i64,

    /// Duração média de computação das entradas Success, em ms.
    pub avg_processing_ms: f64,
}

/// Mapa durável de resultados, compartilhado por todas as requisições.
///
/// Contratos:
/// - `get_by_exact_key` e `find_similar` se auto-filtram por tempo:
///   entradas expiradas nunca são retornadas, mesmo antes do sweep
/// - `put` é um upsert por chave exata (last-writer-wins; apenas o
///   líder do single-flight escreve uma chave nova)
/// - `increment_hit` é a única mutação permitida a não-líderes e é um
///   incremento atômico, nunca read-modify-write
/// - `sweep_expired` pode rodar concorrente a qualquer leitura; uma
///   leitura que corre com um delete apenas observa um miss
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Busca por chave exata. Miss quando ausente ou expirada.
    async fn get_by_exact_key(&self, exact_key: &str) -> VisageResult<Option<CacheEntry>>;

    /// Upsert por chave exata.
    async fn put(&self, entry: &CacheEntry) -> VisageResult<()>;

    /// Busca candidatos Success vivos a distância de Hamming
    /// `<= max_distance`, ordenados por (distância asc, criação desc).
    ///
    /// Chaves de largura diferente da consultada são incomparáveis e
    /// nunca retornadas.
    async fn find_similar(
        &self,
        perceptual_key: &PerceptualKey,
        max_distance: u32,
    ) -> VisageResult<Vec<SimilarEntry>>;

    /// Incrementa o hit count de uma entrada.
    async fn increment_hit(&self, exact_key: &str) -> VisageResult<()>;

    /// Remove entradas expiradas ou recolhíveis. Retorna quantas saíram.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> VisageResult<usize>;

    /// Estatísticas agregadas.
    async fn stats(&self) -> VisageResult<StoreStats>;

    /// Entradas mais recentes, para monitoramento.
    async fn recent(&self, limit: usize) -> VisageResult<Vec<CacheEntry>>;
}

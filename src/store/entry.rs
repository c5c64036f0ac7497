//! Modelo de entrada do cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fingerprint::PerceptualKey;
use crate::types::responses::{ArtifactPayload, FailureInfo};

/// Status de uma entrada armazenada.
///
/// `Pending` não existe aqui de propósito: é um estado local do
/// coordenador de single-flight e nunca é persistido.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Computação concluída com sucesso; payload presente.
    Success,
    /// Computação falhou; cacheada para evitar repetir falhas caras.
    Failure,
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Success => write!(f, "success"),
            EntryStatus::Failure => write!(f, "failure"),
        }
    }
}

impl EntryStatus {
    /// Parseia do texto armazenado.
    pub fn parse(s: &str) -> Self {
        match s {
            "success" => EntryStatus::Success,
            _ => EntryStatus::Failure,
        }
    }
}

/// Uma entrada do cache de resultados.
///
/// Imutável depois de criada, exceto pelo incremento de `hit_count` e
/// pela sobrescrita completa de um Success sob a mesma chave exata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Digest hex da requisição normalizada. Única entre entradas vivas.
    pub exact_key: String,

    /// Fingerprint do conteúdo visual. Colisões entre entradas não
    /// relacionadas são esperadas e intencionais.
    pub perceptual_key: Option<PerceptualKey>,

    /// Status da computação.
    pub status: EntryStatus,

    /// Payload do artefato; presente apenas quando `status = Success`.
    pub payload: Option<ArtifactPayload>,

    /// Tipo do erro; presente apenas quando `status = Failure`.
    pub error_kind: Option<String>,

    /// Mensagem do erro; presente apenas quando `status = Failure`.
    pub error_message: Option<String>,

    /// ID da requisição que computou esta entrada (observabilidade).
    pub task_id: String,

    /// Momento da criação.
    pub created_at: DateTime<Utc>,

    /// Momento de expiração (`created_at + ttl`).
    pub expires_at: DateTime<Utc>,

    /// Quantas vezes esta entrada foi reutilizada (exata ou perceptual).
    pub hit_count: i64,

    /// Duração da computação original em ms. Só observabilidade, nunca
    /// entra na lógica de cache.
    pub processing_duration_ms: f64,
}

impl CacheEntry {
    /// Cria uma entrada de sucesso com TTL a partir de agora.
    pub fn success(
        exact_key: impl Into<String>,
        perceptual_key: Option<PerceptualKey>,
        payload: ArtifactPayload,
        ttl: Duration,
        processing_duration_ms: f64,
        task_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            exact_key: exact_key.into(),
            perceptual_key,
            status: EntryStatus::Success,
            payload: Some(payload),
            error_kind: None,
            error_message: None,
            task_id: task_id.into(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            hit_count: 0,
            processing_duration_ms,
        }
    }

    /// Cria uma entrada de falha com TTL próprio (tipicamente menor).
    pub fn failure(
        exact_key: impl Into<String>,
        perceptual_key: Option<PerceptualKey>,
        failure: &FailureInfo,
        ttl: Duration,
        processing_duration_ms: f64,
        task_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            exact_key: exact_key.into(),
            perceptual_key,
            status: EntryStatus::Failure,
            payload: None,
            error_kind: Some(failure.kind.clone()),
            error_message: Some(failure.message.clone()),
            task_id: task_id.into(),
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            hit_count: 0,
            processing_duration_ms,
        }
    }

    /// Reconstrói a informação de falha desta entrada.
    pub fn failure_info(&self) -> Option<FailureInfo> {
        match self.status {
            EntryStatus::Failure => Some(FailureInfo::new(
                self.error_kind.clone().unwrap_or_else(|| "unknown".to_string()),
                self.error_message.clone().unwrap_or_default(),
            )),
            EntryStatus::Success => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::responses::PayloadMetadata;

    #[test]
    fn test_success_entry_shape() {
        let payload = ArtifactPayload::new(b"<svg/>".to_vec(), PayloadMetadata::default());
        let entry = CacheEntry::success(
            "abc",
            None,
            payload,
            Duration::from_secs(60),
            12.5,
            "task-1",
        );

        assert_eq!(entry.status, EntryStatus::Success);
        assert!(entry.payload.is_some());
        assert!(entry.error_kind.is_none());
        assert_eq!(entry.hit_count, 0);
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn test_failure_entry_shape() {
        let failure = FailureInfo::new("DecodeError", "bad image");
        let entry = CacheEntry::failure(
            "abc",
            None,
            &failure,
            Duration::from_secs(60),
            3.0,
            "task-2",
        );

        assert_eq!(entry.status, EntryStatus::Failure);
        assert!(entry.payload.is_none());
        assert_eq!(entry.failure_info().unwrap(), failure);
    }

    #[test]
    fn test_status_parse_roundtrip() {
        assert_eq!(EntryStatus::parse("success"), EntryStatus::Success);
        assert_eq!(EntryStatus::parse("failure"), EntryStatus::Failure);
        assert_eq!(
            EntryStatus::parse(&EntryStatus::Success.to_string()),
            EntryStatus::Success
        );
    }
}

//! Tipos de resposta do Visage.

use serde::{Deserialize, Serialize};

/// Metadados estruturados que acompanham o blob do artefato.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PayloadMetadata {
    /// Número de regiões detectadas.
    #[serde(default)]
    pub regions_detected: u32,

    /// Número de landmarks processados.
    #[serde(default)]
    pub landmarks_count: u32,

    /// Largura da imagem de entrada.
    #[serde(default)]
    pub image_width: u32,

    /// Altura da imagem de entrada.
    #[serde(default)]
    pub image_height: u32,

    /// Dados adicionais produzidos pelo Processor (contornos, etc.).
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Resultado opaco de uma computação: blob do artefato + metadados.
///
/// O blob é opaco para o núcleo de cache - qualquer formato de artefato
/// pode ser armazenado (o Processor de referência produz SVG).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactPayload {
    /// Conteúdo do artefato, base64 em JSON.
    #[serde(with = "blob_base64")]
    pub blob: Vec<u8>,

    /// Metadados estruturados.
    #[serde(default)]
    pub metadata: PayloadMetadata,
}

impl ArtifactPayload {
    /// Cria um novo payload.
    pub fn new(blob: Vec<u8>, metadata: PayloadMetadata) -> Self {
        Self { blob, metadata }
    }
}

mod blob_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Como uma requisição foi resolvida.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Hit exato: mesma requisição já computada.
    ExactHit,
    /// Hit perceptual: requisição visualmente quase idêntica já computada.
    PerceptualHit,
    /// Miss: computado agora com sucesso.
    Computed,
    /// Falha já cacheada, retornada sem recomputar.
    CachedFailure,
    /// Computado agora e o Processor falhou.
    ComputedFailure,
}

impl ResolutionOutcome {
    /// Se o payload veio do cache.
    pub fn is_cache_hit(&self) -> bool {
        matches!(
            self,
            ResolutionOutcome::ExactHit
                | ResolutionOutcome::PerceptualHit
                | ResolutionOutcome::CachedFailure
        )
    }

    /// Se a resolução terminou em falha (fresca ou cacheada).
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ResolutionOutcome::CachedFailure | ResolutionOutcome::ComputedFailure
        )
    }
}

impl std::fmt::Display for ResolutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionOutcome::ExactHit => write!(f, "EXACT_HIT"),
            ResolutionOutcome::PerceptualHit => write!(f, "PERCEPTUAL_HIT"),
            ResolutionOutcome::Computed => write!(f, "COMPUTED"),
            ResolutionOutcome::CachedFailure => write!(f, "CACHED_FAILURE"),
            ResolutionOutcome::ComputedFailure => write!(f, "COMPUTED_FAILURE"),
        }
    }
}

/// Informação de falha do Processor, com a mesma forma cacheada ou fresca.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureInfo {
    /// Tipo do erro.
    pub kind: String,

    /// Mensagem do erro.
    pub message: String,
}

impl FailureInfo {
    /// Cria uma nova informação de falha.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Resultado de uma resolução de cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// ID da requisição que originou esta resolução.
    pub request_id: String,

    /// Chave exata da requisição.
    pub exact_key: String,

    /// Como a requisição foi resolvida.
    pub outcome: ResolutionOutcome,

    /// Payload do artefato (presente em hits e computações com sucesso).
    pub payload: Option<ArtifactPayload>,

    /// Falha (presente em CachedFailure e ComputedFailure).
    pub failure: Option<FailureInfo>,

    /// Distância de Hamming do match perceptual, quando aplicável.
    pub distance: Option<u32>,

    /// Se o resultado veio do cache.
    pub from_cache: bool,

    /// Quantas vezes a entrada que serviu este resultado já foi reutilizada.
    pub hit_count: i64,

    /// Duração da computação original, em milissegundos.
    pub processing_duration_ms: f64,

    /// Timestamp da resolução.
    pub resolved_at: chrono::DateTime<chrono::Utc>,
}

impl Resolution {
    fn base(request_id: impl Into<String>, exact_key: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            exact_key: exact_key.into(),
            outcome: ResolutionOutcome::Computed,
            payload: None,
            failure: None,
            distance: None,
            from_cache: false,
            hit_count: 0,
            processing_duration_ms: 0.0,
            resolved_at: chrono::Utc::now(),
        }
    }

    /// Cria uma resolução de hit exato.
    pub fn exact_hit(
        request_id: impl Into<String>,
        exact_key: impl Into<String>,
        payload: ArtifactPayload,
        hit_count: i64,
        processing_duration_ms: f64,
    ) -> Self {
        Self {
            outcome: ResolutionOutcome::ExactHit,
            payload: Some(payload),
            from_cache: true,
            hit_count,
            processing_duration_ms,
            ..Self::base(request_id, exact_key)
        }
    }

    /// Cria uma resolução de hit perceptual.
    pub fn perceptual_hit(
        request_id: impl Into<String>,
        exact_key: impl Into<String>,
        payload: ArtifactPayload,
        distance: u32,
        hit_count: i64,
        processing_duration_ms: f64,
    ) -> Self {
        Self {
            outcome: ResolutionOutcome::PerceptualHit,
            payload: Some(payload),
            distance: Some(distance),
            from_cache: true,
            hit_count,
            processing_duration_ms,
            ..Self::base(request_id, exact_key)
        }
    }

    /// Cria uma resolução computada agora.
    pub fn computed(
        request_id: impl Into<String>,
        exact_key: impl Into<String>,
        payload: ArtifactPayload,
        processing_duration_ms: f64,
    ) -> Self {
        Self {
            outcome: ResolutionOutcome::Computed,
            payload: Some(payload),
            processing_duration_ms,
            ..Self::base(request_id, exact_key)
        }
    }

    /// Cria uma resolução de falha cacheada.
    pub fn cached_failure(
        request_id: impl Into<String>,
        exact_key: impl Into<String>,
        failure: FailureInfo,
    ) -> Self {
        Self {
            outcome: ResolutionOutcome::CachedFailure,
            failure: Some(failure),
            from_cache: true,
            ..Self::base(request_id, exact_key)
        }
    }

    /// Cria uma resolução de falha fresca do Processor.
    pub fn computed_failure(
        request_id: impl Into<String>,
        exact_key: impl Into<String>,
        failure: FailureInfo,
        processing_duration_ms: f64,
    ) -> Self {
        Self {
            outcome: ResolutionOutcome::ComputedFailure,
            failure: Some(failure),
            processing_duration_ms,
            ..Self::base(request_id, exact_key)
        }
    }
}

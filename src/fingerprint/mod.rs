//! Derivação de chaves de cache.
//!
//! Este módulo deriva as duas chaves de uma requisição:
//!
//! - chave exata: digest SHA-256 da serialização canônica de todos os
//!   insumos (pixels, landmarks, parâmetros)
//! - chave perceptual: fingerprint DCT do conteúdo visual, tolerante a
//!   re-encoding

mod exact;
mod perceptual;

pub use exact::exact_key;
pub use perceptual::{PerceptualHasher, PerceptualKey};

use crate::types::config::PerceptualConfig;
use crate::types::requests::ArtifactRequest;
use crate::{VisageError, VisageResult};

/// Motor de fingerprint: deriva as chaves exata e perceptual.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    hasher: PerceptualHasher,
    perceptual_enabled: bool,
}

impl FingerprintEngine {
    /// Cria o motor a partir da configuração perceptual.
    pub fn new(config: &PerceptualConfig) -> Self {
        Self {
            hasher: PerceptualHasher::new(config),
            perceptual_enabled: config.enabled,
        }
    }

    /// Deriva a chave exata. Falha de derivação é fatal para a requisição.
    pub fn exact_key(&self, request: &ArtifactRequest) -> VisageResult<String> {
        exact_key(request)
    }

    /// Deriva a chave perceptual da imagem da requisição.
    ///
    /// Retorna `None` quando desabilitado ou quando a derivação falha -
    /// o chamador segue apenas pelo caminho exato, nunca aborta.
    pub fn perceptual_key(&self, request: &ArtifactRequest) -> Option<PerceptualKey> {
        if !self.perceptual_enabled {
            return None;
        }
        match self.hasher.hash(&request.image) {
            Ok(key) => Some(key),
            Err(VisageError::PerceptualHashUnavailable(reason)) => {
                tracing::warn!(
                    request_id = %request.request_id,
                    %reason,
                    "chave perceptual indisponível, seguindo só pelo caminho exato"
                );
                None
            }
            Err(e) => {
                tracing::warn!(request_id = %request.request_id, error = %e, "falha inesperada no hash perceptual");
                None
            }
        }
    }

    /// Largura em bits das chaves perceptuais deste motor.
    pub fn key_len(&self) -> u16 {
        self.hasher.key_len()
    }
}

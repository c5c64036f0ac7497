//! Derivação da chave exata.
//!
//! A chave exata é um digest SHA-256 sobre a serialização canônica de
//! todos os insumos que afetam o artefato gerado: pixels da imagem,
//! landmarks (em ordem verbatim), mapa de segmentação e parâmetros de
//! geração. Qualquer mudança em qualquer um deles muda o digest.

use sha2::{Digest, Sha256};

use crate::types::requests::{ArtifactRequest, ImageBuffer};
use crate::{VisageError, VisageResult};

/// Tag de domínio: versiona o formato da serialização canônica.
const DOMAIN_TAG: &[u8] = b"visage.exact.v1";

/// Deriva a chave exata de uma requisição.
///
/// Retorna o digest em hex minúsculo com 64 caracteres.
pub fn exact_key(request: &ArtifactRequest) -> VisageResult<String> {
    if !request.image.is_well_formed() {
        return Err(VisageError::KeyDerivation(format!(
            "buffer de imagem inconsistente: {}x{}x{} com {} bytes",
            request.image.width,
            request.image.height,
            request.image.channels,
            request.image.data.len()
        )));
    }
    if let Some(map) = &request.segmentation_map {
        if !map.is_well_formed() {
            return Err(VisageError::KeyDerivation(
                "mapa de segmentação inconsistente".to_string(),
            ));
        }
    }
    for (i, lm) in request.landmarks.iter().enumerate() {
        if !lm.x.is_finite() || !lm.y.is_finite() {
            return Err(VisageError::KeyDerivation(format!(
                "landmark {} com coordenada não-finita",
                i
            )));
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);

    // Digest do conteúdo da imagem (dimensões + pixels)
    hasher.update(image_digest(&request.image));

    // Landmarks em ordem verbatim - a ordem dos pontos é significativa
    hasher.update((request.landmarks.len() as u64).to_le_bytes());
    for lm in &request.landmarks {
        hasher.update(lm.x.to_le_bytes());
        hasher.update(lm.y.to_le_bytes());
    }

    // Mapa de segmentação, quando presente
    match &request.segmentation_map {
        Some(map) => {
            hasher.update([1u8]);
            hasher.update(image_digest(map));
        }
        None => hasher.update([0u8]),
    }

    // Parâmetros de geração
    hasher.update([request.params.show_landmarks as u8]);
    // Floats arredondados a 2 casas antes do hash, evitando que ruído de
    // precisão fragmente o cache
    hasher.update(round_centi(request.params.region_opacity).to_le_bytes());
    hasher.update(round_centi(request.params.stroke_width).to_le_bytes());

    // Regiões customizadas em ordem de declaração
    match &request.params.regions {
        Some(regions) => {
            hasher.update((regions.len() as u64).to_le_bytes());
            for region in regions {
                hasher.update((region.name.len() as u64).to_le_bytes());
                hasher.update(region.name.as_bytes());
                hasher.update((region.indices.len() as u64).to_le_bytes());
                for idx in &region.indices {
                    hasher.update((*idx as u64).to_le_bytes());
                }
                hasher.update((region.color.len() as u64).to_le_bytes());
                hasher.update(region.color.as_bytes());
            }
        }
        None => hasher.update(u64::MAX.to_le_bytes()),
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Digest SHA-256 de um buffer de pixels (dimensões incluídas).
fn image_digest(image: &ImageBuffer) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(image.width.to_le_bytes());
    hasher.update(image.height.to_le_bytes());
    hasher.update([image.channels]);
    hasher.update(&image.data);
    hasher.finalize().into()
}

/// Arredonda para centésimos e converte para inteiro estável.
fn round_centi(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

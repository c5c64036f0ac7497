//! Processor: o colaborador externo que gera o artefato.
//!
//! O núcleo de cache consome esta interface como uma capacidade opaca
//! e determinística - a mesma requisição sempre produz um payload
//! equivalente. Qualquer não-determinismo aqui mina as garantias do
//! cache e é assumido fora.
//!
//! `RegionSvgProcessor` é a implementação de referência: recorta
//! regiões faciais a partir dos landmarks e gera um SVG com as máscaras
//! preenchidas.

mod regions;
mod svg;

pub use regions::{default_regions, simplify_contour, Region};
pub use svg::RegionSvgProcessor;

use async_trait::async_trait;

use crate::types::requests::ArtifactRequest;
use crate::types::responses::ArtifactPayload;
use crate::VisageResult;

/// Geração de artefato a partir de uma requisição.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Nome do processor (observabilidade).
    fn name(&self) -> &str;

    /// Processa a requisição e produz o payload.
    ///
    /// Falhas devem sair como `VisageError::Processor`; o resolver as
    /// cacheia como entradas Failure.
    async fn process(&self, request: &ArtifactRequest) -> VisageResult<ArtifactPayload>;
}

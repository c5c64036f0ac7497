//! Processor de referência: SVG com máscaras de regiões faciais.

use async_trait::async_trait;

use super::regions::{default_regions, region_contour, simplify_contour, Region};
use super::Processor;
use crate::types::requests::ArtifactRequest;
use crate::types::responses::{ArtifactPayload, PayloadMetadata};
use crate::{VisageError, VisageResult};

/// Epsilon do Douglas-Peucker na suavização de contornos.
const SMOOTHING_EPSILON: f64 = 2.0;

/// Gera um SVG com as regiões faciais preenchidas sobre as dimensões
/// da imagem de entrada.
///
/// Determinístico por construção: mesma requisição, mesmo documento.
pub struct RegionSvgProcessor;

impl RegionSvgProcessor {
    /// Cria o processor.
    pub fn new() -> Self {
        Self
    }

    fn render_svg(
        &self,
        request: &ArtifactRequest,
        contours: &[(String, Vec<(f64, f64)>, String)],
    ) -> String {
        let width = request.image.width;
        let height = request.image.height;
        let params = &request.params;

        let mut svg = Vec::new();
        svg.push("<?xml version=\"1.0\" encoding=\"UTF-8\"?>".to_string());
        svg.push(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
            w = width,
            h = height
        ));
        svg.push("<defs>".to_string());
        svg.push("  <style>".to_string());
        svg.push(format!(
            "    .region {{ stroke: #FFFFFF40; stroke-width: {:.1}; opacity: {:.2}; }}",
            params.stroke_width, params.region_opacity
        ));
        svg.push("    .landmark { fill: #FFFFFF; opacity: 0.3; }".to_string());
        svg.push("  </style>".to_string());
        svg.push("</defs>".to_string());
        svg.push(format!(
            "<rect width=\"{}\" height=\"{}\" fill=\"none\"/>",
            width, height
        ));

        for (name, contour, color) in contours {
            let points = contour
                .iter()
                .map(|(x, y)| format!("{:.2},{:.2}", x, y))
                .collect::<Vec<_>>()
                .join(" ");
            svg.push(format!(
                "<polygon id=\"{}\" class=\"region\" points=\"{}\" fill=\"{}\"/>",
                name, points, color
            ));
        }

        if params.show_landmarks {
            svg.push("<g id=\"landmarks\">".to_string());
            for lm in &request.landmarks {
                svg.push(format!(
                    "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"1\" class=\"landmark\"/>",
                    lm.x, lm.y
                ));
            }
            svg.push("</g>".to_string());
        }

        svg.push("</svg>".to_string());
        svg.join("\n")
    }
}

impl Default for RegionSvgProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Processor for RegionSvgProcessor {
    fn name(&self) -> &str {
        "region-svg"
    }

    async fn process(&self, request: &ArtifactRequest) -> VisageResult<ArtifactPayload> {
        if !request.image.is_well_formed() {
            return Err(VisageError::processor(
                "InvalidImage",
                "buffer de imagem inconsistente",
            ));
        }

        if let Some(map) = &request.segmentation_map {
            if !map.is_well_formed() {
                return Err(VisageError::processor(
                    "InvalidSegmentationMap",
                    "mapa de segmentação inconsistente",
                ));
            }
            if map.width != request.image.width || map.height != request.image.height {
                return Err(VisageError::processor(
                    "DimensionMismatch",
                    format!(
                        "imagem {}x{} e mapa de segmentação {}x{} têm dimensões diferentes",
                        request.image.width, request.image.height, map.width, map.height
                    ),
                ));
            }
        }

        let regions: Vec<Region> = match &request.params.regions {
            Some(specs) => specs.iter().map(Region::from).collect(),
            None => default_regions(),
        };

        // Extrai e suaviza os contornos com pelo menos 3 pontos
        let mut contours = Vec::new();
        for region in &regions {
            let contour = region_contour(&request.landmarks, &region.indices);
            if contour.len() < 3 {
                continue;
            }
            let smoothed = simplify_contour(&contour, SMOOTHING_EPSILON);
            contours.push((region.name.clone(), smoothed, region.color.clone()));
        }

        tracing::debug!(
            request_id = %request.request_id,
            regions = contours.len(),
            "contornos extraídos"
        );

        let svg = self.render_svg(request, &contours);

        let contour_json: serde_json::Value = serde_json::to_value(
            contours
                .iter()
                .map(|(name, points, _)| (name.clone(), points.clone()))
                .collect::<std::collections::BTreeMap<_, _>>(),
        )?;

        Ok(ArtifactPayload::new(
            svg.into_bytes(),
            PayloadMetadata {
                regions_detected: contours.len() as u32,
                landmarks_count: request.landmarks.len() as u32,
                image_width: request.image.width,
                image_height: request.image.height,
                extra: serde_json::json!({ "mask_contours": contour_json }),
            },
        ))
    }
}

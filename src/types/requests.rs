//! Tipos de requisição do Visage.

use serde::{Deserialize, Serialize};

/// Buffer de pixels decodificado.
///
/// O Visage opera sobre pixels já decodificados - decodificar o formato
/// do container (PNG, JPEG) é responsabilidade da camada de API ou do
/// Processor. Isso mantém a chave perceptual estável sob re-encoding:
/// o mesmo conteúdo visual produz o mesmo buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageBuffer {
    /// Largura em pixels.
    pub width: u32,

    /// Altura em pixels.
    pub height: u32,

    /// Canais por pixel (1 = luma, 3 = RGB, 4 = RGBA).
    pub channels: u8,

    /// Dados dos pixels, row-major, base64 em JSON.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl ImageBuffer {
    /// Cria um novo buffer de pixels.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Verifica se as dimensões são consistentes com os dados.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && matches!(self.channels, 1 | 3 | 4)
            && self.data.len()
                == (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }
}

/// Serializa `Vec<u8>` como base64 em JSON.
mod base64_bytes {
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

/// Um ponto de landmark facial.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    /// Coordenada X.
    pub x: f64,

    /// Coordenada Y.
    pub y: f64,
}

impl Landmark {
    /// Cria um novo landmark.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Definição de uma região facial customizada.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSpec {
    /// Nome da região (vira o id do polígono no SVG).
    pub name: String,

    /// Índices dos landmarks que formam o contorno, em ordem.
    pub indices: Vec<usize>,

    /// Cor de preenchimento (hex RGBA, ex.: "#FF6B6B80").
    pub color: String,
}

/// Parâmetros de geração que afetam o artefato produzido.
///
/// Todos participam da chave exata: qualquer mudança aqui muda o digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    /// Desenha os pontos de landmark no SVG.
    #[serde(default)]
    pub show_landmarks: bool,

    /// Opacidade das máscaras de região (0.0 a 1.0).
    #[serde(default = "default_region_opacity")]
    pub region_opacity: f64,

    /// Largura do traço dos contornos.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,

    /// Regiões customizadas. `None` usa o conjunto padrão do Processor.
    #[serde(default)]
    pub regions: Option<Vec<RegionSpec>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            show_landmarks: false,
            region_opacity: default_region_opacity(),
            stroke_width: default_stroke_width(),
            regions: None,
        }
    }
}

impl GenerationParams {
    /// Deriva parâmetros dos padrões configurados do Processor.
    pub fn from_config(config: &crate::types::config::ProcessorConfig) -> Self {
        Self {
            show_landmarks: config.show_landmarks,
            region_opacity: config.region_opacity,
            stroke_width: config.stroke_width,
            regions: None,
        }
    }
}

fn default_region_opacity() -> f64 {
    0.7
}

fn default_stroke_width() -> f64 {
    1.5
}

/// Requisição de geração de artefato.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRequest {
    /// ID único da requisição.
    pub request_id: String,

    /// Imagem de entrada.
    pub image: ImageBuffer,

    /// Landmarks faciais, em ordem significativa (nunca reordenados).
    pub landmarks: Vec<Landmark>,

    /// Mapa de segmentação opcional.
    pub segmentation_map: Option<ImageBuffer>,

    /// Parâmetros de geração.
    #[serde(default)]
    pub params: GenerationParams,
}

impl ArtifactRequest {
    /// Cria uma nova requisição com ID gerado.
    pub fn new(image: ImageBuffer, landmarks: Vec<Landmark>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            image,
            landmarks,
            segmentation_map: None,
            params: GenerationParams::default(),
        }
    }

    /// Define o mapa de segmentação.
    pub fn with_segmentation_map(mut self, map: ImageBuffer) -> Self {
        self.segmentation_map = Some(map);
        self
    }

    /// Define os parâmetros de geração.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

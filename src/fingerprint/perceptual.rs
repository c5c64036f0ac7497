//! Chave perceptual baseada em DCT.
//!
//! A chave é derivada apenas do conteúdo visual: luminância, downsample
//! para uma grade fixa, DCT-II 2D, bloco de baixa frequência sem o termo
//! DC, binarização contra a mediana do bloco. Estável sob re-encoding e
//! recompressão leve do mesmo conteúdo; muda substancialmente para
//! imagens visualmente distintas.

use serde::{Deserialize, Serialize};

use crate::types::config::PerceptualConfig;
use crate::types::requests::ImageBuffer;
use crate::{VisageError, VisageResult};

/// Chave perceptual: bitstring de largura fixa, empacotada MSB-first.
///
/// A largura viaja com a chave. Comparações só são válidas entre chaves
/// da mesma largura - larguras diferentes são incomparáveis, nunca
/// truncadas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualKey {
    bits: Vec<u8>,
    len: u16,
}

impl PerceptualKey {
    /// Constrói a chave a partir de bits individuais.
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut packed = vec![0u8; bits.len().div_ceil(8)];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                packed[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Self {
            bits: packed,
            len: bits.len() as u16,
        }
    }

    /// Largura da chave em bits.
    pub fn len(&self) -> u16 {
        self.len
    }

    /// Se a chave está vazia.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Codifica os bits empacotados em hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bits)
    }

    /// Decodifica de hex com a largura registrada.
    pub fn from_hex(encoded: &str, len: u16) -> VisageResult<Self> {
        let bits = hex::decode(encoded)
            .map_err(|e| VisageError::other(format!("chave perceptual inválida: {}", e)))?;
        if bits.len() != (len as usize).div_ceil(8) {
            return Err(VisageError::other(format!(
                "chave perceptual com {} bytes não comporta {} bits",
                bits.len(),
                len
            )));
        }
        Ok(Self { bits, len })
    }

    /// Distância de Hamming entre duas chaves.
    ///
    /// Retorna `None` quando as larguras diferem (incomparável).
    pub fn hamming_distance(&self, other: &PerceptualKey) -> Option<u32> {
        if self.len != other.len {
            return None;
        }
        let distance = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(&a, &b)| (a ^ b).count_ones())
            .sum();
        Some(distance)
    }
}

/// Hasher perceptual com grade configurável.
#[derive(Debug, Clone)]
pub struct PerceptualHasher {
    grid_size: u32,
}

impl PerceptualHasher {
    /// Cria um hasher a partir da configuração.
    pub fn new(config: &PerceptualConfig) -> Self {
        Self {
            grid_size: config.grid_size.max(8),
        }
    }

    /// Cria um hasher com a grade padrão (32).
    pub fn default_config() -> Self {
        Self::new(&PerceptualConfig::default())
    }

    /// Lado do bloco de baixa frequência retido.
    fn block_size(&self) -> usize {
        (self.grid_size as usize / 4).max(2)
    }

    /// Largura em bits das chaves produzidas por este hasher.
    pub fn key_len(&self) -> u16 {
        (self.block_size() * self.block_size() - 1) as u16
    }

    /// Deriva a chave perceptual de um buffer de pixels.
    ///
    /// Falha com `PerceptualHashUnavailable` para buffers malformados -
    /// não-fatal: o chamador degrada para o caminho exato.
    pub fn hash(&self, image: &ImageBuffer) -> VisageResult<PerceptualKey> {
        if !image.is_well_formed() {
            return Err(VisageError::PerceptualHashUnavailable(format!(
                "buffer de imagem inconsistente: {}x{}x{} com {} bytes",
                image.width,
                image.height,
                image.channels,
                image.data.len()
            )));
        }

        let grid = self.grid_size as usize;
        let luma = luminance(image);
        let small = downsample(&luma, image.width as usize, image.height as usize, grid);
        let coeffs = dct_2d(&small, grid);

        // Bloco de baixa frequência em ordem raster, sem o termo DC
        let block = self.block_size();
        let mut retained = Vec::with_capacity(block * block - 1);
        for v in 0..block {
            for u in 0..block {
                if u == 0 && v == 0 {
                    continue;
                }
                retained.push(coeffs[v * grid + u]);
            }
        }

        // Binariza contra a mediana do bloco retido
        let median = median_of(&retained);
        let bits: Vec<bool> = retained.iter().map(|&c| c > median).collect();

        Ok(PerceptualKey::from_bits(&bits))
    }
}

/// Converte para luminância (Rec. 601) em f32 por pixel.
fn luminance(image: &ImageBuffer) -> Vec<f32> {
    let pixels = (image.width * image.height) as usize;
    let channels = image.channels as usize;
    let mut luma = Vec::with_capacity(pixels);

    match channels {
        1 => luma.extend(image.data.iter().map(|&p| p as f32)),
        _ => {
            // 3 ou 4 canais; alfa ignorado
            for px in image.data.chunks_exact(channels) {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                luma.push(y);
            }
        }
    }

    luma
}

/// Downsample por média de blocos para uma grade `grid x grid`.
fn downsample(luma: &[f32], width: usize, height: usize, grid: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(grid * grid);

    for gy in 0..grid {
        let y0 = gy * height / grid;
        let y1 = ((gy + 1) * height / grid).max(y0 + 1).min(height.max(1));
        for gx in 0..grid {
            let x0 = gx * width / grid;
            let x1 = ((gx + 1) * width / grid).max(x0 + 1).min(width.max(1));

            let mut sum = 0.0f32;
            let mut count = 0u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    // Imagens menores que a grade repetem o último pixel
                    let sy = y.min(height - 1);
                    let sx = x.min(width - 1);
                    sum += luma[sy * width + sx];
                    count += 1;
                }
            }
            out.push(sum / count.max(1) as f32);
        }
    }

    out
}

/// DCT-II 1D direta, O(n²).
///
/// Os tamanhos aqui são fixos e pequenos (<= 64), a faixa onde a forma
/// direta ganha de FFT pelo overhead do plano.
fn dct_1d_direct(input: &[f32], output: &mut [f32]) {
    let n = input.len();
    let scale = (2.0 / n as f32).sqrt();

    for (k, out_k) in output.iter_mut().enumerate().take(n) {
        let mut sum = 0.0f32;
        for (i, &inp_i) in input.iter().enumerate() {
            sum += inp_i * (std::f32::consts::PI * k as f32 * (i as f32 + 0.5) / n as f32).cos();
        }
        *out_k = sum * scale;
    }

    output[0] /= std::f32::consts::SQRT_2;
}

/// DCT-II 2D separável: linhas, depois colunas.
fn dct_2d(input: &[f32], n: usize) -> Vec<f32> {
    let mut rows = vec![0.0f32; n * n];
    let mut row_out = vec![0.0f32; n];
    for y in 0..n {
        dct_1d_direct(&input[y * n..(y + 1) * n], &mut row_out);
        rows[y * n..(y + 1) * n].copy_from_slice(&row_out);
    }

    let mut out = vec![0.0f32; n * n];
    let mut col_in = vec![0.0f32; n];
    let mut col_out = vec![0.0f32; n];
    for x in 0..n {
        for y in 0..n {
            col_in[y] = rows[y * n + x];
        }
        dct_1d_direct(&col_in, &mut col_out);
        for y in 0..n {
            out[y * n + x] = col_out[y];
        }
    }

    out
}

/// Mediana por ordenação de uma cópia.
fn median_of(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted[sorted.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Padrão radial: espectro denso, coeficientes longe da mediana.
    fn radial_image(width: u32, height: u32) -> ImageBuffer {
        let cx = width as f64 / 2.0;
        let cy = height as f64 / 2.0;
        let max_d = (cx * cx + cy * cy).sqrt();
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                let d = (dx * dx + dy * dy).sqrt();
                data.push((d * 200.0 / max_d) as u8);
            }
        }
        ImageBuffer::new(width, height, 1, data)
    }

    fn checker_image(width: u32, height: u32, cell: u32) -> ImageBuffer {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                data.push(if on { 230 } else { 20 });
            }
        }
        ImageBuffer::new(width, height, 1, data)
    }

    #[test]
    fn test_key_is_deterministic() {
        let hasher = PerceptualHasher::default_config();
        let image = radial_image(64, 64);

        let a = hasher.hash(&image).unwrap();
        let b = hasher.hash(&image).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 63);
    }

    #[test]
    fn test_uniform_brightness_shift_preserves_key() {
        let hasher = PerceptualHasher::default_config();
        let image = radial_image(64, 64);
        let mut brighter = image.clone();
        for px in brighter.data.iter_mut() {
            *px = px.saturating_add(10).min(245);
        }

        let a = hasher.hash(&image).unwrap();
        let b = hasher.hash(&brighter).unwrap();

        // Um deslocamento uniforme só move o termo DC, que é descartado
        let distance = a.hamming_distance(&b).unwrap();
        assert!(distance <= 2, "distância {} alta demais", distance);
    }

    #[test]
    fn test_distinct_images_are_distant() {
        let hasher = PerceptualHasher::default_config();
        let a = hasher.hash(&radial_image(64, 64)).unwrap();
        let b = hasher.hash(&checker_image(64, 64, 8)).unwrap();

        let distance = a.hamming_distance(&b).unwrap();
        assert!(distance > 10, "distância {} baixa demais", distance);
    }

    #[test]
    fn test_rgb_and_luma_agree() {
        let hasher = PerceptualHasher::default_config();
        let luma = radial_image(32, 32);
        let mut rgb_data = Vec::with_capacity(luma.data.len() * 3);
        for &p in &luma.data {
            rgb_data.extend_from_slice(&[p, p, p]);
        }
        let rgb = ImageBuffer::new(32, 32, 3, rgb_data);

        let a = hasher.hash(&luma).unwrap();
        let b = hasher.hash(&rgb).unwrap();
        let distance = a.hamming_distance(&b).unwrap();
        assert!(distance <= 1, "distância {} entre luma e RGB cinza", distance);
    }

    #[test]
    fn test_malformed_buffer_is_unavailable() {
        let hasher = PerceptualHasher::default_config();
        let image = ImageBuffer::new(4, 4, 1, vec![0u8; 3]);

        let err = hasher.hash(&image).unwrap_err();
        assert!(matches!(err, VisageError::PerceptualHashUnavailable(_)));
    }

    #[test]
    fn test_different_widths_incomparable() {
        let a = PerceptualKey::from_bits(&[true; 63]);
        let b = PerceptualKey::from_bits(&[true; 15]);

        assert_eq!(a.hamming_distance(&b), None);
    }

    #[test]
    fn test_hamming_distance_counts_bits() {
        let mut bits_a = vec![false; 63];
        let mut bits_b = vec![false; 63];
        bits_b[0] = true;
        bits_b[10] = true;
        bits_b[62] = true;

        let a = PerceptualKey::from_bits(&bits_a);
        let b = PerceptualKey::from_bits(&bits_b);
        assert_eq!(a.hamming_distance(&b), Some(3));

        bits_a[10] = true;
        let a = PerceptualKey::from_bits(&bits_a);
        assert_eq!(a.hamming_distance(&b), Some(2));
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = PerceptualKey::from_bits(&[true, false, true, true, false, false, true]);
        let restored = PerceptualKey::from_hex(&key.to_hex(), key.len()).unwrap();

        assert_eq!(restored, key);
        assert_eq!(restored.hamming_distance(&key), Some(0));
    }

    #[test]
    fn test_hex_wrong_len_rejected() {
        let key = PerceptualKey::from_bits(&[true; 63]);
        assert!(PerceptualKey::from_hex(&key.to_hex(), 128).is_err());
    }

    #[test]
    fn test_small_image_still_hashes() {
        let hasher = PerceptualHasher::default_config();
        let image = radial_image(8, 8);

        let key = hasher.hash(&image).unwrap();
        assert_eq!(key.len(), 63);
    }
}

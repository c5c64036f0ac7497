//! Regiões faciais e geometria de contornos.

use crate::types::requests::{Landmark, RegionSpec};

/// Uma região facial resolvida: nome, contorno e cor.
#[derive(Debug, Clone)]
pub struct Region {
    /// Nome da região (vira o id do polígono no SVG).
    pub name: String,

    /// Índices dos landmarks do contorno, em ordem.
    pub indices: Vec<usize>,

    /// Cor de preenchimento (hex RGBA).
    pub color: String,
}

impl From<&RegionSpec> for Region {
    fn from(spec: &RegionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            indices: spec.indices.clone(),
            color: spec.color.clone(),
        }
    }
}

/// Conjunto padrão de regiões para a malha de 478 landmarks do
/// MediaPipe FaceMesh.
pub fn default_regions() -> Vec<Region> {
    let table: &[(&str, &[usize], &str)] = &[
        (
            "left_eye",
            &[33, 7, 163, 144, 145, 153, 154, 155, 133, 173, 157, 158, 159, 160, 161, 246],
            "#FF6B6B80",
        ),
        (
            "right_eye",
            &[263, 249, 390, 373, 374, 380, 381, 382, 362, 398, 384, 385, 386, 387, 388, 466],
            "#4ECDC480",
        ),
        (
            "left_eyebrow",
            &[70, 63, 105, 66, 107, 55, 65, 52, 53, 46],
            "#45B7D180",
        ),
        (
            "right_eyebrow",
            &[300, 293, 334, 296, 336, 285, 295, 282, 283, 276],
            "#FFA07A80",
        ),
        (
            "nose",
            &[168, 6, 197, 195, 5, 4, 1, 19, 94, 2, 326, 327, 294, 278, 344, 440, 275, 4],
            "#98D8C880",
        ),
        (
            "upper_lip",
            &[
                61, 185, 40, 39, 37, 0, 267, 269, 270, 409, 291, 308, 415, 310, 311, 312, 13, 82,
                81, 80, 191, 78,
            ],
            "#F7DC6F80",
        ),
        (
            "lower_lip",
            &[
                61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 308, 324, 318, 402, 317, 14, 87,
                178, 88, 95, 78,
            ],
            "#BB8FCE80",
        ),
        (
            "face_oval",
            &[
                10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400,
                377, 152, 148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103,
                67, 109,
            ],
            "#85C1E980",
        ),
        ("left_cheek", &[50, 101, 36, 205, 123, 203], "#F8B88B80"),
        ("right_cheek", &[280, 330, 266, 425, 352, 423], "#ABEBC680"),
    ];

    table
        .iter()
        .map(|(name, indices, color)| Region {
            name: name.to_string(),
            indices: indices.to_vec(),
            color: color.to_string(),
        })
        .collect()
}

/// Extrai os pontos do contorno de uma região.
///
/// Índices fora da faixa de landmarks são ignorados.
pub fn region_contour(landmarks: &[Landmark], indices: &[usize]) -> Vec<(f64, f64)> {
    indices
        .iter()
        .filter_map(|&idx| landmarks.get(idx).map(|lm| (lm.x, lm.y)))
        .collect()
}

/// Simplifica um contorno com Douglas-Peucker.
///
/// Contornos com menos de 3 pontos voltam inalterados.
pub fn simplify_contour(contour: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    douglas_peucker(contour, epsilon)
}

fn douglas_peucker(points: &[(f64, f64)], epsilon: f64) -> Vec<(f64, f64)> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;
    for (i, &p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance(p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        let mut left = douglas_peucker(&points[..=max_idx], epsilon);
        let right = douglas_peucker(&points[max_idx..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

fn perpendicular_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let norm = (dx * dx + dy * dy).sqrt();
    if norm < f64::EPSILON {
        let (ex, ey) = (p.0 - a.0, p.1 - a.1);
        return (ex * ex + ey * ey).sqrt();
    }
    ((dy * p.0 - dx * p.1 + b.0 * a.1 - b.1 * a.0) / norm).abs()
}

//! Face geometry: landmark alignment, crops and bilinear resampling.
//!
//! Every buffer here is packed RGB8, row-major, three bytes per pixel.
//!
//! Aligned faces are warped onto the five InsightFace reference landmarks
//! with a least-squares 4-DOF similarity transform.

/// Side of the square face crop fed to ArcFace.
pub const ALIGNED_SIZE: usize = 112;

/// Bytes per pixel in packed RGB8.
pub const CHANNELS: usize = 3;

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Similarity transform `[a, -b, tx, b, a, ty]` mapping `src` onto `dst`.
fn estimate_similarity_transform(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Normal equations for:
    //   sx * a - sy * b + tx = dx
    //   sy * a + sx * b + ty = dy
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let r1 = [sx, -sy, 1.0, 0.0];
        let r2 = [sy, sx, 0.0, 1.0];
        for j in 0..4 {
            for k in 0..4 {
                ata[j][k] += r1[j] * r1[k] + r2[j] * r2[k];
            }
            atb[j] += r1[j] * dx + r2[j] * dy;
        }
    }

    let [a, b, tx, ty] = solve_4x4(ata, atb).unwrap_or([1.0, 0.0, 0.0, 0.0]);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting. `None` when singular.
#[allow(clippy::needless_range_loop)]
fn solve_4x4(a: [[f32; 4]; 4], b: [f32; 4]) -> Option<[f32; 4]> {
    let mut m = [[0.0f32; 5]; 4];
    for i in 0..4 {
        m[i][..4].copy_from_slice(&a[i]);
        m[i][4] = b[i];
    }

    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&r1, &r2| m[r1][col].abs().total_cmp(&m[r2][col].abs()))?;
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (m[i][4] - tail) / m[i][i];
    }
    Some(x)
}

/// Bilinear sample of all three channels, black outside the image.
fn sample_bilinear(rgb: &[u8], width: usize, height: usize, sx: f32, sy: f32) -> [f32; CHANNELS] {
    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let px = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
            rgb[(y as usize * width + x as usize) * CHANNELS + c] as f32
        } else {
            0.0
        }
    };

    std::array::from_fn(|c| {
        px(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
            + px(x0 + 1, y0, c) * fx * (1.0 - fy)
            + px(x0, y0 + 1, c) * (1.0 - fx) * fy
            + px(x0 + 1, y0 + 1, c) * fx * fy
    })
}

/// Warp by the inverse of a similarity matrix into an `out_size` square.
fn warp_affine(rgb: &[u8], width: usize, height: usize, matrix: &[f32; 6], out_size: usize) -> Vec<u8> {
    let (a, tx, b, ty) = (matrix[0], matrix[2], matrix[3], matrix[5]);

    let mut output = vec![0u8; out_size * out_size * CHANNELS];
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return output;
    }
    let ia = a / det;
    let ib = b / det;

    for (i, pixel) in output.chunks_exact_mut(CHANNELS).enumerate() {
        let dx = (i % out_size) as f32 - tx;
        let dy = (i / out_size) as f32 - ty;
        let sx = ia * dx + ib * dy;
        let sy = -ib * dx + ia * dy;
        let sample = sample_bilinear(rgb, width, height, sx, sy);
        for (out, v) in pixel.iter_mut().zip(sample) {
            *out = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

/// Align a face to a canonical 112×112 RGB crop from its five landmarks.
pub fn align_face(rgb: &[u8], width: u32, height: u32, landmarks: &[(f32, f32); 5]) -> Vec<u8> {
    let matrix = estimate_similarity_transform(landmarks, &REFERENCE_LANDMARKS_112);
    warp_affine(rgb, width as usize, height as usize, &matrix, ALIGNED_SIZE)
}

/// Resize an RGB buffer with half-pixel-centred bilinear interpolation.
///
/// Source coordinates are clamped to the image edge.
pub fn resize_bilinear(
    rgb: &[u8],
    width: usize,
    height: usize,
    new_w: usize,
    new_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; new_w * new_h * CHANNELS];
    if width == 0 || height == 0 || rgb.len() < width * height * CHANNELS {
        return out;
    }

    let scale_x = width as f32 / new_w as f32;
    let scale_y = height as f32 / new_h as f32;
    let at = |x: usize, y: usize, c: usize| rgb[(y * width + x) * CHANNELS + c] as f32;

    for y in 0..new_h {
        let sy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (height - 1) as f32);
        let y0 = sy.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = sy - y0 as f32;

        for x in 0..new_w {
            let sx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (width - 1) as f32);
            let x0 = sx.floor() as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = sx - x0 as f32;

            for c in 0..CHANNELS {
                let v = at(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                    + at(x1, y0, c) * fx * (1.0 - fy)
                    + at(x0, y1, c) * (1.0 - fx) * fy
                    + at(x1, y1, c) * fx * fy;
                out[(y * new_w + x) * CHANNELS + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Crop a face box (clipped to the image) and resize it to 112×112.
///
/// Used when alignment is disabled or the detector produced no landmarks.
pub fn crop_and_resize(rgb: &[u8], width: u32, height: u32, bbox: &crate::BoundingBox) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return vec![0u8; ALIGNED_SIZE * ALIGNED_SIZE * CHANNELS];
    }

    let x0 = (bbox.x.max(0.0) as usize).min(w - 1);
    let y0 = (bbox.y.max(0.0) as usize).min(h - 1);
    let x1 = ((bbox.x + bbox.width).ceil().max(0.0) as usize).clamp(x0 + 1, w);
    let y1 = ((bbox.y + bbox.height).ceil().max(0.0) as usize).clamp(y0 + 1, h);

    let (cw, ch) = (x1 - x0, y1 - y0);
    let mut crop = Vec::with_capacity(cw * ch * CHANNELS);
    for row in rgb.chunks_exact(w * CHANNELS).skip(y0).take(ch) {
        crop.extend_from_slice(&row[x0 * CHANNELS..x1 * CHANNELS]);
    }

    resize_bilinear(&crop, cw, ch, ALIGNED_SIZE, ALIGNED_SIZE)
}

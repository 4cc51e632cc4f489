//! Face alignment via 4-DOF similarity transform.
//!
//! Warps an RGB face onto the canonical ArcFace 112×112 landmark template using
//! a least-squares similarity fit of the five detected landmarks. Also builds
//! the box-centred square crops used by the attribute and landmark models.

use image::{Rgb, RgbImage};
use ndarray::Array4;

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Similarity transform `dst = [a -b; b a] · src + [tx; ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    /// Map a destination pixel back into source coordinates.
    fn invert_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let (dx, dy) = (x - self.tx, y - self.ty);
        Some((
            (self.a * dx + self.b * dy) / det,
            (-self.b * dx + self.a * dy) / det,
        ))
    }
}

/// Least-squares similarity transform taking `src` landmarks onto `dst`.
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
    // Normal equations for the overdetermined system in [a, b, tx, ty]:
    //   sx·a − sy·b + tx = dx
    //   sy·a + sx·b + ty = dy
    let mut ata = [[0.0f32; 4]; 4];
    let mut atb = [0.0f32; 4];

    for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j][k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    match solve_4x4(ata, atb) {
        Some([a, b, tx, ty]) => Similarity { a, b, tx, ty },
        None => Similarity { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 },
    }
}

/// Gaussian elimination with partial pivoting. `None` for a singular system.
#[allow(clippy::needless_range_loop)]
pub(crate) fn solve_4x4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> Option<[f32; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&i, &j| m[i][col].abs().total_cmp(&m[j][col].abs()))
            .unwrap_or(col);
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            return None;
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / m[i][i];
    }
    Some(x)
}

/// Bilinear sample with black outside the image.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: i64, py: i64, c: usize| -> f32 {
        if px >= 0 && px < w && py >= 0 && py < h {
            image.get_pixel(px as u32, py as u32)[c] as f32
        } else {
            0.0
        }
    };

    Rgb(std::array::from_fn(|c| {
        let v = at(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
            + at(x0 + 1, y0, c) * fx * (1.0 - fy)
            + at(x0, y0 + 1, c) * (1.0 - fx) * fy
            + at(x0 + 1, y0 + 1, c) * fx * fy;
        v.round().clamp(0.0, 255.0) as u8
    }))
}

fn warp(image: &RgbImage, transform: &Similarity, out_size: u32) -> RgbImage {
    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        match transform.invert_point(ox as f32, oy as f32) {
            Some((sx, sy)) => sample_bilinear(image, sx, sy),
            None => Rgb([0, 0, 0]),
        }
    })
}

/// Align a face to the canonical 112×112 ArcFace crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = estimate_similarity(landmarks, &REFERENCE_LANDMARKS_112);
    warp(image, &transform, ALIGNED_SIZE)
}

/// Square crop of side `side` centred on `(cx, cy)`, resampled to `out_size`.
///
/// Pixels outside the source image are black.
pub fn crop_square(image: &RgbImage, cx: f32, cy: f32, side: f32, out_size: u32) -> RgbImage {
    let scale = out_size as f32 / side.max(1e-3);
    let transform = Similarity {
        a: scale,
        b: 0.0,
        tx: out_size as f32 / 2.0 - cx * scale,
        ty: out_size as f32 / 2.0 - cy * scale,
    };
    warp(image, &transform, out_size)
}

/// Square crop centred on the box `[x1, y1, x2, y2]`, its side `scale` times
/// the longer box side, resampled to `out_size`.
pub fn crop_around_box(image: &RgbImage, [x1, y1, x2, y2]: [f32; 4], scale: f32, out_size: u32) -> RgbImage {
    let side = (x2 - x1).max(y2 - y1) * scale;
    crop_square(image, (x1 + x2) / 2.0, (y1 + y2) / 2.0, side, out_size)
}

/// RGB crop to NCHW with raw 0..=255 values.
pub(crate) fn raw_nchw(crop: &RgbImage) -> Array4<f32> {
    let (w, h) = crop.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32;
        }
    }
    tensor
}

//! Pixel statistics behind the quality checks.
//!
//! Every function here is pure and deterministic. Luminance uses the
//! Rec. 601 weights (0.299, 0.587, 0.114), computed in integer thousandths
//! so a gray pixel maps to exactly its channel value.

use crate::capture::ImageFrame;

/// Sobel magnitude a pixel must exceed to count as an edge.
pub const EDGE_MAGNITUDE_THRESHOLD: f64 = 50.0;

/// Channel value every RGB channel must exceed for a pixel to count as glare.
pub const GLARE_CHANNEL_THRESHOLD: u8 = 250;

/// Divisor that maps mean local variance onto the 0-1 noise scale.
pub const NOISE_NORMALIZER: f64 = 500.0;

/// Sampling stride for the noise estimate (both axes).
pub const NOISE_SAMPLE_STRIDE: usize = 2;

#[inline]
fn luma_milli(px: &[u8]) -> u32 {
    299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32
}

/// Grayscale view of a frame.
pub struct LuminancePlane {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl LuminancePlane {
    /// Converts an RGBA frame to luminance.
    pub fn from_frame(frame: &ImageFrame) -> Self {
        let values = frame
            .pixels()
            .map(|px| luma_milli(px) as f32 / 1000.0)
            .collect();
        Self {
            width: frame.width() as usize,
            height: frame.height() as usize,
            values,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x] as f64
    }

    /// True when the plane has at least one interior pixel.
    #[inline]
    fn has_interior(&self) -> bool {
        self.width >= 3 && self.height >= 3
    }
}

/// Mean luminance over all pixels, 0-255.
pub fn mean_brightness(frame: &ImageFrame) -> f64 {
    let count = frame.pixel_count();
    if count == 0 {
        return 0.0;
    }
    let total: u64 = frame.pixels().map(|px| luma_milli(px) as u64).sum();
    total as f64 / (1000.0 * count as f64)
}

/// Population variance of the 3x3 Laplacian response over interior pixels.
///
/// Higher variance means more high-frequency detail, i.e. a sharper image.
pub fn laplacian_variance(plane: &LuminancePlane) -> f64 {
    if !plane.has_interior() {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..plane.height - 1 {
        for x in 1..plane.width - 1 {
            let laplacian = plane.at(x, y - 1)
                + plane.at(x, y + 1)
                + plane.at(x - 1, y)
                + plane.at(x + 1, y)
                - 4.0 * plane.at(x, y);
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            count += 1;
        }
    }

    let n = count as f64;
    let mean = sum / n;
    ((sum_sq / n) - mean * mean).max(0.0)
}

/// Dominant edge orientation in whole degrees, `[0, 180)`.
///
/// Builds a one-degree histogram of Sobel gradient angles for pixels whose
/// gradient magnitude exceeds [`EDGE_MAGNITUDE_THRESHOLD`]. Returns `None`
/// when no pixel qualifies.
pub fn dominant_edge_angle(plane: &LuminancePlane) -> Option<f64> {
    if !plane.has_interior() {
        return None;
    }

    let mut histogram = [0u64; 180];
    let mut edges = 0u64;

    for y in 1..plane.height - 1 {
        for x in 1..plane.width - 1 {
            let tl = plane.at(x - 1, y - 1);
            let tc = plane.at(x, y - 1);
            let tr = plane.at(x + 1, y - 1);
            let ml = plane.at(x - 1, y);
            let mr = plane.at(x + 1, y);
            let bl = plane.at(x - 1, y + 1);
            let bc = plane.at(x, y + 1);
            let br = plane.at(x + 1, y + 1);

            let gx = (tr + 2.0 * mr + br) - (tl + 2.0 * ml + bl);
            let gy = (bl + 2.0 * bc + br) - (tl + 2.0 * tc + tr);

            if (gx * gx + gy * gy).sqrt() <= EDGE_MAGNITUDE_THRESHOLD {
                continue;
            }

            let mut angle = gy.atan2(gx).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            if angle >= 180.0 {
                angle -= 180.0;
            }
            let bucket = (angle.floor() as usize).min(179);
            histogram[bucket] += 1;
            edges += 1;
        }
    }

    if edges == 0 {
        return None;
    }

    // Lowest bucket wins ties.
    let (peak, _) = histogram
        .iter()
        .enumerate()
        .fold((0usize, 0u64), |best, (i, &n)| if n > best.1 { (i, n) } else { best });
    Some(peak as f64)
}

/// Reduces a dominant edge angle to its deviation from the nearest axis.
///
/// Angles above 45 degrees are measured against the vertical axis
/// (`90 - angle`), which yields negative values past 90.
pub fn skew_from_angle(angle: f64) -> f64 {
    if angle > 45.0 {
        90.0 - angle
    } else {
        angle
    }
}

/// Number of pixels whose R, G and B channels all exceed the glare cutoff.
pub fn glare_pixel_count(frame: &ImageFrame) -> usize {
    frame
        .pixels()
        .filter(|px| {
            px[0] > GLARE_CHANNEL_THRESHOLD
                && px[1] > GLARE_CHANNEL_THRESHOLD
                && px[2] > GLARE_CHANNEL_THRESHOLD
        })
        .count()
}

/// Fraction of overexposed pixels, 0-1.
pub fn glare_fraction(frame: &ImageFrame) -> f64 {
    let count = frame.pixel_count();
    if count == 0 {
        return 0.0;
    }
    glare_pixel_count(frame) as f64 / count as f64
}

/// Normalized noise estimate, 0-1.
///
/// Averages the 3x3 luminance variance around interior pixels sampled on a
/// stride of [`NOISE_SAMPLE_STRIDE`], then divides by [`NOISE_NORMALIZER`].
pub fn noise_level(plane: &LuminancePlane) -> f64 {
    if !plane.has_interior() {
        return 0.0;
    }

    let mut total = 0.0f64;
    let mut samples = 0u64;

    for y in (1..plane.height - 1).step_by(NOISE_SAMPLE_STRIDE) {
        for x in (1..plane.width - 1).step_by(NOISE_SAMPLE_STRIDE) {
            let mut sum = 0.0f64;
            let mut sum_sq = 0.0f64;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    let v = plane.at(nx, ny);
                    sum += v;
                    sum_sq += v * v;
                }
            }
            let mean = sum / 9.0;
            total += ((sum_sq / 9.0) - mean * mean).max(0.0);
            samples += 1;
        }
    }

    (total / samples as f64 / NOISE_NORMALIZER).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, value: u8) -> ImageFrame {
        ImageFrame::filled(width, height, [value, value, value, 255])
    }

    fn vertical_edge(width: u32, height: u32) -> ImageFrame {
        ImageFrame::from_fn(width, height, |x, _| {
            if x < width / 2 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        })
    }

    #[test]
    fn test_gray_luminance_is_exact() {
        for value in [0u8, 40, 128, 220, 255] {
            assert_eq!(mean_brightness(&gray(4, 4, value)), value as f64);
        }
    }

    #[test]
    fn test_luminance_weights() {
        let red = ImageFrame::filled(2, 2, [255, 0, 0, 255]);
        assert!((mean_brightness(&red) - 76.245).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_has_zero_laplacian_variance() {
        let plane = LuminancePlane::from_frame(&gray(32, 32, 90));
        assert_eq!(laplacian_variance(&plane), 0.0);
    }

    #[test]
    fn test_edge_has_large_laplacian_variance() {
        let plane = LuminancePlane::from_frame(&vertical_edge(64, 64));
        assert!(laplacian_variance(&plane) > 1000.0);
    }

    #[test]
    fn test_tiny_frame_is_safe() {
        let plane = LuminancePlane::from_frame(&gray(2, 2, 10));
        assert_eq!(laplacian_variance(&plane), 0.0);
        assert_eq!(noise_level(&plane), 0.0);
        assert!(dominant_edge_angle(&plane).is_none());
    }

    #[test]
    fn test_vertical_edge_angle() {
        let plane = LuminancePlane::from_frame(&vertical_edge(32, 32));
        assert_eq!(dominant_edge_angle(&plane), Some(0.0));
    }

    #[test]
    fn test_horizontal_edge_angle() {
        let frame = ImageFrame::from_fn(32, 32, |_, y| {
            if y < 16 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        let plane = LuminancePlane::from_frame(&frame);
        assert_eq!(dominant_edge_angle(&plane), Some(90.0));
        assert_eq!(skew_from_angle(90.0), 0.0);
    }

    #[test]
    fn test_skew_reduction() {
        assert_eq!(skew_from_angle(5.0), 5.0);
        assert_eq!(skew_from_angle(45.0), 45.0);
        assert_eq!(skew_from_angle(80.0), 10.0);
        assert_eq!(skew_from_angle(100.0), -10.0);
    }

    #[test]
    fn test_glare_count_exact() {
        let frame = ImageFrame::from_fn(10, 10, |x, _| {
            if x < 3 {
                [255, 255, 255, 255]
            } else if x == 3 {
                // Only two channels saturated: not glare.
                [255, 255, 200, 255]
            } else {
                [100, 100, 100, 255]
            }
        });
        assert_eq!(glare_pixel_count(&frame), 30);
        assert_eq!(glare_fraction(&frame), 0.3);
    }

    #[test]
    fn test_noise_uniform_zero() {
        let plane = LuminancePlane::from_frame(&gray(16, 16, 77));
        assert_eq!(noise_level(&plane), 0.0);
    }

    #[test]
    fn test_noise_clamped() {
        let checker = ImageFrame::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 {
                [0, 0, 0, 255]
            } else {
                [255, 255, 255, 255]
            }
        });
        let plane = LuminancePlane::from_frame(&checker);
        assert_eq!(noise_level(&plane), 1.0);
    }
}

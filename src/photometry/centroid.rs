//! Local centroid refinement.
//!
//! Catalog positions projected through the astrometric solution are only
//! accurate to a fraction of a pixel. Each position is refined by the
//! intensity-weighted centre of mass of a small square window centred on the
//! nearest pixel.
use ndarray::ArrayView2;

use crate::constants::PixelPos;

/// Centre of mass of the `box_size × box_size` window around `guess`.
///
/// The window is centred on the pixel nearest to `guess` and clipped at the
/// image edges. Non-finite pixels do not contribute.
///
/// Arguments
/// -----------------
/// * `image`: pixel array indexed `[[y, x]]`.
/// * `guess`: initial `(x, y)` position.
/// * `box_size`: side of the search window in pixels (odd).
///
/// Return
/// ----------
/// * The refined `(x, y)` position, or `None` when the window holds no usable
///   pixel or its total intensity is zero or not finite.
pub fn centroid_com(image: &ArrayView2<f64>, guess: PixelPos, box_size: usize) -> Option<PixelPos> {
    let (height, width) = image.dim();
    if !(guess.0.is_finite() && guess.1.is_finite()) || width == 0 || height == 0 {
        return None;
    }

    let half = (box_size / 2) as isize;
    let cx = guess.0.round() as isize;
    let cy = guess.1.round() as isize;

    let x_min = (cx - half).max(0);
    let x_max = (cx + half + 1).min(width as isize);
    let y_min = (cy - half).max(0);
    let y_max = (cy + half + 1).min(height as isize);
    if x_min >= x_max || y_min >= y_max {
        return None;
    }

    let mut total = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for y in y_min as usize..y_max as usize {
        for x in x_min as usize..x_max as usize {
            let v = image[[y, x]];
            if !v.is_finite() {
                continue;
            }
            total += v;
            sum_x += v * x as f64;
            sum_y += v * y as f64;
        }
    }

    if total == 0.0 || !total.is_finite() {
        return None;
    }
    let refined = (sum_x / total, sum_y / total);
    (refined.0.is_finite() && refined.1.is_finite()).then_some(refined)
}

#[cfg(test)]
mod centroid_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_symmetric_spot() {
        let mut image = Array2::<f64>::zeros((10, 10));
        image[[4, 5]] = 10.0;
        image[[4, 4]] = 5.0;
        image[[4, 6]] = 5.0;

        let (x, y) = centroid_com(&image.view(), (5.3, 3.8), 3).unwrap();
        assert_abs_diff_eq!(x, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_offset_spot_pulls_centroid() {
        let mut image = Array2::<f64>::zeros((10, 10));
        image[[5, 5]] = 3.0;
        image[[5, 6]] = 1.0;

        let (x, _) = centroid_com(&image.view(), (5.0, 5.0), 3).unwrap();
        assert_abs_diff_eq!(x, 5.25, epsilon = 1e-12);
    }

    #[test]
    fn test_window_is_clipped_at_edges() {
        let mut image = Array2::<f64>::zeros((10, 10));
        image[[0, 0]] = 2.0;
        image[[0, 1]] = 2.0;

        let (x, y) = centroid_com(&image.view(), (0.0, 0.0), 3).unwrap();
        assert_abs_diff_eq!(x, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_undefined_centroid() {
        let mut image = Array2::<f64>::zeros((10, 10));
        assert!(centroid_com(&image.view(), (5.0, 5.0), 3).is_none());

        image[[5, 5]] = f64::NAN;
        assert!(centroid_com(&image.view(), (5.0, 5.0), 3).is_none());

        // equal positive and negative weights cancel
        image[[5, 5]] = 1.0;
        image[[5, 6]] = -1.0;
        assert!(centroid_com(&image.view(), (5.0, 5.0), 3).is_none());
    }
}

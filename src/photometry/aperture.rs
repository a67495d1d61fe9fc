//! Circular aperture photometry with a local background annulus.
//!
//! Pixels are assigned with the "center" method: a pixel belongs to a region
//! when its centre falls inside it. The aperture is the disk `d ≤ r_ap` and
//! the background annulus the ring `r_in ≤ d < r_out`. Areas are the number
//! of pixels actually summed, so apertures partially outside the image and
//! masked (non-finite) pixels stay consistent with their background term.
use ndarray::ArrayView2;

use crate::constants::PixelPos;

/// Raw sums of one aperture measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureSums {
    /// Sum of the pixels inside the aperture
    pub aperture_sum: f64,
    /// Number of pixels inside the aperture
    pub aperture_area: f64,
    /// Mean pixel value of the annulus
    pub background_mean: f64,
    /// Number of pixels inside the annulus
    pub annulus_area: f64,
}

impl ApertureSums {
    /// Background-subtracted flux: `aperture_sum − background_mean × aperture_area`.
    pub fn net_flux(&self) -> f64 {
        self.aperture_sum - self.background_mean * self.aperture_area
    }
}

/// Geometry of the aperture and its background annulus, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApertureShape {
    pub radius: f64,
    pub annulus_inner: f64,
    pub annulus_outer: f64,
}

/// Measure the aperture and annulus sums around `center`.
///
/// Arguments
/// -----------------
/// * `image`: pixel array indexed `[[y, x]]`.
/// * `center`: sub-pixel `(x, y)` centre of the aperture.
/// * `shape`: aperture radius and annulus radii.
///
/// Return
/// ----------
/// * The raw sums. `background_mean` is NaN when the annulus holds no usable
///   pixel, which propagates to a non-finite net flux.
pub fn measure_aperture(
    image: &ArrayView2<f64>,
    center: PixelPos,
    shape: &ApertureShape,
) -> ApertureSums {
    let (height, width) = image.dim();
    let (x_center, y_center) = center;
    let reach = shape.annulus_outer.max(shape.radius).ceil() as isize;

    let x_center_int = x_center.round() as isize;
    let y_center_int = y_center.round() as isize;

    let x_min = (x_center_int - reach).max(0) as usize;
    let x_max = (x_center_int + reach + 1).clamp(0, width as isize) as usize;
    let y_min = (y_center_int - reach).max(0) as usize;
    let y_max = (y_center_int + reach + 1).clamp(0, height as isize) as usize;

    let mut aperture_sum = 0.0;
    let mut aperture_count = 0usize;
    let mut annulus_sum = 0.0;
    let mut annulus_count = 0usize;

    for y in y_min..y_max {
        for x in x_min..x_max {
            let value = image[[y, x]];
            if !value.is_finite() {
                continue;
            }
            let dx = x as f64 - x_center;
            let dy = y as f64 - y_center;
            let distance = dx.hypot(dy);

            if distance <= shape.radius {
                aperture_sum += value;
                aperture_count += 1;
            }
            if distance >= shape.annulus_inner && distance < shape.annulus_outer {
                annulus_sum += value;
                annulus_count += 1;
            }
        }
    }

    let background_mean = if annulus_count > 0 {
        annulus_sum / annulus_count as f64
    } else {
        f64::NAN
    };

    ApertureSums {
        aperture_sum,
        aperture_area: aperture_count as f64,
        background_mean,
        annulus_area: annulus_count as f64,
    }
}

#[cfg(test)]
mod aperture_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    const SHAPE: ApertureShape = ApertureShape {
        radius: 2.0,
        annulus_inner: 4.0,
        annulus_outer: 6.0,
    };

    #[test]
    fn test_regions_are_separated() {
        let mut image = Array2::<f64>::zeros((20, 20));
        for ((y, x), v) in image.indexed_iter_mut() {
            let d = (x as f64 - 10.0).hypot(y as f64 - 10.0);
            if d <= 2.0 {
                *v = 100.0;
            } else if (4.0..6.0).contains(&d) {
                *v = 50.0;
            }
        }

        let sums = measure_aperture(&image.view(), (10.0, 10.0), &SHAPE);
        // 13 pixel centres lie within 2 px of an integer centre
        assert_eq!(sums.aperture_area, 13.0);
        assert_abs_diff_eq!(sums.aperture_sum, 1300.0);
        assert_abs_diff_eq!(sums.background_mean, 50.0);
        assert_abs_diff_eq!(sums.net_flux(), 1300.0 - 50.0 * 13.0);
    }

    #[test]
    fn test_constant_image_has_zero_net_flux() {
        let image = Array2::<f64>::from_elem((30, 30), 123.0);
        let sums = measure_aperture(&image.view(), (14.3, 15.6), &SHAPE);
        assert_abs_diff_eq!(sums.net_flux(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_edge_clipping_counts_only_included_pixels() {
        let image = Array2::<f64>::from_elem((10, 10), 1.0);
        let sums = measure_aperture(&image.view(), (0.0, 0.0), &SHAPE);
        // quarter disk of radius 2 including the axes: (0,0),(1,0),(2,0),(0,1),(1,1),(0,2)
        assert_eq!(sums.aperture_area, 6.0);
        assert_abs_diff_eq!(sums.net_flux(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_annulus_outside_image_gives_nan() {
        let image = Array2::<f64>::from_elem((3, 3), 1.0);
        let sums = measure_aperture(&image.view(), (1.0, 1.0), &SHAPE);
        assert_eq!(sums.annulus_area, 0.0);
        assert!(sums.net_flux().is_nan());
    }
}

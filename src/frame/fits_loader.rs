//! FITS decoding of full-frame images.
//!
//! Survey full-frame images store the calibrated pixels and the astrometric
//! solution in the first image extension, with an empty primary HDU. Plain
//! single-HDU files are accepted as well: the loader uses HDU 1 when it is an
//! image and falls back to the primary HDU otherwise.
use std::path::Path;

use fitsio::{
    hdu::{FitsHdu, HduInfo},
    FitsFile,
};
use ndarray::Array2;
use tracing::debug;

use crate::{
    ffiphot_errors::FfiphotError,
    frame::{wcs::Wcs, Frame, FrameLoader},
};

/// [`FrameLoader`] reading FITS files through cfitsio.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsFrameLoader;

fn read_key_optional<T: fitsio::headers::ReadsKey>(
    hdu: &FitsHdu,
    fptr: &mut FitsFile,
    key: &str,
) -> Option<T> {
    hdu.read_key(fptr, key).ok()
}

fn image_shape(hdu: &FitsHdu) -> Option<(usize, usize)> {
    match &hdu.info {
        // shape is reported in reverse NAXIS order: [NAXIS2 (rows), NAXIS1 (columns)]
        HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => Some((shape[0], shape[1])),
        _ => None,
    }
}

impl FrameLoader for FitsFrameLoader {
    fn load(&self, path: &Path) -> Result<Frame, FfiphotError> {
        let mut fptr = FitsFile::open(path)?;

        let hdu = match fptr.hdu(1) {
            Ok(hdu) if image_shape(&hdu).is_some() => hdu,
            _ => {
                debug!(path = %path.display(), "no image extension, using primary HDU");
                fptr.primary_hdu()?
            }
        };
        let (rows, cols) = image_shape(&hdu).ok_or_else(|| {
            FfiphotError::Image(format!("{} holds no 2-D image", path.display()))
        })?;

        let data: Vec<f64> = hdu.read_image(&mut fptr)?;
        let pixels = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| FfiphotError::Image(format!("{}: {e}", path.display())))?;

        let wcs = Wcs::from_header(|key| read_key_optional::<f64>(&hdu, &mut fptr, key))?;
        let date_obs: String =
            read_key_optional(&hdu, &mut fptr, "DATE-OBS").unwrap_or_default();

        Ok(Frame::new(pixels, wcs, date_obs))
    }
}

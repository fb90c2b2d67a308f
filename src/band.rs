//! Single-filter flux and variance maps.
//!
//! A [`Band`] bundles everything the pipeline needs to know about one filter:
//! the flux map, its variance map, an optional Poisson-reference map (the flux
//! convolved with the squared PSF, used to reinject shot noise), the magnitude
//! zeropoint and an optional exposure time. The variance map is expected to be
//! in the squared unit of the flux map; no unit check is performed.

use ndarray::Array2;
use tracing::warn;

use crate::error::SedError;

/// One filter's data over the full image footprint.
///
/// All member arrays share one shape, enforced at construction. A band is
/// immutable once built.
#[derive(Debug, Clone)]
pub struct Band {
    name: String,
    flux: Array2<f64>,
    variance: Array2<f64>,
    poisson_ref: Option<Array2<f64>>,
    zeropoint: f64,
    exposure_time: Option<f64>,
}

impl Band {
    /// Create a band from its flux and variance maps.
    ///
    /// Fails with [`SedError::ShapeMismatch`] if the two maps differ in shape.
    pub fn new(
        name: impl Into<String>,
        flux: Array2<f64>,
        variance: Array2<f64>,
        zeropoint: f64,
    ) -> Result<Self, SedError> {
        let name = name.into();
        if flux.dim() != variance.dim() {
            return Err(SedError::shape_mismatch(
                format!("between flux and variance in band {name}"),
                flux.dim(),
                variance.dim(),
            ));
        }
        Ok(Self {
            name,
            flux,
            variance,
            poisson_ref: None,
            zeropoint,
            exposure_time: None,
        })
    }

    /// Attach a Poisson-reference map and the exposure time it was taken with.
    ///
    /// The reference map must match the flux shape. A missing exposure time is
    /// not an error: the band is still usable, but no shot noise can be added
    /// downstream, which is logged as a warning. A non-positive exposure time
    /// is rejected.
    pub fn with_poisson_ref(
        mut self,
        poisson_ref: Array2<f64>,
        exposure_time: Option<f64>,
    ) -> Result<Self, SedError> {
        if poisson_ref.dim() != self.flux.dim() {
            return Err(SedError::shape_mismatch(
                format!("between flux and Poisson reference in band {}", self.name),
                self.flux.dim(),
                poisson_ref.dim(),
            ));
        }
        match exposure_time {
            Some(texp) if texp <= 0.0 => {
                return Err(SedError::Configuration(format!(
                    "exposure time of band {} is {texp} but it must be positive",
                    self.name
                )));
            }
            None => warn!(
                "band {}: Poisson reference given without an exposure time, shot noise will not be added",
                self.name
            ),
            _ => {}
        }
        self.poisson_ref = Some(poisson_ref);
        self.exposure_time = exposure_time;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flux(&self) -> &Array2<f64> {
        &self.flux
    }

    pub fn variance(&self) -> &Array2<f64> {
        &self.variance
    }

    pub fn poisson_ref(&self) -> Option<&Array2<f64>> {
        self.poisson_ref.as_ref()
    }

    pub fn zeropoint(&self) -> f64 {
        self.zeropoint
    }

    pub fn exposure_time(&self) -> Option<f64> {
        self.exposure_time
    }

    /// Shape of every map in this band, as (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        self.flux.dim()
    }
}

/// Return a copy of `arr` with NaN written at every masked position.
///
/// `true` in the mask marks a bad pixel. The input is left untouched and the
/// operation is idempotent: re-applying the same mask changes nothing.
pub fn masked(arr: &Array2<f64>, mask: &Array2<bool>) -> Array2<f64> {
    assert_eq!(
        arr.dim(),
        mask.dim(),
        "mask dimensions must match array dimensions"
    );

    let mut out = arr.clone();
    for (value, &bad) in out.iter_mut().zip(mask.iter()) {
        if bad {
            *value = f64::NAN;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_mask(shape: (usize, usize), bad: &[(usize, usize)]) -> Array2<bool> {
        let mut mask = Array2::from_elem(shape, false);
        for &(r, c) in bad {
            mask[[r, c]] = true;
        }
        mask
    }

    #[test]
    fn test_band_construction() {
        let flux = Array2::from_elem((3, 4), 1.5);
        let var = Array2::from_elem((3, 4), 0.1);
        let band = Band::new("u", flux, var, 25.0).unwrap();
        assert_eq!(band.name(), "u");
        assert_eq!(band.shape(), (3, 4));
        assert_eq!(band.zeropoint(), 25.0);
        assert!(band.poisson_ref().is_none());
        assert!(band.exposure_time().is_none());
    }

    #[test]
    fn test_band_shape_mismatch_fails() {
        let flux = Array2::from_elem((3, 4), 1.0);
        let var = Array2::from_elem((4, 3), 1.0);
        let err = Band::new("u", flux, var, 25.0).unwrap_err();
        assert!(matches!(err, SedError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_poisson_ref_shape_mismatch_fails() {
        let flux = Array2::from_elem((2, 2), 1.0);
        let var = Array2::from_elem((2, 2), 1.0);
        let band = Band::new("g", flux, var, 25.0).unwrap();
        let err = band
            .with_poisson_ref(Array2::from_elem((2, 3), 1.0), Some(100.0))
            .unwrap_err();
        assert!(matches!(err, SedError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_poisson_ref_without_exposure_time_is_allowed() {
        let flux = Array2::from_elem((2, 2), 1.0);
        let var = Array2::from_elem((2, 2), 1.0);
        let band = Band::new("g", flux, var, 25.0)
            .unwrap()
            .with_poisson_ref(Array2::from_elem((2, 2), 1.0), None)
            .unwrap();
        assert!(band.poisson_ref().is_some());
        assert!(band.exposure_time().is_none());
    }

    #[test]
    fn test_negative_exposure_time_rejected() {
        let flux = Array2::from_elem((2, 2), 1.0);
        let var = Array2::from_elem((2, 2), 1.0);
        let result = Band::new("g", flux, var, 25.0)
            .unwrap()
            .with_poisson_ref(Array2::from_elem((2, 2), 1.0), Some(-3.0));
        assert!(matches!(result, Err(SedError::Configuration(_))));
    }

    #[test]
    fn test_masked_sets_nan_and_preserves_rest() {
        let arr = Array2::from_shape_fn((3, 3), |(r, c)| (r * 3 + c) as f64);
        let mask = flat_mask((3, 3), &[(0, 0), (2, 1)]);
        let out = masked(&arr, &mask);

        assert!(out[[0, 0]].is_nan());
        assert!(out[[2, 1]].is_nan());
        assert_eq!(out[[1, 1]], 4.0);
        assert_eq!(out[[2, 2]], 8.0);
        // Input untouched.
        assert_eq!(arr[[0, 0]], 0.0);
    }

    #[test]
    fn test_masked_is_idempotent() {
        let arr = Array2::from_shape_fn((4, 4), |(r, c)| (r + c) as f64 - 3.0);
        let mask = flat_mask((4, 4), &[(1, 1), (3, 0)]);
        let once = masked(&arr, &mask);
        let twice = masked(&once, &mask);

        for (a, b) in once.iter().zip(twice.iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }
}

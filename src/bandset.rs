//! Ordered band collections and the forward catalogue pipeline.
//!
//! A [`BandSet`] owns the bands of one galaxy together with a shared bad-pixel
//! mask and turns them into the flat table a SED fitting engine consumes. One
//! call to [`BandSet::configure`] runs the whole pipeline: masking, negative
//! cleaning, optional shot-noise injection, engine-specific normalisation,
//! flattening with valid-pixel tracking, sentinel substitution and unit
//! conversion. Everything the run derives (table, mean map, scale factor,
//! pixel index) is recomputed from scratch and swapped in as one unit, so the
//! four can never be stale relative to each other.

use std::str::FromStr;

use ndarray::Array2;
use tracing::{debug, warn};

use crate::band::{masked, Band};
use crate::error::SedError;
use crate::photometry;
use crate::table::{Column, Table};

/// Value LePhare reads as "do not use this measurement".
pub const LEPHARE_SENTINEL: f64 = -99.0;

/// SED fitting engine a table is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SedCode {
    /// LePhare: expects normalised, scaled AB magnitudes.
    LePhare,
    /// Cigale: expects physical flux densities in mJy.
    Cigale,
}

impl FromStr for SedCode {
    type Err = SedError;

    fn from_str(s: &str) -> Result<Self, SedError> {
        match s.to_ascii_lowercase().as_str() {
            "lephare" => Ok(SedCode::LePhare),
            "cigale" => Ok(SedCode::Cigale),
            other => Err(SedError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// How negative flux and variance values are replaced during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanMethod {
    /// Replace negatives with 0.
    #[default]
    Zero,
    /// Replace negatives with the smallest non-negative value found in the
    /// band's masked flux and variance maps, computed fresh for each band.
    Min,
}

/// Parameters of one table-generation run.
#[derive(Debug, Clone, Copy)]
pub struct TableParams {
    clean_method: CleanMethod,
    scale_factor: f64,
    texp_factor: f64,
}

impl TableParams {
    /// Validating constructor.
    ///
    /// The scale factor must be finite and strictly positive; the exposure
    /// factor must be finite and non-negative (0 disables shot-noise
    /// injection).
    pub fn new(
        clean_method: CleanMethod,
        scale_factor: f64,
        texp_factor: f64,
    ) -> Result<Self, SedError> {
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(SedError::Configuration(format!(
                "scale factor is {scale_factor} but it must be finite and positive"
            )));
        }
        if !texp_factor.is_finite() || texp_factor < 0.0 {
            return Err(SedError::Configuration(format!(
                "exposure factor is {texp_factor} but it must be finite and non-negative"
            )));
        }
        Ok(Self {
            clean_method,
            scale_factor,
            texp_factor,
        })
    }

    pub fn clean_method(&self) -> CleanMethod {
        self.clean_method
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn texp_factor(&self) -> f64 {
        self.texp_factor
    }
}

impl Default for TableParams {
    fn default() -> Self {
        Self {
            clean_method: CleanMethod::Zero,
            scale_factor: 100.0,
            texp_factor: 0.0,
        }
    }
}

/// Everything one pipeline run derives from the band data.
///
/// Recomputed whole on every [`BandSet::configure`] call and swapped in as a
/// single value, never field by field.
#[derive(Debug, Clone)]
struct PipelineState {
    code: SedCode,
    table: Table,
    mean_map: Option<Array2<f64>>,
    scale_factor: f64,
    pixel_index: Vec<usize>,
}

/// An ordered set of uniquely named bands sharing one bad-pixel mask.
#[derive(Debug, Clone)]
pub struct BandSet {
    bands: Vec<Band>,
    mask: Array2<bool>,
    redshift: f64,
    shape: (usize, usize),
    state: Option<PipelineState>,
}

impl BandSet {
    /// Assemble a band set.
    ///
    /// Duplicate band names and bands without data are dropped with a warning
    /// (first occurrence wins). Fails with [`SedError::EmptyInput`] when no
    /// band survives and with [`SedError::ShapeMismatch`] when the surviving
    /// bands or the mask disagree on shape.
    pub fn new(bands: Vec<Band>, mask: Array2<bool>) -> Result<Self, SedError> {
        let mut kept: Vec<Band> = Vec::with_capacity(bands.len());
        for band in bands {
            if kept.iter().any(|b| b.name() == band.name()) {
                warn!("band {} already present in band set, skipping", band.name());
                continue;
            }
            if band.flux().is_empty() {
                warn!("band {} has no data, skipping", band.name());
                continue;
            }
            kept.push(band);
        }

        if kept.is_empty() {
            return Err(SedError::EmptyInput(
                "at least one band with data is required".to_string(),
            ));
        }

        let shape = kept[0].shape();
        for band in &kept[1..] {
            if band.shape() != shape {
                return Err(SedError::shape_mismatch(
                    format!("in band {}", band.name()),
                    shape,
                    band.shape(),
                ));
            }
        }
        if mask.dim() != shape {
            return Err(SedError::shape_mismatch(
                "between mask and band data",
                shape,
                mask.dim(),
            ));
        }

        Ok(Self {
            bands: kept,
            mask,
            redshift: 0.0,
            shape,
            state: None,
        })
    }

    /// Set the redshift written into the generated tables (defaults to 0).
    pub fn with_redshift(mut self, redshift: f64) -> Self {
        self.redshift = redshift;
        self
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    /// Engine the current table was generated for, if any.
    pub fn code(&self) -> Option<SedCode> {
        self.state.as_ref().map(|s| s.code)
    }

    /// Table from the latest pipeline run.
    pub fn table(&self) -> Option<&Table> {
        self.state.as_ref().map(|s| &s.table)
    }

    /// Cross-band mean map from the latest run (LePhare only).
    pub fn mean_map(&self) -> Option<&Array2<f64>> {
        self.state.as_ref().and_then(|s| s.mean_map.as_ref())
    }

    /// Scale factor from the latest run (1 when no scaling was applied).
    pub fn scale_factor(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.scale_factor)
    }

    /// Flat positions of the pixels that made it into the table, in row order.
    pub fn pixel_index(&self) -> Option<&[usize]> {
        self.state.as_ref().map(|s| s.pixel_index.as_slice())
    }

    /// Run the full pipeline for `code` and return the generated table.
    ///
    /// Every call recomputes everything; there is no incremental update. The
    /// derived state (table, mean map, scale factor, pixel index) is replaced
    /// atomically, so a failed run leaves the previous state intact.
    pub fn configure(&mut self, code: SedCode, params: &TableParams) -> Result<&Table, SedError> {
        let state = self.run_pipeline(code, params)?;
        let state = self.state.insert(state);
        Ok(&state.table)
    }

    fn run_pipeline(&self, code: SedCode, params: &TableParams) -> Result<PipelineState, SedError> {
        // Clean every band, then inject shot noise where possible.
        let mut cleaned: Vec<(Array2<f64>, Array2<f64>)> = Vec::with_capacity(self.bands.len());
        for band in &self.bands {
            let (flux, mut var) = clean(band.flux(), band.variance(), &self.mask, params.clean_method);

            if let (Some(poisson_ref), Some(texp)) = (band.poisson_ref(), band.exposure_time()) {
                if params.texp_factor != 0.0 {
                    debug!(
                        "band {}: adding Poisson variance with texp = {texp}, factor = {}",
                        band.name(),
                        params.texp_factor
                    );
                    var.zip_mut_with(poisson_ref, |v, &p| {
                        *v += p.abs() * params.texp_factor / texp;
                    });
                }
            }

            cleaned.push((flux, var));
        }

        // LePhare works on normalised data; the reference map is the cross-band
        // mean of the raw masked flux, shared by all bands.
        let (mean_map, scale_factor) = match code {
            SedCode::LePhare => {
                let mean = self.mean_flux_map();
                for (flux, var) in &mut cleaned {
                    normalise(flux, var, &mean, params.scale_factor);
                }
                (Some(mean), params.scale_factor)
            }
            SedCode::Cigale => (None, 1.0),
        };

        // A pixel is kept only when flux and variance are finite in every band.
        let n_pixels = self.shape.0 * self.shape.1;
        let mut valid = vec![true; n_pixels];
        for (flux, var) in &cleaned {
            for (i, (f, v)) in flux.iter().zip(var.iter()).enumerate() {
                if !f.is_finite() || !v.is_finite() {
                    valid[i] = false;
                }
            }
        }
        let pixel_index: Vec<usize> = valid
            .iter()
            .enumerate()
            .filter_map(|(i, &ok)| ok.then_some(i))
            .collect();

        if pixel_index.is_empty() {
            return Err(SedError::EmptyInput(
                "no valid pixels left after masking".to_string(),
            ));
        }

        let table = self.assemble_table(code, &cleaned, &pixel_index)?;

        Ok(PipelineState {
            code,
            table,
            mean_map,
            scale_factor,
            pixel_index,
        })
    }

    fn assemble_table(
        &self,
        code: SedCode,
        cleaned: &[(Array2<f64>, Array2<f64>)],
        pixel_index: &[usize],
    ) -> Result<Table, SedError> {
        let id_name = match code {
            SedCode::LePhare => "ID",
            SedCode::Cigale => "id",
        };

        let mut table = Table::new();
        table.push(Column::ints(
            id_name,
            pixel_index.iter().map(|&i| i as i64).collect(),
        ))?;

        for (band, (flux, var)) in self.bands.iter().zip(cleaned.iter()) {
            let flux_flat: Vec<f64> = flux.iter().copied().collect();
            let var_flat: Vec<f64> = var.iter().copied().collect();

            let mut values = Vec::with_capacity(pixel_index.len());
            let mut errors = Vec::with_capacity(pixel_index.len());

            for &i in pixel_index {
                let f = flux_flat[i];
                let sigma = var_flat[i].sqrt();

                match code {
                    SedCode::LePhare => {
                        // An exact zero would turn into an infinite magnitude;
                        // LePhare instead expects its exclusion sentinel.
                        if f == 0.0 || var_flat[i] == 0.0 {
                            values.push(LEPHARE_SENTINEL);
                            errors.push(LEPHARE_SENTINEL);
                        } else {
                            let (mag, sigma_mag) =
                                photometry::flux_to_magnitude(f, sigma, band.zeropoint());
                            values.push(mag);
                            errors.push(sigma_mag);
                        }
                    }
                    SedCode::Cigale => {
                        let (density, density_sigma) =
                            photometry::count_to_flux_density(f, sigma, band.zeropoint());
                        values.push(density * photometry::MJY_PER_CGS);
                        errors.push(density_sigma * photometry::MJY_PER_CGS);
                    }
                }
            }

            table.push(Column::with_errors(band.name(), values, errors))?;
        }

        let n_rows = pixel_index.len();
        match code {
            SedCode::LePhare => {
                // Context encodes which bands participate; all of them, here.
                let context = (1i64 << self.bands.len()) - 1;
                table.push(Column::ints("Context", vec![context; n_rows]))?;
                table.push(Column::floats("zs", vec![self.redshift; n_rows]))?;
            }
            SedCode::Cigale => {
                table.push(Column::floats("redshift", vec![self.redshift; n_rows]))?;
            }
        }

        Ok(table)
    }

    /// Per-pixel mean of the masked flux across bands, NaN contributions
    /// ignored, all-NaN positions set to 0.
    fn mean_flux_map(&self) -> Array2<f64> {
        let (rows, cols) = self.shape;
        let mut sum = Array2::<f64>::zeros(self.shape);
        let mut count = Array2::<f64>::zeros(self.shape);

        for band in &self.bands {
            let flux = band.flux();
            for r in 0..rows {
                for c in 0..cols {
                    let value = flux[[r, c]];
                    if !self.mask[[r, c]] && !value.is_nan() {
                        sum[[r, c]] += value;
                        count[[r, c]] += 1.0;
                    }
                }
            }
        }

        let mut mean = Array2::<f64>::zeros(self.shape);
        for r in 0..rows {
            for c in 0..cols {
                if count[[r, c]] > 0.0 {
                    mean[[r, c]] = sum[[r, c]] / count[[r, c]];
                }
            }
        }
        mean
    }
}

/// Mask a flux/variance pair and replace negative entries.
///
/// Masked positions become NaN in both maps. A position where either map is
/// negative gets the same substitute in both: 0 for [`CleanMethod::Zero`], the
/// band minimum for [`CleanMethod::Min`] (the smallest non-negative, non-NaN
/// value over both already-masked maps at positions where neither is
/// negative; 0 when no such value exists). Always total, never fails.
pub fn clean(
    flux: &Array2<f64>,
    variance: &Array2<f64>,
    mask: &Array2<bool>,
    method: CleanMethod,
) -> (Array2<f64>, Array2<f64>) {
    let mut flux = masked(flux, mask);
    let mut var = masked(variance, mask);

    // NaN compares false, so masked positions are never flagged negative.
    let negative: Vec<bool> = flux
        .iter()
        .zip(var.iter())
        .map(|(&f, &v)| f < 0.0 || v < 0.0)
        .collect();

    let substitute = match method {
        CleanMethod::Zero => 0.0,
        CleanMethod::Min => {
            let mut min = f64::INFINITY;
            for ((&f, &v), &neg) in flux.iter().zip(var.iter()).zip(negative.iter()) {
                if !neg {
                    if !f.is_nan() && f >= 0.0 && f < min {
                        min = f;
                    }
                    if !v.is_nan() && v >= 0.0 && v < min {
                        min = v;
                    }
                }
            }
            if min.is_finite() {
                min
            } else {
                0.0
            }
        }
    };

    for ((f, v), &neg) in flux.iter_mut().zip(var.iter_mut()).zip(negative.iter()) {
        if neg {
            *f = substitute;
            *v = substitute;
        }
    }

    (flux, var)
}

/// Divide a flux/variance pair by the mean map and apply the scale factor,
/// wherever the map is non-zero. The variance picks up the squared factor.
fn normalise(flux: &mut Array2<f64>, var: &mut Array2<f64>, mean: &Array2<f64>, factor: f64) {
    for ((f, v), &m) in flux.iter_mut().zip(var.iter_mut()).zip(mean.iter()) {
        if m != 0.0 {
            *f *= factor / m;
            *v *= factor * factor / (m * m);
        }
    }
}

//! Resolved-map reconstruction from SED fitting results.
//!
//! The fitting engine returns one row per pixel that survived the forward
//! pass, keyed by the same flat pixel index the table was generated with.
//! [`SedOutput`] scatters any named result column back into a dense 2D map,
//! undoing the forward scaling and normalisation. The image-side bookkeeping
//! needed for that ([`ImageProps`]) is copied out of a [`BandSet`] by
//! [`SedOutput::link`] and can be persisted to JSON, since reconstruction may
//! run long after the band set is gone, possibly in another process.

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::bandset::BandSet;
use crate::error::SedError;
use crate::table::{ColumnValues, Table};

/// Image-side bookkeeping captured from a band set at link time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageProps {
    /// Shape of the original maps, as (rows, columns).
    pub shape: (usize, usize),
    /// Scale factor applied during table generation (1 when none was).
    pub scale_factor: f64,
    /// Cross-band mean map used for normalisation, when the engine used one.
    pub mean_map: Option<Array2<f64>>,
}

impl ImageProps {
    /// Copy the reconstruction bookkeeping out of a configured band set.
    ///
    /// Fails with [`SedError::Configuration`] when the band set has not been
    /// configured yet (there is no pipeline state to copy).
    pub fn from_band_set(band_set: &BandSet) -> Result<Self, SedError> {
        let scale_factor = band_set.scale_factor().ok_or_else(|| {
            SedError::Configuration(
                "band set has no generated table to link against".to_string(),
            )
        })?;
        Ok(Self {
            shape: band_set.shape(),
            scale_factor,
            mean_map: band_set.mean_map().cloned(),
        })
    }

    /// Save to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Per-call overrides for [`SedOutput::to_image`]; unset fields fall back to
/// the linked [`ImageProps`].
#[derive(Debug, Clone, Default)]
pub struct ToImageOptions {
    pub shape: Option<(usize, usize)>,
    pub scale_factor: Option<f64>,
    pub mean_map: Option<Array2<f64>>,
}

/// SED fitting results keyed by the forward pass's pixel index.
#[derive(Debug, Clone)]
pub struct SedOutput {
    table: Table,
    id_column: String,
    props: Option<ImageProps>,
}

impl SedOutput {
    /// Wrap a results table.
    ///
    /// The table must carry an `ID` or `id` integer column holding the flat
    /// pixel index of each row; [`SedError::UnknownColumn`] otherwise.
    pub fn new(table: Table) -> Result<Self, SedError> {
        let id_column = ["ID", "id"]
            .into_iter()
            .find(|name| table.column(name).is_some())
            .map(str::to_string)
            .ok_or_else(|| SedError::UnknownColumn("ID".to_string()))?;
        if !matches!(
            table.column(&id_column).map(|c| &c.values),
            Some(ColumnValues::Int(_))
        ) {
            return Err(SedError::Configuration(format!(
                "column '{id_column}' must hold integer pixel indices"
            )));
        }
        Ok(Self {
            table,
            id_column,
            props: None,
        })
    }

    /// Copy the reconstruction bookkeeping from a configured band set.
    ///
    /// A relation, not ownership: the band set can be dropped afterwards.
    pub fn link(&mut self, band_set: &BandSet) -> Result<(), SedError> {
        self.props = Some(ImageProps::from_band_set(band_set)?);
        Ok(())
    }

    /// Install previously captured bookkeeping, e.g. loaded from disk.
    pub fn link_props(&mut self, props: ImageProps) {
        self.props = Some(props);
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn props(&self) -> Option<&ImageProps> {
        self.props.as_ref()
    }

    /// Scatter the named column back into a dense map.
    ///
    /// Pixels absent from the results stay NaN. Each value is divided by the
    /// scale factor and, where a mean map is present and non-zero, multiplied
    /// by it — the exact inverse of the forward normalisation. Explicit
    /// options win over the linked bookkeeping.
    pub fn to_image(&self, name: &str, opts: &ToImageOptions) -> Result<Array2<f64>, SedError> {
        let shape = opts
            .shape
            .or(self.props.as_ref().map(|p| p.shape))
            .ok_or_else(|| {
                SedError::Configuration(
                    "an image shape must be given in the call or by linking a band set"
                        .to_string(),
                )
            })?;
        let scale_factor = opts
            .scale_factor
            .or(self.props.as_ref().map(|p| p.scale_factor))
            .unwrap_or(1.0);
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(SedError::Configuration(format!(
                "scale factor is {scale_factor} but it must be finite and positive"
            )));
        }
        let mean_map = opts
            .mean_map
            .as_ref()
            .or_else(|| self.props.as_ref().and_then(|p| p.mean_map.as_ref()));

        let column = self
            .table
            .column(name)
            .ok_or_else(|| SedError::UnknownColumn(name.to_string()))?;
        let values = column.values.as_floats();
        let indices = self.pixel_indices()?;

        let n_pixels = shape.0 * shape.1;
        let mut flat = vec![f64::NAN; n_pixels];
        for (&i, &value) in indices.iter().zip(values.iter()) {
            if i >= n_pixels {
                return Err(SedError::Configuration(format!(
                    "pixel index {i} does not fit an image of {} x {} pixels",
                    shape.0, shape.1
                )));
            }
            flat[i] = value / scale_factor;
        }

        let mut image = Array2::from_shape_vec(shape, flat)
            .map_err(|e| SedError::Configuration(e.to_string()))?;

        if let Some(mean) = mean_map {
            if mean.dim() != shape {
                return Err(SedError::shape_mismatch(
                    "between mean map and image",
                    shape,
                    mean.dim(),
                ));
            }
            for (pixel, &m) in image.iter_mut().zip(mean.iter()) {
                if m != 0.0 {
                    *pixel *= m;
                }
            }
        }

        Ok(image)
    }

    fn pixel_indices(&self) -> Result<Vec<usize>, SedError> {
        match self.table.column(&self.id_column).map(|c| &c.values) {
            Some(ColumnValues::Int(values)) => values
                .iter()
                .map(|&i| {
                    usize::try_from(i).map_err(|_| {
                        SedError::Configuration(format!("negative pixel index {i}"))
                    })
                })
                .collect(),
            _ => Err(SedError::UnknownColumn(self.id_column.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::Band;
    use crate::bandset::{SedCode, TableParams};
    use crate::table::Column;
    use ndarray::Array2;

    fn results_table(ids: Vec<i64>, values: Vec<f64>) -> Table {
        let mut table = Table::new();
        table.push(Column::ints("id", ids)).unwrap();
        table.push(Column::floats("mass", values)).unwrap();
        table
    }

    fn configured_set() -> BandSet {
        let band = Band::new(
            "u",
            Array2::from_elem((2, 3), 5.0),
            Array2::from_elem((2, 3), 0.5),
            25.0,
        )
        .unwrap();
        let mut set = BandSet::new(vec![band], Array2::from_elem((2, 3), false)).unwrap();
        set.configure(SedCode::LePhare, &TableParams::default())
            .unwrap();
        set
    }

    #[test]
    fn test_requires_id_column() {
        let mut table = Table::new();
        table.push(Column::floats("mass", vec![1.0])).unwrap();
        assert!(matches!(
            SedOutput::new(table),
            Err(SedError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_rejects_float_id_column() {
        let mut table = Table::new();
        table.push(Column::floats("id", vec![0.0])).unwrap();
        assert!(matches!(
            SedOutput::new(table),
            Err(SedError::Configuration(_))
        ));
    }

    #[test]
    fn test_to_image_without_shape_fails() {
        let output = SedOutput::new(results_table(vec![0], vec![1.0])).unwrap();
        let err = output.to_image("mass", &ToImageOptions::default()).unwrap_err();
        assert!(matches!(err, SedError::Configuration(_)));
    }

    #[test]
    fn test_to_image_unknown_column_fails() {
        let output = SedOutput::new(results_table(vec![0], vec![1.0])).unwrap();
        let opts = ToImageOptions {
            shape: Some((1, 1)),
            ..Default::default()
        };
        let err = output.to_image("sfr", &opts).unwrap_err();
        assert!(matches!(err, SedError::UnknownColumn(_)));
    }

    #[test]
    fn test_to_image_scatter_and_nan_fill() {
        let output = SedOutput::new(results_table(vec![0, 3], vec![10.0, 40.0])).unwrap();
        let opts = ToImageOptions {
            shape: Some((2, 2)),
            ..Default::default()
        };
        let image = output.to_image("mass", &opts).unwrap();

        assert_eq!(image[[0, 0]], 10.0);
        assert!(image[[0, 1]].is_nan());
        assert!(image[[1, 0]].is_nan());
        assert_eq!(image[[1, 1]], 40.0);
    }

    #[test]
    fn test_to_image_index_out_of_range_fails() {
        let output = SedOutput::new(results_table(vec![4], vec![1.0])).unwrap();
        let opts = ToImageOptions {
            shape: Some((2, 2)),
            ..Default::default()
        };
        assert!(output.to_image("mass", &opts).is_err());
    }

    #[test]
    fn test_to_image_applies_scale_and_mean_map() {
        let set = configured_set();
        let n = set.pixel_index().unwrap().len();
        let mut output =
            SedOutput::new(results_table((0..n as i64).collect(), vec![100.0; n])).unwrap();
        output.link(&set).unwrap();

        let image = output.to_image("mass", &ToImageOptions::default()).unwrap();
        // Forward: value 100, scale factor 100, mean map 5 everywhere.
        // Inverse: 100 / 100 * 5 = 5.
        for &v in image.iter() {
            assert!((v - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_explicit_options_override_link() {
        let set = configured_set();
        let mut output = SedOutput::new(results_table(vec![0], vec![12.0])).unwrap();
        output.link(&set).unwrap();

        let opts = ToImageOptions {
            scale_factor: Some(1.0),
            mean_map: Some(Array2::from_elem((2, 3), 2.0)),
            ..Default::default()
        };
        let image = output.to_image("mass", &opts).unwrap();
        assert!((image[[0, 0]] - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_map_shape_mismatch_fails() {
        let output = SedOutput::new(results_table(vec![0], vec![1.0])).unwrap();
        let opts = ToImageOptions {
            shape: Some((2, 2)),
            mean_map: Some(Array2::from_elem((3, 3), 1.0)),
            ..Default::default()
        };
        assert!(matches!(
            output.to_image("mass", &opts),
            Err(SedError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_link_requires_configured_band_set() {
        let band = Band::new(
            "u",
            Array2::from_elem((2, 2), 1.0),
            Array2::from_elem((2, 2), 1.0),
            25.0,
        )
        .unwrap();
        let set = BandSet::new(vec![band], Array2::from_elem((2, 2), false)).unwrap();
        let mut output = SedOutput::new(results_table(vec![0], vec![1.0])).unwrap();
        assert!(matches!(
            output.link(&set),
            Err(SedError::Configuration(_))
        ));
    }

    #[test]
    fn test_props_survive_save_and_load() {
        let set = configured_set();
        let props = ImageProps::from_band_set(&set).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("galaxy1_props.json");
        props.save_to_file(&path).unwrap();
        let loaded = ImageProps::load_from_file(&path).unwrap();

        assert_eq!(loaded.shape, props.shape);
        assert_eq!(loaded.scale_factor, props.scale_factor);
        assert_eq!(
            loaded.mean_map.as_ref().unwrap(),
            props.mean_map.as_ref().unwrap()
        );
    }
}

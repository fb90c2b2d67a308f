//! Error types shared across the catalogue pipeline.

use thiserror::Error;

/// Errors raised during catalogue generation and map reconstruction.
///
/// Every variant is fatal to the operation that raised it. Per-pixel numeric
/// conditions (masked pixels, negative flux, zero variance) are resolved by the
/// substitution rules of the pipeline and never surface as errors.
#[derive(Error, Debug)]
pub enum SedError {
    /// A constructor or call argument is outside its allowed domain.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Two arrays that must align do not.
    #[error("shape mismatch {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// No bands or no valid pixels left to work with.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Engine selector not recognised.
    #[error("unsupported SED fitting engine '{0}'")]
    UnsupportedEngine(String),

    /// A column name not present in the table was requested.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

impl SedError {
    /// Build a [`SedError::ShapeMismatch`] with a short context string such as
    /// `"in band u"` or `"between mean map and image"`.
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        SedError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

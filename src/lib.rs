//! Multi-band pixel photometry tables for SED fitting, and back again.
//!
//! This crate turns per-pixel flux and variance maps of a galaxy, one pair per
//! filter, into the flat catalogue a SED fitting engine (LePhare or Cigale)
//! consumes, and reconstructs dense maps of the fitted physical properties
//! from the engine's results.
//!
//! The forward pipeline lives on [`BandSet`]: masking, negative-value
//! cleaning, optional shot-noise injection, engine-specific normalisation and
//! unit conversion, and dense-to-sparse flattening with valid-pixel tracking.
//! [`Catalogue`] projects the generated table into the engine's column layout.
//! The inverse lives on [`SedOutput`]: results rows are scattered back to
//! their pixel positions using the bookkeeping captured from the band set via
//! `link`, un-scaling and un-normalising along the way.
//!
//! Reading images from disk, writing catalogue files and driving the engines
//! themselves are left to the surrounding tooling; this crate only works on
//! arrays and tables.

pub mod band;
pub mod bandset;
pub mod catalogue;
pub mod error;
pub mod photometry;
pub mod reconstruct;
pub mod table;

// Re-export the main entry points for easier access
pub use band::{masked, Band};
pub use bandset::{clean, BandSet, CleanMethod, SedCode, TableParams};
pub use catalogue::Catalogue;
pub use error::SedError;
pub use reconstruct::{ImageProps, SedOutput, ToImageOptions};
pub use table::{Column, ColumnValues, Table};

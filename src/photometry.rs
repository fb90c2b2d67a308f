//! Photometric unit conversions.
//!
//! Pure scalar conversions between detector counts, AB magnitudes and physical
//! flux densities. Each function returns the converted value together with its
//! converted uncertainty, and each pair of functions is an exact mutual inverse
//! (up to floating-point rounding for the logarithmic pair).

/// Conversion factor from erg s⁻¹ cm⁻² Hz⁻¹ to mJy.
pub const MJY_PER_CGS: f64 = 1.0e26;

/// Convert a count rate and its standard error into an AB magnitude.
///
/// The magnitude is `-2.5 log10(value) + zeropoint` and the error follows the
/// usual first-order propagation `1.08 sigma / value`. The caller must ensure
/// `value > 0`; non-positive input propagates as NaN or infinity, it never
/// panics.
pub fn flux_to_magnitude(value: f64, sigma: f64, zeropoint: f64) -> (f64, f64) {
    let mag = -2.5 * value.log10() + zeropoint;
    let sigma_mag = 1.08 * sigma / value;
    (mag, sigma_mag)
}

/// Invert [`flux_to_magnitude`]: recover a count rate and its standard error
/// from an AB magnitude.
pub fn magnitude_to_flux(mag: f64, sigma_mag: f64, zeropoint: f64) -> (f64, f64) {
    let value = 10.0_f64.powf((zeropoint - mag) / 2.5);
    let sigma = sigma_mag * value / 1.08;
    (value, sigma)
}

/// Convert a count rate into a physical flux density in erg s⁻¹ cm⁻² Hz⁻¹.
///
/// The zeropoint is assumed to place the data on the AB system, so the scaling
/// is `10^(-(zeropoint + 48.6) / 2.5)`; the same multiplier applies to the
/// error.
pub fn count_to_flux_density(value: f64, sigma: f64, zeropoint: f64) -> (f64, f64) {
    let factor = 10.0_f64.powf(-(zeropoint + 48.6) / 2.5);
    (value * factor, sigma * factor)
}

/// Invert [`count_to_flux_density`]: recover a count rate from a physical flux
/// density in erg s⁻¹ cm⁻² Hz⁻¹.
pub fn flux_density_to_count(value: f64, sigma: f64, zeropoint: f64) -> (f64, f64) {
    let factor = 10.0_f64.powf((zeropoint + 48.6) / 2.5);
    (value * factor, sigma * factor)
}

//! Physical constants and system parameters

/// Propagation speed of the UWB pulse in air (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

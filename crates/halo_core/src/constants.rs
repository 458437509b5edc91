// Physical constants and pipeline defaults
// Units throughout the crate:
// - Distance: megaparsec (Mpc), comoving unless a name says proper
// - Mass: solar masses (Msun), no factors of h
// - Velocity: km/s
// - Sky angles: arcseconds

/// Speed of light in km/s
pub const C_KM_S: f64 = 299_792.458;

/// Gravitational constant in Mpc (km/s)^2 / Msun
pub const G_MPC: f64 = 4.300_917_270e-9;

/// Arcseconds per radian
pub const ARCSEC_PER_RAD: f64 = 3600.0 * 180.0 / std::f64::consts::PI;

/// Overdensity of the 200c mass definition, relative to the critical density
pub const DELTA_200C: f64 = 200.0;

/// Padding applied to the distance bracket of the redshift inversion grid (Mpc)
pub const INVERSION_PAD_MPC: f64 = 0.1;

/// Number of redshift samples in the inversion grid
pub const INVERSION_GRID_POINTS: usize = 10;

/// Highest redshift the distance root finder will search
pub const MAX_SEARCH_REDSHIFT: f64 = 1100.0;

/// Simpson intervals per unit redshift for the comoving distance integral
pub const SIMPSON_STEPS_PER_UNIT_Z: f64 = 512.0;

/// Steps kept between a halo and the nearest lightcone shell boundary
pub const SHELL_BUFFER_STEPS: usize = 10;

/// Fraction of the largest inscribed square kept as field of view
pub const FOV_TRIM: f64 = 0.95;

/// Default source redshift for lensing inputs
pub const DEFAULT_SOURCE_REDSHIFT: f64 = 10.0;

/// Default padding (in pixels) around the lensing grid
pub const DEFAULT_NPAD: usize = 5;

/// Default lensing grid resolution per side
pub const DEFAULT_GRID_SIZE: usize = 1024;

/// Default number of particles drawn for an NFW realization
pub const DEFAULT_PARTICLE_COUNT: usize = 10_000;

/// Largest particle count a padded point mass may lay out
pub const MAX_PADDED_PARTICLES: usize = 10_000_000;

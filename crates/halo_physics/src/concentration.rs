use halo_core::{Concentration, HaloError, HaloResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Mean concentration-mass relation for the 200c mass definition
pub trait ConcentrationModel: std::fmt::Debug {
    fn name(&self) -> &str;

    /// Concentration on the relation for mass `m200c_h` (Msun/h) at redshift `z`
    fn mean_concentration(&self, m200c_h: f64, z: f64) -> f64;
}

/// Child et al. (2018) power law, all individual halos:
/// c200c = A (1+z)^d M^m with M in Msun/h
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Child18 {
    pub amplitude: f64,
    pub redshift_slope: f64,
    pub mass_slope: f64,
}

impl Default for Child18 {
    fn default() -> Self {
        Self {
            amplitude: 57.6,
            redshift_slope: -0.376,
            mass_slope: -0.078,
        }
    }
}

impl ConcentrationModel for Child18 {
    fn name(&self) -> &str {
        "child18"
    }

    fn mean_concentration(&self, m200c_h: f64, z: f64) -> f64 {
        self.amplitude * (1.0 + z).powf(self.redshift_slope) * m200c_h.powf(self.mass_slope)
    }
}

/// Draws a halo concentration from a model, optionally with Gaussian
/// scatter of one third of the mean
#[derive(Debug)]
pub struct ConcentrationSampler<'a> {
    model: &'a dyn ConcentrationModel,
    scatter: bool,
}

impl<'a> ConcentrationSampler<'a> {
    pub fn new(model: &'a dyn ConcentrationModel, scatter: bool) -> Self {
        Self { model, scatter }
    }

    pub fn sample(&self, m200c_h: f64, z: f64, seed: u64) -> HaloResult<Concentration> {
        let mean = self.model.mean_concentration(m200c_h, z);
        if !(mean > 0.0) {
            return Err(HaloError::invalid(format!(
                "{} gives non-positive concentration {mean} for M={m200c_h:e}, z={z}",
                self.model.name()
            )));
        }
        if !self.scatter {
            return Ok(Concentration::fixed(mean));
        }
        let sigma = mean / 3.0;
        let normal = Normal::new(mean, sigma)
            .map_err(|e| HaloError::invalid(format!("concentration scatter: {e}")))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let value = normal.sample(&mut rng);
        if !(value > 0.0) {
            return Err(HaloError::invalid(format!(
                "drew non-positive concentration {value} (mean {mean}, sigma {sigma})"
            )));
        }
        Ok(Concentration {
            value,
            scatter: sigma,
        })
    }
}

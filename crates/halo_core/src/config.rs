use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PARTICLE_COUNT, G_MPC, SHELL_BUFFER_STEPS};
use crate::error::{HaloError, HaloResult};

/// Flat Lambda-CDM background parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmologyParams {
    pub name: String,
    /// Hubble constant in km/s/Mpc
    pub h0: f64,
    /// Matter density parameter at z=0
    pub omega_m0: f64,
    /// Baryon density parameter at z=0
    pub omega_b0: f64,
}

impl CosmologyParams {
    /// Outer Rim simulation cosmology
    pub fn outer_rim() -> Self {
        Self {
            name: "OuterRim".into(),
            h0: 71.0,
            omega_m0: 0.220,
            omega_b0: 0.02258 * 0.71 * 0.71,
        }
    }

    /// WMAP 7-year parameters, without radiation
    pub fn wmap7() -> Self {
        Self {
            name: "WMAP7".into(),
            h0: 70.4,
            omega_m0: 0.272,
            omega_b0: 0.0455,
        }
    }

    /// Dimensionless Hubble parameter
    pub fn h(&self) -> f64 {
        self.h0 / 100.0
    }

    /// Critical density at z=0 in Msun/Mpc^3
    pub fn critical_density_z0(&self) -> f64 {
        3.0 * self.h0 * self.h0 / (8.0 * std::f64::consts::PI * G_MPC)
    }

    pub fn validate(&self) -> HaloResult<()> {
        if !(self.h0 > 0.0) {
            return Err(HaloError::invalid(format!("H0 must be positive, got {}", self.h0)));
        }
        if !(self.omega_m0 > 0.0 && self.omega_m0 <= 1.0) {
            return Err(HaloError::invalid(format!(
                "Omega_m0 must lie in (0, 1], got {}",
                self.omega_m0
            )));
        }
        if !(self.omega_b0 >= 0.0 && self.omega_b0 <= self.omega_m0) {
            return Err(HaloError::invalid(format!(
                "Omega_b0 must lie in [0, Omega_m0], got {}",
                self.omega_b0
            )));
        }
        Ok(())
    }
}

impl Default for CosmologyParams {
    fn default() -> Self {
        Self::outer_rim()
    }
}

/// Mass per particle of a periodic box of side `box_size` (Mpc) holding
/// `n_particles` particles at the mean matter density
pub fn calc_mpp(params: &CosmologyParams, box_size: f64, n_particles: f64) -> f64 {
    let rho_m = params.critical_density_z0() * params.omega_m0;
    rho_m * box_size.powi(3) / n_particles
}

/// Bookkeeping for the N-body run whose lightcone the halo is inserted into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    /// Redshift of the initial conditions
    pub z_init: f64,
    /// Number of timesteps from z_init to z=0
    pub sim_steps: usize,
    /// Comoving box side length in Mpc
    pub box_size: f64,
    /// Mass per particle in Msun
    pub mpp: f64,
}

impl SimulationConfig {
    /// Outer Rim run: 10240^3 particles in a 4225 Mpc box
    pub fn outer_rim(params: &CosmologyParams) -> Self {
        let box_size = 4225.0;
        Self {
            name: "OuterRim".into(),
            z_init: 200.0,
            sim_steps: 500,
            box_size,
            mpp: calc_mpp(params, box_size, 10240f64.powi(3)),
        }
    }

    /// Key-wise merge: only the fields present in `update` change
    pub fn merge(&mut self, update: &SimulationUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(z_init) = update.z_init {
            self.z_init = z_init;
        }
        if let Some(steps) = update.sim_steps {
            self.sim_steps = steps;
        }
        if let Some(box_size) = update.box_size {
            self.box_size = box_size;
        }
        if let Some(mpp) = update.mpp {
            self.mpp = mpp;
        }
    }

    /// Redshift of every snapshot, uniform in scale factor from z_init to 0.
    /// Index 0 is the initial snapshot, the last index is z=0.
    pub fn snapshot_redshifts(&self) -> Vec<f64> {
        let a0 = 1.0 / (self.z_init + 1.0);
        match self.sim_steps {
            0 => Vec::new(),
            1 => vec![1.0 / a0 - 1.0],
            n => {
                let da = (1.0 - a0) / (n - 1) as f64;
                (0..n).map(|i| 1.0 / (a0 + da * i as f64) - 1.0).collect()
            }
        }
    }

    /// Redshift of snapshot `step`
    pub fn shell_redshift(&self, step: usize) -> HaloResult<f64> {
        self.snapshot_redshifts()
            .get(step)
            .copied()
            .ok_or_else(|| {
                HaloError::domain(format!(
                    "snapshot {step} outside a run of {} steps",
                    self.sim_steps
                ))
            })
    }

    /// Lightcone shell equivalent to redshift `z`, kept `SHELL_BUFFER_STEPS`
    /// steps away from the shell boundary
    pub fn lightcone_shell(&self, z: f64) -> HaloResult<usize> {
        if !(z >= 0.0 && z <= self.z_init) {
            return Err(HaloError::domain(format!(
                "redshift {z} outside simulated range [0, {}]",
                self.z_init
            )));
        }
        let later = self
            .snapshot_redshifts()
            .iter()
            .filter(|&&zz| zz < z)
            .count();
        self.sim_steps
            .checked_sub(later + SHELL_BUFFER_STEPS)
            .ok_or_else(|| {
                HaloError::domain(format!("redshift {z} leaves no room for the shell buffer"))
            })
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::outer_rim(&CosmologyParams::default())
    }
}

/// Partial simulation record, merged field by field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationUpdate {
    pub name: Option<String>,
    pub z_init: Option<f64>,
    pub sim_steps: Option<usize>,
    pub box_size: Option<f64>,
    pub mpp: Option<f64>,
}

impl SimulationUpdate {
    pub fn mpp(mpp: f64) -> Self {
        Self {
            mpp: Some(mpp),
            ..Self::default()
        }
    }
}

/// How an NFW halo is populated with particles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of particles to draw
    pub n_particles: usize,
    /// Maximum radial extent in units of r200c
    pub rfrac: f64,
    /// Line-of-sight clipping in units of r200c. Leaves the mass per
    /// particle unnormalized; debugging only.
    pub rfrac_los: Option<f64>,
}

impl PopulationConfig {
    pub fn validate(&self) -> HaloResult<()> {
        if self.n_particles == 0 {
            return Err(HaloError::invalid("population needs at least one particle"));
        }
        if !(self.rfrac > 0.0) {
            return Err(HaloError::invalid(format!("rfrac must be positive, got {}", self.rfrac)));
        }
        if let Some(los) = self.rfrac_los {
            if !(los > 0.0) {
                return Err(HaloError::invalid(format!("rfrac_los must be positive, got {los}")));
            }
        }
        Ok(())
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            n_particles: DEFAULT_PARTICLE_COUNT,
            rfrac: 1.0,
            rfrac_los: None,
        }
    }
}

/// Field tracers laid around a padded point mass.
///
/// A field of half-width `fov` gets k = round(2 fov sqrt(areal_density))
/// tracers per side and ceil(k^2 / tracer_mass_fraction) centre particles,
/// so the particle count grows with the field area: about 144,000 for a
/// 3 Mpc half-width at the defaults and 6.4 million at 20 Mpc. Layouts over
/// `MAX_PADDED_PARTICLES` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddingConfig {
    /// Tracers per comoving Mpc^2 on the lens plane
    pub areal_density: f64,
    /// Upper bound on the share of the total mass carried by tracers
    pub tracer_mass_fraction: f64,
}

impl PaddingConfig {
    pub fn validate(&self) -> HaloResult<()> {
        if !(self.areal_density > 0.0) {
            return Err(HaloError::invalid(format!(
                "tracer areal density must be positive, got {}",
                self.areal_density
            )));
        }
        if !(self.tracer_mass_fraction > 0.0 && self.tracer_mass_fraction < 1.0) {
            return Err(HaloError::invalid(format!(
                "tracer mass fraction must lie in (0, 1), got {}",
                self.tracer_mass_fraction
            )));
        }
        Ok(())
    }
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            areal_density: 4.0,
            tracer_mass_fraction: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_critical_density_outer_rim() {
        // 2.775e11 h^2 Msun/Mpc^3
        let rho = CosmologyParams::outer_rim().critical_density_z0();
        assert_relative_eq!(rho, 2.775e11 * 0.71 * 0.71, max_relative = 1e-3);
    }

    #[test]
    fn test_merge_is_keywise() {
        let mut sim = SimulationConfig::default();
        let before = sim.clone();
        sim.merge(&SimulationUpdate::mpp(1e9));
        assert_eq!(sim.mpp, 1e9);
        assert_eq!(sim.z_init, before.z_init);
        assert_eq!(sim.sim_steps, before.sim_steps);
        assert_eq!(sim.box_size, before.box_size);
        assert_eq!(sim.name, before.name);
    }

    #[test]
    fn test_outer_rim_mpp() {
        // total matter density, Omega_m0 = 0.22, over a 4225^3 box of 10240^3 particles
        let sim = SimulationConfig::default();
        assert_relative_eq!(sim.mpp, 2.162e9, max_relative = 1e-3);
    }

    #[test]
    fn test_snapshot_redshifts_span_run() {
        let sim = SimulationConfig::default();
        let zz = sim.snapshot_redshifts();
        assert_eq!(zz.len(), 500);
        assert_relative_eq!(zz[0], 200.0, max_relative = 1e-12);
        assert!(zz[499].abs() < 1e-12);
        assert!(zz.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_lightcone_shell_sits_beyond_halo() {
        let sim = SimulationConfig::default();
        let shell = sim.lightcone_shell(0.3).unwrap();
        assert!(sim.shell_redshift(shell).unwrap() > 0.3);
        assert!(sim.lightcone_shell(250.0).is_err());
        assert!(sim.shell_redshift(500).is_err());
    }

    #[test]
    fn test_population_validation() {
        assert!(PopulationConfig::default().validate().is_ok());
        let bad = PopulationConfig { n_particles: 0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = PopulationConfig { rfrac: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}

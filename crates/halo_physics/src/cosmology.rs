use halo_core::{
    ARCSEC_PER_RAD, C_KM_S, CosmologyParams, G_MPC, HaloError, HaloResult, INVERSION_PAD_MPC,
    INVERSION_GRID_POINTS, MAX_SEARCH_REDSHIFT, SIMPSON_STEPS_PER_UNIT_Z, SimulationConfig,
    SimulationUpdate,
};
use tracing::debug;

/// Expansion history the distance functions are built on
pub trait Background: std::fmt::Debug {
    fn params(&self) -> &CosmologyParams;

    /// Dimensionless Hubble rate E(z) = H(z) / H0
    fn efunc(&self, z: f64) -> f64;

    /// Line-of-sight comoving distance in Mpc
    fn comoving_distance(&self, z: f64) -> f64;

    /// Transverse comoving distance; equal to the line-of-sight one when flat
    fn transverse_comoving_distance(&self, z: f64) -> f64 {
        self.comoving_distance(z)
    }
}

/// Flat Lambda-CDM without radiation
#[derive(Debug, Clone)]
pub struct FlatLambdaCdm {
    params: CosmologyParams,
    omega_l0: f64,
    /// c / H0 in Mpc
    hubble_distance: f64,
}

impl FlatLambdaCdm {
    pub fn new(params: CosmologyParams) -> HaloResult<Self> {
        params.validate()?;
        Ok(Self {
            omega_l0: 1.0 - params.omega_m0,
            hubble_distance: C_KM_S / params.h0,
            params,
        })
    }

    pub fn outer_rim() -> Self {
        let params = CosmologyParams::outer_rim();
        Self {
            omega_l0: 1.0 - params.omega_m0,
            hubble_distance: C_KM_S / params.h0,
            params,
        }
    }

    pub fn hubble_distance(&self) -> f64 {
        self.hubble_distance
    }
}

impl Background for FlatLambdaCdm {
    fn params(&self) -> &CosmologyParams {
        &self.params
    }

    fn efunc(&self, z: f64) -> f64 {
        let zp1 = 1.0 + z;
        (self.params.omega_m0 * zp1 * zp1 * zp1 + self.omega_l0).sqrt()
    }

    fn comoving_distance(&self, z: f64) -> f64 {
        if z == 0.0 {
            return 0.0;
        }
        self.hubble_distance * simpson(|zz| 1.0 / self.efunc(zz), 0.0, z)
    }
}

/// Composite Simpson rule, interval count scaled with the range
fn simpson(f: impl Fn(f64) -> f64, a: f64, b: f64) -> f64 {
    let mut n = (((b - a).abs() * SIMPSON_STEPS_PER_UNIT_Z).ceil() as usize).max(16);
    n += n % 2;
    let h = (b - a) / n as f64;
    let inner: f64 = (1..n)
        .map(|i| {
            let w = if i % 2 == 1 { 4.0 } else { 2.0 };
            w * f(a + h * i as f64)
        })
        .sum();
    (f(a) + inner + f(b)) * h / 3.0
}

/// Background cosmology plus simulation bookkeeping, passed explicitly to
/// every component. Immutable for the lifetime of a realization; concurrent
/// realizations each hold their own context.
#[derive(Debug, Clone)]
pub struct CosmologyContext<B = FlatLambdaCdm> {
    background: B,
    sim: SimulationConfig,
}

impl CosmologyContext<FlatLambdaCdm> {
    /// Outer Rim cosmology and run setup
    pub fn outer_rim() -> Self {
        let background = FlatLambdaCdm::outer_rim();
        let sim = SimulationConfig::outer_rim(background.params());
        Self { background, sim }
    }

    pub fn flat(params: CosmologyParams, sim: SimulationConfig) -> HaloResult<Self> {
        Ok(Self::new(FlatLambdaCdm::new(params)?, sim))
    }
}

impl<B: Background> CosmologyContext<B> {
    pub fn new(background: B, sim: SimulationConfig) -> Self {
        Self { background, sim }
    }

    /// Copy of this context with `update` merged into the simulation record
    pub fn with_sim_update(mut self, update: &SimulationUpdate) -> Self {
        self.sim.merge(update);
        self
    }

    pub fn background(&self) -> &B {
        &self.background
    }

    pub fn params(&self) -> &CosmologyParams {
        self.background.params()
    }

    pub fn sim(&self) -> &SimulationConfig {
        &self.sim
    }

    pub fn h(&self) -> f64 {
        self.params().h()
    }

    pub fn comoving_distance(&self, z: f64) -> f64 {
        self.background.comoving_distance(z)
    }

    /// Comoving separation between two redshifts
    pub fn comoving_distance_between(&self, z1: f64, z2: f64) -> f64 {
        self.comoving_distance(z2) - self.comoving_distance(z1)
    }

    pub fn angular_diameter_distance(&self, z: f64) -> f64 {
        self.background.transverse_comoving_distance(z) / (1.0 + z)
    }

    /// Angular diameter distance of `z2` seen from `z1` (flat universe)
    pub fn angular_diameter_distance_between(&self, z1: f64, z2: f64) -> f64 {
        self.comoving_distance_between(z1, z2) / (1.0 + z2)
    }

    /// Transverse comoving Mpc subtended by one arcsecond at `z`
    pub fn comoving_mpc_per_arcsec(&self, z: f64) -> f64 {
        self.background.transverse_comoving_distance(z) / ARCSEC_PER_RAD
    }

    /// Transverse proper Mpc subtended by one arcsecond at `z`
    pub fn proper_mpc_per_arcsec(&self, z: f64) -> f64 {
        self.angular_diameter_distance(z) / ARCSEC_PER_RAD
    }

    /// Msun/Mpc^3
    pub fn critical_density_z0(&self) -> f64 {
        self.params().critical_density_z0()
    }

    /// Proper critical density at `z`, Msun/Mpc^3
    pub fn critical_density(&self, z: f64) -> f64 {
        let e = self.background.efunc(z);
        self.critical_density_z0() * e * e
    }

    /// Comoving mean matter density, Msun/Mpc^3
    pub fn mean_matter_density_z0(&self) -> f64 {
        self.critical_density_z0() * self.params().omega_m0
    }

    /// Projected mean matter density between `z1` and `z2`: the comoving mean
    /// density integrated along the line of sight, in comoving Msun/Mpc^2
    pub fn mean_matter_density(&self, z1: f64, z2: f64) -> f64 {
        self.mean_matter_density_z0() * self.comoving_distance_between(z1, z2)
    }

    /// Lensing critical surface density in proper Msun/Mpc^2.
    ///
    /// Built from angular diameter distances only, so no (1+z) factors enter.
    /// A surface density measured from comoving particle positions is in
    /// Msun/cMpc^2 and must be multiplied by (1+z_lens)^2 before comparing.
    pub fn critical_surface_density(&self, z_lens: f64, z_source: f64) -> HaloResult<f64> {
        if !(z_lens > 0.0 && z_source > z_lens) {
            return Err(HaloError::invalid(format!(
                "need 0 < z_lens < z_source, got z_lens={z_lens}, z_source={z_source}"
            )));
        }
        let d_l = self.angular_diameter_distance(z_lens);
        let d_s = self.angular_diameter_distance(z_source);
        let d_ls = self.angular_diameter_distance_between(z_lens, z_source);
        Ok(C_KM_S * C_KM_S / (4.0 * std::f64::consts::PI * G_MPC) * d_s / (d_l * d_ls))
    }

    /// Redshift at comoving distance `d` by bisection on the full background
    pub fn redshift_at_comoving_distance(&self, d: f64) -> HaloResult<f64> {
        if !(d >= 0.0) {
            return Err(HaloError::domain(format!("negative comoving distance {d}")));
        }
        if d == 0.0 {
            return Ok(0.0);
        }
        let mut lo = 0.0;
        let mut hi = 1.0;
        while self.comoving_distance(hi) < d {
            if hi >= MAX_SEARCH_REDSHIFT {
                return Err(HaloError::domain(format!(
                    "comoving distance {d} Mpc lies beyond z={MAX_SEARCH_REDSHIFT}"
                )));
            }
            lo = hi;
            hi = (hi * 2.0).min(MAX_SEARCH_REDSHIFT);
        }
        for _ in 0..200 {
            let mid = 0.5 * (lo + hi);
            if self.comoving_distance(mid) < d {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < 1e-13 * (1.0 + hi) {
                break;
            }
        }
        Ok(0.5 * (lo + hi))
    }

    /// Inversion grid over `[d_min - pad, d_max + pad]` with `n_points`
    /// redshift samples, uniform in redshift
    pub fn redshift_inverter(
        &self,
        d_min: f64,
        d_max: f64,
        n_points: usize,
    ) -> HaloResult<RedshiftInverter> {
        if n_points < INVERSION_GRID_POINTS {
            return Err(HaloError::invalid(format!(
                "inversion grid needs at least {INVERSION_GRID_POINTS} points, got {n_points}"
            )));
        }
        if !(d_min <= d_max) {
            return Err(HaloError::invalid(format!(
                "empty distance bracket [{d_min}, {d_max}]"
            )));
        }
        let z_lo = self.redshift_at_comoving_distance((d_min - INVERSION_PAD_MPC).max(0.0))?;
        let z_hi = self.redshift_at_comoving_distance(d_max + INVERSION_PAD_MPC)?;
        let dz = (z_hi - z_lo) / (n_points - 1) as f64;
        let redshifts: Vec<f64> = (0..n_points).map(|i| z_lo + dz * i as f64).collect();
        let distances: Vec<f64> = redshifts.iter().map(|&z| self.comoving_distance(z)).collect();
        debug!(
            "Redshift inversion grid: z in [{:.6}, {:.6}], {} points",
            z_lo, z_hi, n_points
        );
        Ok(RedshiftInverter {
            distances,
            redshifts,
        })
    }

    /// Redshift at comoving distance `d`, interpolated on a local grid
    pub fn inverse_comoving_distance(&self, d: f64) -> HaloResult<f64> {
        self.redshift_inverter(d, d, INVERSION_GRID_POINTS)?.invert(d)
    }
}

/// Piecewise-linear inverse of the comoving distance over a sampled bracket.
/// Knots are strictly increasing in both coordinates, so the inverse is
/// strictly monotone inside the bracket.
#[derive(Debug, Clone)]
pub struct RedshiftInverter {
    distances: Vec<f64>,
    redshifts: Vec<f64>,
}

impl RedshiftInverter {
    /// Sampled distance bracket
    pub fn bounds(&self) -> (f64, f64) {
        (self.distances[0], self.distances[self.distances.len() - 1])
    }

    pub fn grid_len(&self) -> usize {
        self.distances.len()
    }

    pub fn invert(&self, d: f64) -> HaloResult<f64> {
        let (lo, hi) = self.bounds();
        if !(d >= lo && d <= hi) {
            return Err(HaloError::domain(format!(
                "distance {d} Mpc outside inversion bracket [{lo}, {hi}]"
            )));
        }
        let n = self.distances.len();
        let j = self
            .distances
            .partition_point(|&x| x <= d)
            .saturating_sub(1)
            .min(n - 2);
        let (d0, d1) = (self.distances[j], self.distances[j + 1]);
        let (z0, z1) = (self.redshifts[j], self.redshifts[j + 1]);
        Ok(z0 + (d - d0) / (d1 - d0) * (z1 - z0))
    }

    pub fn invert_all(&self, distances: &[f64]) -> HaloResult<Vec<f64>> {
        distances.iter().map(|&d| self.invert(d)).collect()
    }
}

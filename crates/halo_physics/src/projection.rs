use halo_core::{
    ARCSEC_PER_RAD, HaloError, HaloParticles, HaloResult, INVERSION_GRID_POINTS, SkyParticles,
};
use tracing::debug;

use crate::cosmology::{Background, CosmologyContext};

/// Places a halo-centred particle cloud on the observer's lightcone.
/// The observer sits at the origin and the line of sight runs along x.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionEngine<'a, B> {
    ctx: &'a CosmologyContext<B>,
    grid_points: usize,
}

impl<'a, B: Background> ProjectionEngine<'a, B> {
    pub fn new(ctx: &'a CosmologyContext<B>) -> Self {
        Self {
            ctx,
            grid_points: INVERSION_GRID_POINTS,
        }
    }

    /// Redshift samples in the inversion grid (at least 10)
    pub fn with_grid_points(mut self, grid_points: usize) -> Self {
        self.grid_points = grid_points;
        self
    }

    /// Project comoving halo-centric particles of a halo at `z_halo`
    pub fn project(&self, particles: &HaloParticles, z_halo: f64) -> HaloResult<SkyParticles> {
        if !(z_halo > 0.0) {
            return Err(HaloError::invalid(format!(
                "halo must sit beyond the observer, got z={z_halo}"
            )));
        }
        let d_halo = self.ctx.comoving_distance(z_halo);
        let [mut x, y, z] = particles.cartesian();
        x.iter_mut().for_each(|xi| *xi += d_halo);
        self.project_cartesian(x, y, z)
    }

    /// Sky angles and redshifts for observer-frame Cartesian positions
    pub fn project_cartesian(
        &self,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
    ) -> HaloResult<SkyParticles> {
        if x.is_empty() {
            return Err(HaloError::invalid("cannot project an empty particle set"));
        }
        if x.len() != y.len() || x.len() != z.len() {
            return Err(HaloError::invalid("Cartesian columns differ in length"));
        }
        let r_sky: Vec<f64> = x
            .iter()
            .zip(&y)
            .zip(&z)
            .map(|((&xi, &yi), &zi)| (xi * xi + yi * yi + zi * zi).sqrt())
            .collect();
        if r_sky.iter().any(|&r| !(r > 0.0)) {
            return Err(HaloError::invalid("particle at the observer has no sky position"));
        }
        let (theta, phi) = sky_angles(&x, &y, &z, &r_sky);

        let r_min = r_sky.iter().copied().fold(f64::INFINITY, f64::min);
        let r_max = r_sky.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let inverter = self.ctx.redshift_inverter(r_min, r_max, self.grid_points)?;
        let redshift = inverter.invert_all(&r_sky)?;
        debug!(
            "Projected {} particles, r_sky in [{:.4}, {:.4}] Mpc",
            r_sky.len(),
            r_min,
            r_max
        );

        SkyParticles::from_columns([x, y, z, theta, phi, redshift])
    }
}

/// theta = arccos(z / r), phi = arctan(y / x), both in arcseconds
fn sky_angles(x: &[f64], y: &[f64], z: &[f64], r_sky: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let theta = z
        .iter()
        .zip(r_sky)
        .map(|(&zi, &r)| (zi / r).clamp(-1.0, 1.0).acos() * ARCSEC_PER_RAD)
        .collect();
    let phi = y
        .iter()
        .zip(x)
        .map(|(&yi, &xi)| (yi / xi).atan() * ARCSEC_PER_RAD)
        .collect();
    (theta, phi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_single_particle_on_axis() {
        let ctx = CosmologyContext::outer_rim();
        let engine = ProjectionEngine::new(&ctx);
        let d = ctx.comoving_distance(0.5);
        let sky = engine.project_cartesian(vec![d], vec![0.0], vec![0.0]).unwrap();
        assert_relative_eq!(sky.theta()[0], 90.0 * 3600.0, max_relative = 1e-12);
        assert_abs_diff_eq!(sky.phi()[0], 0.0);
        assert_relative_eq!(sky.redshift()[0], 0.5, max_relative = 1e-6);
    }

    #[test]
    fn test_halo_displaced_along_line_of_sight() {
        let ctx = CosmologyContext::outer_rim();
        let engine = ProjectionEngine::new(&ctx);
        let p = HaloParticles::new(
            vec![0.0, 1.0],
            vec![0.3, std::f64::consts::FRAC_PI_2],
            vec![0.0, 0.0],
        )
        .unwrap();
        let sky = engine.project(&p, 0.3).unwrap();
        let d = ctx.comoving_distance(0.3);
        assert_relative_eq!(sky.x()[0], d);
        assert_relative_eq!(sky.x()[1], d + 1.0, max_relative = 1e-12);
        assert!(sky.redshift()[1] > sky.redshift()[0]);
    }

    #[test]
    fn test_transverse_offset_angle() {
        let ctx = CosmologyContext::outer_rim();
        let engine = ProjectionEngine::new(&ctx);
        let d = ctx.comoving_distance(0.3);
        let sky = engine
            .project_cartesian(vec![d, d], vec![1.0, 0.0], vec![0.0, 1.0])
            .unwrap();
        assert_relative_eq!(sky.phi()[0], (1.0 / d).atan() * ARCSEC_PER_RAD);
        let r = (d * d + 1.0).sqrt();
        assert_relative_eq!(sky.theta()[1], (1.0 / r).acos() * ARCSEC_PER_RAD);
    }

    #[test]
    fn test_finer_inversion_grid() {
        let ctx = CosmologyContext::outer_rim();
        let d = ctx.comoving_distance(0.3);
        let x = vec![d - 5.0, d, d + 5.0];
        let coarse = ProjectionEngine::new(&ctx)
            .project_cartesian(x.clone(), vec![0.0; 3], vec![0.0; 3])
            .unwrap();
        let fine = ProjectionEngine::new(&ctx)
            .with_grid_points(20)
            .project_cartesian(x.clone(), vec![0.0; 3], vec![0.0; 3])
            .unwrap();
        for (i, &xi) in x.iter().enumerate() {
            let exact = ctx.redshift_at_comoving_distance(xi).unwrap();
            assert!((coarse.redshift()[i] - exact).abs() < 1e-7);
            assert!((fine.redshift()[i] - exact).abs() < 1e-7);
        }
        assert!(
            ProjectionEngine::new(&ctx)
                .with_grid_points(5)
                .project_cartesian(x, vec![0.0; 3], vec![0.0; 3])
                .is_err()
        );
    }

    #[test]
    fn test_zero_redshift_halo_rejected() {
        let ctx = CosmologyContext::outer_rim();
        let engine = ProjectionEngine::new(&ctx);
        let p = HaloParticles::new(vec![1.0], vec![1.0], vec![1.0]).unwrap();
        assert!(matches!(engine.project(&p, 0.0), Err(HaloError::InvalidParameter(_))));
        assert!(engine.project(&HaloParticles::default(), 0.3).is_err());
    }
}

use halo_core::{
    ARCSEC_PER_RAD, HaloError, HaloProperties, HaloResult, MAX_PADDED_PARTICLES, PaddingConfig,
    RealizationState, SkyParticles,
};
use halo_physics::{Background, CosmologyContext, FlatLambdaCdm, ProjectionEngine};
use std::f64::consts::FRAC_PI_2;
use tracing::{info, warn};

use crate::realization::{HaloRealization, Stage};

fn validate_lens(mass: f64, redshift: f64) -> HaloResult<()> {
    if !(mass > 0.0) {
        return Err(HaloError::invalid(format!("point mass must be positive, got {mass}")));
    }
    if !(redshift > 0.0) {
        return Err(HaloError::invalid(format!(
            "point mass must sit beyond the observer, got z={redshift}"
        )));
    }
    Ok(())
}

fn validate_fov(fov_size: f64) -> HaloResult<()> {
    if !(fov_size > 0.0) {
        return Err(HaloError::invalid(format!(
            "field of view half-width must be positive, got {fov_size}"
        )));
    }
    Ok(())
}

/// `n` copies of the field centre at the lens distance
fn centre_particles(n: usize, distance: f64, redshift: f64) -> HaloResult<SkyParticles> {
    SkyParticles::from_columns([
        vec![distance; n],
        vec![0.0; n],
        vec![0.0; n],
        vec![FRAC_PI_2 * ARCSEC_PER_RAD; n],
        vec![0.0; n],
        vec![redshift; n],
    ])
}

fn point_properties<B: Background>(
    ctx: &CosmologyContext<B>,
    mass: f64,
    redshift: f64,
    fov_size: f64,
    mpp: f64,
) -> HaloProperties {
    HaloProperties {
        redshift,
        mass,
        radius: None,
        concentration: None,
        lightcone_shell: None,
        box_radius_mpc: fov_size,
        box_radius_arcsec: fov_size / ctx.comoving_mpc_per_arcsec(redshift),
        mpp,
    }
}

/// All of the lens mass on one particle at the centre of the field
#[derive(Debug)]
pub struct PointMass<'a, B = FlatLambdaCdm> {
    ctx: &'a CosmologyContext<B>,
    mass: f64,
    redshift: f64,
    /// Field-of-view half-width once populated, comoving Mpc
    stage: Stage<f64>,
}

impl<'a, B: Background> PointMass<'a, B> {
    pub fn new(ctx: &'a CosmologyContext<B>, mass: f64, redshift: f64) -> HaloResult<Self> {
        validate_lens(mass, redshift)?;
        Ok(Self {
            ctx,
            mass,
            redshift,
            stage: Stage::default(),
        })
    }

    /// `fov_size` is the comoving half-width of the square field at the lens
    pub fn populate(&mut self, fov_size: f64) -> HaloResult<()> {
        validate_fov(fov_size)?;
        self.stage.populate(fov_size);
        Ok(())
    }
}

impl<B: Background> HaloRealization for PointMass<'_, B> {
    fn kind(&self) -> &'static str {
        "point-mass"
    }

    fn state(&self) -> RealizationState {
        self.stage.state()
    }

    fn finalize(&self) -> HaloResult<(SkyParticles, HaloProperties)> {
        let fov_size = *self.stage.populated("finalize")?;
        let distance = self.ctx.comoving_distance(self.redshift);
        let particles = centre_particles(1, distance, self.redshift)?;
        let properties = point_properties(self.ctx, self.mass, self.redshift, fov_size, self.mass);
        Ok((particles, properties))
    }

    fn mark_emitted(&mut self) {
        self.stage.mark_emitted();
    }
}

/// Layout of a padded point mass over its field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddingLayout {
    pub fov_size: f64,
    /// Tracers per side of the square grid
    pub grid_side: usize,
    pub n_center: usize,
    pub n_tracers: usize,
    /// Equal for centre particles and tracers
    pub mpp: f64,
}

impl PaddingLayout {
    fn new(mass: f64, fov_size: f64, padding: &PaddingConfig) -> HaloResult<Self> {
        let side = 2.0 * fov_size;
        let tracers_per_side = (side * padding.areal_density.sqrt()).round().max(1.0);
        let n_center_f = (tracers_per_side * tracers_per_side / padding.tracer_mass_fraction).ceil();
        if n_center_f + tracers_per_side * tracers_per_side > MAX_PADDED_PARTICLES as f64 {
            return Err(HaloError::invalid(format!(
                "padded field of half-width {fov_size} Mpc needs {:.3e} particles, \
                 above the limit of {MAX_PADDED_PARTICLES}",
                n_center_f + tracers_per_side * tracers_per_side
            )));
        }
        let grid_side = tracers_per_side as usize;
        let n_tracers = grid_side * grid_side;
        let n_center = n_center_f as usize;
        Ok(Self {
            fov_size,
            grid_side,
            n_center,
            n_tracers,
            mpp: mass / (n_center + n_tracers) as f64,
        })
    }

    pub fn total(&self) -> usize {
        self.n_center + self.n_tracers
    }

    /// Share of the lens mass carried by the field tracers
    pub fn tracer_mass_fraction(&self) -> f64 {
        self.n_tracers as f64 / self.total() as f64
    }

    /// Transverse cell centres along one axis, comoving Mpc
    pub fn cell_centres(&self) -> Vec<f64> {
        let d = 2.0 * self.fov_size / self.grid_side as f64;
        (0..self.grid_side)
            .map(|i| -self.fov_size + d * (i as f64 + 0.5))
            .collect()
    }
}

/// Point mass spread over many centre particles, plus a uniform grid of
/// light tracers across the field so density estimates stay defined away
/// from the lens
#[derive(Debug)]
pub struct PaddedPointMass<'a, B = FlatLambdaCdm> {
    ctx: &'a CosmologyContext<B>,
    mass: f64,
    redshift: f64,
    padding: PaddingConfig,
    stage: Stage<PaddingLayout>,
}

impl<'a, B: Background> PaddedPointMass<'a, B> {
    pub fn new(
        ctx: &'a CosmologyContext<B>,
        mass: f64,
        redshift: f64,
        padding: PaddingConfig,
    ) -> HaloResult<Self> {
        validate_lens(mass, redshift)?;
        padding.validate()?;
        Ok(Self {
            ctx,
            mass,
            redshift,
            padding,
            stage: Stage::default(),
        })
    }

    pub fn layout(&self) -> Option<&PaddingLayout> {
        self.stage.populated("read layout").ok()
    }

    pub fn populate(&mut self, fov_size: f64) -> HaloResult<()> {
        validate_fov(fov_size)?;
        let layout = PaddingLayout::new(self.mass, fov_size, &self.padding)?;
        warn!(
            "{} field tracers carry {:.3e} of the lens mass ({} centre particles)",
            layout.n_tracers,
            layout.tracer_mass_fraction(),
            layout.n_center
        );
        info!(
            "Populated padded point mass with {} particles, mpp={:.4e} Msun",
            layout.total(),
            layout.mpp
        );
        self.stage.populate(layout);
        Ok(())
    }
}

impl<B: Background> HaloRealization for PaddedPointMass<'_, B> {
    fn kind(&self) -> &'static str {
        "padded point-mass"
    }

    fn state(&self) -> RealizationState {
        self.stage.state()
    }

    fn finalize(&self) -> HaloResult<(SkyParticles, HaloProperties)> {
        let layout = *self.stage.populated("finalize")?;
        let distance = self.ctx.comoving_distance(self.redshift);
        let mut particles = centre_particles(layout.n_center, distance, self.redshift)?;

        let centres = layout.cell_centres();
        let mut y = Vec::with_capacity(layout.n_tracers);
        let mut z = Vec::with_capacity(layout.n_tracers);
        for &zi in &centres {
            for &yi in &centres {
                y.push(yi);
                z.push(zi);
            }
        }
        let tracers = ProjectionEngine::new(self.ctx).project_cartesian(
            vec![distance; layout.n_tracers],
            y,
            z,
        )?;
        particles.extend(&tracers);

        let properties =
            point_properties(self.ctx, self.mass, self.redshift, layout.fov_size, layout.mpp);
        Ok((particles, properties))
    }

    fn mark_emitted(&mut self) {
        self.stage.mark_emitted();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_mass_single_particle() {
        let ctx = CosmologyContext::outer_rim();
        let mut lens = PointMass::new(&ctx, 1e12, 0.5).unwrap();
        lens.populate(3.0).unwrap();
        let (sky, props) = lens.finalize().unwrap();
        assert_eq!(sky.len(), 1);
        assert_relative_eq!(sky.x()[0], ctx.comoving_distance(0.5));
        assert_eq!(sky.redshift(), &[0.5]);
        assert_relative_eq!(sky.theta()[0], 324_000.0, max_relative = 1e-12);
        assert_eq!(props.mpp, 1e12);
        assert_eq!(props.box_radius_mpc, 3.0);
        assert_eq!(props.schema(), halo_core::PropertiesSchema::PointMass);
    }

    #[test]
    fn test_point_mass_validation() {
        let ctx = CosmologyContext::outer_rim();
        assert!(PointMass::new(&ctx, 0.0, 0.5).is_err());
        assert!(PointMass::new(&ctx, 1e12, 0.0).is_err());
        let mut lens = PointMass::new(&ctx, 1e12, 0.5).unwrap();
        assert!(lens.populate(-1.0).is_err());
        assert!(matches!(lens.finalize(), Err(HaloError::InvalidState { .. })));
    }

    #[test]
    fn test_padding_layout() {
        let layout = PaddingLayout::new(1e12, 3.0, &PaddingConfig::default()).unwrap();
        // 6 Mpc side at 4 tracers per Mpc^2
        assert_eq!(layout.grid_side, 12);
        assert_eq!(layout.n_tracers, 144);
        assert!((144_000..=144_001).contains(&layout.n_center));
        assert!(layout.tracer_mass_fraction() <= 1e-3);
        assert_relative_eq!(layout.mpp * layout.total() as f64, 1e12, max_relative = 1e-12);

        let centres = layout.cell_centres();
        assert_relative_eq!(centres[0], -2.75);
        assert_relative_eq!(centres[11], 2.75);
        assert_relative_eq!(centres[5] + centres[6], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_padding_layout_grows_with_area() {
        let padding = PaddingConfig::default();
        let wide = PaddingLayout::new(1e12, 20.0, &padding).unwrap();
        assert_eq!(wide.grid_side, 80);
        assert!((6_400_000..=6_400_001).contains(&wide.n_center));

        let ctx = CosmologyContext::outer_rim();
        let mut lens = PaddedPointMass::new(&ctx, 1e12, 0.5, padding).unwrap();
        assert!(matches!(lens.populate(30.0), Err(HaloError::InvalidParameter(_))));
        assert_eq!(lens.state(), RealizationState::Constructed);
    }

    #[test]
    fn test_padded_particles_cover_field() {
        let ctx = CosmologyContext::outer_rim();
        let padding = PaddingConfig {
            areal_density: 1.0,
            tracer_mass_fraction: 0.125,
        };
        let mut lens = PaddedPointMass::new(&ctx, 1e12, 0.5, padding).unwrap();
        lens.populate(2.0).unwrap();
        let layout = *lens.layout().unwrap();
        assert_eq!(layout.n_tracers, 16);
        assert_eq!(layout.n_center, 128);

        let (sky, props) = lens.finalize().unwrap();
        assert_eq!(sky.len(), 144);
        let d = ctx.comoving_distance(0.5);
        assert!(sky.x().iter().all(|&x| x == d));
        assert!(sky.redshift()[..128].iter().all(|&z| z == 0.5));
        // tracers sit off-axis, so slightly behind the lens in redshift
        assert!(sky.redshift()[128..].iter().all(|&z| z > 0.5 && z < 0.501));
        let y_max = sky.y().iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(y_max, 1.5);
        assert_relative_eq!(props.mpp, 1e12 / 144.0);
    }
}

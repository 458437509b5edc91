use halo_core::{
    Concentration, FOV_TRIM, HaloError, HaloParticles, HaloProperties, HaloResult,
    PopulationConfig, RealizationState, SkyParticles,
};
use halo_physics::{
    Background, Child18, ConcentrationModel, ConcentrationSampler, CosmologyContext,
    EnclosedMassModel, FlatLambdaCdm, InverseCdfNfwSampler, ProjectionEngine, RadialSampler,
    clip_line_of_sight, mass_from_r200, r200_from_mass, sample_angles, sample_population_radii,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::realization::{HaloRealization, Stage};

/// The one user-supplied size of a halo; the other follows from the
/// 200c mass-radius relation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaloSize {
    /// M200c in Msun
    Mass(f64),
    /// r200c in proper Mpc
    Radius(f64),
}

#[derive(Debug, Clone)]
struct Population {
    /// Comoving halo-centric positions
    particles: HaloParticles,
    mpp: f64,
    rfrac: f64,
}

/// NFW halo at the centre of the field, placed on the line of sight
#[derive(Debug)]
pub struct NfwHalo<'a, B = FlatLambdaCdm> {
    ctx: &'a CosmologyContext<B>,
    m200c: f64,
    r200c: f64,
    redshift: f64,
    concentration: Concentration,
    seed: u64,
    sampler: Box<dyn RadialSampler + 'a>,
    lightcone_shell: Option<usize>,
    stage: Stage<Population>,
}

pub struct NfwHaloBuilder<'a, B> {
    ctx: &'a CosmologyContext<B>,
    redshift: f64,
    size: Option<HaloSize>,
    size_given_twice: bool,
    concentration: Option<f64>,
    scatter: bool,
    seed: Option<u64>,
    concentration_model: Box<dyn ConcentrationModel + 'a>,
    radial_sampler: Box<dyn RadialSampler + 'a>,
    lightcone_shell: Option<usize>,
    shell_from_sim: bool,
}

impl<'a, B: Background> NfwHaloBuilder<'a, B> {
    fn set_size(mut self, size: HaloSize) -> Self {
        self.size_given_twice |= self.size.is_some();
        self.size = Some(size);
        self
    }

    pub fn mass(self, m200c: f64) -> Self {
        self.set_size(HaloSize::Mass(m200c))
    }

    pub fn radius(self, r200c: f64) -> Self {
        self.set_size(HaloSize::Radius(r200c))
    }

    pub fn size(self, size: HaloSize) -> Self {
        self.set_size(size)
    }

    /// Fix the concentration instead of drawing it from the model
    pub fn concentration(mut self, c: f64) -> Self {
        self.concentration = Some(c);
        self
    }

    /// Draw the concentration with Gaussian scatter around the relation
    pub fn scatter(mut self, scatter: bool) -> Self {
        self.scatter = scatter;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn concentration_model(mut self, model: impl ConcentrationModel + 'a) -> Self {
        self.concentration_model = Box::new(model);
        self
    }

    pub fn radial_sampler(mut self, sampler: impl RadialSampler + 'a) -> Self {
        self.radial_sampler = Box::new(sampler);
        self
    }

    /// Tag the output with a lightcone shell for multi-plane inputs
    pub fn lightcone_shell(mut self, shell: usize) -> Self {
        self.lightcone_shell = Some(shell);
        self
    }

    /// Tag the output with the lightcone shell the simulation places the
    /// halo redshift in. An explicit [`Self::lightcone_shell`] wins.
    pub fn lightcone_shell_from_sim(mut self) -> Self {
        self.shell_from_sim = true;
        self
    }

    pub fn build(self) -> HaloResult<NfwHalo<'a, B>> {
        let z = self.redshift;
        if !(z > 0.0) {
            return Err(HaloError::invalid(format!(
                "NFW halo must sit beyond the observer, got z={z}"
            )));
        }
        if self.size_given_twice {
            return Err(HaloError::invalid("supply exactly one of mass or radius, not both"));
        }
        let rho_crit = self.ctx.critical_density(z);
        let (m200c, r200c) = match self.size {
            None => return Err(HaloError::invalid("neither mass nor radius supplied")),
            Some(HaloSize::Mass(m)) if m > 0.0 => (m, r200_from_mass(m, rho_crit)),
            Some(HaloSize::Radius(r)) if r > 0.0 => (mass_from_r200(r, rho_crit), r),
            Some(size) => {
                return Err(HaloError::invalid(format!("halo size must be positive, got {size:?}")));
            }
        };

        let lightcone_shell = match self.lightcone_shell {
            Some(shell) => Some(shell),
            None if self.shell_from_sim => Some(self.ctx.sim().lightcone_shell(z)?),
            None => None,
        };

        let seed = self.seed.unwrap_or_else(rand::random);
        let concentration = match self.concentration {
            Some(c) if c > 0.0 => Concentration::fixed(c),
            Some(c) => {
                return Err(HaloError::invalid(format!(
                    "concentration must be positive, got {c}"
                )));
            }
            // the relation is calibrated on Msun/h
            None => ConcentrationSampler::new(self.concentration_model.as_ref(), self.scatter)
                .sample(m200c * self.ctx.h(), z, seed)?,
        };

        info!(
            "NFW halo: M200c={:.4e} Msun, r200c={:.4} Mpc, z={}, c={:.3}",
            m200c, r200c, z, concentration.value
        );
        Ok(NfwHalo {
            ctx: self.ctx,
            m200c,
            r200c,
            redshift: z,
            concentration,
            seed,
            sampler: self.radial_sampler,
            lightcone_shell,
            stage: Stage::default(),
        })
    }
}

impl<'a, B: Background> NfwHalo<'a, B> {
    pub fn builder(ctx: &'a CosmologyContext<B>, redshift: f64) -> NfwHaloBuilder<'a, B> {
        NfwHaloBuilder {
            ctx,
            redshift,
            size: None,
            size_given_twice: false,
            concentration: None,
            scatter: false,
            seed: None,
            concentration_model: Box::new(Child18::default()),
            radial_sampler: Box::new(InverseCdfNfwSampler::default()),
            lightcone_shell: None,
            shell_from_sim: false,
        }
    }

    pub fn m200c(&self) -> f64 {
        self.m200c
    }

    /// Proper Mpc
    pub fn r200c(&self) -> f64 {
        self.r200c
    }

    pub fn redshift(&self) -> f64 {
        self.redshift
    }

    pub fn concentration(&self) -> Concentration {
        self.concentration
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Comoving halo-centric particles once populated
    pub fn particles(&self) -> Option<&HaloParticles> {
        self.stage.populated("read particles").ok().map(|p| &p.particles)
    }

    pub fn mass_per_particle(&self) -> Option<f64> {
        self.stage.populated("read mass per particle").ok().map(|p| p.mpp)
    }

    /// Draw the particle realization. Radii come from the radial sampler on
    /// stream `seed + 1`, angles on `seed + 2`; radii are made comoving.
    pub fn populate(&mut self, config: &PopulationConfig) -> HaloResult<()> {
        config.validate()?;
        let n = config.n_particles;
        let c = self.concentration.value;
        let radii = sample_population_radii(
            self.sampler.as_ref(),
            n,
            c,
            self.r200c,
            config.rfrac,
            self.seed.wrapping_add(1),
        )?;
        let mpp = EnclosedMassModel::new(self.m200c, self.r200c, c)?
            .mass_per_particle(config.rfrac, n)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(2));
        let (theta, phi) = sample_angles(n, &mut rng);
        let mut particles = HaloParticles::new(radii, theta, phi)?;
        particles.scale_radii(1.0 + self.redshift);

        // comoving x against the proper r200c
        if let Some(rfrac_los) = config.rfrac_los {
            clip_line_of_sight(&mut particles, self.r200c, rfrac_los)?;
        }

        info!(
            "Populated NFW halo with {} particles out to {} r200c, mpp={:.4e} Msun",
            particles.len(),
            config.rfrac,
            mpp
        );
        self.stage.populate(Population {
            particles,
            mpp,
            rfrac: config.rfrac,
        });
        Ok(())
    }

    /// Radial extent of the current population in units of r200c
    pub fn max_rfrac(&self) -> Option<f64> {
        self.stage.populated("read extent").ok().map(|p| p.rfrac)
    }
}

impl<B: Background> HaloRealization for NfwHalo<'_, B> {
    fn kind(&self) -> &'static str {
        "NFW"
    }

    fn state(&self) -> RealizationState {
        self.stage.state()
    }

    fn finalize(&self) -> HaloResult<(SkyParticles, HaloProperties)> {
        let population = self.stage.populated("finalize")?;
        let sky = ProjectionEngine::new(self.ctx).project(&population.particles, self.redshift)?;

        // largest square inside the projected ball, trimmed
        let box_radius_mpc = FOV_TRIM * population.particles.max_radius() / std::f64::consts::SQRT_2;
        let properties = HaloProperties {
            redshift: self.redshift,
            mass: self.m200c,
            radius: Some(self.r200c),
            concentration: Some(self.concentration),
            lightcone_shell: self.lightcone_shell,
            box_radius_mpc,
            box_radius_arcsec: box_radius_mpc / self.ctx.comoving_mpc_per_arcsec(self.redshift),
            mpp: population.mpp,
        };
        Ok((sky, properties))
    }

    fn mark_emitted(&mut self) {
        self.stage.mark_emitted();
    }
}
